// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the monotonic frame allocator: a single `(cartridge,
//! frame)` cursor that hands out fresh slots for append-only file
//! growth.
//!
//! Allocation is append-only. Slots freed by `close` are never
//! reclaimed; there is no free-list, so a file's frames stay assigned
//! to it for the life of the process even after it is closed.

#![forbid(unsafe_code)]

use bus::Slot;

/// Returned when the device has no cartridges left to allocate from.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("frame allocator exhausted: all {max_cartridges} cartridges are fully allocated")]
pub struct Exhausted {
    pub max_cartridges: u16,
}

/// Hands out fresh slots in cartridge-major, frame-minor order starting
/// at `(0, 0)`.
///
pub struct Allocator {
    max_cartridges: u16,
    max_frames_per_cartridge: u16,
    next_cartridge: u16,
    next_frame: u16,
}

impl Allocator {
    /// Creates an allocator for a device with `max_cartridges`
    /// cartridges, each holding `max_frames_per_cartridge` frames.
    ///
    pub fn new(max_cartridges: u16, max_frames_per_cartridge: u16) -> Self {
        Allocator {
            max_cartridges,
            max_frames_per_cartridge,
            next_cartridge: 0,
            next_frame: 0,
        }
    }

    /// Returns the current cursor and advances it, or
    /// [`Exhausted`] if the device has no slots left.
    ///
    pub fn alloc(&mut self) -> Result<Slot, Exhausted> {
        if self.next_cartridge >= self.max_cartridges {
            return Err(Exhausted {
                max_cartridges: self.max_cartridges,
            });
        }

        let slot = Slot::new(self.next_cartridge, self.next_frame);

        self.next_frame += 1;
        if self.next_frame == self.max_frames_per_cartridge {
            self.next_frame = 0;
            self.next_cartridge += 1;
        }

        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_in_cartridge_major_frame_minor_order() {
        let mut alloc = Allocator::new(2, 2);
        assert_eq!(alloc.alloc().unwrap(), Slot::new(0, 0));
        assert_eq!(alloc.alloc().unwrap(), Slot::new(0, 1));
        assert_eq!(alloc.alloc().unwrap(), Slot::new(1, 0));
        assert_eq!(alloc.alloc().unwrap(), Slot::new(1, 1));
    }

    #[test]
    fn exhaustion_is_reported_once_the_device_is_full() {
        let mut alloc = Allocator::new(1, 1);
        assert_eq!(alloc.alloc().unwrap(), Slot::new(0, 0));
        assert_eq!(
            alloc.alloc().unwrap_err(),
            Exhausted { max_cartridges: 1 }
        );
    }

    #[test]
    fn allocation_never_reuses_a_slot() {
        let mut alloc = Allocator::new(3, 4);
        let mut seen = std::collections::HashSet::new();
        while let Ok(slot) = alloc.alloc() {
            assert!(seen.insert(slot), "slot {:?} allocated twice", slot);
        }
        assert_eq!(seen.len(), 12);
    }
}
