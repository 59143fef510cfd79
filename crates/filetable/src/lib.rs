// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the flat, single-namespace file table: per-file metadata
//! mapping a name to an open/closed handle, a byte length, a read/write
//! position and the ordered sequence of [`bus::Slot`]s backing its
//! content.
//!
//! Names are sticky: closing a file retains its `length` and `slots`,
//! so reopening the same name resumes its content. Handles are
//! recycled: the smallest positive handle not currently in use among
//! open entries is assigned on every `open`.

#![forbid(unsafe_code)]

use bus::Slot;

/// A handle naming an open file within the process. Positive values are
/// open; `0` is never a valid open handle.
///
pub type Handle = i16;

/// Per-file metadata. An entry is created on the first `open` of a
/// name and persists for the table's lifetime.
///
#[derive(Debug)]
pub struct FileEntry {
    /// The file's name, compared by value. Stored as an explicit
    /// length-carrying byte sequence rather than a fixed-size buffer,
    /// so there is no terminator to allocate space for and no risk of
    /// writing past the end of a fixed-size name field.
    ///
    pub name: Vec<u8>,

    /// `0` when closed; a unique positive value while open.
    ///
    pub handle: Handle,

    /// The file's length in bytes. Always `<= slots.len() * FRAME_SIZE`.
    ///
    pub length: u32,

    /// The read/write cursor. Always `<= length`. Reset to `0` on open
    /// and close.
    ///
    pub position: u32,

    /// The ordered slots backing the file's content; slot `i` backs
    /// bytes `[i * FRAME_SIZE, (i + 1) * FRAME_SIZE)`.
    ///
    pub slots: Vec<Slot>,
}

/// Errors returned by [`Table`]'s operations.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `handle` was `<= 0`, or did not match any open entry. `0` is
    /// reserved for "closed", so it is always reported as
    /// [`Error::HandleNotOpen`] rather than this variant; this variant
    /// covers a positive handle that no open entry currently holds.
    #[error("handle {0} does not refer to an open file")]
    InvalidHandle(Handle),

    /// `handle` was `0`, or (equivalently, from the caller's
    /// perspective) named a file that is not currently open.
    #[error("handle {0} is not open")]
    HandleNotOpen(Handle),

    /// `open` was called for a name whose entry already has a positive
    /// handle.
    #[error("file is already open")]
    AlreadyOpen,

    /// `seek` was asked to move past the file's current length.
    #[error("seek offset {offset} exceeds file length {length}")]
    SeekOutOfRange { offset: u32, length: u32 },
}

/// The flat, single-namespace table of file entries. Lookups by name
/// and by handle are both linear scans; the table is not expected to
/// hold enough files for that to matter.
///
#[derive(Default)]
pub struct Table {
    entries: Vec<FileEntry>,
}

impl Table {
    /// Returns an empty table.
    ///
    pub fn new() -> Self {
        Table {
            entries: Vec::new(),
        }
    }

    fn smallest_unused_handle(&self) -> Handle {
        let mut candidate: Handle = 1;
        while self.entries.iter().any(|e| e.handle == candidate) {
            candidate += 1;
        }
        candidate
    }

    /// Opens `name`, creating a new entry on first use or reviving a
    /// previously-closed one. Returns the assigned handle.
    ///
    pub fn open(&mut self, name: &[u8]) -> Result<Handle, Error> {
        match self.entries.iter().position(|e| e.name == name) {
            Some(index) => {
                if self.entries[index].handle > 0 {
                    return Err(Error::AlreadyOpen);
                }
                let handle = self.smallest_unused_handle();
                self.entries[index].handle = handle;
                self.entries[index].position = 0;
                Ok(handle)
            }
            None => {
                let handle = self.smallest_unused_handle();
                self.entries.push(FileEntry {
                    name: name.to_vec(),
                    handle,
                    length: 0,
                    position: 0,
                    slots: Vec::new(),
                });
                Ok(handle)
            }
        }
    }

    /// Closes `handle`: sets its entry's handle and position to zero,
    /// retaining `length` and `slots`.
    ///
    pub fn close(&mut self, handle: Handle) -> Result<(), Error> {
        let index = self.open_index(handle)?;
        self.entries[index].handle = 0;
        self.entries[index].position = 0;
        Ok(())
    }

    /// Moves `handle`'s position to `offset`. Fails if `offset` exceeds
    /// the file's current length, leaving the position unchanged.
    ///
    pub fn seek(&mut self, handle: Handle, offset: u32) -> Result<(), Error> {
        let index = self.open_index(handle)?;
        let length = self.entries[index].length;
        if offset > length {
            return Err(Error::SeekOutOfRange { offset, length });
        }
        self.entries[index].position = offset;
        Ok(())
    }

    /// Returns a shared reference to the entry for `handle`.
    ///
    pub fn entry(&self, handle: Handle) -> Result<&FileEntry, Error> {
        let index = self.open_index(handle)?;
        Ok(&self.entries[index])
    }

    /// Returns a mutable reference to the entry for `handle`.
    ///
    pub fn entry_mut(&mut self, handle: Handle) -> Result<&mut FileEntry, Error> {
        let index = self.open_index(handle)?;
        Ok(&mut self.entries[index])
    }

    /// Releases every entry. Used by the filesystem's power-off
    /// sequence; does not touch the device or cache.
    ///
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn open_index(&self, handle: Handle) -> Result<usize, Error> {
        if handle <= 0 {
            return Err(Error::HandleNotOpen(handle));
        }
        self.entries
            .iter()
            .position(|e| e.handle == handle)
            .ok_or(Error::InvalidHandle(handle))
    }
}
