// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Orchestrates the bus codec, network transport, device driver, frame
//! cache, frame allocator and file table into a POSIX-like filesystem
//! API: `power_on`/`power_off`, `open`/`close`/`seek`, and
//! `read`/`write`.
//!
//! [`Filesystem`] is generic over [`transport::BusTransport`] so the
//! production [`transport::TcpTransport`] and an in-memory test double
//! share one orchestration path.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;

pub use config::Config;
pub use error::Error;

use bus::{Slot, FRAME_SIZE};
use transport::BusTransport;

/// The single top-level driver value: owns the device driver, the
/// frame cache (once initialized by `power_on`), the frame allocator
/// and the file table, and exposes the filesystem API as methods.
///
/// Collapses what would otherwise be a handful of process-wide
/// singletons (the loaded cartridge, the cache, the file table, the
/// allocator cursor) into fields of one owned value.
///
pub struct Filesystem<T: BusTransport> {
    driver: device::Driver<T>,
    cache: Option<cache::Cache>,
    cache_size: usize,
    allocator: allocator::Allocator,
    table: filetable::Table,
}

impl<T: BusTransport> Filesystem<T> {
    /// Builds a filesystem over `transport`, with cache capacity and
    /// device geometry taken from `config`. No opcodes are issued and
    /// no file operation is valid until [`Filesystem::power_on`].
    ///
    pub fn new(transport: T, config: &Config) -> Self {
        Filesystem {
            driver: device::Driver::new(
                transport,
                config.max_cartridges,
                config.max_frames_per_cartridge,
            ),
            cache: None,
            cache_size: config.cache_size,
            allocator: allocator::Allocator::new(
                config.max_cartridges,
                config.max_frames_per_cartridge,
            ),
            table: filetable::Table::new(),
        }
    }

    /// Sets the cache's capacity. Callable before [`Filesystem::power_on`],
    /// or after it as long as the cache created by `power_on` is still
    /// empty (no `read`/`write` has touched it yet) — once a frame has
    /// been cached, capacity is fixed and resizing fails, since the
    /// cache cannot grow or shrink out from under live entries.
    ///
    pub fn set_cache_size(&mut self, capacity: usize) -> Result<(), Error> {
        match &self.cache {
            None => {}
            Some(cache) if cache.is_empty() => {}
            Some(_) => return Err(Error::CacheNotInitialized),
        }
        self.cache_size = capacity;
        if self.cache.is_some() {
            self.cache = Some(cache::Cache::new(capacity));
        }
        Ok(())
    }

    /// Resets the device, zeroes every cartridge, and initializes the
    /// frame cache. Must be called once before any file operation.
    ///
    pub fn power_on(&mut self) -> Result<(), Error> {
        self.driver.power_on()?;
        self.cache = Some(cache::Cache::new(self.cache_size));
        Ok(())
    }

    /// Releases all open file entries, shuts the device down, and
    /// tears down the cache. No file operation is valid until the next
    /// `power_on`.
    ///
    pub fn power_off(&mut self) -> Result<(), Error> {
        self.table.clear();
        self.driver.power_off()?;
        self.cache = None;
        Ok(())
    }

    /// Opens `name`, creating it on first use or resuming a previously
    /// closed file of the same name. Returns the assigned handle.
    ///
    pub fn open(&mut self, name: &[u8]) -> Result<filetable::Handle, Error> {
        Ok(self.table.open(name)?)
    }

    /// Closes `handle`, retaining the file's content for a later
    /// `open` of the same name.
    ///
    pub fn close(&mut self, handle: filetable::Handle) -> Result<(), Error> {
        Ok(self.table.close(handle)?)
    }

    /// Moves `handle`'s read/write position to `offset`. Fails if
    /// `offset` exceeds the file's current length.
    ///
    pub fn seek(&mut self, handle: filetable::Handle, offset: u32) -> Result<(), Error> {
        Ok(self.table.seek(handle, offset)?)
    }

    fn cache_get(&mut self, slot: Slot) -> Result<Option<[u8; FRAME_SIZE]>, Error> {
        Ok(self
            .cache
            .as_mut()
            .ok_or(Error::CacheNotInitialized)?
            .get(slot))
    }

    fn cache_put(&mut self, slot: Slot, payload: &[u8; FRAME_SIZE]) -> Result<(), Error> {
        self.cache
            .as_mut()
            .ok_or(Error::CacheNotInitialized)?
            .put(slot, payload);
        Ok(())
    }

    /// Returns `slot`'s payload, faulting it in from the device on a
    /// cache miss and populating the cache with the result.
    ///
    fn load_frame(&mut self, slot: Slot) -> Result<[u8; FRAME_SIZE], Error> {
        if let Some(payload) = self.cache_get(slot)? {
            return Ok(payload);
        }

        self.driver.load(slot.cartridge)?;
        let mut payload = [0u8; FRAME_SIZE];
        self.driver.read_frame(slot.frame, &mut payload)?;
        self.cache_put(slot, &payload)?;
        Ok(payload)
    }

    /// Writes `payload` to `slot` on the device, then refreshes the
    /// cache. Write-through: the device write completes before this
    /// returns, so cache and device agree on `slot`'s content.
    ///
    fn store_frame(&mut self, slot: Slot, payload: &[u8; FRAME_SIZE]) -> Result<(), Error> {
        self.driver.load(slot.cartridge)?;
        self.driver.write_frame(slot.frame, payload)?;
        self.cache_put(slot, payload)?;
        Ok(())
    }

    /// Reads up to `n` bytes from `handle` into `out`, starting at its
    /// current position, and advances the position by the number of
    /// bytes returned. Returns `0` at end of file.
    ///
    pub fn read(&mut self, handle: filetable::Handle, out: &mut [u8], n: usize) -> Result<usize, Error> {
        let (position, length, slots) = {
            let entry = self.table.entry(handle)?;
            (entry.position, entry.length, entry.slots.clone())
        };

        let remaining = (length - position) as usize;
        let n = n.min(remaining).min(out.len());
        if n == 0 {
            return Ok(0);
        }

        let first = position as usize / FRAME_SIZE;
        let mut last = (position as usize + n - 1) / FRAME_SIZE;
        if last >= slots.len() {
            last = slots.len() - 1;
        }

        let mut assembled = Vec::with_capacity((last - first + 1) * FRAME_SIZE);
        for slot in &slots[first..=last] {
            assembled.extend_from_slice(&self.load_frame(*slot)?);
        }

        let start = position as usize - first * FRAME_SIZE;
        out[..n].copy_from_slice(&assembled[start..start + n]);

        self.table.entry_mut(handle)?.position = position + n as u32;
        Ok(n)
    }

    /// Writes up to `n` bytes of `data` to `handle` at its current
    /// position, allocating new frames to extend the file as needed,
    /// and advances the position by the number of bytes written.
    ///
    pub fn write(&mut self, handle: filetable::Handle, data: &[u8], n: usize) -> Result<usize, Error> {
        let n = n.min(data.len());
        if n == 0 {
            return Ok(0);
        }

        let (position, length, mut slots) = {
            let entry = self.table.entry(handle)?;
            (entry.position, entry.length, entry.slots.clone())
        };

        let end = position as usize + n;
        let highest_frame = (end - 1) / FRAME_SIZE;
        while slots.len() <= highest_frame {
            slots.push(self.allocator.alloc()?);
        }

        let first = position as usize / FRAME_SIZE;
        for (i, slot) in slots.iter().enumerate().take(highest_frame + 1).skip(first) {
            let frame_start = i * FRAME_SIZE;
            let frame_end = frame_start + FRAME_SIZE;
            let lo = frame_start.max(position as usize);
            let hi = frame_end.min(end);

            let mut payload = if lo == frame_start && hi == frame_end {
                [0u8; FRAME_SIZE]
            } else {
                self.load_frame(*slot)?
            };

            payload[(lo - frame_start)..(hi - frame_start)]
                .copy_from_slice(&data[(lo - position as usize)..(hi - position as usize)]);

            self.store_frame(*slot, &payload)?;
        }

        let entry = self.table.entry_mut(handle)?;
        entry.slots = slots;
        entry.length = length.max(position + n as u32);
        entry.position = position + n as u32;

        Ok(n)
    }
}
