// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the device driver: a thin, stateful wrapper around a
//! [`transport::BusTransport`] that issues the HRAM device's six
//! opcodes and tracks which cartridge is currently loaded.
//!
//! Callers of [`Driver::read_frame`] and [`Driver::write_frame`] are
//! responsible for ensuring the target cartridge has already been
//! [`Driver::load`]ed — the filesystem layer does this before every
//! frame access, the way the virtio block driver requires the PCI
//! device to already be reset and negotiated before issuing requests.

#![forbid(unsafe_code)]

use bus::{Opcode, FRAME_SIZE};
use transport::BusTransport;

/// Errors the device driver can return.
///
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport failed to complete an exchange.
    #[error("transport error: {0}")]
    Transport(#[from] transport::Error),

    /// The device set `ret = 1` for the given opcode. A non-zero `ret`
    /// is never retried internally; it is surfaced to the caller.
    #[error("device reported an error for opcode {opcode:?}")]
    DeviceError { opcode: Opcode },

    /// A frame operation was attempted before any cartridge had been
    /// loaded.
    #[error("no cartridge is currently loaded")]
    NoCartridgeLoaded,
}

/// Wraps a [`BusTransport`], issuing opcodes and tracking the
/// currently loaded cartridge.
///
pub struct Driver<T: BusTransport> {
    transport: T,
    max_cartridges: u16,
    max_frames_per_cartridge: u16,
    loaded_cartridge: Option<u16>,
}

impl<T: BusTransport> Driver<T> {
    /// Wraps `transport` for a device with `max_cartridges` cartridges
    /// of `max_frames_per_cartridge` frames each. No opcodes are issued
    /// until [`Driver::power_on`] is called.
    ///
    pub fn new(transport: T, max_cartridges: u16, max_frames_per_cartridge: u16) -> Self {
        Driver {
            transport,
            max_cartridges,
            max_frames_per_cartridge,
            loaded_cartridge: None,
        }
    }

    /// Returns the number of frames in a cartridge, for callers
    /// computing frame/offset math.
    ///
    pub fn max_frames_per_cartridge(&self) -> u16 {
        self.max_frames_per_cartridge
    }

    /// Returns the number of cartridges the device has.
    ///
    pub fn max_cartridges(&self) -> u16 {
        self.max_cartridges
    }

    /// Returns the cartridge currently targetable by read/write/zero
    /// opcodes, if any has been loaded.
    ///
    pub fn loaded_cartridge(&self) -> Option<u16> {
        self.loaded_cartridge
    }

    fn exchange(
        &mut self,
        opcode: Opcode,
        cartridge: u16,
        frame: u16,
        buffer: &mut [u8; FRAME_SIZE],
    ) -> Result<(), Error> {
        let request = bus::encode(opcode as u8, cartridge, frame);
        let response = self.transport.exchange(request, buffer)?;
        let fields = bus::decode(response);
        if fields.ret {
            return Err(Error::DeviceError { opcode });
        }
        Ok(())
    }

    /// Resets the device, then loads and zeroes every cartridge in
    /// order, leaving the last cartridge loaded.
    ///
    pub fn power_on(&mut self) -> Result<(), Error> {
        let mut scratch = [0u8; FRAME_SIZE];
        self.exchange(Opcode::Init, 0, 0, &mut scratch)?;
        for cartridge in 0..self.max_cartridges {
            log::debug!("device: loading and zeroing cartridge {}", cartridge);
            self.exchange(Opcode::LoadCartridge, cartridge, 0, &mut scratch)?;
            self.loaded_cartridge = Some(cartridge);
            self.exchange(Opcode::ZeroCurrentCartridge, cartridge, 0, &mut scratch)?;
        }
        Ok(())
    }

    /// Shuts the device down. The caller is responsible for tearing
    /// down any higher-level state (file table, cache) around this
    /// call; the driver only issues the shutdown opcode.
    ///
    pub fn power_off(&mut self) -> Result<(), Error> {
        let mut scratch = [0u8; FRAME_SIZE];
        self.exchange(Opcode::Shutdown, 0, 0, &mut scratch)?;
        self.loaded_cartridge = None;
        Ok(())
    }

    /// Makes `cartridge` the target of subsequent frame operations. A
    /// no-op if `cartridge` is already loaded.
    ///
    pub fn load(&mut self, cartridge: u16) -> Result<(), Error> {
        if self.loaded_cartridge == Some(cartridge) {
            return Ok(());
        }
        let mut scratch = [0u8; FRAME_SIZE];
        self.exchange(Opcode::LoadCartridge, cartridge, 0, &mut scratch)?;
        self.loaded_cartridge = Some(cartridge);
        Ok(())
    }

    /// Zeroes every frame of the currently loaded cartridge.
    ///
    pub fn zero_current(&mut self) -> Result<(), Error> {
        let cartridge = self.loaded_cartridge.ok_or(Error::NoCartridgeLoaded)?;
        let mut scratch = [0u8; FRAME_SIZE];
        self.exchange(Opcode::ZeroCurrentCartridge, cartridge, 0, &mut scratch)
    }

    /// Reads `frame` of the currently loaded cartridge into `out`.
    ///
    pub fn read_frame(&mut self, frame: u16, out: &mut [u8; FRAME_SIZE]) -> Result<(), Error> {
        let cartridge = self.loaded_cartridge.ok_or(Error::NoCartridgeLoaded)?;
        self.exchange(Opcode::ReadFrame, cartridge, frame, out)
    }

    /// Writes `data` to `frame` of the currently loaded cartridge.
    ///
    pub fn write_frame(&mut self, frame: u16, data: &[u8; FRAME_SIZE]) -> Result<(), Error> {
        let cartridge = self.loaded_cartridge.ok_or(Error::NoCartridgeLoaded)?;
        let mut buffer = *data;
        self.exchange(Opcode::WriteFrame, cartridge, frame, &mut buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// An in-memory stand-in for the real device server, used to test
    /// the driver's opcode sequencing without a TCP round trip.
    struct MockTransport {
        cartridges: HashMap<u16, Vec<[u8; FRAME_SIZE]>>,
        max_frames_per_cartridge: u16,
        loaded: Option<u16>,
    }

    impl MockTransport {
        fn new(max_frames_per_cartridge: u16) -> Self {
            MockTransport {
                cartridges: HashMap::new(),
                max_frames_per_cartridge,
                loaded: None,
            }
        }
    }

    impl BusTransport for MockTransport {
        fn exchange(
            &mut self,
            request: u64,
            buffer: &mut [u8; FRAME_SIZE],
        ) -> Result<u64, transport::Error> {
            let fields = bus::decode(request);
            let opcode = Opcode::try_from(fields.key1).unwrap();
            match opcode {
                Opcode::Init => {}
                Opcode::LoadCartridge => self.loaded = Some(fields.cartridge1),
                Opcode::ZeroCurrentCartridge => {
                    let frames = self
                        .cartridges
                        .entry(fields.cartridge1)
                        .or_insert_with(|| vec![[0u8; FRAME_SIZE]; self.max_frames_per_cartridge as usize]);
                    frames.iter_mut().for_each(|f| *f = [0u8; FRAME_SIZE]);
                }
                Opcode::ReadFrame => {
                    let frames = self.cartridges.get(&fields.cartridge1).unwrap();
                    *buffer = frames[fields.frame1 as usize];
                }
                Opcode::WriteFrame => {
                    let frames = self.cartridges.get_mut(&fields.cartridge1).unwrap();
                    frames[fields.frame1 as usize] = *buffer;
                }
                Opcode::Shutdown => {}
            }
            Ok(bus::encode_response(fields.key1, fields.cartridge1, fields.frame1, false))
        }
    }

    #[test]
    fn power_on_loads_and_zeroes_every_cartridge() {
        let mut driver = Driver::new(MockTransport::new(2), 3, 2);
        driver.power_on().unwrap();
        assert_eq!(driver.loaded_cartridge(), Some(2));
    }

    #[test]
    fn load_is_a_no_op_when_already_loaded() {
        let mut driver = Driver::new(MockTransport::new(2), 2, 2);
        driver.power_on().unwrap();
        driver.load(1).unwrap();
        assert_eq!(driver.loaded_cartridge(), Some(1));
    }

    #[test]
    fn write_then_read_round_trips_through_the_device() {
        let mut driver = Driver::new(MockTransport::new(2), 1, 2);
        driver.power_on().unwrap();
        driver.load(0).unwrap();

        let data = [0x5Au8; FRAME_SIZE];
        driver.write_frame(1, &data).unwrap();

        let mut out = [0u8; FRAME_SIZE];
        driver.read_frame(1, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn frame_operations_require_a_loaded_cartridge() {
        let mut driver = Driver::new(MockTransport::new(2), 1, 2);
        let mut out = [0u8; FRAME_SIZE];
        assert!(matches!(
            driver.read_frame(0, &mut out),
            Err(Error::NoCartridgeLoaded)
        ));
    }
}
