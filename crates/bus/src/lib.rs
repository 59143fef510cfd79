// Copyright 2022 The Firefly Authors.
//
// Use of this source code is governed by a BSD 3-clause
// license that can be found in the LICENSE file.

//! Implements the HRAM bus register: the 64-bit word that carries every
//! request to, and response from, the simulated storage device.
//!
//! The register packs an opcode and two small operands into a single
//! `u64`, matching the layout documented below. [`encode`] builds a
//! request word; [`decode`] extracts the fields of a request or
//! response word. Neither function can fail: every `u64` decodes to
//! well-formed field values, and every opcode/operand triple encodes to
//! a well-formed word.
//!
//! ```text
//! bit   63    56 55    48 47  46        31 30        15 14           0
//!       +-------+-------+---+------------+------------+--------------+
//!       | key1  | key2  |ret| cartridge1 |   frame1   |   reserved   |
//!       +-------+-------+---+------------+------------+--------------+
//! ```

#![forbid(unsafe_code)]

/// The number of bytes transferred by the device in a single frame
/// operation. The device never performs partial-frame I/O.
///
pub const FRAME_SIZE: usize = 1024;

/// Identifies one frame on the device: a cartridge and a frame within
/// it. Both fields share the bus register's 16-bit operand width, so a
/// slot always round-trips through [`encode`]/[`decode`] without
/// truncation.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub cartridge: u16,
    pub frame: u16,
}

impl Slot {
    pub fn new(cartridge: u16, frame: u16) -> Self {
        Slot { cartridge, frame }
    }
}

const KEY1_SHIFT: u32 = 56;
const RET_SHIFT: u32 = 47;
const CARTRIDGE_SHIFT: u32 = 31;
const FRAME_SHIFT: u32 = 15;

const KEY1_MASK: u64 = 0xff;
const RET_MASK: u64 = 0x1;
const CARTRIDGE_MASK: u64 = 0xffff;
const FRAME_MASK: u64 = 0xffff;

// `key2` (bits 55..48) and the low 15 bits are reserved and always
// zero; `encode`/`encode_response` never set them.

/// The set of opcodes the bus register's `key1` field can carry.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Reset the device and prepare it for use.
    Init = 0,

    /// Zero every frame of the currently loaded cartridge.
    ZeroCurrentCartridge = 1,

    /// Make a cartridge the target of subsequent frame operations.
    LoadCartridge = 2,

    /// Read one frame from the currently loaded cartridge.
    ReadFrame = 3,

    /// Write one frame to the currently loaded cartridge.
    WriteFrame = 4,

    /// Tear the device down.
    Shutdown = 5,
}

/// Describes a `key1` value that does not correspond to a known
/// [`Opcode`].
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownOpcode(pub u8);

impl TryFrom<u8> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Init),
            1 => Ok(Opcode::ZeroCurrentCartridge),
            2 => Ok(Opcode::LoadCartridge),
            3 => Ok(Opcode::ReadFrame),
            4 => Ok(Opcode::WriteFrame),
            5 => Ok(Opcode::Shutdown),
            other => Err(UnknownOpcode(other)),
        }
    }
}

impl Opcode {
    /// Returns whether this opcode's exchange carries a 1024-byte
    /// payload, and if so, in which direction.
    ///
    pub fn payload_direction(self) -> Option<PayloadDirection> {
        match self {
            Opcode::ReadFrame => Some(PayloadDirection::DeviceToHost),
            Opcode::WriteFrame => Some(PayloadDirection::HostToDevice),
            _ => None,
        }
    }
}

/// Describes which side of the exchange supplies the 1024-byte frame
/// payload, if any.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadDirection {
    /// The host writes `buffer` to the wire before the request word's
    /// response is read.
    HostToDevice,

    /// The device writes `buffer` to the wire after the response word.
    DeviceToHost,
}

/// The decoded fields of a bus register word.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fields {
    /// The raw opcode byte. Kept raw (rather than as an [`Opcode`]) so
    /// that `decode` never fails.
    ///
    pub key1: u8,

    /// The cartridge operand.
    ///
    pub cartridge1: u16,

    /// The frame operand.
    ///
    pub frame1: u16,

    /// The device's return code: `false` for success, `true` for error.
    /// Always `false` on a well-formed request.
    ///
    pub ret: bool,
}

/// Packs an opcode and its two operands into a 64-bit request word, with
/// `key2`, `ret` and the reserved bits all zero.
///
pub fn encode(key1: u8, cartridge1: u16, frame1: u16) -> u64 {
    ((key1 as u64 & KEY1_MASK) << KEY1_SHIFT)
        | ((cartridge1 as u64 & CARTRIDGE_MASK) << CARTRIDGE_SHIFT)
        | ((frame1 as u64 & FRAME_MASK) << FRAME_SHIFT)
}

/// Extracts the fields of a request or response word.
///
pub fn decode(word: u64) -> Fields {
    Fields {
        key1: ((word >> KEY1_SHIFT) & KEY1_MASK) as u8,
        cartridge1: ((word >> CARTRIDGE_SHIFT) & CARTRIDGE_MASK) as u16,
        frame1: ((word >> FRAME_SHIFT) & FRAME_MASK) as u16,
        ret: ((word >> RET_SHIFT) & RET_MASK) != 0,
    }
}

/// Packs a response word: the same layout as [`encode`], but with `ret`
/// set according to whether the device reported success.
///
pub fn encode_response(key1: u8, cartridge1: u16, frame1: u16, ret: bool) -> u64 {
    encode(key1, cartridge1, frame1) | ((ret as u64 & RET_MASK) << RET_SHIFT)
}
