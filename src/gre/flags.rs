use std::convert::TryFrom;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use thiserror::Error;

/// Index of the byte holding flags and version, relative to the GRE header start.
pub const GRE_FLAGS_BYTE: usize = 1;
/// Bits 7..3 of the flags byte.
pub const FLAGS_BITS: u8 = 0xF8;
pub const FLAGS_SHIFT: u32 = 3;
/// Bits 2..0 of the flags byte carry the GRE version.
pub const VERSION_BITS: u8 = 0x07;
pub const FLAGS_MAX: u8 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("GRE flags at offset {offset} are outside of a {len} byte packet")]
    OutOfBounds { offset: usize, len: usize },
}

/// A five bit GRE flags value or mask.
///
/// Bit 4 of the value is the most significant bit of the flags byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GreFlags(u8);

impl GreFlags {
    pub const NONE: GreFlags = GreFlags(0);
    pub const ALL: GreFlags = GreFlags(FLAGS_MAX);

    pub fn new(bits: u8) -> Option<Self> {
        if bits <= FLAGS_MAX {
            Some(GreFlags(bits))
        } else {
            None
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    fn from_byte(byte: u8) -> Self {
        GreFlags((byte & FLAGS_BITS) >> FLAGS_SHIFT)
    }

    fn to_byte(self) -> u8 {
        self.0 << FLAGS_SHIFT
    }
}

impl TryFrom<u8> for GreFlags {
    type Error = u8;

    fn try_from(bits: u8) -> Result<Self, u8> {
        GreFlags::new(bits).ok_or(bits)
    }
}

impl From<GreFlags> for u8 {
    fn from(flags: GreFlags) -> u8 {
        flags.0
    }
}

impl BitAnd for GreFlags {
    type Output = GreFlags;

    fn bitand(self, rhs: GreFlags) -> GreFlags {
        GreFlags(self.0 & rhs.0)
    }
}

impl BitOr for GreFlags {
    type Output = GreFlags;

    fn bitor(self, rhs: GreFlags) -> GreFlags {
        GreFlags(self.0 | rhs.0)
    }
}

impl Not for GreFlags {
    type Output = GreFlags;

    fn not(self) -> GreFlags {
        GreFlags(!self.0 & FLAGS_MAX)
    }
}

impl fmt::Display for GreFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl fmt::Binary for GreFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:05b}", self.0)
    }
}

fn flags_index(len: usize, gre_offset: usize) -> Result<usize, CodecError> {
    match gre_offset.checked_add(GRE_FLAGS_BYTE) {
        Some(index) if index < len => Ok(index),
        _ => Err(CodecError::OutOfBounds {
            offset: gre_offset,
            len,
        }),
    }
}

/// Read the flags of the GRE header starting at `gre_offset`.
pub fn read_flags(packet: &[u8], gre_offset: usize) -> Result<GreFlags, CodecError> {
    let index = flags_index(packet.len(), gre_offset)?;
    Ok(GreFlags::from_byte(packet[index]))
}

/// Read the three version bits of the GRE header starting at `gre_offset`.
pub fn read_version(packet: &[u8], gre_offset: usize) -> Result<u8, CodecError> {
    let index = flags_index(packet.len(), gre_offset)?;
    Ok(packet[index] & VERSION_BITS)
}

/// Replace the flag bits selected by `mask` with the ones of `value`.
///
/// Unselected flags and the version bits keep their current value.
pub fn write_flags(
    packet: &mut [u8],
    gre_offset: usize,
    value: GreFlags,
    mask: GreFlags,
) -> Result<(), CodecError> {
    let index = flags_index(packet.len(), gre_offset)?;
    let byte = packet[index];
    let flags = (GreFlags::from_byte(byte) & !mask) | (value & mask);
    packet[index] = (byte & VERSION_BITS) | flags.to_byte();
    Ok(())
}
