use std::convert::TryFrom;
use std::fmt;
use thiserror::Error;

use super::flags::{write_flags, CodecError, GreFlags, GRE_FLAGS_BYTE};
use super::offset::{resolve_gre_offset, IpVersion};
use super::spec::{Field, FlagSpec, SpecError};

/// Set the GRE flags selected by the mask.
pub const OP_SET_FLAGS: u8 = 0x01;
/// Clear every GRE flag.
pub const OP_CLEAR_FLAGS: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid GRE target operation {0:#04x}")]
    InvalidOperation(u8),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Target-info block with operation, value and mask, as laid out by the kernel target.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawTargetInfo {
    pub operation: u8,
    pub flags_value: u8,
    pub flags_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationConfig {
    SetFlags { value: GreFlags, mask: GreFlags },
    ClearFlags,
}

impl MutationConfig {
    pub fn set(spec: FlagSpec) -> Self {
        MutationConfig::SetFlags {
            value: spec.value,
            mask: spec.mask,
        }
    }

    /// The masked write performed by this operation.
    pub fn as_write(&self) -> (GreFlags, GreFlags) {
        match *self {
            MutationConfig::SetFlags { value, mask } => (value, mask),
            MutationConfig::ClearFlags => (GreFlags::NONE, GreFlags::ALL),
        }
    }

    pub fn operation(&self) -> u8 {
        match self {
            MutationConfig::SetFlags { .. } => OP_SET_FLAGS,
            MutationConfig::ClearFlags => OP_CLEAR_FLAGS,
        }
    }
}

/// Rejects unknown operations and out of range flags before any packet is seen.
impl TryFrom<RawTargetInfo> for MutationConfig {
    type Error = TargetError;

    fn try_from(raw: RawTargetInfo) -> Result<Self, TargetError> {
        match raw.operation {
            OP_SET_FLAGS => {
                let value = GreFlags::new(raw.flags_value)
                    .ok_or_else(|| SpecError::OutOfRange(Field::Flags, raw.flags_value.into()))?;
                let mask = GreFlags::new(raw.flags_mask)
                    .ok_or_else(|| SpecError::OutOfRange(Field::Mask, raw.flags_mask.into()))?;
                Ok(MutationConfig::SetFlags { value, mask })
            }
            OP_CLEAR_FLAGS => Ok(MutationConfig::ClearFlags),
            other => Err(TargetError::InvalidOperation(other)),
        }
    }
}

impl From<MutationConfig> for RawTargetInfo {
    fn from(cfg: MutationConfig) -> Self {
        let (flags_value, flags_mask) = match cfg {
            MutationConfig::SetFlags { value, mask } => (value.bits(), mask.bits()),
            MutationConfig::ClearFlags => (0, 0),
        };
        RawTargetInfo {
            operation: cfg.operation(),
            flags_value,
            flags_mask,
        }
    }
}

impl fmt::Display for MutationConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MutationConfig::SetFlags { value, mask } => {
                write!(f, " --set-gre-flags {}", FlagSpec::new(*value, *mask))
            }
            MutationConfig::ClearFlags => write!(f, " --clear-gre-flags"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetVerdict {
    Continue,
    Drop,
}

/// Rewrite the flags of the GRE header at `gre_offset`.
pub fn apply(packet: &mut [u8], gre_offset: usize, cfg: &MutationConfig) -> Result<(), CodecError> {
    let (value, mask) = cfg.as_write();
    write_flags(packet, gre_offset, value, mask)
}

/// Locate the GRE header and rewrite its flags.
///
/// Packets whose GRE header cannot be located are left untouched and dropped.
pub fn mangle(
    packet: &mut [u8],
    version: IpVersion,
    cfg: &MutationConfig,
) -> Result<TargetVerdict, CodecError> {
    let offset = match resolve_gre_offset(packet, version) {
        Ok(offset) => offset,
        Err(err) => {
            debug!("dropping {} packet: {}", version, err);
            return Ok(TargetVerdict::Drop);
        }
    };
    let header = offset..packet.len().min(offset + 4);
    debug!("gre header before: {:02X?}", &packet[header.clone()]);
    apply(packet, offset, cfg)?;
    debug!(
        "gre header after: {:02X?} (flags byte {:08b})",
        &packet[header],
        packet[offset + GRE_FLAGS_BYTE]
    );
    Ok(TargetVerdict::Continue)
}
