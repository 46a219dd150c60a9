use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::flags::{read_flags, CodecError, GreFlags};
use super::offset::{resolve_gre_offset, IpVersion};
use super::spec::{parse_spec, Field, FlagSpec, SpecError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("invert must be 0 or 1, got {0}")]
    InvalidInvert(u8),
}

/// Match-info block as laid out by the kernel match.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawMatchInfo {
    pub invert: u8,
    pub flags_value: u8,
    pub flags_mask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    pub value: GreFlags,
    pub mask: GreFlags,
    pub invert: bool,
}

impl MatchConfig {
    pub fn new(spec: FlagSpec, invert: bool) -> Self {
        if spec.value_outside_mask() {
            warn!(
                "gre flags {} set bits outside of mask {}, the match is constant",
                spec.value, spec.mask
            );
        }
        MatchConfig {
            value: spec.value,
            mask: spec.mask,
            invert,
        }
    }

    pub fn spec(&self) -> FlagSpec {
        FlagSpec::new(self.value, self.mask)
    }
}

impl TryFrom<RawMatchInfo> for MatchConfig {
    type Error = MatchError;

    fn try_from(raw: RawMatchInfo) -> Result<Self, MatchError> {
        let value = GreFlags::new(raw.flags_value)
            .ok_or_else(|| SpecError::OutOfRange(Field::Flags, raw.flags_value.into()))?;
        let mask = GreFlags::new(raw.flags_mask)
            .ok_or_else(|| SpecError::OutOfRange(Field::Mask, raw.flags_mask.into()))?;
        let invert = match raw.invert {
            0 => false,
            1 => true,
            other => return Err(MatchError::InvalidInvert(other)),
        };
        Ok(MatchConfig::new(FlagSpec::new(value, mask), invert))
    }
}

impl From<MatchConfig> for RawMatchInfo {
    fn from(cfg: MatchConfig) -> Self {
        RawMatchInfo {
            invert: cfg.invert as u8,
            flags_value: cfg.value.bits(),
            flags_mask: cfg.mask.bits(),
        }
    }
}

/// Parses `[!]value[/mask]`.
impl FromStr for MatchConfig {
    type Err = SpecError;

    fn from_str(text: &str) -> Result<Self, SpecError> {
        let trimmed = text.trim_start();
        match trimmed.strip_prefix('!') {
            Some(spec) => Ok(MatchConfig::new(parse_spec(spec.trim_start())?, true)),
            None => Ok(MatchConfig::new(parse_spec(text)?, false)),
        }
    }
}

impl fmt::Display for MatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.invert {
            write!(f, " !")?;
        }
        write!(f, " --gre-flags {}", self.spec())
    }
}

/// Compare the flags of the GRE header at `gre_offset` with the configuration.
pub fn evaluate(packet: &[u8], gre_offset: usize, cfg: &MatchConfig) -> Result<bool, CodecError> {
    let masked = read_flags(packet, gre_offset)? & cfg.mask;
    Ok((masked == cfg.value) != cfg.invert)
}

/// Locate the GRE header and evaluate `cfg` against it.
///
/// Packets whose GRE header cannot be located never match, inverted or not.
pub fn matches(packet: &[u8], version: IpVersion, cfg: &MatchConfig) -> Result<bool, CodecError> {
    match resolve_gre_offset(packet, version) {
        Ok(offset) => evaluate(packet, offset, cfg),
        Err(err) => {
            debug!("gre match skipped {} packet: {}", version, err);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(bits: u8) -> GreFlags {
        GreFlags::new(bits).unwrap()
    }

    fn config(value: u8, mask: u8, invert: bool) -> MatchConfig {
        MatchConfig::new(FlagSpec::new(flags(value), flags(mask)), invert)
    }

    fn ipv4_gre(flags: u8) -> Vec<u8> {
        let mut packet = vec![0u8; 24];
        packet[0] = 0x45;
        packet[9] = 47;
        packet[21] = flags << 3;
        packet
    }

    #[test]
    fn test_evaluate_masked() {
        let packet = [0x00, 0b10110 << 3];
        assert_eq!(evaluate(&packet, 0, &config(0b00110, 0b00111, false)), Ok(true));
        assert_eq!(evaluate(&packet, 0, &config(0b00110, 0b00111, true)), Ok(false));
        assert_eq!(evaluate(&packet, 0, &config(0b10110, 0b11111, false)), Ok(true));
        assert_eq!(evaluate(&packet, 0, &config(0b00000, 0b00001, false)), Ok(true));
        assert_eq!(evaluate(&packet, 0, &config(0b00001, 0b00001, false)), Ok(false));
        assert_eq!(evaluate(&packet, 0, &config(0b00001, 0b00001, true)), Ok(true));
    }

    #[test]
    fn test_evaluate_ignores_version() {
        let packet = [0x00, 0x07];
        assert_eq!(evaluate(&packet, 0, &config(0, 31, false)), Ok(true));
    }

    #[test]
    fn test_evaluate_out_of_bounds() {
        assert_eq!(
            evaluate(&[0x00], 0, &config(0, 31, false)),
            Err(CodecError::OutOfBounds { offset: 0, len: 1 })
        );
    }

    #[test]
    fn test_matches_resolves_offset() {
        let packet = ipv4_gre(0b00100);
        assert_eq!(matches(&packet, IpVersion::V4, &config(4, 4, false)), Ok(true));
        assert_eq!(matches(&packet, IpVersion::V4, &config(0, 4, false)), Ok(false));
    }

    #[test]
    fn test_truncated_never_matches() {
        let packet = ipv4_gre(0);
        assert_eq!(
            matches(&packet[..21], IpVersion::V4, &config(0, 31, false)),
            Ok(false)
        );
        assert_eq!(
            matches(&packet[..21], IpVersion::V4, &config(1, 31, true)),
            Ok(false)
        );
    }

    #[test]
    fn test_parse_and_display() {
        let cfg: MatchConfig = "! 0x4/0x4".parse().unwrap();
        assert_eq!(cfg, config(4, 4, true));
        assert_eq!(cfg.to_string(), " ! --gre-flags 0x04/0x04");

        let cfg: MatchConfig = "12".parse().unwrap();
        assert_eq!(cfg, config(12, 31, false));
        assert_eq!(cfg.to_string(), " --gre-flags 0x0c/0x1f");

        assert!("!".parse::<MatchConfig>().is_err());
    }

    #[test]
    fn test_raw_info() {
        let raw = RawMatchInfo {
            invert: 1,
            flags_value: 3,
            flags_mask: 7,
        };
        let cfg = MatchConfig::try_from(raw).unwrap();
        assert_eq!(cfg, config(3, 7, true));
        assert_eq!(RawMatchInfo::from(cfg), raw);

        assert_eq!(
            MatchConfig::try_from(RawMatchInfo {
                invert: 0,
                flags_value: 32,
                flags_mask: 31,
            }),
            Err(MatchError::Spec(SpecError::OutOfRange(Field::Flags, 32)))
        );
        assert_eq!(
            MatchConfig::try_from(RawMatchInfo {
                invert: 2,
                ..raw
            }),
            Err(MatchError::InvalidInvert(2))
        );
    }
}
