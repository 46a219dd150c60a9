use std::fmt;

use super::flags::CodecError;
use super::matcher::{matches, MatchConfig};
use super::offset::IpVersion;
use super::target::{mangle, MutationConfig, TargetVerdict};

/// Result of running a rule over one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    NotMatched,
    /// The packet was rewritten and continues.
    Continue,
    /// The GRE header could not be located, the packet must not be forwarded.
    Drop,
}

/// A configured GRE match or target.
///
/// Rules hold no per packet state and can be shared between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreRule {
    Match(MatchConfig),
    Mutate(MutationConfig),
}

impl GreRule {
    /// Run the rule over a raw IP packet, mutating it in place for targets.
    ///
    /// Packets of an unknown family are handled like truncated ones: they never
    /// match and are dropped by targets.
    pub fn process(&self, packet: &mut [u8]) -> Result<Outcome, CodecError> {
        let version = match IpVersion::of_packet(packet) {
            Ok(version) => version,
            Err(err) => {
                debug!("not an ip packet: {}", err);
                return Ok(self.unresolved());
            }
        };
        self.process_as(packet, version)
    }

    /// Like [`GreRule::process`] with the family given by the caller.
    pub fn process_as(&self, packet: &mut [u8], version: IpVersion) -> Result<Outcome, CodecError> {
        match self {
            GreRule::Match(cfg) => Ok(if matches(packet, version, cfg)? {
                Outcome::Matched
            } else {
                Outcome::NotMatched
            }),
            GreRule::Mutate(cfg) => Ok(match mangle(packet, version, cfg)? {
                TargetVerdict::Continue => Outcome::Continue,
                TargetVerdict::Drop => Outcome::Drop,
            }),
        }
    }

    fn unresolved(&self) -> Outcome {
        match self {
            GreRule::Match(_) => Outcome::NotMatched,
            GreRule::Mutate(_) => Outcome::Drop,
        }
    }
}

impl From<MatchConfig> for GreRule {
    fn from(cfg: MatchConfig) -> Self {
        GreRule::Match(cfg)
    }
}

impl From<MutationConfig> for GreRule {
    fn from(cfg: MutationConfig) -> Self {
        GreRule::Mutate(cfg)
    }
}

impl fmt::Display for GreRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GreRule::Match(cfg) => write!(f, "-m gre{}", cfg),
            GreRule::Mutate(cfg) => write!(f, "-j GRE{}", cfg),
        }
    }
}
