use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const IPPROTO_GRE: u8 = 47;
pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const IPV6_HEADER_LEN: usize = 40;
/// Upper bound on IPv6 extension headers walked before giving up on a packet.
pub const MAX_EXTENSION_HEADERS: usize = 8;

const IPV6_NEXT_HEADER: usize = 6;

// IPv6 extension header numbers
const HOP_BY_HOP: u8 = 0;
const ROUTING: u8 = 43;
const FRAGMENT: u8 = 44;
const AUTHENTICATION: u8 = 51;
const DESTINATION_OPTIONS: u8 = 60;
const MOBILITY: u8 = 135;
const HIP: u8 = 139;
const SHIM6: u8 = 140;

const FRAGMENT_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OffsetError {
    #[error("unsupported ip family {0}")]
    UnsupportedFamily(u8),
    #[error("packet of {len} bytes ends before offset {needed}")]
    Truncated { needed: usize, len: usize },
    #[error("more than {} ipv6 extension headers", MAX_EXTENSION_HEADERS)]
    ChainTooLong,
    #[error("ipv4 header length {0} is below the minimum of 5 words")]
    BadHeaderLength(u8),
}

/// A family name that is neither IPv4 nor IPv6.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown ip family '{0}', expected ipv4 or ipv6")]
pub struct UnknownFamily(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Family of a raw IP packet, taken from the version nibble.
    pub fn of_packet(packet: &[u8]) -> Result<Self, OffsetError> {
        match packet.first() {
            Some(byte) => Self::try_from(byte >> 4),
            None => Err(OffsetError::Truncated { needed: 1, len: 0 }),
        }
    }

}

impl TryFrom<u8> for IpVersion {
    type Error = OffsetError;

    fn try_from(version: u8) -> Result<Self, OffsetError> {
        match version {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            other => Err(OffsetError::UnsupportedFamily(other)),
        }
    }
}

impl FromStr for IpVersion {
    type Err = UnknownFamily;

    fn from_str(family: &str) -> Result<Self, UnknownFamily> {
        match family.trim().to_ascii_lowercase().as_str() {
            "4" | "ipv4" | "inet" => Ok(IpVersion::V4),
            "6" | "ipv6" | "inet6" => Ok(IpVersion::V6),
            _ => Err(UnknownFamily(family.trim().to_string())),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IpVersion::V4 => write!(f, "ipv4"),
            IpVersion::V6 => write!(f, "ipv6"),
        }
    }
}

/// Byte offset of the GRE header inside `packet`.
///
/// On success at least the first two bytes of the GRE header are inside the packet.
pub fn resolve_gre_offset(packet: &[u8], version: IpVersion) -> Result<usize, OffsetError> {
    let offset = match version {
        IpVersion::V4 => ipv4_header_len(packet)?,
        IpVersion::V6 => ipv6_headers_len(packet)?,
    };
    ensure_len(packet, offset + 2)?;
    Ok(offset)
}

fn ensure_len(packet: &[u8], needed: usize) -> Result<(), OffsetError> {
    if needed > packet.len() {
        Err(OffsetError::Truncated {
            needed,
            len: packet.len(),
        })
    } else {
        Ok(())
    }
}

fn ipv4_header_len(packet: &[u8]) -> Result<usize, OffsetError> {
    ensure_len(packet, 1)?;
    let ihl = packet[0] & 0x0F;
    let len = usize::from(ihl) * 4;
    if len < IPV4_MIN_HEADER_LEN {
        return Err(OffsetError::BadHeaderLength(ihl));
    }
    Ok(len)
}

fn ipv6_headers_len(packet: &[u8]) -> Result<usize, OffsetError> {
    ensure_len(packet, IPV6_HEADER_LEN)?;
    let mut next_header = packet[IPV6_NEXT_HEADER];
    let mut offset = IPV6_HEADER_LEN;

    for _ in 0..MAX_EXTENSION_HEADERS {
        let ext_len = match next_header {
            HOP_BY_HOP | ROUTING | DESTINATION_OPTIONS | MOBILITY | HIP | SHIM6 => {
                ensure_len(packet, offset + 2)?;
                (usize::from(packet[offset + 1]) + 1) * 8
            }
            FRAGMENT => FRAGMENT_HEADER_LEN,
            AUTHENTICATION => {
                ensure_len(packet, offset + 2)?;
                (usize::from(packet[offset + 1]) + 2) * 4
            }
            _ => return Ok(offset),
        };
        ensure_len(packet, offset + ext_len)?;
        trace!(
            "skipping ipv6 extension header {} of {} bytes at {}",
            next_header,
            ext_len,
            offset
        );
        next_header = packet[offset];
        offset += ext_len;
    }

    match next_header {
        HOP_BY_HOP | ROUTING | FRAGMENT | AUTHENTICATION | DESTINATION_OPTIONS | MOBILITY
        | HIP | SHIM6 => Err(OffsetError::ChainTooLong),
        _ => Ok(offset),
    }
}
