use etherparse::{InternetSlice, SlicedPacket};
use std::{fmt, net::IpAddr, result::Result};

/// Addresses of a queued packet, for log lines.
#[derive(Debug)]
pub struct TunnelPacket {
    pub src_addr: IpAddr,
    pub dest_addr: IpAddr,
    pub len: usize,
}

impl TunnelPacket {
    fn get_ips_from_packet(pkt: &SlicedPacket) -> Result<(IpAddr, IpAddr), String> {
        match &pkt.ip {
            Some(InternetSlice::Ipv4(ip)) => Ok((
                IpAddr::V4(ip.source_addr()),
                IpAddr::V4(ip.destination_addr()),
            )),
            Some(InternetSlice::Ipv6(ip, _)) => Ok((
                IpAddr::V6(ip.source_addr()),
                IpAddr::V6(ip.destination_addr()),
            )),
            None => Err("could not parse ip layer".into()),
        }
    }

    pub fn from(packet: &[u8]) -> Result<Self, String> {
        match SlicedPacket::from_ip(packet) {
            Ok(pkt) => {
                let (src_addr, dest_addr) = Self::get_ips_from_packet(&pkt)?;
                Ok(Self {
                    src_addr,
                    dest_addr,
                    len: packet.len(),
                })
            }
            Err(msg) => Err(format!("failed to parse packet {:?}", msg)),
        }
    }
}

impl fmt::Display for TunnelPacket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} bytes)",
            self.src_addr, self.dest_addr, self.len
        )
    }
}
