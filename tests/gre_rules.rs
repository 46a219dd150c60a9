use gre_flags::{
    parse_spec, resolve_gre_offset, FlagSpec, GreFlags, GreRule, IpVersion, MatchConfig,
    MutationConfig, OffsetError, Outcome,
};

const GRE: u8 = 47;
const HOP_BY_HOP: u8 = 0;
const ROUTING: u8 = 43;

/// IPv4 packet with `options` words of IP options and a GRE header with `flags_byte`.
fn ipv4_gre(options: usize, flags_byte: u8) -> Vec<u8> {
    let header_len = 20 + options * 4;
    let mut packet = vec![0u8; header_len + 8];
    packet[0] = 0x40 | (5 + options as u8);
    packet[8] = 64;
    packet[9] = GRE;
    packet[12..16].copy_from_slice(&[192, 0, 2, 1]);
    packet[16..20].copy_from_slice(&[192, 0, 2, 2]);
    for option in packet[20..header_len].iter_mut() {
        *option = 0x01; // NOP
    }
    packet[header_len + 1] = flags_byte;
    packet[header_len + 2..header_len + 4].copy_from_slice(&[0x08, 0x00]);
    packet
}

/// IPv6 packet carrying GRE behind a hop-by-hop and a routing header.
fn ipv6_gre_extended(flags_byte: u8) -> Vec<u8> {
    let mut packet = vec![0u8; 40];
    packet[0] = 0x60;
    packet[6] = HOP_BY_HOP;
    packet[7] = 64;
    packet.extend_from_slice(&[ROUTING, 0, 0, 0, 0, 0, 0, 0]);
    packet.extend_from_slice(&[GRE, 1]);
    packet.extend_from_slice(&[0u8; 14]);
    packet.extend_from_slice(&[0x00, flags_byte, 0x86, 0xDD]);
    packet
}

fn flags(bits: u8) -> GreFlags {
    GreFlags::new(bits).unwrap()
}

#[test]
fn offsets() {
    assert_eq!(resolve_gre_offset(&ipv4_gre(0, 0), IpVersion::V4), Ok(20));
    assert_eq!(resolve_gre_offset(&ipv4_gre(3, 0), IpVersion::V4), Ok(32));
    assert_eq!(resolve_gre_offset(&ipv6_gre_extended(0), IpVersion::V6), Ok(64));
}

#[test]
fn match_rule_on_both_families() {
    let rule = GreRule::Match(MatchConfig::new(parse_spec("3").unwrap(), false));
    assert_eq!(rule.process(&mut ipv4_gre(1, 3 << 3)), Ok(Outcome::Matched));
    assert_eq!(rule.process(&mut ipv6_gre_extended(3 << 3 | 0x07)), Ok(Outcome::Matched));
    assert_eq!(rule.process(&mut ipv6_gre_extended(2 << 3)), Ok(Outcome::NotMatched));

    let inverted: GreRule = "!0x10/0x10".parse::<MatchConfig>().unwrap().into();
    assert_eq!(inverted.process(&mut ipv4_gre(0, 0x80)), Ok(Outcome::NotMatched));
    assert_eq!(inverted.process(&mut ipv4_gre(0, 0x00)), Ok(Outcome::Matched));
}

#[test]
fn set_flags_rewrites_only_the_flags() {
    let spec = FlagSpec::new(flags(0b10001), flags(0b10011));
    let rule = GreRule::Mutate(MutationConfig::set(spec));

    let original = ipv6_gre_extended(0b01110_001);
    let mut packet = original.clone();
    assert_eq!(rule.process(&mut packet), Ok(Outcome::Continue));
    assert_eq!(packet[65], 0b11101_001);
    for (index, (before, after)) in original.iter().zip(packet.iter()).enumerate() {
        if index != 65 {
            assert_eq!(before, after, "byte {} changed", index);
        }
    }

    let once = packet.clone();
    assert_eq!(rule.process(&mut packet), Ok(Outcome::Continue));
    assert_eq!(once, packet);
}

#[test]
fn clear_flags_on_ipv4_with_options() {
    let rule: GreRule = MutationConfig::ClearFlags.into();
    let mut packet = ipv4_gre(2, 0xFF);
    assert_eq!(rule.process(&mut packet), Ok(Outcome::Continue));
    assert_eq!(packet[29], 0x07);
    assert_eq!(packet[28], 0x00);
    assert_eq!(packet[27], 0x01);
}

#[test]
fn truncated_packets_fail_closed() {
    let mut short = ipv4_gre(4, 0xF8);
    short.truncate(36);
    assert_eq!(
        resolve_gre_offset(&short, IpVersion::V4),
        Err(OffsetError::Truncated { needed: 38, len: 36 })
    );

    let matcher = GreRule::Match(MatchConfig::new(FlagSpec::exact(GreFlags::NONE), true));
    assert_eq!(matcher.process(&mut short.clone()), Ok(Outcome::NotMatched));

    let target = GreRule::Mutate(MutationConfig::ClearFlags);
    let mut packet = short.clone();
    assert_eq!(target.process(&mut packet), Ok(Outcome::Drop));
    assert_eq!(packet, short);

    let mut packet = ipv6_gre_extended(0xF8);
    packet.truncate(60);
    assert_eq!(target.process(&mut packet), Ok(Outcome::Drop));
}

#[test]
fn family_from_caller() {
    let rule = GreRule::Match("0/0".parse().unwrap());
    let mut packet = ipv4_gre(0, 0);
    assert_eq!(rule.process_as(&mut packet, IpVersion::V4), Ok(Outcome::Matched));
    // read as IPv6 the 28 byte packet is too short
    assert_eq!(rule.process_as(&mut packet, IpVersion::V6), Ok(Outcome::NotMatched));
}
