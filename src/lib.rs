//! Inspect and rewrite the flags of GRE headers carried in IPv4 and IPv6 packets.
//!
//! The [`gre`] module locates the GRE header behind a (possibly extended) IP header and
//! reads or writes the five flag bits in its second byte. Rules built from
//! `value[/mask]` strings are evaluated per packet through [`gre::GreRule`].

#[macro_use]
extern crate log;

pub mod gre;

pub use gre::{
    parse_spec, resolve_gre_offset, CodecError, FlagSpec, GreFlags, GreRule, IpVersion,
    MatchConfig, MutationConfig, OffsetError, Outcome, SpecError, TargetError, UnknownFamily,
};
