//! GRE flags match and target.
//!
//! Only the fixed part of a version 0 GRE header is touched:
//!
//! ```text
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |C|R|K|S|s|Recur|  Flags  | Ver |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The flags handled here are the five most significant bits of the second byte; the
//! three low bits hold the version and are never modified.

mod flags;
mod matcher;
mod offset;
mod rule;
mod spec;
mod target;

pub use flags::{
    read_flags, read_version, write_flags, CodecError, GreFlags, FLAGS_BITS, FLAGS_MAX,
    FLAGS_SHIFT, GRE_FLAGS_BYTE, VERSION_BITS,
};
pub use matcher::{evaluate, matches, MatchConfig, MatchError, RawMatchInfo};
pub use offset::{
    resolve_gre_offset, IpVersion, OffsetError, IPPROTO_GRE, IPV4_MIN_HEADER_LEN,
    IPV6_HEADER_LEN, MAX_EXTENSION_HEADERS, UnknownFamily,
};
pub use rule::{GreRule, Outcome};
pub use spec::{parse_spec, Field, FlagSpec, SpecError};
pub use target::{
    apply, mangle, MutationConfig, RawTargetInfo, TargetError, TargetVerdict, OP_CLEAR_FLAGS,
    OP_SET_FLAGS,
};
