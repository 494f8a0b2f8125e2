#[cfg(test)]
mod message_test;

pub(crate) mod incoming;
pub(crate) mod name;
pub(crate) mod outgoing;
mod packer;
pub(crate) mod record;

use std::fmt;

// Message formats

// A DnsType is a type of DNS request and response.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DnsType {
    A = 1,
    Cname = 5,
    Ptr = 12,
    Hinfo = 13,
    Txt = 16,
    Aaaa = 28,
    Srv = 33,
    Nsec = 47,
    Any = 255,

    #[default]
    Unsupported = 0,
}

impl From<u16> for DnsType {
    fn from(v: u16) -> Self {
        match v {
            1 => DnsType::A,
            5 => DnsType::Cname,
            12 => DnsType::Ptr,
            13 => DnsType::Hinfo,
            16 => DnsType::Txt,
            28 => DnsType::Aaaa,
            33 => DnsType::Srv,
            47 => DnsType::Nsec,
            255 => DnsType::Any,
            _ => DnsType::Unsupported,
        }
    }
}

impl fmt::Display for DnsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DnsType::A => "A",
            DnsType::Cname => "CNAME",
            DnsType::Ptr => "PTR",
            DnsType::Hinfo => "HINFO",
            DnsType::Txt => "TXT",
            DnsType::Aaaa => "AAAA",
            DnsType::Srv => "SRV",
            DnsType::Nsec => "NSEC",
            DnsType::Any => "ANY",
            _ => "Unsupported",
        };
        write!(f, "{s}")
    }
}

impl DnsType {
    /// Address record types, which answer both their own queries and ANY.
    pub(crate) fn is_address(&self) -> bool {
        matches!(self, DnsType::A | DnsType::Aaaa)
    }
}

// Internet class (IN) - the only class used by mDNS.
pub(crate) const CLASS_IN: u16 = 1;

// Any class (*) - matches any class in questions.
pub(crate) const CLASS_ANY: u16 = 255;

// The low 15 bits of the class field carry the class proper; the top bit is
// reused by RFC 6762 as the cache-flush bit on records and the QU bit on
// questions.
pub(crate) const CLASS_MASK: u16 = 0x7FFF;
pub(crate) const CLASS_UNIQUE: u16 = 0x8000;

// UINT16LEN is the length (in bytes) of a uint16.
pub(crate) const UINT16LEN: usize = 2;

// UINT32LEN is the length (in bytes) of a uint32.
pub(crate) const UINT32LEN: usize = 4;

// HEADER_LEN is the length (in bytes) of a DNS header.
//
// A header is comprised of 6 uint16s and no padding.
pub(crate) const HEADER_LEN: usize = 6 * UINT16LEN;

pub(crate) const HEADER_BIT_QR: u16 = 1 << 15; // query/response (response=1)
pub(crate) const HEADER_BIT_AA: u16 = 1 << 10; // authoritative
pub(crate) const HEADER_BIT_TC: u16 = 1 << 9; // truncated

/// Header flags for an outgoing multicast query.
pub(crate) const FLAGS_QR_QUERY: u16 = 0;

/// Header flags for an outgoing authoritative response.
pub(crate) const FLAGS_QR_RESPONSE_AA: u16 = HEADER_BIT_QR | HEADER_BIT_AA;

// Assembled names are bounded independently of per-packet limits: a name is
// at most 253 bytes of presentation text and 128 labels, and a single label
// is at most 63 bytes.
pub(crate) const MAX_NAME_LENGTH: usize = 253;
pub(crate) const MAX_NAME_LABELS: usize = 128;
pub(crate) const MAX_LABEL_LENGTH: usize = 63;

// PACK_STARTING_CAP is the default initial buffer size allocated during
// packing.
//
// The starting capacity doesn't matter too much, but most mDNS responses
// fit a typical UDP-safe datagram.
pub(crate) const PACK_STARTING_CAP: usize = 512;

/// Normalizes a name to its fully-qualified form with a trailing dot.
pub(crate) fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}
