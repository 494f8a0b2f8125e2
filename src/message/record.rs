//! Resource record and question value types.
//!
//! A [`Record`] is an immutable value object: equality and hashing cover its
//! identity (lowercased name, type, class, cache-flush flag) and its payload,
//! and deliberately ignore `ttl` and `created` so a refreshed copy of a
//! record compares equal to the cached one it replaces. Re-stamping a
//! record's lifetime goes through [`Record::with_created_ttl`], which
//! produces a new value; nothing ever mutates a record another component may
//! be holding.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use super::DnsType;

/// Payload of a resource record, one variant per supported type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RData {
    /// A or AAAA. `scope_id` carries the IPv6 zone of the receiving
    /// interface and never appears on the wire.
    Address {
        addr: IpAddr,
        scope_id: Option<u32>,
    },
    /// PTR (and CNAME, which shares the wire shape).
    Pointer { alias: String },
    /// TXT, kept as the raw RDATA bytes.
    Text { text: Vec<u8> },
    /// SRV.
    Service {
        priority: u16,
        weight: u16,
        port: u16,
        server: String,
    },
    /// HINFO.
    HostInfo { cpu: String, os: String },
    /// NSEC, restricted to type codes 0-255 as mDNS uses it (RFC 6762 §6.1).
    Nsec { next_name: String, types: Vec<u16> },
}

impl RData {
    pub fn dns_type(&self) -> DnsType {
        match self {
            RData::Address { addr, .. } => {
                if addr.is_ipv4() {
                    DnsType::A
                } else {
                    DnsType::Aaaa
                }
            }
            RData::Pointer { .. } => DnsType::Ptr,
            RData::Text { .. } => DnsType::Txt,
            RData::Service { .. } => DnsType::Srv,
            RData::HostInfo { .. } => DnsType::Hinfo,
            RData::Nsec { .. } => DnsType::Nsec,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::Address { addr, .. } => write!(f, "{addr}"),
            RData::Pointer { alias } => write!(f, "{alias}"),
            RData::Text { text } => write!(f, "{} bytes", text.len()),
            RData::Service {
                priority,
                weight,
                port,
                server,
            } => write!(f, "{priority} {weight} {port} {server}"),
            RData::HostInfo { cpu, os } => write!(f, "{cpu} {os}"),
            RData::Nsec { next_name, types } => write!(f, "{next_name} {types:?}"),
        }
    }
}

/// A DNS resource record.
#[derive(Debug, Clone)]
pub struct Record {
    /// Fully-qualified name with trailing dot.
    pub name: String,
    /// Class with the top bit masked off; mDNS only uses IN.
    pub class: u16,
    /// Cache-flush bit (RFC 6762 §10.2): this record replaces, rather than
    /// merges with, cached records of the same identity.
    pub unique: bool,
    /// Time to live in seconds.
    pub ttl: u32,
    /// When this record was received or synthesized.
    pub created: Instant,
    pub rdata: RData,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        class: u16,
        unique: bool,
        ttl: u32,
        created: Instant,
        rdata: RData,
    ) -> Self {
        Self {
            name: super::fqdn(&name.into()),
            class,
            unique,
            ttl,
            created,
            rdata,
        }
    }

    pub fn dns_type(&self) -> DnsType {
        self.rdata.dns_type()
    }

    /// Lowercased name, the cache row key.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub(crate) fn ttl_fraction(&self, percent: u32) -> Duration {
        Duration::from_millis(self.ttl as u64 * percent as u64 * 10)
    }

    /// Absolute time at which this record leaves the cache.
    pub fn expire_time(&self) -> Instant {
        self.created + Duration::from_secs(self.ttl as u64)
    }

    /// Age has reached 100% of TTL.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expire_time()
    }

    /// Age has reached 50% of TTL.
    pub fn is_stale(&self, now: Instant) -> bool {
        now >= self.created + self.ttl_fraction(50)
    }

    /// Age is still below 25% of TTL.
    pub fn is_recent(&self, now: Instant) -> bool {
        now < self.created + self.ttl_fraction(25)
    }

    /// Seconds of lifetime left at `now`, rounded down.
    pub fn remaining_ttl(&self, now: Instant) -> u32 {
        let expire = self.expire_time();
        if now >= expire {
            0
        } else {
            (expire - now).as_secs() as u32
        }
    }

    /// A copy with its lifetime re-stamped. Used for goodbye handling and
    /// the cache-flush expiry rule; the cache replaces its entry with the
    /// copy instead of mutating a possibly-shared record.
    pub fn with_created_ttl(&self, created: Instant, ttl: u32) -> Self {
        let mut r = self.clone();
        r.created = created;
        r.ttl = ttl;
        r
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class
            && self.unique == other.unique
            && self.rdata == other.rdata
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.class.hash(state);
        self.unique.hash(state);
        self.rdata.hash(state);
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record{{Name: {}, Type: {}, Class: {}{}, TTL: {}, Data: {}}}",
            self.name,
            self.dns_type(),
            self.class,
            if self.unique { "|unique" } else { "" },
            self.ttl,
            self.rdata,
        )
    }
}

/// A DNS question.
///
/// Identity (equality and hashing) covers name, type and class but not the
/// QU bit, so a QU re-ask lands on the same duplicate-question history slot
/// as its QM form.
#[derive(Debug, Clone)]
pub struct Question {
    /// Fully-qualified name with trailing dot.
    pub name: String,
    pub typ: DnsType,
    pub class: u16,
    /// QU bit: the querier is willing to accept a unicast response.
    pub unicast: bool,
}

impl Question {
    pub fn new(name: impl Into<String>, typ: DnsType, class: u16, unicast: bool) -> Self {
        Self {
            name: super::fqdn(&name.into()),
            typ,
            class,
            unicast,
        }
    }

    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

impl PartialEq for Question {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ
            && self.class == other.class
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for Question {}

impl Hash for Question {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.typ.hash(state);
        self.class.hash(state);
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Question{{Name: {}, Type: {}, Class: {}{}}}",
            self.name,
            self.typ,
            self.class,
            if self.unicast { ", QU" } else { "" }
        )
    }
}
