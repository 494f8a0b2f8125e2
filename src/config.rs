//! Configuration for the mDNS/DNS-SD engine.
//!
//! Most of the protocol's timing rules are RFC 6762 mandates and are carried
//! as crate-private constants below rather than configuration: the half-TTL
//! known-answer rule, the 75%/10% refresh and rescue points, the one second
//! multicast rate limit and the respond-immediately type set are
//! interoperability constants, not tuning knobs.
//!
//! # Example
//!
//! ```rust
//! use zeroconf_sd::ZeroconfConfig;
//! use std::time::Duration;
//!
//! let config = ZeroconfConfig::default()
//!     .with_cache_maintenance_interval(Duration::from_secs(5));
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Largest datagram the codec will emit under normal conditions, and the
/// point at which an outgoing packet is rolled back and continued in the
/// next one.
pub(crate) const MAX_MSG_TYPICAL: usize = 1460;

/// Absolute datagram limit. A single record that cannot fit the typical
/// budget may grow a fresh packet up to this size; inbound datagrams larger
/// than this are dropped before parsing.
pub(crate) const MAX_MSG_ABSOLUTE: usize = 8966;

/// Response jitter for multicast answers (RFC 6762 §6).
pub(crate) const RESPONSE_JITTER_MIN: Duration = Duration::from_millis(20);
pub(crate) const RESPONSE_JITTER_MAX: Duration = Duration::from_millis(120);

/// Aggregation window for ordinary multicast answers.
pub(crate) const AGGREGATION_DELAY: Duration = Duration::from_millis(500);

/// Extra delay and tighter window for answers that were already multicast
/// within the last second (RFC 6762 §6: no record more than once per second).
pub(crate) const RATE_LIMIT_EXTRA_DELAY: Duration = Duration::from_millis(1000);
pub(crate) const RATE_LIMITED_AGGREGATION_DELAY: Duration = Duration::from_millis(200);

/// Window in which an identical question from another querier suppresses
/// our own duplicate answer work.
pub(crate) const DUPLICATE_QUESTION_INTERVAL: Duration = Duration::from_millis(999);

/// Point in a record's lifetime at which a browser refreshes it.
pub(crate) const EXPIRE_REFRESH_PERCENT: u32 = 75;

/// Spacing of rescue retries after a missed refresh, as a percentage of TTL.
pub(crate) const RESCUE_RETRY_PERCENT: u32 = 10;

/// Floor applied to incoming PTR TTLs so low-TTL advertisers do not drive
/// refresh-query storms. Goodbye records (TTL 0) are exempt.
pub(crate) const DNS_PTR_MIN_TTL: u32 = 1800;

/// Default TTLs for synthesized records: host (address) records versus
/// everything else (RFC 6762 §10).
pub(crate) const DNS_HOST_TTL: u32 = 120;
pub(crate) const DNS_OTHER_TTL: u32 = 4500;

/// Number of startup queries a fresh browser sends, spaced iteration^2
/// seconds apart, before settling into TTL-driven refresh.
pub(crate) const STARTUP_QUERIES: u32 = 4;

/// Tolerance when deciding whether a scheduled query is due, so queries
/// scheduled a few milliseconds apart coalesce into one wake.
pub(crate) const CLOCK_RESOLUTION: Duration = Duration::from_millis(50);

/// How long a truncated query is held for its continuation packets.
pub(crate) const TC_HOLD_MIN: Duration = Duration::from_millis(400);
pub(crate) const TC_HOLD_MAX: Duration = Duration::from_millis(500);

/// Unsolicited announcements broadcast after a successful registration.
pub(crate) const REGISTER_ANNOUNCEMENTS: u32 = 3;
pub(crate) const REGISTER_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded instance-name suffix retries when `allow_name_change` is set.
pub(crate) const NAME_CHANGE_MAX_TRIES: u32 = 15;

/// The expiry heap is compacted once it exceeds both this floor and twice
/// the number of live scheduled expirations.
pub(crate) const EXPIRE_HEAP_COMPACT_MIN: usize = 100;

/// DNS-SD service type enumeration meta-query name (RFC 6763 §9).
pub(crate) const SERVICE_TYPE_ENUMERATION_NAME: &str = "_services._dns-sd._udp.local.";

pub(crate) const DEFAULT_CACHE_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_MIN_TIME_BETWEEN_QUERIES: Duration = Duration::from_secs(10);

/// Configuration for a [`Zeroconf`](crate::Zeroconf) engine.
///
/// # Fields
///
/// - `cache_maintenance_interval`: how often expired records are purged
///   from the cache (default: 10 seconds)
/// - `min_time_between_queries`: floor on the spacing of steady-state
///   refresh queries issued by browsers (default: 10 seconds)
#[derive(Clone, Debug)]
pub struct ZeroconfConfig {
    /// How often `handle_timeout` purges expired records from the cache.
    pub cache_maintenance_interval: Duration,

    /// Minimum spacing between steady-state refresh query packets.
    ///
    /// Browsers never wake more often than this, regardless of how many
    /// pointer records approach their refresh points.
    pub min_time_between_queries: Duration,

    /// Local address stamped onto outgoing packets' transport context.
    pub local_addr: SocketAddr,
}

impl Default for ZeroconfConfig {
    fn default() -> Self {
        Self {
            cache_maintenance_interval: DEFAULT_CACHE_MAINTENANCE_INTERVAL,
            min_time_between_queries: DEFAULT_MIN_TIME_BETWEEN_QUERIES,
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5353),
        }
    }
}

impl ZeroconfConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache maintenance interval. A value of zero uses the default.
    pub fn with_cache_maintenance_interval(mut self, interval: Duration) -> Self {
        self.cache_maintenance_interval = if interval == Duration::ZERO {
            DEFAULT_CACHE_MAINTENANCE_INTERVAL
        } else {
            interval
        };
        self
    }

    /// Set the minimum spacing between steady-state refresh queries.
    pub fn with_min_time_between_queries(mut self, interval: Duration) -> Self {
        self.min_time_between_queries = if interval == Duration::ZERO {
            DEFAULT_MIN_TIME_BETWEEN_QUERIES
        } else {
            interval
        };
        self
    }

    /// Set the local address stamped onto outgoing packets.
    pub fn with_local_addr(mut self, local_addr: SocketAddr) -> Self {
        self.local_addr = local_addr;
        self
    }
}
