//! Sans-I/O mDNS / DNS-SD engine.
//!
//! This module provides [`Zeroconf`], a sans-I/O implementation of an mDNS
//! responder and DNS-SD browser that implements the [`sansio::Protocol`]
//! trait for integration with any I/O framework.
//!
//! # Overview
//!
//! The [`Zeroconf`] struct handles the protocol logic without performing any
//! I/O. The caller is responsible for:
//!
//! 1. **Network I/O**: Reading/writing UDP packets to/from 224.0.0.251:5353
//! 2. **Timing**: Calling `handle_timeout()` when `poll_timeout()` expires
//! 3. **Event Processing**: Handling events from `poll_event()`
//!
//! Every entry point takes the current time from the caller; the engine
//! never reads the clock itself.
//!
//! # Browsing
//!
//! ```rust
//! use zeroconf_sd::{Zeroconf, ZeroconfConfig, ZeroconfEvent};
//! use sansio::Protocol;
//! use std::time::Instant;
//!
//! let mut zc = Zeroconf::new(ZeroconfConfig::default());
//! let browser = zc.browse(vec!["_http._tcp.local.".to_string()], None, Instant::now()).unwrap();
//!
//! // The first startup query is queued immediately.
//! if let Some(packet) = zc.poll_write() {
//!     // Send packet.message to packet.transport.peer_addr via UDP.
//! }
//!
//! // Feed received datagrams to handle_read(), then drain poll_event()
//! // for ServiceFound / ServiceRemoved.
//! ```
//!
//! # Advertising
//!
//! ```rust
//! use zeroconf_sd::{Zeroconf, ZeroconfConfig, ServiceRegistration};
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::time::Instant;
//!
//! let mut zc = Zeroconf::new(ZeroconfConfig::default());
//! let service = ServiceRegistration::new("_http._tcp.local.", "web", 8080)
//!     .with_server("myhost.local.")
//!     .with_addresses(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))]);
//! zc.register_service(service, false, Instant::now()).unwrap();
//! // Announcement packets are now queued; incoming queries are answered
//! // automatically from handle_read()/handle_timeout().
//! ```
//!
//! # Threading contract
//!
//! The engine is single-threaded by construction: all cache mutation,
//! scheduling and answer planning happen inside its methods, which must be
//! driven from one event-loop context. Code on other threads must marshal
//! calls into that context and wait with a timeout; a call that cannot be
//! serviced in time should surface [`Error::ErrEventLoopBlocked`] to its
//! caller rather than touch the engine concurrently.

#[cfg(test)]
mod zeroconf_test;

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Instant;

use bytes::BytesMut;

use crate::browser::{QuestionType, ServiceBrowser, ServiceEvent};
use crate::cache::DnsCache;
use crate::config::{
    AGGREGATION_DELAY, CLOCK_RESOLUTION, MAX_MSG_ABSOLUTE, NAME_CHANGE_MAX_TRIES,
    RATE_LIMIT_EXTRA_DELAY, RATE_LIMITED_AGGREGATION_DELAY, REGISTER_ANNOUNCE_INTERVAL,
    REGISTER_ANNOUNCEMENTS, TC_HOLD_MAX, TC_HOLD_MIN, ZeroconfConfig,
};
use crate::error::{Error, Result};
use crate::history::QuestionHistory;
use crate::message::incoming::DnsIncoming;
use crate::message::outgoing::DnsOutgoing;
use crate::message::record::Record;
use crate::message::{CLASS_IN, DnsType, FLAGS_QR_RESPONSE_AA};
use crate::queue::MulticastOutgoingQueue;
use crate::registry::{ServiceRegistration, ServiceRegistry, check_service_type};
use crate::responder::{AnswerPlanner, AnswerWithAdditionals, QueryFrame};
use crate::router::{CacheUpdateListener, route_records};
use crate::transport::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};

/// The mDNS multicast group address (224.0.0.251).
pub const MDNS_MULTICAST_IPV4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// The standard mDNS port (5353).
pub const MDNS_PORT: u16 = 5353;

/// mDNS multicast destination address (224.0.0.251:5353).
///
/// All multicast queries and responses are addressed here.
pub const MDNS_DEST_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(MDNS_MULTICAST_IPV4), MDNS_PORT);

/// Identifier for one browse instance, as returned by [`Zeroconf::browse`].
pub type BrowserId = u64;

/// Events emitted by the engine.
///
/// Poll for events using [`poll_event()`](sansio::Protocol::poll_event)
/// after calling [`handle_read()`](sansio::Protocol::handle_read) or
/// [`handle_timeout()`](sansio::Protocol::handle_timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZeroconfEvent {
    /// A browser saw a new service instance of a browsed type.
    ServiceFound {
        browser: BrowserId,
        service_type: String,
        name: String,
    },

    /// A service instance said goodbye or its pointer expired unrefreshed.
    ServiceRemoved {
        browser: BrowserId,
        service_type: String,
        name: String,
    },

    /// Registration finished its unsolicited announcements.
    ///
    /// Carries the final instance name, which differs from the requested
    /// one if `allow_name_change` resolved a conflict.
    ServiceRegistered { name: String },

    /// A processed response added at least one new record to the cache.
    CacheUpdated,
}

/// A query held back because its TC bit promised continuation packets.
struct PendingTruncated {
    frame: QueryFrame,
    /// Header id of the first packet, echoed in legacy unicast replies.
    id: u16,
    deadline: Instant,
}

/// Announcement schedule for a freshly registered service.
struct Announcement {
    name: String,
    remaining: u32,
    next: Instant,
}

/// Deduplicates decode-failure log lines: a failure signature logs at warn
/// once and at debug thereafter, so a noisy peer cannot flood the log.
#[derive(Default)]
struct LogThrottle {
    seen: HashSet<String>,
}

impl LogThrottle {
    fn log(&mut self, signature: String) {
        if self.seen.len() > 512 {
            self.seen.clear();
        }
        if self.seen.insert(signature.clone()) {
            log::warn!("decode failure: {signature}");
        } else {
            log::debug!("decode failure: {signature}");
        }
    }
}

/// Sans-I/O mDNS responder and DNS-SD browser.
///
/// Implements [`sansio::Protocol`]: feed received datagrams to
/// `handle_read()`, drain outgoing datagrams from `poll_write()`, call
/// `handle_timeout()` whenever the `poll_timeout()` deadline arrives, and
/// consume [`ZeroconfEvent`]s from `poll_event()`.
pub struct Zeroconf {
    config: ZeroconfConfig,

    registry: ServiceRegistry,
    cache: DnsCache,
    history: QuestionHistory,

    /// Standard multicast answer aggregation (500 ms window).
    out_queue: MulticastOutgoingQueue,
    /// Rate-limited aggregation for answers multicast within the last
    /// second (extra 1 s delay, 200 ms window).
    out_delayed_queue: MulticastOutgoingQueue,

    browsers: HashMap<BrowserId, ServiceBrowser>,
    next_browser_id: BrowserId,

    /// When each record we own last went out by multicast; drives the QU
    /// quarter-TTL rule and the once-per-second rate limit.
    last_multicast: HashMap<Record, Instant>,

    /// Truncated queries waiting for their continuation packets, per
    /// source address.
    pending_truncated: HashMap<SocketAddr, PendingTruncated>,

    announcements: Vec<Announcement>,

    next_cache_maintenance: Option<Instant>,
    log_throttle: LogThrottle,

    write_outs: VecDeque<TaggedBytesMut>,
    event_outs: VecDeque<ZeroconfEvent>,

    closed: bool,
}

impl Zeroconf {
    /// Create a new engine with the given configuration.
    pub fn new(config: ZeroconfConfig) -> Self {
        Self {
            out_queue: MulticastOutgoingQueue::new(std::time::Duration::ZERO, AGGREGATION_DELAY),
            out_delayed_queue: MulticastOutgoingQueue::new(
                RATE_LIMIT_EXTRA_DELAY,
                RATE_LIMITED_AGGREGATION_DELAY,
            ),
            config,
            registry: ServiceRegistry::new(),
            cache: DnsCache::new(),
            history: QuestionHistory::new(),
            browsers: HashMap::new(),
            next_browser_id: 1,
            last_multicast: HashMap::new(),
            pending_truncated: HashMap::new(),
            announcements: Vec::new(),
            next_cache_maintenance: None,
            log_throttle: LogThrottle::default(),
            write_outs: VecDeque::new(),
            event_outs: VecDeque::new(),
            closed: false,
        }
    }

    /// Start browsing for service types.
    ///
    /// Queues the first startup query immediately; the remaining startup
    /// queries and all steady-state refreshes are driven by
    /// `handle_timeout()`. Discoveries surface as
    /// [`ZeroconfEvent::ServiceFound`] / [`ZeroconfEvent::ServiceRemoved`].
    ///
    /// # Errors
    ///
    /// [`Error::ErrBadServiceType`] for a malformed type,
    /// [`Error::ErrBrowserAlreadyExists`] if another browser already covers
    /// one of the types.
    pub fn browse(
        &mut self,
        types: Vec<String>,
        question_type: Option<QuestionType>,
        now: Instant,
    ) -> Result<BrowserId> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        for service_type in &types {
            check_service_type(service_type)?;
            let key = crate::message::fqdn(service_type).to_lowercase();
            if self.browsers.values().any(|b| b.types().contains(&key)) {
                return Err(Error::ErrBrowserAlreadyExists);
            }
        }

        let mut browser = ServiceBrowser::new(
            types,
            question_type,
            self.config.min_time_between_queries,
            now,
        );
        for out in browser.handle_timeout(&self.cache, now) {
            self.queue_packet(&out, MDNS_DEST_ADDR, now);
        }

        let id = self.next_browser_id;
        self.next_browser_id += 1;
        self.browsers.insert(id, browser);
        Ok(id)
    }

    /// Stop a browse instance. Idempotent.
    pub fn stop_browse(&mut self, id: BrowserId) {
        self.browsers.remove(&id);
    }

    /// Register a service and start announcing it.
    ///
    /// The instance name is checked against our own registry and the cache;
    /// on a conflict, `allow_name_change` retries with an incrementing
    /// ` (N)` suffix, otherwise the call fails with
    /// [`Error::ErrServiceNameAlreadyInUse`]. Three unsolicited responses
    /// go out roughly a second apart, the first immediately;
    /// [`ZeroconfEvent::ServiceRegistered`] fires after the last.
    pub fn register_service(
        &mut self,
        mut registration: ServiceRegistration,
        allow_name_change: bool,
        now: Instant,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        check_service_type(registration.service_type())?;

        let base = registration.instance().to_string();
        let mut tries = 0u32;
        while self.name_in_use(&registration.name()) {
            if !allow_name_change || tries >= NAME_CHANGE_MAX_TRIES {
                return Err(Error::ErrServiceNameAlreadyInUse);
            }
            tries += 1;
            registration.set_instance(format!("{base} ({})", tries + 1));
        }

        let name = registration.name();
        self.registry.add(registration);
        self.announcements.push(Announcement {
            name: name.clone(),
            remaining: REGISTER_ANNOUNCEMENTS,
            next: now,
        });
        self.send_due_announcements(now);
        Ok(())
    }

    /// Unregister a service, broadcasting a goodbye (all records with
    /// TTL 0).
    pub fn unregister_service(&mut self, name: &str, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        let Some(mut registration) = self.registry.remove(name) else {
            return Ok(());
        };
        let key = name.to_lowercase();
        self.announcements.retain(|a| a.name.to_lowercase() != key);

        let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
        for record in registration.records(now) {
            self.last_multicast.remove(&record);
            out.add_answer(record.with_created_ttl(now, 0));
        }
        self.queue_packet(&out, MDNS_DEST_ADDR, now);
        Ok(())
    }

    /// Unregister everything, typically right before close.
    pub fn unregister_all_services(&mut self, now: Instant) -> Result<()> {
        let names: Vec<String> = self
            .registry
            .types()
            .iter()
            .flat_map(|t| self.registry.get_by_type(t))
            .map(|r| r.name())
            .collect();
        for name in names {
            self.unregister_service(&name, now)?;
        }
        Ok(())
    }

    fn name_in_use(&self, name: &str) -> bool {
        if self.registry.has_name(name) {
            return true;
        }
        // An SRV for this instance name in the cache means some other host
        // already claimed it.
        !self
            .cache
            .get_by_details(name, DnsType::Srv, CLASS_IN)
            .is_empty()
    }

    fn send_due_announcements(&mut self, now: Instant) {
        let mut due: Vec<usize> = Vec::new();
        for (i, announcement) in self.announcements.iter().enumerate() {
            if announcement.next <= now + CLOCK_RESOLUTION {
                due.push(i);
            }
        }
        for i in due {
            let name = self.announcements[i].name.clone();
            let Some(registration) = self.registry.get_mut(&name) else {
                self.announcements[i].remaining = 0;
                continue;
            };
            let records = registration.records(now);

            let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
            for record in records {
                self.last_multicast.insert(record.clone(), now);
                out.add_answer(record);
            }
            self.queue_packet(&out, MDNS_DEST_ADDR, now);

            let announcement = &mut self.announcements[i];
            announcement.remaining -= 1;
            announcement.next = now + REGISTER_ANNOUNCE_INTERVAL;
            if announcement.remaining == 0 {
                self.event_outs
                    .push_back(ZeroconfEvent::ServiceRegistered { name });
            }
        }
        self.announcements.retain(|a| a.remaining > 0);
    }

    fn queue_packet(&mut self, out: &DnsOutgoing, dest: SocketAddr, now: Instant) {
        if out.is_empty() {
            return;
        }
        for data in out.packets() {
            log::trace!("queuing {} bytes to {dest}", data.len());
            self.write_outs.push_back(TransportMessage {
                now,
                transport: TransportContext {
                    local_addr: self.config.local_addr,
                    peer_addr: dest,
                    transport_protocol: TransportProtocol::UDP,
                },
                message: BytesMut::from(&data[..]),
            });
        }
    }

    fn process_message(&mut self, msg: &TaggedBytesMut) {
        let source = msg.transport.peer_addr;
        let mut incoming = DnsIncoming::new(&msg.message, Some(source), None, msg.now);
        if !incoming.is_valid() {
            self.log_throttle
                .log(format!("invalid packet from {source}"));
            return;
        }

        if incoming.is_query() {
            self.process_query(incoming, source, msg.now);
        } else {
            self.process_response(incoming, msg.now);
        }
    }

    fn process_query(&mut self, mut incoming: DnsIncoming, source: SocketAddr, now: Instant) {
        let id = incoming.id();
        let is_probe = incoming.is_probe();
        let truncated = incoming.truncated();
        let questions = incoming.questions().to_vec();
        let known_answers = incoming.answers().to_vec();
        for failure in incoming.take_decode_failures() {
            self.log_throttle.log(failure);
        }

        let ucast_source = source.port() != MDNS_PORT;

        let (frame, frame_id) = match self.pending_truncated.remove(&source) {
            Some(mut pending) => {
                pending.frame.questions.extend(questions);
                pending.frame.known_answers.extend(known_answers);
                pending.frame.is_probe |= is_probe;
                (pending.frame, pending.id)
            }
            None => (
                QueryFrame {
                    questions,
                    known_answers,
                    is_probe,
                    ucast_source,
                },
                id,
            ),
        };

        if truncated {
            // Continuation packets carry the rest of the known answers;
            // hold the whole query until they arrive or the window closes.
            let hold = std::time::Duration::from_millis(rand::random_range(
                TC_HOLD_MIN.as_millis() as u64..=TC_HOLD_MAX.as_millis() as u64,
            ));
            self.pending_truncated.insert(
                source,
                PendingTruncated {
                    frame,
                    id: frame_id,
                    deadline: now + hold,
                },
            );
            return;
        }

        self.respond_to_frame(&frame, source, frame_id, now);
    }

    fn respond_to_frame(&mut self, frame: &QueryFrame, source: SocketAddr, id: u16, now: Instant) {
        let mut planner = AnswerPlanner {
            registry: &self.registry,
            history: &mut self.history,
            last_multicast: &self.last_multicast,
        };
        let answers = planner.plan(frame, now);
        if answers.is_empty() {
            return;
        }

        if !answers.unicast.is_empty() {
            let mut out = build_response(&answers.unicast, now);
            if frame.ucast_source {
                // Legacy resolvers match responses by id.
                out.id = id;
            }
            self.queue_packet(&out, source, now);
        }
        if !answers.multicast_now.is_empty() {
            self.multicast_answers(&answers.multicast_now, now);
        }
        if !answers.multicast_aggregate.is_empty() {
            self.out_queue.add(now, answers.multicast_aggregate);
        }
        if !answers.multicast_aggregate_delayed.is_empty() {
            self.out_delayed_queue
                .add(now, answers.multicast_aggregate_delayed);
        }
    }

    fn multicast_answers(&mut self, answers: &AnswerWithAdditionals, now: Instant) {
        let out = build_response(answers, now);
        for (record, additionals) in answers {
            self.last_multicast.insert(record.clone(), now);
            for additional in additionals {
                self.last_multicast.insert(additional.clone(), now);
            }
        }
        self.queue_packet(&out, MDNS_DEST_ADDR, now);
    }

    fn process_response(&mut self, mut incoming: DnsIncoming, now: Instant) {
        let records = incoming.answers().to_vec();
        for failure in incoming.take_decode_failures() {
            self.log_throttle.log(failure);
        }
        if records.is_empty() {
            return;
        }

        let mut listeners: Vec<&mut dyn CacheUpdateListener> = self
            .browsers
            .values_mut()
            .map(|b| b as &mut dyn CacheUpdateListener)
            .collect();
        let new = route_records(&mut self.cache, &mut listeners, records, now);

        self.drain_browser_events();
        if new {
            self.event_outs.push_back(ZeroconfEvent::CacheUpdated);
        }
    }

    fn drain_browser_events(&mut self) {
        for (id, browser) in self.browsers.iter_mut() {
            while let Some(event) = browser.pop_event() {
                self.event_outs.push_back(match event {
                    ServiceEvent::Found { service_type, name } => ZeroconfEvent::ServiceFound {
                        browser: *id,
                        service_type,
                        name,
                    },
                    ServiceEvent::Removed { service_type, name } => {
                        ZeroconfEvent::ServiceRemoved {
                            browser: *id,
                            service_type,
                            name,
                        }
                    }
                });
            }
        }
    }

    fn run_cache_maintenance(&mut self, now: Instant) {
        let due = match self.next_cache_maintenance {
            Some(next) => next <= now + CLOCK_RESOLUTION,
            None => true,
        };
        if !due {
            return;
        }
        self.next_cache_maintenance = Some(now + self.config.cache_maintenance_interval);

        let expired = self.cache.expire(now);
        if !expired.is_empty() {
            log::debug!("expired {} cached records", expired.len());
            for browser in self.browsers.values_mut() {
                browser.on_records_expired(&expired, now);
            }
            self.drain_browser_events();
        }
        self.history.expire(now);
    }

    fn flush_outgoing_queues(&mut self, now: Instant) {
        if let Some(answers) = self.out_queue.ready(now) {
            self.multicast_answers(&answers, now);
        }
        if let Some(answers) = self.out_delayed_queue.ready(now) {
            self.multicast_answers(&answers, now);
        }
    }

    fn flush_truncated(&mut self, now: Instant) {
        let due: Vec<SocketAddr> = self
            .pending_truncated
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(addr, _)| *addr)
            .collect();
        for source in due {
            if let Some(pending) = self.pending_truncated.remove(&source) {
                // The continuation never came; answer with what we have.
                self.respond_to_frame(&pending.frame, source, pending.id, now);
            }
        }
    }
}

fn build_response(answers: &AnswerWithAdditionals, now: Instant) -> DnsOutgoing {
    let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
    let mut seen_additionals: HashSet<&Record> = HashSet::new();
    for (record, additionals) in answers {
        out.add_answer_at_time(record.clone(), now);
        for additional in additionals {
            if !answers.contains_key(additional) && seen_additionals.insert(additional) {
                out.add_additional_answer(additional.clone());
            }
        }
    }
    out
}

impl sansio::Protocol<TaggedBytesMut, (), ()> for Zeroconf {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = ZeroconfEvent;
    type Error = Error;
    type Time = Instant;

    /// Process an incoming datagram from 224.0.0.251:5353 (or a legacy
    /// unicast query).
    ///
    /// Queries are answered per RFC 6762's timing rules; answer packets
    /// surface through `poll_write()` either immediately or after a later
    /// `handle_timeout()`. Responses update the cache and may produce
    /// events.
    ///
    /// # Errors
    ///
    /// [`Error::ErrConnectionClosed`] after `close()`.
    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        if msg.message.len() > MAX_MSG_ABSOLUTE {
            self.log_throttle.log(format!(
                "oversized packet ({} bytes) from {}",
                msg.message.len(),
                msg.transport.peer_addr
            ));
            return Ok(());
        }
        if self.next_cache_maintenance.is_none() {
            self.next_cache_maintenance =
                Some(msg.now + self.config.cache_maintenance_interval);
        }
        self.process_message(&msg);
        Ok(())
    }

    /// The engine has no read outputs; discoveries arrive via
    /// `poll_event()`.
    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Not used; outgoing traffic originates from the engine itself.
    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    /// Next datagram to put on the wire. Drain until `None` after every
    /// `handle_read()` / `handle_timeout()` call.
    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.write_outs.pop_front()
    }

    /// Not used.
    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    /// Next protocol event, or `None` when the queue is empty.
    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.event_outs.pop_front()
    }

    /// Run everything that has come due: cache expiry, browser queries,
    /// aggregation queue flushes, registration announcements, and held
    /// truncated queries.
    ///
    /// # Errors
    ///
    /// [`Error::ErrConnectionClosed`] after `close()`.
    fn handle_timeout(&mut self, now: Self::Time) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }

        self.run_cache_maintenance(now);
        self.send_due_announcements(now);
        self.flush_truncated(now);
        self.flush_outgoing_queues(now);

        let mut queries: Vec<DnsOutgoing> = Vec::new();
        for browser in self.browsers.values_mut() {
            queries.extend(browser.handle_timeout(&self.cache, now));
        }
        for out in queries {
            self.queue_packet(&out, MDNS_DEST_ADDR, now);
        }
        Ok(())
    }

    /// Earliest deadline at which `handle_timeout()` has work to do.
    fn poll_timeout(&mut self) -> Option<Self::Time> {
        if self.closed {
            return None;
        }
        let mut deadline: Option<Instant> = self.next_cache_maintenance;
        let mut consider = |candidate: Option<Instant>| {
            if let Some(c) = candidate {
                deadline = Some(match deadline {
                    Some(d) => d.min(c),
                    None => c,
                });
            }
        };
        consider(self.announcements.iter().map(|a| a.next).min());
        consider(self.pending_truncated.values().map(|p| p.deadline).min());
        consider(self.out_queue.next_time());
        consider(self.out_delayed_queue.next_time());
        consider(self.browsers.values().map(|b| b.next_time()).min());
        deadline
    }

    /// Mark the engine closed and drop queued output.
    ///
    /// Call [`unregister_all_services`](Zeroconf::unregister_all_services)
    /// first if peers should see goodbyes.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnectionClosed);
        }
        self.closed = true;
        self.write_outs.clear();
        self.event_outs.clear();
        self.pending_truncated.clear();
        self.announcements.clear();
        Ok(())
    }
}
