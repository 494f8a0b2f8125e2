//! Continuous querying for browsed service types (RFC 6762 §5.2).
//!
//! A browser starts with four queries at quadratically growing spacing,
//! then settles into steady state: every discovered pointer gets a refresh
//! query scheduled at 75% of its TTL, with a one-shot rescue retry 10% of
//! TTL later if the refresh went unanswered. Scheduled queries live in a
//! tombstoned heap; cancellation just drops the validating side-table entry.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::time::Instant;

use crate::cache::DnsCache;
use crate::config::{
    CLOCK_RESOLUTION, EXPIRE_HEAP_COMPACT_MIN, EXPIRE_REFRESH_PERCENT, MAX_MSG_TYPICAL,
    RESCUE_RETRY_PERCENT, STARTUP_QUERIES,
};
use crate::message::outgoing::{DnsOutgoing, estimated_question_size, estimated_record_size};
use crate::message::record::{Question, RData, Record};
use crate::message::{CLASS_IN, DnsType, FLAGS_QR_QUERY, HEADER_LEN, fqdn};
use crate::router::{CacheUpdateListener, RecordUpdate};

/// Whether browse questions request unicast (QU) or multicast (QM)
/// responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    QM,
    QU,
}

/// Service discovery notifications produced by a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    Found {
        service_type: String,
        name: String,
    },
    Removed {
        service_type: String,
        name: String,
    },
}

struct ScheduledQuery {
    when: Instant,
    expire: Instant,
    /// Lowercased instance name this refresh protects.
    alias: String,
    /// Service type to ask for.
    name: String,
    ttl: u32,
    seq: u64,
}

impl PartialEq for ScheduledQuery {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ScheduledQuery {}

impl PartialOrd for ScheduledQuery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledQuery {
    // Reversed for a soonest-first heap.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .when
            .cmp(&self.when)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One browse instance over a set of service types.
pub struct ServiceBrowser {
    /// Lowercased fully-qualified service types.
    types: Vec<String>,
    question_type: Option<QuestionType>,
    min_time_between_queries: std::time::Duration,

    startup_queries_sent: u32,
    next_time: Instant,

    heap: BinaryHeap<ScheduledQuery>,
    /// Lowercased alias -> (seq, when) of its one live scheduled query. A
    /// popped heap entry whose seq no longer matches was cancelled or
    /// superseded.
    scheduled: HashMap<String, (u64, Instant)>,
    seq: u64,

    events: VecDeque<ServiceEvent>,
}

impl ServiceBrowser {
    pub(crate) fn new(
        types: Vec<String>,
        question_type: Option<QuestionType>,
        min_time_between_queries: std::time::Duration,
        now: Instant,
    ) -> Self {
        Self {
            types: types.iter().map(|t| fqdn(t).to_lowercase()).collect(),
            question_type,
            min_time_between_queries,
            startup_queries_sent: 0,
            next_time: now,
            heap: BinaryHeap::new(),
            scheduled: HashMap::new(),
            seq: 0,
            events: VecDeque::new(),
        }
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub(crate) fn next_time(&self) -> Instant {
        self.next_time
    }

    pub(crate) fn pop_event(&mut self) -> Option<ServiceEvent> {
        self.events.pop_front()
    }

    fn browses(&self, service_type: &str) -> bool {
        let key = service_type.to_lowercase();
        self.types.contains(&key)
    }

    /// Runs one scheduler wake. Returns the queries to put on the wire.
    pub(crate) fn handle_timeout(&mut self, cache: &DnsCache, now: Instant) -> Vec<DnsOutgoing> {
        if now + CLOCK_RESOLUTION < self.next_time {
            return Vec::new();
        }

        if self.startup_queries_sent < STARTUP_QUERIES {
            let unicast = match self.question_type {
                Some(qt) => qt == QuestionType::QU,
                None => self.startup_queries_sent == 0,
            };
            let types = self.types.clone();
            let queries = self.queries_for_types(&types, unicast, cache, now);
            self.startup_queries_sent += 1;
            self.next_time = now
                + std::time::Duration::from_secs(
                    (self.startup_queries_sent * self.startup_queries_sent) as u64,
                );
            return queries;
        }

        let ready = self.pop_ready(now);
        let next_refresh = self.next_scheduled_time();
        self.next_time = (now + self.min_time_between_queries)
            .max(next_refresh.unwrap_or(now + self.min_time_between_queries));

        if ready.is_empty() {
            return Vec::new();
        }
        let unicast = self.question_type == Some(QuestionType::QU);
        self.queries_for_types(&ready, unicast, cache, now)
    }

    /// Pops every non-cancelled entry due within clock tolerance, arming a
    /// rescue retry for each, and returns the distinct service types to
    /// query.
    fn pop_ready(&mut self, now: Instant) -> Vec<String> {
        let mut ready: Vec<String> = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.when > now + CLOCK_RESOLUTION {
                break;
            }
            let entry = match self.heap.pop() {
                Some(e) => e,
                None => break,
            };
            if self.scheduled.get(&entry.alias).map(|(seq, _)| *seq) != Some(entry.seq) {
                continue;
            }
            self.scheduled.remove(&entry.alias);

            if !ready.contains(&entry.name) {
                ready.push(entry.name.clone());
            }

            // One rescue shot in case the refresh answer never comes.
            let rescue_at =
                now + std::time::Duration::from_millis(entry.ttl as u64 * RESCUE_RETRY_PERCENT as u64 * 10);
            if rescue_at < entry.expire {
                self.push_query(entry.alias, entry.name, entry.ttl, rescue_at, entry.expire);
            }
        }
        ready
    }

    fn next_scheduled_time(&mut self) -> Option<Instant> {
        while let Some(top) = self.heap.peek() {
            if self.scheduled.get(&top.alias).map(|(seq, _)| *seq) == Some(top.seq) {
                return Some(top.when);
            }
            self.heap.pop();
        }
        None
    }

    fn push_query(&mut self, alias: String, name: String, ttl: u32, when: Instant, expire: Instant) {
        self.seq += 1;
        self.scheduled.insert(alias.clone(), (self.seq, when));
        self.heap.push(ScheduledQuery {
            when,
            expire,
            alias,
            name,
            ttl,
            seq: self.seq,
        });
        self.maybe_compact();
    }

    fn cancel(&mut self, alias: &str) {
        self.scheduled.remove(&alias.to_lowercase());
    }

    /// (Re)schedules the steady-state refresh for a pointer at 75% of its
    /// TTL. An existing schedule within one rescue interval of the new
    /// target is left alone.
    fn reschedule_refresh(&mut self, pointer: &Record, alias: &str) {
        let when = pointer.created + pointer.ttl_fraction(EXPIRE_REFRESH_PERCENT);
        let rescue_interval = pointer.ttl_fraction(RESCUE_RETRY_PERCENT);
        let key = alias.to_lowercase();
        if let Some((_, current_when)) = self.scheduled.get(&key) {
            let drift = if *current_when > when {
                *current_when - when
            } else {
                when - *current_when
            };
            if drift <= rescue_interval {
                return;
            }
        }
        self.push_query(
            key,
            pointer.key(),
            pointer.ttl,
            when,
            pointer.expire_time(),
        );
        if when < self.next_time {
            self.next_time = when;
        }
    }

    /// Called when the cache maintenance tick expires records without a
    /// goodbye having been heard.
    pub(crate) fn on_records_expired(&mut self, records: &[Record], _now: Instant) {
        for record in records {
            let RData::Pointer { alias } = &record.rdata else {
                continue;
            };
            if !self.browses(&record.name) {
                continue;
            }
            self.cancel(alias);
            self.events.push_back(ServiceEvent::Removed {
                service_type: record.key(),
                name: alias.clone(),
            });
        }
    }

    /// Builds the wire queries for a set of service types, attaching each
    /// type's still-fresh cached pointers as known answers. Pairs are
    /// packed greedily, largest first, so known answers always share a
    /// packet with their question.
    fn queries_for_types(
        &self,
        types: &[String],
        unicast: bool,
        cache: &DnsCache,
        now: Instant,
    ) -> Vec<DnsOutgoing> {
        let mut pairs: Vec<(usize, Question, Vec<Record>)> = Vec::with_capacity(types.len());
        for service_type in types {
            let question = Question::new(service_type.clone(), DnsType::Ptr, CLASS_IN, unicast);
            let known: Vec<Record> = cache
                .get_by_details(service_type, DnsType::Ptr, CLASS_IN)
                .into_iter()
                .filter(|r| !r.is_stale(now))
                .cloned()
                .collect();
            let size = estimated_question_size(&question)
                + known.iter().map(estimated_record_size).sum::<usize>();
            pairs.push((size, question, known));
        }
        pairs.sort_by(|a, b| b.0.cmp(&a.0));

        let budget = MAX_MSG_TYPICAL - HEADER_LEN;
        let mut buckets: Vec<(usize, DnsOutgoing)> = Vec::new();
        for (size, question, known) in pairs {
            let idx = match buckets.iter().position(|(used, _)| used + size <= budget) {
                Some(i) => i,
                None => {
                    buckets.push((0, DnsOutgoing::new(FLAGS_QR_QUERY)));
                    buckets.len() - 1
                }
            };
            let (used, out) = &mut buckets[idx];
            *used += size;
            out.add_question(question);
            for record in known {
                out.add_answer_at_time(record, now);
            }
        }
        buckets.into_iter().map(|(_, out)| out).collect()
    }

    fn maybe_compact(&mut self) {
        let threshold = EXPIRE_HEAP_COMPACT_MIN.max(2 * self.scheduled.len());
        if self.heap.len() <= threshold {
            return;
        }
        let scheduled = &self.scheduled;
        let live: Vec<ScheduledQuery> = self
            .heap
            .drain()
            .filter(|e| scheduled.get(&e.alias).map(|(seq, _)| *seq) == Some(e.seq))
            .collect();
        self.heap = BinaryHeap::from(live);
    }
}

impl CacheUpdateListener for ServiceBrowser {
    fn update_records(&mut self, now: Instant, updates: &[RecordUpdate]) {
        for update in updates {
            let RData::Pointer { alias } = &update.new.rdata else {
                continue;
            };
            if !self.browses(&update.new.name) {
                continue;
            }
            if update.new.is_expired(now) {
                // Goodbye.
                self.cancel(alias);
                self.events.push_back(ServiceEvent::Removed {
                    service_type: update.new.key(),
                    name: alias.clone(),
                });
                continue;
            }
            if update.old.is_none() {
                self.events.push_back(ServiceEvent::Found {
                    service_type: update.new.key(),
                    name: alias.clone(),
                });
            }
            self.reschedule_refresh(&update.new, alias);
        }
    }

    fn update_records_complete(&mut self, _now: Instant) {}
}
