//! The record cache: every record learned from the network, indexed by name
//! and by SRV target, with a priority queue driving TTL expiry.
//!
//! The heap is tombstone-based. Records are never removed from it; instead
//! a side table maps each live record identity to its current expire time,
//! and a popped heap entry counts only if its recorded time still matches
//! the table. Refreshing a record simply pushes a new heap entry and lets
//! the old one die on pop. The heap is rebuilt once dead entries outnumber
//! live ones past a floor.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::config::EXPIRE_HEAP_COMPACT_MIN;
use crate::message::DnsType;
use crate::message::record::{RData, Record};

struct ExpireEntry {
    expire: Instant,
    /// Insertion tiebreaker so `Record` itself never needs an ordering.
    seq: u64,
    record: Record,
}

impl PartialEq for ExpireEntry {
    fn eq(&self, other: &Self) -> bool {
        self.expire == other.expire && self.seq == other.seq
    }
}

impl Eq for ExpireEntry {}

impl PartialOrd for ExpireEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExpireEntry {
    // Reversed so the BinaryHeap pops the soonest expiry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .expire
            .cmp(&self.expire)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Cache of records seen on the network.
#[derive(Default)]
pub struct DnsCache {
    /// Lowercased name -> distinct records carrying that name.
    rows: HashMap<String, Vec<Record>>,
    /// Lowercased SRV target -> the SRV records pointing at it.
    service_rows: HashMap<String, Vec<Record>>,
    /// Live expire time per record identity; the heap validator.
    expirations: HashMap<Record, Instant>,
    heap: BinaryHeap<ExpireEntry>,
    seq: u64,
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or refreshes one record. Returns true if the record was not
    /// already cached; NSEC records are stored but never count as new.
    pub fn add(&mut self, record: Record) -> bool {
        let expire = record.expire_time();
        self.expirations.insert(record.clone(), expire);
        self.seq += 1;
        self.heap.push(ExpireEntry {
            expire,
            seq: self.seq,
            record: record.clone(),
        });
        self.maybe_compact();

        if let RData::Service { server, .. } = &record.rdata {
            let services = self.service_rows.entry(server.to_lowercase()).or_default();
            match services.iter_mut().find(|r| **r == record) {
                Some(slot) => *slot = record.clone(),
                None => services.push(record.clone()),
            }
        }

        let is_new = record.dns_type() != DnsType::Nsec;
        let row = self.rows.entry(record.key()).or_default();
        match row.iter_mut().find(|r| **r == record) {
            Some(slot) => {
                *slot = record;
                false
            }
            None => {
                row.push(record);
                is_new
            }
        }
    }

    /// Adds a batch; true if any record was new.
    pub fn add_records(&mut self, records: impl IntoIterator<Item = Record>) -> bool {
        let mut any_new = false;
        for record in records {
            if self.add(record) {
                any_new = true;
            }
        }
        any_new
    }

    /// Removes a record by identity. Heap entries are left to die on pop.
    pub fn remove(&mut self, record: &Record) -> bool {
        self.expirations.remove(record);

        if let RData::Service { server, .. } = &record.rdata {
            let server_key = server.to_lowercase();
            if let Some(services) = self.service_rows.get_mut(&server_key) {
                services.retain(|r| r != record);
                if services.is_empty() {
                    self.service_rows.remove(&server_key);
                }
            }
        }

        let key = record.key();
        let Some(row) = self.rows.get_mut(&key) else {
            return false;
        };
        let before = row.len();
        row.retain(|r| r != record);
        let removed = row.len() < before;
        if row.is_empty() {
            self.rows.remove(&key);
        }
        removed
    }

    pub fn remove_records(&mut self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.remove(&record);
        }
    }

    /// The cached record identity-equal to `record`, if any.
    pub fn get(&self, record: &Record) -> Option<&Record> {
        self.rows
            .get(&record.key())?
            .iter()
            .find(|r| *r == record)
    }

    /// All cached records matching (name, type, class).
    pub fn get_by_details(&self, name: &str, typ: DnsType, class: u16) -> Vec<&Record> {
        let key = name.to_lowercase();
        self.rows
            .get(&key)
            .into_iter()
            .flatten()
            .filter(|r| r.dns_type() == typ && r.class == class)
            .collect()
    }

    pub fn entries_with_name(&self, name: &str) -> Vec<&Record> {
        self.rows
            .get(&name.to_lowercase())
            .into_iter()
            .flatten()
            .collect()
    }

    /// All SRV records whose target is `server`.
    pub fn entries_with_server(&self, server: &str) -> Vec<&Record> {
        self.service_rows
            .get(&server.to_lowercase())
            .into_iter()
            .flatten()
            .collect()
    }

    /// Removes and returns every record expired at `now`.
    pub fn expire(&mut self, now: Instant) -> Vec<Record> {
        let mut expired = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.expire > now {
                break;
            }
            let entry = match self.heap.pop() {
                Some(e) => e,
                None => break,
            };
            // A mismatched expire time means the record was refreshed or
            // removed after this entry was pushed.
            if self.expirations.get(&entry.record) == Some(&entry.expire) {
                self.remove(&entry.record);
                expired.push(entry.record);
            }
        }
        expired
    }

    /// Earliest live expiry, discarding dead heap entries on the way.
    pub fn next_expiry(&mut self) -> Option<Instant> {
        while let Some(top) = self.heap.peek() {
            if self.expirations.get(&top.record) == Some(&top.expire) {
                return Some(top.expire);
            }
            self.heap.pop();
        }
        None
    }

    /// RFC 6762 §10.2: when a response asserts cache-flush records, every
    /// *other* cached record with an asserted identity that is older than
    /// one second and absent from the response is re-stamped to expire one
    /// second from now.
    pub fn mark_unique_records_older_than_1s_to_expire(
        &mut self,
        unique_types: &HashSet<(String, DnsType, u16)>,
        answers: &[Record],
        now: Instant,
    ) {
        if unique_types.is_empty() {
            return;
        }
        let answer_set: HashSet<&Record> = answers.iter().collect();
        let mut doomed = Vec::new();
        for (name, typ, class) in unique_types {
            for record in self.get_by_details(name, *typ, *class) {
                if now.saturating_duration_since(record.created) > Duration::from_secs(1)
                    && !answer_set.contains(record)
                {
                    doomed.push(record.with_created_ttl(now, 1));
                }
            }
        }
        for record in doomed {
            self.add(record);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    fn maybe_compact(&mut self) {
        let threshold = EXPIRE_HEAP_COMPACT_MIN.max(2 * self.expirations.len());
        if self.heap.len() <= threshold {
            return;
        }
        let expirations = &self.expirations;
        let live: Vec<ExpireEntry> = self
            .heap
            .drain()
            .filter(|e| expirations.get(&e.record) == Some(&e.expire))
            .collect();
        self.heap = BinaryHeap::from(live);
    }
}
