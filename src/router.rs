//! Applying a decoded response to the cache, in the order dependents rely
//! on: listeners see the full update batch before the cache changes, and
//! address records land before the records that point at them.

use std::collections::HashSet;
use std::time::Instant;

use crate::cache::DnsCache;
use crate::config::DNS_PTR_MIN_TTL;
use crate::message::DnsType;
use crate::message::record::{RData, Record};

/// One observed record change: the incoming record and what the cache held
/// for that identity, if anything.
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    pub new: Record,
    pub old: Option<Record>,
}

/// Receives cache change batches. `update_records` runs before the cache
/// mutates; `update_records_complete` after, and only when the batch
/// actually added something new.
pub trait CacheUpdateListener {
    fn update_records(&mut self, now: Instant, updates: &[RecordUpdate]);
    fn update_records_complete(&mut self, now: Instant);
}

/// Routes one response's answer records into the cache, fanning change
/// notifications out to `listeners`. Returns true if anything new was
/// cached.
pub(crate) fn route_records(
    cache: &mut DnsCache,
    listeners: &mut [&mut dyn CacheUpdateListener],
    mut records: Vec<Record>,
    now: Instant,
) -> bool {
    let mut unique_types: HashSet<(String, DnsType, u16)> = HashSet::new();
    let mut updates: Vec<RecordUpdate> = Vec::new();
    let mut address_adds: Vec<Record> = Vec::new();
    let mut other_adds: Vec<Record> = Vec::new();
    let mut removes: Vec<Record> = Vec::new();

    for record in &mut records {
        // Low-TTL advertisers would otherwise drive refresh-query storms.
        // Goodbyes (TTL 0) pass through untouched.
        if record.dns_type() == DnsType::Ptr
            && record.ttl > 0
            && record.ttl < DNS_PTR_MIN_TTL
        {
            record.ttl = DNS_PTR_MIN_TTL;
        }
    }

    for record in records.iter() {
        if record.unique {
            unique_types.insert((record.name.clone(), record.dns_type(), record.class));
        }

        let old = cache.get(record).cloned();
        if !record.is_expired(now) {
            updates.push(RecordUpdate {
                new: record.clone(),
                old,
            });
            if matches!(record.rdata, RData::Address { .. }) {
                address_adds.push(record.clone());
            } else {
                other_adds.push(record.clone());
            }
        } else if old.is_some() {
            // A goodbye, or a record that aged out in flight; only
            // interesting if we actually held it.
            updates.push(RecordUpdate {
                new: record.clone(),
                old,
            });
            removes.push(record.clone());
        }
    }

    if !updates.is_empty() {
        for listener in listeners.iter_mut() {
            listener.update_records(now, &updates);
        }
    }

    cache.mark_unique_records_older_than_1s_to_expire(&unique_types, &records, now);

    let mut new = false;
    if cache.add_records(address_adds) {
        new = true;
    }
    if cache.add_records(other_adds) {
        new = true;
    }
    cache.remove_records(removes);

    if new {
        for listener in listeners.iter_mut() {
            listener.update_records_complete(now);
        }
    }
    new
}
