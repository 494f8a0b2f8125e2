//! Registered services and the records synthesized from them.
//!
//! A [`ServiceRegistration`] owns one advertised service's metadata and
//! produces its PTR/SRV/TXT/address/NSEC records on demand. Synthesis is
//! memoized; any metadata change drops the memo.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use crate::config::{DNS_HOST_TTL, DNS_OTHER_TTL};
use crate::error::{Error, Result};
use crate::message::record::{RData, Record};
use crate::message::{CLASS_IN, DnsType, fqdn};

/// Validates a DNS-SD service type like `_http._tcp.local.`.
pub(crate) fn check_service_type(type_: &str) -> Result<()> {
    let t = type_.to_lowercase();
    if !t.starts_with('_') || !(t.ends_with("._tcp.local.") || t.ends_with("._udp.local.")) {
        return Err(Error::ErrBadServiceType);
    }
    Ok(())
}

/// One advertised service.
#[derive(Clone)]
pub struct ServiceRegistration {
    type_: String,
    instance: String,
    server: String,
    port: u16,
    priority: u16,
    weight: u16,
    text: Vec<u8>,
    addresses: Vec<IpAddr>,
    host_ttl: u32,
    other_ttl: u32,
    /// Synthesized records, re-stamped to the caller's `now` on access.
    memo: Option<Vec<Record>>,
}

impl ServiceRegistration {
    /// `type_` is the service type (`_http._tcp.local.`), `instance` the
    /// bare instance name (`web`).
    pub fn new(type_: impl Into<String>, instance: impl Into<String>, port: u16) -> Self {
        let instance = instance.into();
        Self {
            type_: fqdn(&type_.into()),
            server: format!("{instance}.local."),
            instance,
            port,
            priority: 0,
            weight: 0,
            text: Vec::new(),
            addresses: Vec::new(),
            host_ttl: DNS_HOST_TTL,
            other_ttl: DNS_OTHER_TTL,
            memo: None,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = fqdn(&server.into());
        self.memo = None;
        self
    }

    pub fn with_addresses(mut self, addresses: Vec<IpAddr>) -> Self {
        self.addresses = addresses;
        self.memo = None;
        self
    }

    pub fn with_text(mut self, text: Vec<u8>) -> Self {
        self.text = text;
        self.memo = None;
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self.memo = None;
        self
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self.memo = None;
        self
    }

    pub fn with_host_ttl(mut self, ttl: u32) -> Self {
        self.host_ttl = ttl;
        self.memo = None;
        self
    }

    pub fn with_other_ttl(mut self, ttl: u32) -> Self {
        self.other_ttl = ttl;
        self.memo = None;
        self
    }

    /// Full instance name, `web._http._tcp.local.`.
    pub fn name(&self) -> String {
        format!("{}.{}", self.instance, self.type_)
    }

    pub fn service_type(&self) -> &str {
        &self.type_
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    /// Renames the instance (conflict resolution); drops the memo.
    pub(crate) fn set_instance(&mut self, instance: String) {
        self.instance = instance;
        self.memo = None;
    }

    pub(crate) fn ptr_record(&self, now: Instant) -> Record {
        Record::new(
            self.type_.clone(),
            CLASS_IN,
            false,
            self.other_ttl,
            now,
            RData::Pointer { alias: self.name() },
        )
    }

    pub(crate) fn srv_record(&self, now: Instant) -> Record {
        Record::new(
            self.name(),
            CLASS_IN,
            true,
            self.host_ttl,
            now,
            RData::Service {
                priority: self.priority,
                weight: self.weight,
                port: self.port,
                server: self.server.clone(),
            },
        )
    }

    pub(crate) fn txt_record(&self, now: Instant) -> Record {
        Record::new(
            self.name(),
            CLASS_IN,
            true,
            self.other_ttl,
            now,
            RData::Text {
                text: self.text.clone(),
            },
        )
    }

    pub(crate) fn address_records(&self, typ: DnsType, now: Instant) -> Vec<Record> {
        self.addresses
            .iter()
            .filter(|a| match typ {
                DnsType::A => a.is_ipv4(),
                DnsType::Aaaa => a.is_ipv6(),
                DnsType::Any => true,
                _ => false,
            })
            .map(|a| {
                Record::new(
                    self.server.clone(),
                    CLASS_IN,
                    true,
                    self.host_ttl,
                    now,
                    RData::Address {
                        addr: *a,
                        scope_id: None,
                    },
                )
            })
            .collect()
    }

    /// Address types for which no address is registered, in type order.
    pub(crate) fn missing_address_types(&self) -> Vec<u16> {
        let mut missing = Vec::new();
        if !self.addresses.iter().any(|a| a.is_ipv4()) {
            missing.push(DnsType::A as u16);
        }
        if !self.addresses.iter().any(|a| a.is_ipv6()) {
            missing.push(DnsType::Aaaa as u16);
        }
        missing
    }

    /// NSEC asserting which address families do not exist for the server
    /// name (RFC 6762 §6.1). None when both families are present.
    pub(crate) fn nsec_record(&self, now: Instant) -> Option<Record> {
        let types = self.missing_address_types();
        if types.is_empty() || types.len() == 2 {
            // Nothing missing, or no addresses at all to vouch for.
            return None;
        }
        Some(Record::new(
            self.server.clone(),
            CLASS_IN,
            true,
            self.host_ttl,
            now,
            RData::Nsec {
                next_name: self.server.clone(),
                types,
            },
        ))
    }

    /// Every record advertising this service, for announcements and
    /// goodbyes.
    pub(crate) fn records(&mut self, now: Instant) -> Vec<Record> {
        if self.memo.is_none() {
            let mut records = vec![
                self.ptr_record(now),
                self.srv_record(now),
                self.txt_record(now),
            ];
            records.extend(self.address_records(DnsType::Any, now));
            if let Some(nsec) = self.nsec_record(now) {
                records.push(nsec);
            }
            self.memo = Some(records);
        }
        self.memo
            .as_ref()
            .map(|records| {
                records
                    .iter()
                    .map(|r| r.with_created_ttl(now, r.ttl))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// All currently registered services, indexed by instance name and by type.
#[derive(Default)]
pub struct ServiceRegistry {
    /// Lowercased full instance name -> registration.
    services: HashMap<String, ServiceRegistration>,
    /// Lowercased type -> lowercased full instance names.
    types: HashMap<String, Vec<String>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, registration: ServiceRegistration) {
        let key = registration.name().to_lowercase();
        let type_key = registration.service_type().to_lowercase();
        let names = self.types.entry(type_key).or_default();
        if !names.contains(&key) {
            names.push(key.clone());
        }
        self.services.insert(key, registration);
    }

    pub fn remove(&mut self, name: &str) -> Option<ServiceRegistration> {
        let key = name.to_lowercase();
        let registration = self.services.remove(&key)?;
        let type_key = registration.service_type().to_lowercase();
        if let Some(names) = self.types.get_mut(&type_key) {
            names.retain(|n| n != &key);
            if names.is_empty() {
                self.types.remove(&type_key);
            }
        }
        Some(registration)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceRegistration> {
        self.services.get(&name.to_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ServiceRegistration> {
        self.services.get_mut(&name.to_lowercase())
    }

    /// Registrations of one service type.
    pub fn get_by_type(&self, type_: &str) -> Vec<&ServiceRegistration> {
        self.types
            .get(&type_.to_lowercase())
            .into_iter()
            .flatten()
            .filter_map(|name| self.services.get(name))
            .collect()
    }

    /// Registered service types, for `_services._dns-sd._udp.local.`
    /// enumeration.
    pub fn types(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.services.contains_key(&name.to_lowercase())
    }

    /// Registrations whose server (host) name matches.
    pub fn get_by_server(&self, server: &str) -> Vec<&ServiceRegistration> {
        let server = server.to_lowercase();
        self.services
            .values()
            .filter(|s| s.server().to_lowercase() == server)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
