//! # zeroconf-sd
//!
//! A sans-I/O implementation of mDNS (RFC 6762) and DNS-SD (RFC 6763) for
//! Rust.
//!
//! This crate provides a zero-configuration service discovery engine that
//! implements the [`sansio::Protocol`] trait, allowing it to be integrated
//! with any I/O framework (tokio, async-std, smol, or synchronous I/O).
//!
//! ## What is DNS-SD over mDNS?
//!
//! Multicast DNS lets hosts on a local network answer DNS queries
//! themselves, with no central server; DNS Service Discovery layers a
//! naming convention on top so applications can browse for service
//! instances (printers, media servers, IoT devices) by type. Together they
//! are the protocol behind Bonjour and Avahi.
//!
//! ## Sans-I/O Design
//!
//! This crate follows the [sans-I/O](https://sans-io.readthedocs.io/)
//! pattern:
//!
//! - **No runtime dependency**: works with tokio, async-std, smol, or
//!   blocking I/O
//! - **Testable**: protocol logic is exercised without network I/O
//! - **Predictable**: no hidden threads, timers, or background tasks
//! - **Composable**: integrates with existing event loops
//!
//! The caller is responsible for:
//! 1. Reading packets from the network and calling `handle_read()`
//! 2. Sending packets returned by `poll_write()`
//! 3. Calling `handle_timeout()` when `poll_timeout()` expires
//! 4. Processing events from `poll_event()`
//!
//! All of RFC 6762's timing discipline lives inside the engine: response
//! jitter, answer aggregation windows, the once-per-second multicast rate
//! limit, known-answer and duplicate-question suppression, TTL-driven cache
//! expiry, and the 75%/10% refresh and rescue query schedule for browsed
//! services.
//!
//! ## Quick Start
//!
//! ### Browse for services
//!
//! ```rust
//! use zeroconf_sd::{Zeroconf, ZeroconfConfig, ZeroconfEvent};
//! use sansio::Protocol;
//! use std::time::Instant;
//!
//! let mut zc = Zeroconf::new(ZeroconfConfig::default());
//! let browser = zc
//!     .browse(vec!["_http._tcp.local.".to_string()], None, Instant::now())
//!     .unwrap();
//!
//! // The first startup query is queued immediately.
//! let packet = zc.poll_write().expect("startup query should be queued");
//! assert_eq!(packet.transport.peer_addr.to_string(), "224.0.0.251:5353");
//!
//! // Feed received responses to handle_read(), then:
//! while let Some(event) = zc.poll_event() {
//!     match event {
//!         ZeroconfEvent::ServiceFound { name, .. } => println!("found {name}"),
//!         ZeroconfEvent::ServiceRemoved { name, .. } => println!("lost {name}"),
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ### Advertise a service
//!
//! ```rust
//! use zeroconf_sd::{ServiceRegistration, Zeroconf, ZeroconfConfig};
//! use std::net::{IpAddr, Ipv4Addr};
//! use std::time::Instant;
//!
//! let mut zc = Zeroconf::new(ZeroconfConfig::default());
//! let service = ServiceRegistration::new("_http._tcp.local.", "web", 8080)
//!     .with_server("myhost.local.")
//!     .with_addresses(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))]);
//! zc.register_service(service, false, Instant::now()).unwrap();
//!
//! // Announcement packets are queued; queries arriving via handle_read()
//! // are answered with correctly timed unicast/multicast responses.
//! ```
//!
//! ## Event Loop Pattern
//!
//! ```text
//! loop {
//!     // 1. Send any queued packets
//!     while let Some(packet) = zc.poll_write() {
//!         socket.send_to(&packet.message, packet.transport.peer_addr);
//!     }
//!
//!     // 2. Wait for network activity or the engine's next deadline
//!     select! {
//!         packet = socket.recv_from() => zc.handle_read(packet),
//!         _ = sleep_until(zc.poll_timeout()) => zc.handle_timeout(Instant::now()),
//!     }
//!
//!     // 3. Process events
//!     while let Some(event) = zc.poll_event() { /* ... */ }
//! }
//! ```
//!
//! ## Protocol Details
//!
//! - **Multicast Address**: 224.0.0.251:5353 (IPv4)
//! - **Record Types**: A, AAAA, PTR, TXT, SRV, HINFO, NSEC
//! - **Compression**: DNS name compression on encode and decode
//! - **Packet budget**: 1460 bytes typical, 8966 absolute, with automatic
//!   multi-packet continuation

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub(crate) mod browser;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod history;
pub(crate) mod message;
pub(crate) mod proto;
pub(crate) mod queue;
pub(crate) mod registry;
pub(crate) mod responder;
pub(crate) mod router;
pub(crate) mod socket;
pub(crate) mod transport;

#[cfg(test)]
mod history_test;

pub use browser::{QuestionType, ServiceEvent};
pub use config::ZeroconfConfig;
pub use error::{Error, Result};
pub use message::DnsType;
pub use message::record::{Question, RData, Record};
pub use proto::{
    BrowserId, MDNS_DEST_ADDR, MDNS_MULTICAST_IPV4, MDNS_PORT, Zeroconf, ZeroconfEvent,
};
pub use registry::{ServiceRegistration, ServiceRegistry};
pub use router::{CacheUpdateListener, RecordUpdate};
pub use socket::MulticastSocket;
pub use transport::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
