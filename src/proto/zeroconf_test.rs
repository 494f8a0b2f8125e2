use super::*;

use std::time::Duration;

use sansio::Protocol;

use crate::config::DNS_OTHER_TTL;
use crate::message::record::{Question, RData};
use crate::message::{FLAGS_QR_QUERY, HEADER_BIT_TC};

fn engine() -> Zeroconf {
    Zeroconf::new(ZeroconfConfig::default())
}

fn mcast_source() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)), MDNS_PORT)
}

fn tagged(data: &[u8], source: SocketAddr, now: Instant) -> TaggedBytesMut {
    TransportMessage {
        now,
        transport: TransportContext {
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), MDNS_PORT),
            peer_addr: source,
            transport_protocol: TransportProtocol::UDP,
        },
        message: BytesMut::from(data),
    }
}

fn web_service() -> ServiceRegistration {
    ServiceRegistration::new("_http._tcp.local.", "web", 8080)
        .with_server("myhost.local.")
        .with_addresses(vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))])
}

fn ptr_query(unicast: bool) -> Vec<u8> {
    let mut out = DnsOutgoing::new(FLAGS_QR_QUERY);
    out.add_question(Question::new(
        "_http._tcp.local.",
        DnsType::Ptr,
        CLASS_IN,
        unicast,
    ));
    out.packets().remove(0)
}

fn drain_writes(zc: &mut Zeroconf) -> Vec<TaggedBytesMut> {
    let mut packets = Vec::new();
    while let Some(packet) = zc.poll_write() {
        packets.push(packet);
    }
    packets
}

fn drain_events(zc: &mut Zeroconf) -> Vec<ZeroconfEvent> {
    let mut events = Vec::new();
    while let Some(event) = zc.poll_event() {
        events.push(event);
    }
    events
}

/// Registers `web` and drives its three announcements so later asserts see
/// a quiet engine.
fn register_and_settle(zc: &mut Zeroconf, t0: Instant) {
    zc.register_service(web_service(), false, t0).unwrap();
    zc.handle_timeout(t0 + Duration::from_secs(1)).unwrap();
    zc.handle_timeout(t0 + Duration::from_secs(2)).unwrap();
    drain_writes(zc);
    drain_events(zc);
}

#[test]
fn test_browse_queues_first_startup_query() {
    let now = Instant::now();
    let mut zc = engine();
    zc.browse(vec!["_http._tcp.local.".to_string()], None, now)
        .unwrap();

    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, MDNS_DEST_ADDR);

    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, now);
    assert!(incoming.is_valid());
    assert!(incoming.is_query());
    assert_eq!(incoming.num_questions(), 1);
    let question = &incoming.questions()[0];
    assert_eq!(question.name, "_http._tcp.local.");
    assert_eq!(question.typ, DnsType::Ptr);
    // The very first startup query requests a unicast response.
    assert!(question.unicast);
}

#[test]
fn test_browse_rejects_bad_and_duplicate_types() {
    let now = Instant::now();
    let mut zc = engine();

    assert!(matches!(
        zc.browse(vec!["nonsense".to_string()], None, now),
        Err(Error::ErrBadServiceType)
    ));

    let id = zc
        .browse(vec!["_http._tcp.local.".to_string()], None, now)
        .unwrap();
    assert!(matches!(
        zc.browse(vec!["_HTTP._tcp.local.".to_string()], None, now),
        Err(Error::ErrBrowserAlreadyExists)
    ));

    zc.stop_browse(id);
    zc.browse(vec!["_http._tcp.local.".to_string()], None, now)
        .unwrap();
}

#[test]
fn test_register_announces_three_times_then_event() {
    let t0 = Instant::now();
    let mut zc = engine();
    zc.register_service(web_service(), false, t0).unwrap();

    // First unsolicited announcement goes out immediately.
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, MDNS_DEST_ADDR);
    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t0);
    assert!(incoming.is_response());
    // PTR + SRV + TXT + A + NSEC (no AAAA registered).
    assert_eq!(incoming.answers().len(), 5);
    assert!(drain_events(&mut zc).is_empty());

    assert_eq!(zc.poll_timeout(), Some(t0 + Duration::from_secs(1)));
    zc.handle_timeout(t0 + Duration::from_secs(1)).unwrap();
    assert_eq!(drain_writes(&mut zc).len(), 1);
    assert!(drain_events(&mut zc).is_empty());

    zc.handle_timeout(t0 + Duration::from_secs(2)).unwrap();
    assert_eq!(drain_writes(&mut zc).len(), 1);
    assert_eq!(
        drain_events(&mut zc),
        vec![ZeroconfEvent::ServiceRegistered {
            name: "web._http._tcp.local.".to_string(),
        }]
    );
}

#[test]
fn test_register_name_conflict() {
    let t0 = Instant::now();
    let mut zc = engine();
    zc.register_service(web_service(), false, t0).unwrap();

    assert!(matches!(
        zc.register_service(web_service(), false, t0),
        Err(Error::ErrServiceNameAlreadyInUse)
    ));

    // With name changes allowed the second instance picks up a suffix.
    zc.register_service(web_service(), true, t0).unwrap();
    zc.handle_timeout(t0 + Duration::from_secs(1)).unwrap();
    zc.handle_timeout(t0 + Duration::from_secs(2)).unwrap();

    let names: Vec<String> = drain_events(&mut zc)
        .into_iter()
        .filter_map(|e| match e {
            ZeroconfEvent::ServiceRegistered { name } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"web._http._tcp.local.".to_string()));
    assert!(names.contains(&"web (2)._http._tcp.local.".to_string()));
}

#[test]
fn test_qm_ptr_query_answered_after_aggregation() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    zc.handle_read(tagged(&ptr_query(false), mcast_source(), t1))
        .unwrap();
    // PTR rides the 500ms aggregation window; nothing on the wire yet.
    assert!(zc.poll_write().is_none());
    let deadline = zc.poll_timeout().unwrap();
    assert!(deadline > t1 && deadline <= t1 + Duration::from_millis(120));

    zc.handle_timeout(t1 + Duration::from_millis(500)).unwrap();
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, MDNS_DEST_ADDR);

    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t1);
    assert!(incoming.is_response());
    let records = incoming.answers().to_vec();
    // PTR answer plus SRV/TXT/A/NSEC additionals.
    assert_eq!(records.len(), 5);
    assert!(records
        .iter()
        .any(|r| r.dns_type() == DnsType::Ptr && r.name == "_http._tcp.local."));
}

#[test]
fn test_known_answer_suppression_end_to_end() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    let mut query = DnsOutgoing::new(FLAGS_QR_QUERY);
    query.add_question(Question::new(
        "_http._tcp.local.",
        DnsType::Ptr,
        CLASS_IN,
        false,
    ));
    // The querier already holds our PTR at full TTL.
    query.add_answer(Record::new(
        "_http._tcp.local.",
        CLASS_IN,
        false,
        DNS_OTHER_TTL,
        t1,
        RData::Pointer {
            alias: "web._http._tcp.local.".to_string(),
        },
    ));
    zc.handle_read(tagged(&query.packets()[0], mcast_source(), t1))
        .unwrap();

    zc.handle_timeout(t1 + Duration::from_secs(1)).unwrap();
    assert!(zc.poll_write().is_none());
}

#[test]
fn test_duplicate_question_answered_once() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    let other_source = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 51)), MDNS_PORT);
    zc.handle_read(tagged(&ptr_query(false), mcast_source(), t1))
        .unwrap();
    zc.handle_read(tagged(
        &ptr_query(false),
        other_source,
        t1 + Duration::from_millis(200),
    ))
    .unwrap();

    zc.handle_timeout(t1 + Duration::from_secs(1)).unwrap();
    assert_eq!(drain_writes(&mut zc).len(), 1);
}

#[test]
fn test_legacy_query_gets_unicast_reply_with_id() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    let legacy_source = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)), 54321);
    let mut query = DnsOutgoing::new(FLAGS_QR_QUERY);
    query.id = 0x1234;
    query.add_question(Question::new(
        "_http._tcp.local.",
        DnsType::Ptr,
        CLASS_IN,
        false,
    ));
    zc.handle_read(tagged(&query.packets()[0], legacy_source, t1))
        .unwrap();

    // The unicast reply is immediate and echoes the query id.
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, legacy_source);
    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t1);
    assert!(incoming.is_response());
    assert_eq!(incoming.id(), 0x1234);

    // The same answers also go out by multicast after aggregation.
    zc.handle_timeout(t1 + Duration::from_secs(1)).unwrap();
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, MDNS_DEST_ADDR);
    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t1);
    assert_eq!(incoming.id(), 0);
}

#[test]
fn test_probe_answered_immediately() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    // Another host probing for our instance name: ANY question with the
    // proposed SRV in the authority section.
    let t1 = t0 + Duration::from_secs(5);
    let mut probe = DnsOutgoing::new(FLAGS_QR_QUERY);
    probe.add_question(Question::new(
        "web._http._tcp.local.",
        DnsType::Any,
        CLASS_IN,
        false,
    ));
    probe.add_authoritative_answer(Record::new(
        "web._http._tcp.local.",
        CLASS_IN,
        false,
        120,
        t1,
        RData::Service {
            priority: 0,
            weight: 0,
            port: 9999,
            server: "otherhost.local.".to_string(),
        },
    ));
    zc.handle_read(tagged(&probe.packets()[0], mcast_source(), t1))
        .unwrap();

    // Probe defense skips aggregation.
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, MDNS_DEST_ADDR);
    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t1);
    assert!(incoming
        .answers()
        .iter()
        .any(|r| r.dns_type() == DnsType::Srv));
}

#[test]
fn test_truncated_query_held_for_continuation() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    let mut query = DnsOutgoing::new(FLAGS_QR_QUERY | HEADER_BIT_TC);
    query.add_question(Question::new(
        "_http._tcp.local.",
        DnsType::Ptr,
        CLASS_IN,
        false,
    ));
    zc.handle_read(tagged(&query.packets()[0], mcast_source(), t1))
        .unwrap();

    // Held for the continuation; the hold deadline is the next wake.
    assert!(zc.poll_write().is_none());
    let deadline = zc.poll_timeout().unwrap();
    assert!(deadline >= t1 + Duration::from_millis(400));
    assert!(deadline <= t1 + Duration::from_millis(500));

    // Continuation arrives carrying the known answer at full TTL: the whole
    // reassembled query is suppressed.
    let mut continuation = DnsOutgoing::new(FLAGS_QR_QUERY);
    continuation.add_answer(Record::new(
        "_http._tcp.local.",
        CLASS_IN,
        false,
        DNS_OTHER_TTL,
        t1,
        RData::Pointer {
            alias: "web._http._tcp.local.".to_string(),
        },
    ));
    zc.handle_read(tagged(
        &continuation.packets()[0],
        mcast_source(),
        t1 + Duration::from_millis(100),
    ))
    .unwrap();

    zc.handle_timeout(t1 + Duration::from_secs(2)).unwrap();
    assert!(zc.poll_write().is_none());
}

#[test]
fn test_truncated_query_answered_when_continuation_never_comes() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    let mut query = DnsOutgoing::new(FLAGS_QR_QUERY | HEADER_BIT_TC);
    query.add_question(Question::new(
        "_http._tcp.local.",
        DnsType::Ptr,
        CLASS_IN,
        false,
    ));
    zc.handle_read(tagged(&query.packets()[0], mcast_source(), t1))
        .unwrap();

    // Past the hold window the query is answered from what arrived; the
    // answers then ride the normal aggregation queue.
    zc.handle_timeout(t1 + Duration::from_millis(600)).unwrap();
    assert!(zc.poll_write().is_none());
    zc.handle_timeout(t1 + Duration::from_millis(1300)).unwrap();
    assert_eq!(drain_writes(&mut zc).len(), 1);
}

#[test]
fn test_legacy_truncated_query_keeps_id_after_hold_expires() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    let legacy_source = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)), 54321);
    let mut query = DnsOutgoing::new(FLAGS_QR_QUERY | HEADER_BIT_TC);
    query.id = 0x4242;
    query.add_question(Question::new(
        "_http._tcp.local.",
        DnsType::Ptr,
        CLASS_IN,
        false,
    ));
    zc.handle_read(tagged(&query.packets()[0], legacy_source, t1))
        .unwrap();
    assert!(zc.poll_write().is_none());

    // The continuation never arrives; the unicast reply sent when the hold
    // expires still echoes the original query id.
    zc.handle_timeout(t1 + Duration::from_millis(600)).unwrap();
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].transport.peer_addr, legacy_source);
    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t1);
    assert!(incoming.is_response());
    assert_eq!(incoming.id(), 0x4242);
    assert!(incoming
        .answers()
        .iter()
        .any(|r| r.dns_type() == DnsType::Ptr));
}

#[test]
fn test_unregister_sends_goodbye() {
    let t0 = Instant::now();
    let mut zc = engine();
    register_and_settle(&mut zc, t0);

    let t1 = t0 + Duration::from_secs(5);
    zc.unregister_service("web._http._tcp.local.", t1).unwrap();
    let packets = drain_writes(&mut zc);
    assert_eq!(packets.len(), 1);

    let mut incoming = DnsIncoming::new(&packets[0].message, None, None, t1);
    assert!(incoming.is_response());
    let records = incoming.answers().to_vec();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.ttl == 0));

    // Idempotent: already gone, nothing further to say.
    zc.unregister_service("web._http._tcp.local.", t1).unwrap();
    assert!(zc.poll_write().is_none());
}

#[test]
fn test_browser_sees_announcement_and_goodbye() {
    let t0 = Instant::now();
    let mut advertiser = engine();
    let mut browser = engine();

    let id = browser
        .browse(vec!["_http._tcp.local.".to_string()], None, t0)
        .unwrap();
    drain_writes(&mut browser);

    advertiser.register_service(web_service(), false, t0).unwrap();
    let announcement = drain_writes(&mut advertiser).remove(0);
    browser
        .handle_read(tagged(&announcement.message, mcast_source(), t0))
        .unwrap();

    let events = drain_events(&mut browser);
    assert_eq!(
        events,
        vec![
            ZeroconfEvent::ServiceFound {
                browser: id,
                service_type: "_http._tcp.local.".to_string(),
                name: "web._http._tcp.local.".to_string(),
            },
            ZeroconfEvent::CacheUpdated,
        ]
    );

    let t1 = t0 + Duration::from_secs(5);
    advertiser
        .unregister_service("web._http._tcp.local.", t1)
        .unwrap();
    let goodbye = drain_writes(&mut advertiser).remove(0);
    browser
        .handle_read(tagged(&goodbye.message, mcast_source(), t1))
        .unwrap();

    let events = drain_events(&mut browser);
    assert!(events.contains(&ZeroconfEvent::ServiceRemoved {
        browser: id,
        service_type: "_http._tcp.local.".to_string(),
        name: "web._http._tcp.local.".to_string(),
    }));
}

#[test]
fn test_oversized_packet_dropped() {
    let now = Instant::now();
    let mut zc = engine();
    let data = vec![0u8; MAX_MSG_ABSOLUTE + 1];
    zc.handle_read(tagged(&data, mcast_source(), now)).unwrap();
    assert!(zc.poll_write().is_none());
    assert!(zc.poll_event().is_none());
}

#[test]
fn test_closed_engine_rejects_everything() {
    let now = Instant::now();
    let mut zc = engine();
    zc.close().unwrap();

    assert!(matches!(zc.close(), Err(Error::ErrConnectionClosed)));
    assert!(matches!(
        zc.handle_read(tagged(&ptr_query(false), mcast_source(), now)),
        Err(Error::ErrConnectionClosed)
    ));
    assert!(matches!(
        zc.handle_timeout(now),
        Err(Error::ErrConnectionClosed)
    ));
    assert!(matches!(
        zc.browse(vec!["_http._tcp.local.".to_string()], None, now),
        Err(Error::ErrConnectionClosed)
    ));
    assert!(matches!(
        zc.register_service(web_service(), false, now),
        Err(Error::ErrConnectionClosed)
    ));
    assert_eq!(zc.poll_timeout(), None);
}
