use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::{Duration, Instant};

use super::incoming::DnsIncoming;
use super::outgoing::{DnsOutgoing, estimated_record_size};
use super::record::{Question, RData, Record};
use super::*;

fn sample_records(now: Instant) -> Vec<Record> {
    vec![
        Record::new(
            "myhost.local.",
            CLASS_IN,
            true,
            120,
            now,
            RData::Address {
                addr: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
                scope_id: None,
            },
        ),
        Record::new(
            "myhost.local.",
            CLASS_IN,
            true,
            120,
            now,
            RData::Address {
                addr: IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)),
                scope_id: None,
            },
        ),
        Record::new(
            "_http._tcp.local.",
            CLASS_IN,
            false,
            4500,
            now,
            RData::Pointer {
                alias: "web._http._tcp.local.".to_string(),
            },
        ),
        Record::new(
            "web._http._tcp.local.",
            CLASS_IN,
            true,
            4500,
            now,
            RData::Text {
                text: b"\x09path=/web".to_vec(),
            },
        ),
        Record::new(
            "web._http._tcp.local.",
            CLASS_IN,
            true,
            120,
            now,
            RData::Service {
                priority: 0,
                weight: 0,
                port: 8080,
                server: "myhost.local.".to_string(),
            },
        ),
        Record::new(
            "myhost.local.",
            CLASS_IN,
            true,
            120,
            now,
            RData::HostInfo {
                cpu: "x86_64".to_string(),
                os: "linux".to_string(),
            },
        ),
        Record::new(
            "myhost.local.",
            CLASS_IN,
            true,
            120,
            now,
            RData::Nsec {
                next_name: "myhost.local.".to_string(),
                types: vec![DnsType::A as u16, DnsType::Aaaa as u16],
            },
        ),
    ]
}

#[test]
fn test_round_trip_all_record_types() {
    let now = Instant::now();
    let records = sample_records(now);

    let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
    for r in &records {
        out.add_answer(r.clone());
    }
    let packets = out.packets();
    assert_eq!(packets.len(), 1);

    let mut msg = DnsIncoming::new(&packets[0], None, None, now);
    assert!(msg.is_valid());
    assert!(msg.is_response());
    assert!(!msg.truncated());
    assert_eq!(msg.answers(), &records[..]);
    for (sent, got) in records.iter().zip(msg.answers()) {
        assert_eq!(sent.ttl, got.ttl);
        assert_eq!(sent.unique, got.unique);
    }
}

#[test]
fn test_name_compression_shrinks_shared_suffixes() {
    let now = Instant::now();
    let records: Vec<Record> = (0..4)
        .map(|i| {
            Record::new(
                "_music._tcp.local.",
                CLASS_IN,
                false,
                4500,
                now,
                RData::Pointer {
                    alias: format!("speaker-{i}._music._tcp.local."),
                },
            )
        })
        .collect();

    let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
    for r in &records {
        out.add_answer(r.clone());
    }
    let packets = out.packets();
    assert_eq!(packets.len(), 1);

    let uncompressed: usize = records.iter().map(estimated_record_size).sum();
    assert!(packets[0].len() < HEADER_LEN + uncompressed);

    let mut msg = DnsIncoming::new(&packets[0], None, None, now);
    assert_eq!(msg.answers(), &records[..]);
}

#[test]
fn test_decode_two_question_query() {
    let now = Instant::now();
    let mut out = DnsOutgoing::new(FLAGS_QR_QUERY);
    out.add_question(Question::new("_http._tcp.local.", DnsType::Ptr, CLASS_IN, false));
    out.add_question(Question::new("_ipp._tcp.local.", DnsType::Ptr, CLASS_IN, true));
    let packets = out.packets();
    assert_eq!(packets.len(), 1);

    let mut msg = DnsIncoming::new(&packets[0], None, None, now);
    assert!(msg.is_valid());
    assert!(msg.is_query());
    assert!(!msg.is_probe());
    assert_eq!(msg.num_questions(), 2);
    assert!(msg.answers().is_empty());

    assert!(!msg.questions()[0].unicast);
    assert!(msg.questions()[1].unicast);
    assert!(msg.has_qu_question());
}

#[test]
fn test_forward_pointer_poisons_packet() {
    // Header claims one question; the question name is a pointer aimed past
    // itself.
    let mut data = vec![0u8; HEADER_LEN];
    data[5] = 1; // qdcount
    data.extend_from_slice(&[0xC0, 0x40]);
    data.extend_from_slice(&[0, DnsType::Ptr as u8, 0, 1]);

    let mut msg = DnsIncoming::new(&data, None, None, Instant::now());
    assert!(!msg.is_valid());
    assert_eq!(msg.num_questions(), 0);
    assert!(msg.answers().is_empty());
}

#[test]
fn test_pointer_loop_poisons_packet() {
    let mut data = vec![0u8; HEADER_LEN];
    data[5] = 1;
    // Label "a", then a pointer back to the label, which loops through
    // itself forever.
    data.extend_from_slice(&[1, b'a', 0xC0, HEADER_LEN as u8]);
    data.extend_from_slice(&[0, DnsType::A as u8, 0, 1]);

    let msg = DnsIncoming::new(&data, None, None, Instant::now());
    assert!(!msg.is_valid());
    assert_eq!(msg.num_questions(), 0);
}

#[test]
fn test_memoized_suffix_still_bounded_by_name_length() {
    use super::name::{LabelMemo, unpack_name};
    use crate::error::Error;

    // First name: five 40-byte labels (205 chars assembled, within limits).
    // Second name: three 40-byte labels ending in a pointer to the first,
    // assembling to 328 chars, over the 253-byte cap.
    let mut data = Vec::new();
    for _ in 0..5 {
        data.push(40);
        data.extend_from_slice(&[b'a'; 40]);
    }
    data.push(0);
    let second = data.len();
    for _ in 0..3 {
        data.push(40);
        data.extend_from_slice(&[b'b'; 40]);
    }
    data.extend_from_slice(&[0xC0, 0x00]);

    let mut cold = LabelMemo::new();
    assert_eq!(
        unpack_name(&data, second, &mut cold),
        Err(Error::ErrNameTooLong)
    );

    // Decoding the first name warms the suffix memo; the second name must
    // still be rejected on the memoized path.
    let mut warm = LabelMemo::new();
    let (first, _) = unpack_name(&data, 0, &mut warm).unwrap();
    assert_eq!(first.len(), 205);
    assert_eq!(
        unpack_name(&data, second, &mut warm),
        Err(Error::ErrNameTooLong)
    );
}

#[test]
fn test_bad_record_dropped_alone() {
    let now = Instant::now();
    let good = Record::new(
        "myhost.local.",
        CLASS_IN,
        true,
        120,
        now,
        RData::Address {
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            scope_id: None,
        },
    );

    // Hand-build a response with a short A record (rdlen 2) followed by a
    // valid one.
    let mut data = vec![0u8; HEADER_LEN];
    data[2] = (HEADER_BIT_QR >> 8) as u8;
    data[7] = 2; // ancount
    let name = [6, b'm', b'y', b'h', b'o', b's', b't', 5, b'l', b'o', b'c', b'a', b'l', 0];
    data.extend_from_slice(&name);
    data.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 120, 0, 2, 10, 0]); // truncated A
    data.extend_from_slice(&name);
    data.extend_from_slice(&[0, 1, 0x80, 1, 0, 0, 0, 120, 0, 4, 10, 0, 0, 1]);

    let mut msg = DnsIncoming::new(&data, None, None, now);
    assert!(msg.is_valid());
    assert_eq!(msg.answers(), &[good]);
    assert_eq!(msg.take_decode_failures().len(), 1);
}

#[test]
fn test_unknown_record_type_skipped() {
    let now = Instant::now();
    // One OPT-ish record (type 41) followed by a PTR.
    let mut data = vec![0u8; HEADER_LEN];
    data[2] = (HEADER_BIT_QR >> 8) as u8;
    data[7] = 2;
    let name = [1, b'x', 5, b'l', b'o', b'c', b'a', b'l', 0];
    data.extend_from_slice(&name);
    data.extend_from_slice(&[0, 41, 0, 1, 0, 0, 0, 0, 0, 3, 1, 2, 3]);
    data.extend_from_slice(&name);
    data.extend_from_slice(&[0, 12, 0, 1, 0, 0, 17, 148, 0, 2, 0xC0, HEADER_LEN as u8]);

    let mut msg = DnsIncoming::new(&data, None, None, now);
    assert!(msg.is_valid());
    assert_eq!(msg.answers().len(), 1);
    assert_eq!(msg.answers()[0].dns_type(), DnsType::Ptr);
    assert_eq!(
        msg.answers()[0].rdata,
        RData::Pointer {
            alias: "x.local.".to_string()
        }
    );
}

#[test]
fn test_large_response_splits_and_continues() {
    let now = Instant::now();
    let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
    let records: Vec<Record> = (0..120)
        .map(|i| {
            Record::new(
                format!("instance-{i:03}._very-long-service-name._tcp.local."),
                CLASS_IN,
                true,
                4500,
                now,
                RData::Text {
                    text: vec![b'x'; 40],
                },
            )
        })
        .collect();
    for r in &records {
        out.add_answer(r.clone());
    }

    let packets = out.packets();
    assert!(packets.len() > 1);
    for p in &packets {
        assert!(p.len() <= crate::config::MAX_MSG_TYPICAL);
    }

    let mut decoded = Vec::new();
    for p in &packets {
        let mut msg = DnsIncoming::new(p, None, None, now);
        assert!(msg.is_valid());
        // Responses never set TC; the remainder simply arrives in the next
        // packet.
        assert!(!msg.truncated());
        decoded.extend_from_slice(msg.answers());
    }
    assert_eq!(decoded, records);
}

#[test]
fn test_truncated_query_sets_tc_on_all_but_last() {
    let now = Instant::now();
    let mut out = DnsOutgoing::new(FLAGS_QR_QUERY);
    out.add_question(Question::new("_http._tcp.local.", DnsType::Ptr, CLASS_IN, false));
    for i in 0..200 {
        out.add_answer_at_time(
            Record::new(
                format!("known-answer-{i:03}._http._tcp.local."),
                CLASS_IN,
                false,
                4500,
                now,
                RData::Pointer {
                    alias: format!("known-answer-{i:03}._http._tcp.local."),
                },
            ),
            now,
        );
    }

    let packets = out.packets();
    assert!(packets.len() > 1);
    for (i, p) in packets.iter().enumerate() {
        let msg = DnsIncoming::new(p, None, None, now);
        assert!(msg.is_valid());
        assert_eq!(msg.truncated(), i != packets.len() - 1);
    }
}

#[test]
fn test_expired_timed_answer_omitted() {
    let start = Instant::now();
    let later = start + Duration::from_secs(300);

    let mut out = DnsOutgoing::new(FLAGS_QR_RESPONSE_AA);
    out.add_answer_at_time(
        Record::new(
            "gone.local.",
            CLASS_IN,
            true,
            120,
            start,
            RData::Address {
                addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
                scope_id: None,
            },
        ),
        later,
    );
    out.add_answer_at_time(
        Record::new(
            "alive.local.",
            CLASS_IN,
            true,
            4500,
            start,
            RData::Address {
                addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)),
                scope_id: None,
            },
        ),
        later,
    );

    let packets = out.packets();
    assert_eq!(packets.len(), 1);
    let mut msg = DnsIncoming::new(&packets[0], None, None, later);
    assert_eq!(msg.answers().len(), 1);
    assert_eq!(msg.answers()[0].name, "alive.local.");
    // Remaining lifetime at serialization time, not the original TTL.
    assert_eq!(msg.answers()[0].ttl, 4200);
}

#[test]
fn test_probe_query_detected() {
    let now = Instant::now();
    let mut out = DnsOutgoing::new(FLAGS_QR_QUERY);
    out.add_question(Question::new("myhost.local.", DnsType::Any, CLASS_IN, false));
    out.add_authoritative_answer(Record::new(
        "myhost.local.",
        CLASS_IN,
        false,
        120,
        now,
        RData::Address {
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            scope_id: None,
        },
    ));

    let packets = out.packets();
    let msg = DnsIncoming::new(&packets[0], None, None, now);
    assert!(msg.is_valid());
    assert!(msg.is_probe());
}

#[test]
fn test_question_identity_ignores_qu_bit() {
    let qm = Question::new("host.local.", DnsType::A, CLASS_IN, false);
    let qu = Question::new("HOST.local.", DnsType::A, CLASS_IN, true);
    assert_eq!(qm, qu);
}

#[test]
fn test_record_equality_ignores_ttl_and_created() {
    let now = Instant::now();
    let a = Record::new(
        "host.local.",
        CLASS_IN,
        true,
        120,
        now,
        RData::Address {
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            scope_id: None,
        },
    );
    let b = a.with_created_ttl(now + Duration::from_secs(60), 50);
    assert_eq!(a, b);

    let mut c = a.clone();
    c.unique = false;
    assert_ne!(a, c);
}
