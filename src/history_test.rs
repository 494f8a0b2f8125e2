use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use crate::history::QuestionHistory;
use crate::message::record::{Question, RData, Record};
use crate::message::{CLASS_IN, DnsType};

fn ptr_question(name: &str) -> Question {
    Question::new(name, DnsType::Ptr, CLASS_IN, false)
}

fn a_record(octet: u8, created: Instant) -> Record {
    Record::new(
        "host.local.",
        CLASS_IN,
        true,
        120,
        created,
        RData::Address {
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, octet)),
            scope_id: None,
        },
    )
}

#[test]
fn test_suppresses_within_window() {
    let now = Instant::now();
    let mut history = QuestionHistory::new();
    let question = ptr_question("_http._tcp.local.");

    assert!(!history.suppresses(&question, now, &HashSet::new()));
    history.add_question_at_time(question.clone(), now, HashSet::new());

    assert!(history.suppresses(&question, now + Duration::from_millis(500), &HashSet::new()));
    assert!(history.suppresses(&question, now + Duration::from_millis(999), &HashSet::new()));
    assert!(!history.suppresses(&question, now + Duration::from_millis(1000), &HashSet::new()));
}

#[test]
fn test_previous_asker_knowing_more_defeats_suppression() {
    let now = Instant::now();
    let mut history = QuestionHistory::new();
    let question = ptr_question("_http._tcp.local.");

    let mut prev_known = HashSet::new();
    prev_known.insert(a_record(1, now));
    history.add_question_at_time(question.clone(), now, prev_known.clone());

    // The earlier asker knew a record this query does not: answer anyway so
    // that record gets refreshed on the wire.
    assert!(!history.suppresses(&question, now + Duration::from_millis(100), &HashSet::new()));

    // Same knowledge, or a superset of it, suppresses.
    assert!(history.suppresses(&question, now + Duration::from_millis(100), &prev_known));
    let mut superset = prev_known.clone();
    superset.insert(a_record(2, now));
    assert!(history.suppresses(&question, now + Duration::from_millis(100), &superset));
}

#[test]
fn test_distinct_questions_do_not_interfere() {
    let now = Instant::now();
    let mut history = QuestionHistory::new();
    history.add_question_at_time(ptr_question("_http._tcp.local."), now, HashSet::new());

    let other = ptr_question("_ipp._tcp.local.");
    assert!(!history.suppresses(&other, now + Duration::from_millis(100), &HashSet::new()));
}

#[test]
fn test_expire_prunes_old_entries() {
    let now = Instant::now();
    let mut history = QuestionHistory::new();
    history.add_question_at_time(ptr_question("_http._tcp.local."), now, HashSet::new());
    assert!(!history.is_empty());

    history.expire(now + Duration::from_millis(500));
    assert!(!history.is_empty());

    history.expire(now + Duration::from_millis(1500));
    assert!(history.is_empty());
}
