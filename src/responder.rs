//! Answer planning: turning an incoming (possibly reassembled) query into
//! the sets of records to send, bucketed by destination and timing.
//!
//! The buckets map onto RFC 6762's response discipline: probes and
//! single-question queries for time-critical types are answered at once,
//! QU questions go back by unicast unless everyone's cache is due a
//! refresh, and everything else rides an aggregation window so bursts of
//! queries coalesce into one multicast response.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::config::{DNS_OTHER_TTL, RATE_LIMIT_EXTRA_DELAY, SERVICE_TYPE_ENUMERATION_NAME};
use crate::history::QuestionHistory;
use crate::message::record::{Question, RData, Record};
use crate::message::{CLASS_IN, DnsType};
use crate::registry::ServiceRegistry;

/// Answers with their recommended additional records.
pub type AnswerWithAdditionals = HashMap<Record, HashSet<Record>>;

/// Planned answers, one map per destination bucket. The buckets are
/// disjoint for any single planning pass.
#[derive(Default)]
pub struct QuestionAnswers {
    /// Sent straight back to the querier's address.
    pub unicast: AnswerWithAdditionals,
    /// Multicast immediately (after jitter).
    pub multicast_now: AnswerWithAdditionals,
    /// Multicast via the standard 500 ms aggregation queue.
    pub multicast_aggregate: AnswerWithAdditionals,
    /// Multicast via the rate-limited queue; these answers were already on
    /// the wire within the last second.
    pub multicast_aggregate_delayed: AnswerWithAdditionals,
}

impl QuestionAnswers {
    pub fn is_empty(&self) -> bool {
        self.unicast.is_empty()
            && self.multicast_now.is_empty()
            && self.multicast_aggregate.is_empty()
            && self.multicast_aggregate_delayed.is_empty()
    }
}

/// Question types that skip aggregation when they are a query's only
/// question (RFC 6762 §6: something is waiting on this answer).
fn respond_immediately(typ: DnsType) -> bool {
    matches!(typ, DnsType::Nsec | DnsType::Srv | DnsType::A | DnsType::Aaaa)
}

/// One decoded query's planning inputs, after any truncation reassembly.
pub(crate) struct QueryFrame {
    pub questions: Vec<Question>,
    pub known_answers: Vec<Record>,
    pub is_probe: bool,
    /// Query arrived from a port other than 5353 (legacy resolver); answers
    /// also go back by unicast with the query id echoed.
    pub ucast_source: bool,
}

pub(crate) struct AnswerPlanner<'a> {
    pub registry: &'a ServiceRegistry,
    pub history: &'a mut QuestionHistory,
    /// When each of our records last went out by multicast.
    pub last_multicast: &'a HashMap<Record, Instant>,
}

impl AnswerPlanner<'_> {
    pub fn plan(&mut self, frame: &QueryFrame, now: Instant) -> QuestionAnswers {
        let mut out = QuestionAnswers::default();
        let known_ttls: HashMap<Record, u32> = frame
            .known_answers
            .iter()
            .map(|r| (r.clone(), r.ttl))
            .collect();
        let known_set: HashSet<Record> = frame.known_answers.iter().cloned().collect();
        let single_question = frame.questions.len() == 1;

        for question in &frame.questions {
            if !question.unicast {
                if self.history.suppresses(question, now, &known_set) {
                    log::trace!("suppressing duplicate question {question}");
                    continue;
                }
                self.history
                    .add_question_at_time(question.clone(), now, known_set.clone());
            }

            let mut answers = self.answer_question(question, now);
            // Known-answer suppression: skip anything the querier holds at
            // half TTL or better.
            answers.retain(|record, _| match known_ttls.get(record) {
                Some(known_ttl) => *known_ttl < record.ttl.div_ceil(2),
                None => true,
            });
            if answers.is_empty() {
                continue;
            }

            for (record, additionals) in answers {
                if frame.ucast_source || (frame.is_probe && question.unicast) {
                    out.unicast.insert(record.clone(), additionals.clone());
                }
                if frame.is_probe {
                    out.multicast_now.insert(record, additionals);
                } else if question.unicast {
                    // QU honored only while the record is fresh on the wire;
                    // otherwise multicast so every cache gets the refresh.
                    if self.multicast_within_quarter_ttl(&record, now) {
                        out.unicast.insert(record, additionals);
                    } else {
                        out.multicast_now.insert(record, additionals);
                    }
                } else if self.multicast_within_last_second(&record, now) {
                    out.multicast_aggregate_delayed.insert(record, additionals);
                } else if single_question && respond_immediately(question.typ) {
                    out.multicast_now.insert(record, additionals);
                } else {
                    out.multicast_aggregate.insert(record, additionals);
                }
            }
        }
        out
    }

    fn multicast_within_quarter_ttl(&self, record: &Record, now: Instant) -> bool {
        let Some(last) = self.last_multicast.get(record) else {
            return false;
        };
        now.saturating_duration_since(*last)
            < Duration::from_millis(record.ttl as u64 * 250)
    }

    fn multicast_within_last_second(&self, record: &Record, now: Instant) -> bool {
        let Some(last) = self.last_multicast.get(record) else {
            return false;
        };
        now.saturating_duration_since(*last) < RATE_LIMIT_EXTRA_DELAY
    }

    fn answer_question(&self, question: &Question, now: Instant) -> AnswerWithAdditionals {
        let mut answers = AnswerWithAdditionals::new();
        let typ = question.typ;
        let name = &question.name;

        if matches!(typ, DnsType::Ptr | DnsType::Any)
            && name.eq_ignore_ascii_case(SERVICE_TYPE_ENUMERATION_NAME)
        {
            for stype in self.registry.types() {
                answers.insert(
                    Record::new(
                        SERVICE_TYPE_ENUMERATION_NAME,
                        CLASS_IN,
                        false,
                        DNS_OTHER_TTL,
                        now,
                        RData::Pointer { alias: stype },
                    ),
                    HashSet::new(),
                );
            }
            return answers;
        }

        if matches!(typ, DnsType::Ptr | DnsType::Any) {
            for registration in self.registry.get_by_type(name) {
                let mut additionals = HashSet::new();
                additionals.insert(registration.srv_record(now));
                additionals.insert(registration.txt_record(now));
                for address in registration.address_records(DnsType::Any, now) {
                    additionals.insert(address);
                }
                if let Some(nsec) = registration.nsec_record(now) {
                    additionals.insert(nsec);
                }
                answers.insert(registration.ptr_record(now), additionals);
            }
        }

        if typ.is_address() || typ == DnsType::Any {
            self.add_address_answers(question, now, &mut answers);
        }

        if matches!(typ, DnsType::Srv | DnsType::Txt | DnsType::Any)
            && let Some(registration) = self.registry.get(name)
        {
            if matches!(typ, DnsType::Srv | DnsType::Any) {
                let mut additionals = HashSet::new();
                for address in registration.address_records(DnsType::Any, now) {
                    additionals.insert(address);
                }
                if let Some(nsec) = registration.nsec_record(now) {
                    additionals.insert(nsec);
                }
                answers.insert(registration.srv_record(now), additionals);
            }
            if matches!(typ, DnsType::Txt | DnsType::Any) {
                answers.insert(registration.txt_record(now), HashSet::new());
            }
        }

        answers
    }

    /// A/AAAA/ANY against a hostname. If the requested family has no
    /// addresses but another family does, the NSEC declaring the absence
    /// becomes the answer itself; if the requested family is present and
    /// the other is missing, the NSEC rides along as an additional.
    fn add_address_answers(
        &self,
        question: &Question,
        now: Instant,
        answers: &mut AnswerWithAdditionals,
    ) {
        for registration in self.registry.get_by_server(&question.name) {
            let matching = registration.address_records(question.typ, now);
            let nsec = registration.nsec_record(now);
            if matching.is_empty() {
                if question.typ != DnsType::Any
                    && let Some(nsec) = nsec
                    && nsec_declares(&nsec, question.typ)
                {
                    answers.insert(nsec, HashSet::new());
                }
                continue;
            }
            for record in matching {
                let mut additionals = HashSet::new();
                if let Some(nsec) = &nsec {
                    additionals.insert(nsec.clone());
                }
                answers.insert(record, additionals);
            }
        }
    }
}

fn nsec_declares(nsec: &Record, typ: DnsType) -> bool {
    match &nsec.rdata {
        RData::Nsec { types, .. } => types.contains(&(typ as u16)),
        _ => false,
    }
}
