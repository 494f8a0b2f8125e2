//! Outbound message construction.
//!
//! [`DnsOutgoing`] accumulates questions and records, then [`packets`]
//! serializes them into one or more datagrams. Every packet gets its own
//! compression table; a record that would push the packet past its budget is
//! rolled back (bytes truncated, its compression entries dropped) and carried
//! over to the next packet.
//!
//! [`packets`]: DnsOutgoing::packets

use std::collections::HashMap;
use std::time::Instant;

use super::name::{pack_name, pack_name_uncompressed};
use super::packer::*;
use super::record::{Question, RData, Record};
use super::*;
use crate::config::{MAX_MSG_ABSOLUTE, MAX_MSG_TYPICAL};
use crate::error::Result;

/// An answer paired with the instant its remaining TTL should be computed
/// at. `None` means "always include with its full TTL" (authoritative
/// records we own).
type TimedRecord = (Record, Option<Instant>);

/// Builder for one logical outbound message, possibly spanning several
/// datagrams.
pub struct DnsOutgoing {
    pub flags: u16,
    /// Multicast messages keep id 0; legacy unicast responses echo the
    /// query id.
    pub id: u16,
    questions: Vec<Question>,
    answers: Vec<TimedRecord>,
    authorities: Vec<Record>,
    additionals: Vec<Record>,
}

impl DnsOutgoing {
    pub fn new(flags: u16) -> Self {
        Self {
            flags,
            id: 0,
            questions: Vec::new(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    pub fn is_query(&self) -> bool {
        self.flags & HEADER_BIT_QR == 0
    }

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Adds an answer whose TTL is decremented to its remaining lifetime at
    /// `now` when serialized; the record is omitted entirely if expired by
    /// then.
    pub fn add_answer_at_time(&mut self, record: Record, now: Instant) {
        self.answers.push((record, Some(now)));
    }

    /// Adds an answer serialized with its full TTL.
    pub fn add_answer(&mut self, record: Record) {
        self.answers.push((record, None));
    }

    /// Adds a proposed record to the authority section (probing).
    pub fn add_authoritative_answer(&mut self, record: Record) {
        self.authorities.push(record);
    }

    pub fn add_additional_answer(&mut self, record: Record) {
        self.additionals.push(record);
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn num_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn num_answers(&self) -> usize {
        self.answers.len()
    }

    pub fn num_additionals(&self) -> usize {
        self.additionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
            && self.answers.is_empty()
            && self.authorities.is_empty()
            && self.additionals.is_empty()
    }

    /// Serializes the accumulated content into finished datagrams.
    ///
    /// Idempotent; the builder is not consumed. A query that does not fit in
    /// one packet has the TC bit set on every packet but the last.
    pub fn packets(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(1);
        let mut qi = 0usize;
        let mut ai = 0usize;
        let mut ni = 0usize;
        let mut di = 0usize;

        loop {
            let mut pkt = Packet::new();

            while qi < self.questions.len() {
                match pkt.write_question(&self.questions[qi]) {
                    WriteOutcome::Written => qi += 1,
                    WriteOutcome::Deferred => break,
                    WriteOutcome::Dropped => qi += 1,
                }
                if pkt.full {
                    break;
                }
            }
            pkt.counts[0] = pkt.written;
            pkt.rotate_count();

            while !pkt.full && ai < self.answers.len() {
                let (record, at) = &self.answers[ai];
                match pkt.write_record(record, *at) {
                    WriteOutcome::Written => ai += 1,
                    WriteOutcome::Deferred => break,
                    WriteOutcome::Dropped => ai += 1,
                }
            }
            pkt.counts[1] = pkt.written;
            pkt.rotate_count();

            while !pkt.full && ni < self.authorities.len() {
                match pkt.write_record(&self.authorities[ni], None) {
                    WriteOutcome::Written => ni += 1,
                    WriteOutcome::Deferred => break,
                    WriteOutcome::Dropped => ni += 1,
                }
            }
            pkt.counts[2] = pkt.written;
            pkt.rotate_count();

            while !pkt.full && di < self.additionals.len() {
                match pkt.write_record(&self.additionals[di], None) {
                    WriteOutcome::Written => di += 1,
                    WriteOutcome::Deferred => break,
                    WriteOutcome::Dropped => di += 1,
                }
            }
            pkt.counts[3] = pkt.written;

            let remaining = qi < self.questions.len()
                || ai < self.answers.len()
                || ni < self.authorities.len()
                || di < self.additionals.len();

            let mut flags = self.flags;
            if remaining && self.is_query() {
                flags |= HEADER_BIT_TC;
            }
            let total_written: u16 = pkt.counts.iter().sum();
            out.push(pkt.finish(self.id, flags));

            if !remaining {
                break;
            }
            // Zero progress means the remaining content can never fit;
            // return what was built instead of spinning.
            if total_written == 0 {
                log::warn!("packets: remaining content made no progress, dropping it");
                break;
            }
        }
        out
    }
}

enum WriteOutcome {
    /// Serialized into the current packet.
    Written,
    /// Rolled back; retry in the next packet.
    Deferred,
    /// Rolled back and unsendable (expired, or alone over the absolute
    /// limit); never retried.
    Dropped,
}

/// One datagram under construction: content bytes (header excluded until
/// [`finish`](Packet::finish)) plus this packet's compression table.
struct Packet {
    buf: Vec<u8>,
    names: HashMap<String, usize>,
    /// Items written in the section currently being serialized.
    written: u16,
    /// Question/answer/authority/additional counts of finished sections.
    counts: [u16; 4],
    /// Set once a write was deferred; later sections must not leapfrog into
    /// the space the deferred item will take in the next packet.
    full: bool,
    any_written: bool,
}

impl Packet {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(PACK_STARTING_CAP),
            names: HashMap::new(),
            written: 0,
            counts: [0; 4],
            full: false,
            any_written: false,
        }
    }

    fn rotate_count(&mut self) {
        self.written = 0;
    }

    /// The first item of a packet may use the absolute limit, so a record
    /// too big for the typical budget still ships alone.
    fn budget(&self) -> usize {
        if self.any_written {
            MAX_MSG_TYPICAL
        } else {
            MAX_MSG_ABSOLUTE
        }
    }

    fn rollback(&mut self, start: usize) {
        self.buf.truncate(start);
        let floor = HEADER_LEN + start;
        self.names.retain(|_, off| *off < floor);
    }

    fn check_budget(&mut self, start: usize) -> WriteOutcome {
        if HEADER_LEN + self.buf.len() <= self.budget() {
            self.written += 1;
            self.any_written = true;
            return WriteOutcome::Written;
        }
        let first = !self.any_written;
        self.rollback(start);
        self.full = true;
        if first {
            // Alone in a fresh packet and still over the absolute limit;
            // it will never fit.
            log::warn!("dropping record over the absolute packet limit");
            WriteOutcome::Dropped
        } else {
            WriteOutcome::Deferred
        }
    }

    fn write_question(&mut self, question: &Question) -> WriteOutcome {
        let start = self.buf.len();
        if self.try_write_question(question).is_err() {
            self.rollback(start);
            return WriteOutcome::Dropped;
        }
        self.check_budget(start)
    }

    fn try_write_question(&mut self, question: &Question) -> Result<()> {
        pack_name(&mut self.buf, &question.name, &mut self.names)?;
        let mut class = question.class;
        if question.unicast {
            class |= CLASS_UNIQUE;
        }
        let buf = std::mem::take(&mut self.buf);
        let buf = pack_u16(buf, question.typ as u16);
        self.buf = pack_u16(buf, class);
        Ok(())
    }

    fn write_record(&mut self, record: &Record, at: Option<Instant>) -> WriteOutcome {
        let ttl = match at {
            Some(now) => {
                if record.is_expired(now) {
                    return WriteOutcome::Dropped;
                }
                record.remaining_ttl(now)
            }
            None => record.ttl,
        };
        let start = self.buf.len();
        if self.try_write_record(record, ttl).is_err() {
            self.rollback(start);
            return WriteOutcome::Dropped;
        }
        self.check_budget(start)
    }

    fn try_write_record(&mut self, record: &Record, ttl: u32) -> Result<()> {
        pack_name(&mut self.buf, &record.name, &mut self.names)?;
        let mut class = record.class;
        if record.unique {
            class |= CLASS_UNIQUE;
        }
        let buf = std::mem::take(&mut self.buf);
        let buf = pack_u16(buf, record.dns_type() as u16);
        let buf = pack_u16(buf, class);
        let buf = pack_u32(buf, ttl);
        // RDATA length back-patched once the payload is written, since
        // compression makes it unknowable up front.
        let mut buf = pack_u16(buf, 0);
        let rdata_off = buf.len();

        match &record.rdata {
            RData::Address { addr, .. } => match addr {
                std::net::IpAddr::V4(v4) => buf.extend_from_slice(&v4.octets()),
                std::net::IpAddr::V6(v6) => buf.extend_from_slice(&v6.octets()),
            },
            RData::Pointer { alias } => {
                pack_name(&mut buf, alias, &mut self.names)?;
            }
            RData::Text { text } => buf.extend_from_slice(text),
            RData::Service {
                priority,
                weight,
                port,
                server,
            } => {
                buf = pack_u16(buf, *priority);
                buf = pack_u16(buf, *weight);
                buf = pack_u16(buf, *port);
                pack_name(&mut buf, server, &mut self.names)?;
            }
            RData::HostInfo { cpu, os } => {
                buf = pack_char_string(buf, cpu.as_bytes())?;
                buf = pack_char_string(buf, os.as_bytes())?;
            }
            RData::Nsec { next_name, types } => {
                pack_name_uncompressed(&mut buf, next_name)?;
                buf.extend_from_slice(&nsec_bitmap(types));
            }
        }

        let rdlen = (buf.len() - rdata_off) as u16;
        buf[rdata_off - 2..rdata_off].copy_from_slice(&rdlen.to_be_bytes());
        self.buf = buf;
        Ok(())
    }

    fn finish(self, id: u16, flags: u16) -> Vec<u8> {
        let mut msg = Vec::with_capacity(HEADER_LEN + self.buf.len());
        msg = pack_u16(msg, id);
        msg = pack_u16(msg, flags);
        for count in self.counts {
            msg = pack_u16(msg, count);
        }
        msg.extend_from_slice(&self.buf);
        msg
    }
}

/// Window-0 NSEC bitmap for type codes 0-255; higher codes are not
/// representable here and are skipped.
fn nsec_bitmap(types: &[u16]) -> Vec<u8> {
    let mut bitmap = [0u8; 32];
    let mut max = 0usize;
    for &t in types {
        if t > 255 {
            continue;
        }
        let byte = t as usize / 8;
        bitmap[byte] |= 0x80 >> (t % 8);
        max = max.max(byte);
    }
    let mut out = Vec::with_capacity(2 + max + 1);
    out.push(0);
    out.push((max + 1) as u8);
    out.extend_from_slice(&bitmap[..=max]);
    out
}

/// Worst-case (uncompressed) size of a question on the wire, used by the
/// scheduler's packet-packing estimate.
pub(crate) fn estimated_question_size(question: &Question) -> usize {
    question.name.len() + 1 + 2 * UINT16LEN
}

/// Worst-case (uncompressed) size of a record on the wire.
pub(crate) fn estimated_record_size(record: &Record) -> usize {
    let rdata = match &record.rdata {
        RData::Address { addr, .. } => {
            if addr.is_ipv4() {
                4
            } else {
                16
            }
        }
        RData::Pointer { alias } => alias.len() + 1,
        RData::Text { text } => text.len(),
        RData::Service { server, .. } => 3 * UINT16LEN + server.len() + 1,
        RData::HostInfo { cpu, os } => cpu.len() + os.len() + 2,
        RData::Nsec { next_name, .. } => next_name.len() + 1 + 2 + 32,
    };
    record.name.len() + 1 + 2 * UINT16LEN + UINT32LEN + UINT16LEN + rdata
}
