//! Inbound datagram decoding.
//!
//! The header and question section are parsed eagerly, since routing a query
//! needs nothing else. The answer, authority and additional sections are
//! parsed on first request; most queries never ask for them.
//!
//! Error containment follows two tiers: a record whose fixed-length fields
//! cannot be read is dropped alone, with parsing resuming at the next
//! declared record boundary, while a malformed name (bad compression
//! pointer, loop, over-long) poisons the entire packet, which then exposes
//! no questions and no records.

use std::net::SocketAddr;
use std::time::Instant;

use super::name::{LabelMemo, unpack_name};
use super::packer::*;
use super::record::{Question, RData, Record};
use super::*;
use crate::error::Error;

/// True for errors that mean the packet's name compression graph cannot be
/// trusted at all.
fn poisons_packet(err: &Error) -> bool {
    matches!(
        err,
        Error::ErrInvalidPtr
            | Error::ErrPtrLoop
            | Error::ErrReserved
            | Error::ErrNameTooLong
            | Error::ErrTooManyLabels
            | Error::Utf8(_)
    )
}

/// A decoded inbound message.
pub struct DnsIncoming {
    data: Vec<u8>,
    /// Address the datagram arrived from, if known.
    pub source: Option<SocketAddr>,
    /// IPv6 scope of the receiving interface, attached to decoded AAAA
    /// records.
    pub scope_id: Option<u32>,
    /// Receive timestamp; decoded records are created at this instant.
    pub now: Instant,

    id: u16,
    flags: u16,
    num_questions: u16,
    num_answers: u16,
    num_authorities: u16,
    num_additionals: u16,

    questions: Vec<Question>,
    has_qu_question: bool,
    valid: bool,

    records_off: usize,
    records: Option<Vec<Record>>,
    /// Signatures of per-record decode failures, for throttled logging.
    decode_failures: Vec<String>,

    memo: LabelMemo,
}

impl DnsIncoming {
    pub fn new(
        data: &[u8],
        source: Option<SocketAddr>,
        scope_id: Option<u32>,
        now: Instant,
    ) -> Self {
        let mut msg = Self {
            data: data.to_vec(),
            source,
            scope_id,
            now,
            id: 0,
            flags: 0,
            num_questions: 0,
            num_answers: 0,
            num_authorities: 0,
            num_additionals: 0,
            questions: Vec::new(),
            has_qu_question: false,
            valid: true,
            records_off: 0,
            records: None,
            decode_failures: Vec::new(),
            memo: LabelMemo::new(),
        };
        if msg.parse_header_and_questions().is_err() {
            msg.poison();
        }
        msg
    }

    fn poison(&mut self) {
        self.valid = false;
        self.questions.clear();
        self.records = Some(Vec::new());
    }

    fn parse_header_and_questions(&mut self) -> crate::error::Result<()> {
        let data = &self.data;
        let (id, off) = unpack_u16(data, 0)?;
        let (flags, off) = unpack_u16(data, off)?;
        let (nq, off) = unpack_u16(data, off)?;
        let (nan, off) = unpack_u16(data, off)?;
        let (nns, off) = unpack_u16(data, off)?;
        let (nar, mut off) = unpack_u16(data, off)?;
        self.id = id;
        self.flags = flags;
        self.num_questions = nq;
        self.num_answers = nan;
        self.num_authorities = nns;
        self.num_additionals = nar;

        for _ in 0..nq {
            let (name, o) = unpack_name(data, off, &mut self.memo)?;
            let (typ, o) = unpack_u16(data, o)?;
            let (class, o) = unpack_u16(data, o)?;
            off = o;
            let unicast = class & CLASS_UNIQUE != 0;
            if unicast {
                self.has_qu_question = true;
            }
            self.questions.push(Question {
                name,
                typ: DnsType::from(typ),
                class: class & CLASS_MASK,
                unicast,
            });
        }
        self.records_off = off;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_query(&self) -> bool {
        self.flags & HEADER_BIT_QR == 0
    }

    pub fn is_response(&self) -> bool {
        self.flags & HEADER_BIT_QR != 0
    }

    pub fn truncated(&self) -> bool {
        self.flags & HEADER_BIT_TC != 0
    }

    /// A query carrying proposed records in its authority section is a
    /// probe (RFC 6762 §8.1).
    pub fn is_probe(&self) -> bool {
        self.is_query() && self.num_authorities > 0
    }

    pub fn has_qu_question(&self) -> bool {
        self.has_qu_question
    }

    pub fn num_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// All records from the answer, authority and additional sections.
    ///
    /// Parsed on first call; a poisoned packet yields an empty slice.
    pub fn answers(&mut self) -> &[Record] {
        if self.records.is_none() {
            self.parse_records();
        }
        self.records.as_deref().unwrap_or_default()
    }

    /// Decode failure signatures collected while parsing, for the engine's
    /// throttled logging.
    pub(crate) fn take_decode_failures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.decode_failures)
    }

    fn parse_records(&mut self) {
        let total =
            self.num_answers as usize + self.num_authorities as usize + self.num_additionals as usize;
        let mut records = Vec::with_capacity(total);
        let mut off = self.records_off;

        for _ in 0..total {
            let header = (|| {
                let (name, o) = unpack_name(&self.data, off, &mut self.memo)?;
                let (typ, o) = unpack_u16(&self.data, o)?;
                let (class, o) = unpack_u16(&self.data, o)?;
                let (ttl, o) = unpack_u32(&self.data, o)?;
                let (rdlen, o) = unpack_u16(&self.data, o)?;
                Ok::<_, Error>((name, typ, class, ttl, rdlen, o))
            })();

            let (name, typ, class, ttl, rdlen, body_off) = match header {
                Ok(h) => h,
                Err(e) => {
                    if poisons_packet(&e) {
                        self.poison();
                        return;
                    }
                    // Truncated record header: there is no declared length
                    // to resume from.
                    self.decode_failures.push(format!("record-header: {e}"));
                    break;
                }
            };

            let end = body_off + rdlen as usize;
            if end > self.data.len() {
                self.decode_failures
                    .push(format!("record-overruns-packet: {}", DnsType::from(typ)));
                break;
            }

            match self.parse_rdata(DnsType::from(typ), body_off, end) {
                Ok(Some(rdata)) => records.push(Record {
                    name,
                    class: class & CLASS_MASK,
                    unique: class & CLASS_UNIQUE != 0,
                    ttl,
                    created: self.now,
                    rdata,
                }),
                // Unsupported type, skipped via its declared length.
                Ok(None) => {}
                Err(e) => {
                    if poisons_packet(&e) {
                        self.poison();
                        return;
                    }
                    self.decode_failures
                        .push(format!("bad-record: {} {e}", DnsType::from(typ)));
                }
            }
            off = end;
        }

        if self.valid {
            self.records = Some(records);
        }
    }

    fn parse_rdata(
        &mut self,
        typ: DnsType,
        off: usize,
        end: usize,
    ) -> crate::error::Result<Option<RData>> {
        // Bounding reads at the declared record end keeps a lying RDATA
        // length from spilling into the next record. Compression pointers
        // only ever aim backward, so names inside the slice still resolve.
        let data = &self.data[..end];
        Ok(match typ {
            DnsType::A => {
                if end - off != 4 {
                    return Err(Error::ErrResourceLen);
                }
                let (bytes, _) = unpack_bytes(data, off, 4)?;
                let octets: [u8; 4] = bytes.try_into().map_err(|_| Error::ErrResourceLen)?;
                Some(RData::Address {
                    addr: std::net::IpAddr::from(octets),
                    scope_id: None,
                })
            }
            DnsType::Aaaa => {
                if end - off != 16 {
                    return Err(Error::ErrResourceLen);
                }
                let (bytes, _) = unpack_bytes(data, off, 16)?;
                let octets: [u8; 16] = bytes.try_into().map_err(|_| Error::ErrResourceLen)?;
                Some(RData::Address {
                    addr: std::net::IpAddr::from(octets),
                    scope_id: self.scope_id,
                })
            }
            DnsType::Ptr | DnsType::Cname => {
                let (alias, _) = unpack_name(data, off, &mut self.memo)?;
                Some(RData::Pointer { alias })
            }
            DnsType::Txt => {
                let (text, _) = unpack_bytes(data, off, end - off)?;
                Some(RData::Text {
                    text: text.to_vec(),
                })
            }
            DnsType::Srv => {
                let (priority, o) = unpack_u16(data, off)?;
                let (weight, o) = unpack_u16(data, o)?;
                let (port, o) = unpack_u16(data, o)?;
                let (server, _) = unpack_name(data, o, &mut self.memo)?;
                Some(RData::Service {
                    priority,
                    weight,
                    port,
                    server,
                })
            }
            DnsType::Hinfo => {
                let (cpu, o) = unpack_char_string(data, off)?;
                let (os, _) = unpack_char_string(data, o)?;
                Some(RData::HostInfo {
                    cpu: String::from_utf8(cpu.to_vec())?,
                    os: String::from_utf8(os.to_vec())?,
                })
            }
            DnsType::Nsec => {
                let (next_name, mut o) = unpack_name(data, off, &mut self.memo)?;
                let mut types = Vec::new();
                while o < end {
                    let (window, o2) = unpack_byte(data, o)?;
                    let (bitmap_len, o2) = unpack_byte(data, o2)?;
                    let (bitmap, o2) = unpack_bytes(data, o2, bitmap_len as usize)?;
                    // Only window 0 (type codes 0-255) is meaningful here.
                    if window == 0 {
                        for (i, byte) in bitmap.iter().enumerate() {
                            for bit in 0..8u16 {
                                if byte & (0x80 >> bit) != 0 {
                                    types.push(i as u16 * 8 + bit);
                                }
                            }
                        }
                    }
                    o = o2;
                }
                types.sort_unstable();
                Some(RData::Nsec { next_name, types })
            }
            _ => None,
        })
    }
}
