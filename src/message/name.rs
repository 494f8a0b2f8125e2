//! Name wire format: length-prefixed labels with RFC 1035 §4.1.4 pointer
//! compression.
//!
//! Decoding guards against hostile input: pointers must aim strictly
//! backward, may not revisit an offset already followed while assembling the
//! current name, and the assembled name is bounded in bytes and labels.
//! Encoding keeps a per-packet table of every name suffix already written
//! and emits a pointer to the longest matching suffix.

use std::collections::HashMap;

use super::{HEADER_LEN, MAX_LABEL_LENGTH, MAX_NAME_LABELS, MAX_NAME_LENGTH};
use crate::error::{Error, Result};

/// Cache of decoded suffixes keyed by their start offset in the packet, so
/// a pointer target shared by many records is assembled once.
pub(crate) type LabelMemo = HashMap<usize, String>;

/// Decodes a possibly-compressed name starting at `off`.
///
/// Returns the fully-qualified name (trailing dot) and the offset just past
/// the name at the top level of the packet.
pub(crate) fn unpack_name(
    msg: &[u8],
    off: usize,
    memo: &mut LabelMemo,
) -> Result<(String, usize)> {
    let mut name = String::new();
    let mut labels = 0usize;
    let mut cur = off;
    // Offset just past the name in the record being parsed; set at the
    // first pointer, since everything after it lives elsewhere.
    let mut new_off: Option<usize> = None;
    // Pointer targets already followed for this name.
    let mut followed: Vec<usize> = Vec::new();
    // (start offset, name length so far) checkpoints for memoization.
    let mut checkpoints: Vec<(usize, usize)> = vec![(off, 0)];

    loop {
        if new_off.is_some()
            && let Some(suffix) = memo.get(&cur)
        {
            labels += suffix.matches('.').count();
            name.push_str(suffix);
            break;
        }

        let len = *msg.get(cur).ok_or(Error::ErrBaseLen)? as usize;
        match len & 0xC0 {
            0x00 => {
                if len == 0 {
                    cur += 1;
                    break;
                }
                if cur + 1 + len > msg.len() {
                    return Err(Error::ErrBaseLen);
                }
                let label = String::from_utf8(msg[cur + 1..cur + 1 + len].to_vec())?;
                name.push_str(&label);
                name.push('.');
                labels += 1;
                cur += 1 + len;
                if new_off.is_none() {
                    checkpoints.push((cur, name.len()));
                }
            }
            0xC0 => {
                let low = *msg.get(cur + 1).ok_or(Error::ErrBaseLen)? as usize;
                let target = ((len & 0x3F) << 8) | low;
                // A pointer may only reference data earlier in the packet.
                if target >= cur {
                    return Err(Error::ErrInvalidPtr);
                }
                if followed.contains(&target) {
                    return Err(Error::ErrPtrLoop);
                }
                followed.push(target);
                if new_off.is_none() {
                    new_off = Some(cur + 2);
                    checkpoints.pop();
                }
                cur = target;
            }
            _ => return Err(Error::ErrReserved),
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(Error::ErrNameTooLong);
        }
        if labels > MAX_NAME_LABELS {
            return Err(Error::ErrTooManyLabels);
        }
    }

    // The memo fast path exits before the per-iteration guards run; the
    // assembled name is bounded on every path.
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::ErrNameTooLong);
    }
    if labels > MAX_NAME_LABELS {
        return Err(Error::ErrTooManyLabels);
    }

    for (start, consumed) in checkpoints {
        memo.entry(start)
            .or_insert_with(|| name[consumed..].to_string());
    }

    Ok((name, new_off.unwrap_or(cur)))
}

fn labels_of(name: &str) -> Vec<&str> {
    name.split('.').filter(|l| !l.is_empty()).collect()
}

fn suffix_from(labels: &[&str], i: usize) -> String {
    let mut s = String::new();
    for label in &labels[i..] {
        s.push_str(label);
        s.push('.');
    }
    s
}

/// Appends the wire format of `name` to `out`, compressing against `names`,
/// the table of suffixes already written in this packet.
///
/// `out` holds packet content without the 12 byte header; registered offsets
/// account for it so pointers are valid in the finished datagram.
pub(crate) fn pack_name(
    out: &mut Vec<u8>,
    name: &str,
    names: &mut HashMap<String, usize>,
) -> Result<()> {
    if name.len() > MAX_NAME_LENGTH + 1 {
        return Err(Error::ErrNameTooLong);
    }
    let labels = labels_of(name);
    if labels.len() > MAX_NAME_LABELS {
        return Err(Error::ErrTooManyLabels);
    }

    // Longest suffix already written wins.
    let mut pointer: Option<usize> = None;
    let mut stop = labels.len();
    for i in 0..labels.len() {
        if let Some(&off) = names.get(&suffix_from(&labels, i)) {
            pointer = Some(off);
            stop = i;
            break;
        }
    }

    for (i, label) in labels.iter().enumerate().take(stop) {
        let bytes = label.as_bytes();
        if bytes.len() > MAX_LABEL_LENGTH {
            return Err(Error::ErrLabelTooLong);
        }
        let here = HEADER_LEN + out.len();
        // Offsets past the 14-bit pointer range are not compressible.
        if here < 0x4000 {
            names.insert(suffix_from(&labels, i), here);
        }
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }

    match pointer {
        Some(off) => out.extend_from_slice(&(0xC000u16 | off as u16).to_be_bytes()),
        None => out.push(0),
    }
    Ok(())
}

/// Appends `name` without consulting or feeding the compression table.
/// NSEC next-name fields are never compressed.
pub(crate) fn pack_name_uncompressed(out: &mut Vec<u8>, name: &str) -> Result<()> {
    for label in labels_of(name) {
        let bytes = label.as_bytes();
        if bytes.len() > MAX_LABEL_LENGTH {
            return Err(Error::ErrLabelTooLong);
        }
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
    }
    out.push(0);
    Ok(())
}
