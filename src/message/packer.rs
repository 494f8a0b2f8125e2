use crate::error::{Error, Result};

// pack_u16 appends the wire format of field to msg.
pub(crate) fn pack_u16(mut msg: Vec<u8>, v: u16) -> Vec<u8> {
    msg.extend_from_slice(&v.to_be_bytes());
    msg
}

pub(crate) fn unpack_u16(msg: &[u8], off: usize) -> Result<(u16, usize)> {
    if off + 2 > msg.len() {
        return Err(Error::ErrBaseLen);
    }
    Ok((u16::from_be_bytes([msg[off], msg[off + 1]]), off + 2))
}

// pack_u32 appends the wire format of field to msg.
pub(crate) fn pack_u32(mut msg: Vec<u8>, v: u32) -> Vec<u8> {
    msg.extend_from_slice(&v.to_be_bytes());
    msg
}

pub(crate) fn unpack_u32(msg: &[u8], off: usize) -> Result<(u32, usize)> {
    if off + 4 > msg.len() {
        return Err(Error::ErrBaseLen);
    }
    Ok((
        u32::from_be_bytes([msg[off], msg[off + 1], msg[off + 2], msg[off + 3]]),
        off + 4,
    ))
}

pub(crate) fn unpack_byte(msg: &[u8], off: usize) -> Result<(u8, usize)> {
    if off >= msg.len() {
        return Err(Error::ErrBaseLen);
    }
    Ok((msg[off], off + 1))
}

pub(crate) fn unpack_bytes(msg: &[u8], off: usize, len: usize) -> Result<(&[u8], usize)> {
    if off + len > msg.len() {
        return Err(Error::ErrBaseLen);
    }
    Ok((&msg[off..off + len], off + len))
}

// unpack_char_string reads a single length-prefixed character-string
// (HINFO fields, TXT segments).
pub(crate) fn unpack_char_string(msg: &[u8], off: usize) -> Result<(&[u8], usize)> {
    let (len, off) = unpack_byte(msg, off)?;
    unpack_bytes(msg, off, len as usize)
}

pub(crate) fn pack_char_string(mut msg: Vec<u8>, s: &[u8]) -> Result<Vec<u8>> {
    if s.len() > u8::MAX as usize {
        return Err(Error::ErrLabelTooLong);
    }
    msg.push(s.len() as u8);
    msg.extend_from_slice(s);
    Ok(msg)
}
