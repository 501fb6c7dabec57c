//! Binary field readers shared by every protocol decoder.
//!
//! All protocols on this chain serialize instruction arguments and
//! self-emitted log payloads as little-endian fixed-width integers, raw
//! 32-byte public keys and 4-byte-length-prefixed UTF-8 strings (one legacy
//! log layout uses a NUL-terminated string instead). [`Reader`] is a cursor
//! over one payload; short or malformed buffers surface as [`DecodeError`],
//! never as a panic.

use crate::error::DecodeError;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

/// Cursor over a binary payload.
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, wanted: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if remaining < wanted {
            return Err(DecodeError::UnexpectedEof {
                wanted,
                offset: self.pos,
                remaining,
            });
        }
        let out = &self.data[self.pos..self.pos + wanted];
        self.pos += wanted;
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16_le(&mut self) -> Result<u16, DecodeError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64_le(&mut self) -> Result<u64, DecodeError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn i64_le(&mut self) -> Result<i64, DecodeError> {
        Ok(self.u64_le()? as i64)
    }

    pub fn pubkey(&mut self) -> Result<Pubkey, DecodeError> {
        let b = self.take(32)?;
        let mut key = [0u8; 32];
        key.copy_from_slice(b);
        Ok(Pubkey::new_from_array(key))
    }

    /// 4-byte little-endian length prefix followed by that many UTF-8 bytes.
    /// The claimed length is validated against the remaining buffer before
    /// anything is allocated. Embedded NUL bytes are stripped: some on-chain
    /// mint names carry them and they must not reach storage.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.u32_le()? as usize;
        let remaining = self.remaining();
        if len > remaining {
            // rewind so the error offset points at the prefix
            self.pos -= 4;
            return Err(DecodeError::StringTooLong { len, remaining });
        }
        let offset = self.pos;
        let bytes = self.take(len)?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset })?;
        Ok(strip_nuls(s))
    }

    /// NUL-terminated string, used by one legacy log layout. Reads to the
    /// first NUL (or the end of the buffer) and strips the terminator along
    /// with any embedded NULs.
    pub fn cstr(&mut self) -> Result<String, DecodeError> {
        let rest = &self.data[self.pos..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let consumed = if end < rest.len() { end + 1 } else { end };
        let offset = self.pos;
        let bytes = self.take(consumed)?;
        let s = std::str::from_utf8(&bytes[..end])
            .map_err(|_| DecodeError::InvalidUtf8 { offset })?;
        Ok(strip_nuls(s))
    }
}

/// Strips embedded NUL bytes from a decoded name/symbol/label.
pub fn strip_nuls(s: &str) -> String {
    if s.contains('\0') {
        s.chars().filter(|&c| c != '\0').collect()
    } else {
        s.to_string()
    }
}

/// Decode result of one instruction or log payload. A malformed payload is
/// recorded with its error instead of aborting the surrounding transaction
/// walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Decoded<T> {
    Ok(T),
    Malformed(String),
}

impl<T> Decoded<T> {
    pub fn from_result(result: Result<T, DecodeError>) -> Self {
        match result {
            Ok(value) => Decoded::Ok(value),
            Err(err) => Decoded::Malformed(err.to_string()),
        }
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Decoded::Ok(value) => Some(value),
            Decoded::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Decoded::Malformed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_string(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn integer_round_trips_at_boundaries() {
        for value in [0u64, u8::MAX as u64, u16::MAX as u64, u32::MAX as u64, u64::MAX] {
            let buf = value.to_le_bytes();
            let mut r = Reader::new(&buf);
            assert_eq!(r.u64_le().unwrap(), value);
            assert_eq!(r.position(), 8);
        }
        let mut r = Reader::new(&[0xff, 0xff]);
        assert_eq!(r.u16_le().unwrap(), u16::MAX);
        let mut r = Reader::new(&[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(r.u32_le().unwrap(), u32::MAX);
        let mut r = Reader::new(&[0x2a]);
        assert_eq!(r.u8().unwrap(), 42);
    }

    #[test]
    fn pubkey_round_trips_all_zero_and_all_ff() {
        for byte in [0x00u8, 0xffu8] {
            let buf = [byte; 32];
            let mut r = Reader::new(&buf);
            assert_eq!(r.pubkey().unwrap(), Pubkey::new_from_array(buf));
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn length_prefixed_string_advances_cursor() {
        let buf = encode_string("PEPE");
        let mut r = Reader::new(&buf);
        assert_eq!(r.string().unwrap(), "PEPE");
        assert_eq!(r.position(), 8);
    }

    #[test]
    fn empty_string_round_trips() {
        let buf = encode_string("");
        let mut r = Reader::new(&buf);
        assert_eq!(r.string().unwrap(), "");
        assert_eq!(r.position(), 4);
    }

    #[test]
    fn garbage_string_length_is_rejected_before_allocation() {
        // length prefix claims 4 GiB
        let buf = [0xff, 0xff, 0xff, 0xff, b'a'];
        let mut r = Reader::new(&buf);
        match r.string() {
            Err(DecodeError::StringTooLong { len, remaining }) => {
                assert_eq!(len, u32::MAX as usize);
                assert_eq!(remaining, 1);
            }
            other => panic!("expected StringTooLong, got {other:?}"),
        }
    }

    #[test]
    fn embedded_nuls_are_stripped() {
        let buf = encode_string("AB\0CD");
        let mut r = Reader::new(&buf);
        assert_eq!(r.string().unwrap(), "ABCD");
    }

    #[test]
    fn cstr_stops_at_terminator() {
        let buf = b"moonshot\0trailing";
        let mut r = Reader::new(buf);
        assert_eq!(r.cstr().unwrap(), "moonshot");
        assert_eq!(r.position(), 9);
    }

    #[test]
    fn cstr_without_terminator_reads_to_end() {
        let mut r = Reader::new(b"label");
        assert_eq!(r.cstr().unwrap(), "label");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn short_buffer_reports_offsets() {
        let mut r = Reader::new(&[1, 2, 3]);
        r.u8().unwrap();
        match r.u64_le() {
            Err(DecodeError::UnexpectedEof {
                wanted,
                offset,
                remaining,
            }) => {
                assert_eq!((wanted, offset, remaining), (8, 1, 2));
            }
            other => panic!("expected UnexpectedEof, got {other:?}"),
        }
    }

    #[test]
    fn malformed_marker_keeps_error_text() {
        let decoded: Decoded<u64> = Decoded::from_result(Err(DecodeError::InvalidUtf8 { offset: 12 }));
        assert!(decoded.is_malformed());
        assert_eq!(decoded.ok(), None);
        match decoded {
            Decoded::Malformed(msg) => assert!(msg.contains("utf-8")),
            Decoded::Ok(_) => unreachable!(),
        }
    }
}
