//! An implementation of the RouterOS API wire protocol.
//!
//! The protocol is sentence-oriented: a sentence is a sequence of
//! length-prefixed UTF-8 words terminated by a zero-length word. Requests
//! and replies are framed identically.

mod error;
mod parser;
mod reply;

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

pub use error::*;
pub use parser::*;
pub use reply::*;

/// Default API port for plain TCP connections.
pub const DEFAULT_PORT: u16 = 8728;

/// Default API port for TLS connections.
pub const DEFAULT_TLS_PORT: u16 = 8729;

/// Writes a word length prefix to an output stream.
///
/// The width of the prefix is packed into the leading bits of its first
/// byte: lengths below `0x80` fit in one byte, and each longer form adds
/// one tag bit and one byte, up to the five-byte `0xF0` form carrying a
/// full 32-bit length.
pub fn write_length<W: Write>(w: &mut W, len: u32) -> Result<(), ProtocolError> {
    match len {
        0..=0x7F => w.write_u8(len as u8)?,
        0x80..=0x3FFF => w.write_u16::<BigEndian>(len as u16 | 0x8000)?,
        0x4000..=0x1F_FFFF => {
            w.write_u8((len >> 16) as u8 | 0xC0)?;
            w.write_u16::<BigEndian>(len as u16)?;
        }
        0x20_0000..=0xFFF_FFFF => w.write_u32::<BigEndian>(len | 0xE000_0000)?,
        _ => {
            w.write_u8(0xF0)?;
            w.write_u32::<BigEndian>(len)?;
        }
    }

    Ok(())
}

/// Decodes a word length prefix from the start of `buf`.
///
/// Returns the length and the number of prefix bytes consumed, or `None`
/// if `buf` does not yet hold the whole prefix. A length of zero is the
/// sentence terminator.
pub fn decode_length(buf: &[u8]) -> Result<Option<(u32, usize)>, ProtocolError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };

    let width = match first {
        0x00..=0x7F => 1,
        0x80..=0xBF => 2,
        0xC0..=0xDF => 3,
        0xE0..=0xEF => 4,
        0xF0 => 5,
        _ => return Err(ProtocolError::InvalidLength(first)),
    };

    if buf.len() < width {
        return Ok(None);
    }

    let len = match width {
        1 => u32::from(first),
        2 => (u32::from(first) & 0x3F) << 8 | u32::from(buf[1]),
        3 => (u32::from(first) & 0x1F) << 16 | u32::from(buf[1]) << 8 | u32::from(buf[2]),
        4 => {
            (u32::from(first) & 0x0F) << 24
                | u32::from(buf[1]) << 16
                | u32::from(buf[2]) << 8
                | u32::from(buf[3])
        }
        _ => u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]),
    };

    Ok(Some((len, width)))
}

/// Writes a single length-prefixed word to an output stream.
pub fn write_word<W: Write>(w: &mut W, word: &str) -> Result<(), ProtocolError> {
    let len = u32::try_from(word.len()).map_err(|_| ProtocolError::WordTooLong(word.len()))?;

    write_length(w, len)?;
    w.write_all(word.as_bytes())?;

    Ok(())
}

/// Encodes a full sentence: every word length-prefixed, followed by the
/// zero-length terminator word.
pub fn encode_sentence<S: AsRef<str>>(words: &[S]) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    for word in words {
        write_word(&mut buf, word.as_ref())?;
    }

    buf.push(0x00);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn encoded(len: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_length(&mut buf, len).unwrap();
        buf
    }

    #[test]
    fn length_widths() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(0x7F), vec![0x7F]);
        assert_eq!(encoded(0x80), vec![0x80, 0x80]);
        assert_eq!(encoded(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(encoded(0x4000), vec![0xC0, 0x40, 0x00]);
        assert_eq!(encoded(0x1F_FFFF), vec![0xDF, 0xFF, 0xFF]);
        assert_eq!(encoded(0x20_0000), vec![0xE0, 0x20, 0x00, 0x00]);
        assert_eq!(encoded(0xFFF_FFFF), vec![0xEF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encoded(0x1000_0000), vec![0xF0, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(encoded(u32::MAX), vec![0xF0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn length_round_trip() {
        let boundaries = [
            0,
            1,
            0x7F,
            0x80,
            0x3FFF,
            0x4000,
            0x1F_FFFF,
            0x20_0000,
            0xFFF_FFFF,
            0x1000_0000,
            u32::MAX,
        ];

        for len in boundaries {
            let buf = encoded(len);
            let decoded = decode_length(&buf).unwrap();
            assert_eq!(decoded, Some((len, buf.len())), "length {len:#x}");
        }
    }

    #[test]
    fn length_needs_more_data() {
        assert_matches!(decode_length(&[]), Ok(None));

        for len in [0x80u32, 0x4000, 0x20_0000, 0x1000_0000] {
            let buf = encoded(len);
            for cut in 1..buf.len() {
                assert_matches!(
                    decode_length(&buf[..cut]),
                    Ok(None),
                    "length {len:#x} cut at {cut}"
                );
            }
        }
    }

    #[test]
    fn length_invalid_lead_byte() {
        for first in 0xF1u8..=0xFF {
            assert_matches!(
                decode_length(&[first, 0, 0, 0, 0]),
                Err(ProtocolError::InvalidLength(b)) if b == first
            );
        }
    }

    #[test]
    fn word_encoding() {
        let mut buf = Vec::new();
        write_word(&mut buf, "/login").unwrap();

        assert_eq!(buf, b"\x06/login");
    }

    #[test]
    fn sentence_encoding() {
        let buf = encode_sentence(&["/login", "=name=admin"]).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"\x06/login");
        expected.extend_from_slice(b"\x0b=name=admin");
        expected.push(0x00);

        assert_eq!(buf, expected);
    }

    #[test]
    fn long_word_gets_wide_prefix() {
        let word = "x".repeat(0x80);
        let mut buf = Vec::new();
        write_word(&mut buf, &word).unwrap();

        assert_eq!(&buf[..2], &[0x80, 0x80]);
        assert_eq!(buf.len(), 2 + word.len());
    }
}
