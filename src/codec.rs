//! Binary-to-text codec for opaque parameter fields.
//!
//! Classic 64-symbol radix: `A-Z a-z 0-9 + /` with `=` padding. The encoder
//! streams through a `fmt::Write` sink so the form renderer never buffers a
//! full encoded value; the decoder writes into a caller slice and truncates
//! at its boundary, matching the fixed field widths it feeds.

use core::fmt;

use crate::error::{Error, Result};

const SYMBOLS: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn symbol_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Encodes `data` into `sink`, 4 symbols per 3-byte group, `=`-padded.
pub fn encode_to<W: fmt::Write>(sink: &mut W, data: &[u8]) -> fmt::Result {
    for group in data.chunks(3) {
        let b0 = group[0];
        let b1 = group.get(1).copied();
        let b2 = group.get(2).copied();

        sink.write_char(SYMBOLS[(b0 >> 2) as usize] as char)?;
        let mut second = (b0 & 0x03) << 4;
        if let Some(b1) = b1 {
            second |= b1 >> 4;
        }
        sink.write_char(SYMBOLS[second as usize] as char)?;

        match (b1, b2) {
            (None, _) => sink.write_str("==")?,
            (Some(b1), None) => {
                sink.write_char(SYMBOLS[((b1 & 0x0f) << 2) as usize] as char)?;
                sink.write_char('=')?;
            }
            (Some(b1), Some(b2)) => {
                sink.write_char(SYMBOLS[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char)?;
                sink.write_char(SYMBOLS[(b2 & 0x3f) as usize] as char)?;
            }
        }
    }
    Ok(())
}

/// Convenience owned-string form of [`encode_to`].
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    // Infallible: String's fmt::Write never errors.
    let _ = encode_to(&mut out, data);
    out
}

/// Decodes `text` into `out`, returning the number of bytes written.
///
/// Decoding stops silently once `out` is full. Any character outside the
/// alphabet, any non-`=` character after padding starts, and a lone trailing
/// symbol that cannot contribute a whole byte are all rejected as
/// [`Error::Malformed`].
pub fn decode_into(text: &str, out: &mut [u8]) -> Result<usize> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut written = 0usize;
    let mut padded = false;

    for &b in text.as_bytes() {
        if b == b'=' {
            padded = true;
            continue;
        }
        if padded {
            return Err(Error::Malformed);
        }
        let v = symbol_value(b).ok_or(Error::Malformed)?;
        acc = (acc << 6) | u32::from(v);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            if written == out.len() {
                return Ok(written);
            }
            out[written] = (acc >> bits) as u8;
            written += 1;
        }
    }
    // A single leftover symbol carries only 6 bits and can never complete a
    // byte; 2- and 4-bit remnants are the normal padding residue.
    if bits == 6 {
        return Err(Error::Malformed);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn round_trip_spot_lengths() {
        for len in [0usize, 1, 2, 3, 37] {
            let data: Vec<u8> = (0..len).map(|i| (i * 7 + 13) as u8).collect();
            let text = encode(&data);
            let mut back = vec![0u8; len];
            assert_eq!(decode_into(&text, &mut back), Ok(len));
            assert_eq!(back, data);
        }
    }

    #[test]
    fn rejects_alien_characters() {
        let mut buf = [0u8; 8];
        assert_eq!(decode_into("Zm9*", &mut buf), Err(Error::Malformed));
        assert_eq!(decode_into("Zm 9", &mut buf), Err(Error::Malformed));
    }

    #[test]
    fn rejects_symbols_after_padding() {
        let mut buf = [0u8; 8];
        assert_eq!(decode_into("Zg=A", &mut buf), Err(Error::Malformed));
        // Padding followed only by more padding is fine.
        assert_eq!(decode_into("Zg==", &mut buf), Ok(1));
        assert_eq!(buf[0], b'f');
    }

    #[test]
    fn rejects_lone_trailing_symbol() {
        let mut buf = [0u8; 8];
        assert_eq!(decode_into("Z", &mut buf), Err(Error::Malformed));
        assert_eq!(decode_into("Zm9vZ", &mut buf), Err(Error::Malformed));
    }

    #[test]
    fn decode_truncates_at_buffer_boundary() {
        let mut buf = [0u8; 2];
        assert_eq!(decode_into("Zm9vYmFy", &mut buf), Ok(2));
        assert_eq!(&buf, b"fo");
        let mut none = [0u8; 0];
        assert_eq!(decode_into("Zm9v", &mut none), Ok(0));
    }

    #[test]
    fn unpadded_tail_decodes() {
        let mut buf = [0u8; 8];
        assert_eq!(decode_into("Zm8", &mut buf), Ok(2));
        assert_eq!(&buf[..2], b"fo");
    }
}
