use encoding_rs::{Encoding, ISO_8859_8, SHIFT_JIS, UTF_8, WINDOWS_1252};

use crate::common::bitstream::BitStream;
use crate::error::{DecodeError, DecodeResult};
use crate::types::StructuredAppend;

use super::version::Version;

// Mode indicators
//------------------------------------------------------------------------------

const MODE_TERMINATOR: u16 = 0b0000;
const MODE_NUMERIC: u16 = 0b0001;
const MODE_ALPHANUMERIC: u16 = 0b0010;
const MODE_STRUCTURED_APPEND: u16 = 0b0011;
const MODE_BYTE: u16 = 0b0100;
const MODE_FNC1_FIRST: u16 = 0b0101;
const MODE_ECI: u16 = 0b0111;
const MODE_KANJI: u16 = 0b1000;
const MODE_FNC1_SECOND: u16 = 0b1001;

static ALPHANUMERIC_CHARS: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

// Decoded payload
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub text: String,
    pub bytes: Vec<u8>,
    pub structured_append: Option<StructuredAppend>,
    pub eci: Option<u32>,
}

// Segment state machine
//------------------------------------------------------------------------------

/// Walks the segment stream: mode indicator, count field, mode data,
/// repeated until a terminator or the stream runs dry at a segment boundary.
/// Running dry inside a segment is a `TruncatedData` error.
pub fn decode_payload(
    enc: &mut BitStream,
    ver: Version,
    charset_hint: Option<&str>,
) -> DecodeResult<Payload> {
    let mut text = String::new();
    let mut bytes = Vec::new();
    let mut structured_append = None;
    let mut eci = None;
    let mut active: Option<&'static Encoding> = None;

    let hint = charset_hint.and_then(|l| Encoding::for_label(l.as_bytes()));

    loop {
        let mode = match enc.take_bits(4) {
            // Exhausting the stream between segments ends the payload, same
            // as an explicit terminator
            None | Some(MODE_TERMINATOR) => break,
            Some(m) => m,
        };

        match mode {
            MODE_NUMERIC => {
                let cnt = take_count(enc, ver, mode)?;
                read_numeric(enc, cnt, &mut text, &mut bytes)?;
            }
            MODE_ALPHANUMERIC => {
                let cnt = take_count(enc, ver, mode)?;
                read_alphanumeric(enc, cnt, &mut text, &mut bytes)?;
            }
            MODE_BYTE => {
                let cnt = take_count(enc, ver, mode)?;
                read_bytes(enc, cnt, active.or(hint), &mut text, &mut bytes)?;
            }
            MODE_KANJI => {
                let cnt = take_count(enc, ver, mode)?;
                read_kanji(enc, cnt, &mut text, &mut bytes)?;
            }
            MODE_ECI => {
                let designator = read_eci_designator(enc)?;
                eci = Some(designator);
                active = encoding_for_eci(designator);
            }
            MODE_STRUCTURED_APPEND => {
                let index = enc.take_bits(4).ok_or(DecodeError::TruncatedData)? as u8;
                let total = enc.take_bits(4).ok_or(DecodeError::TruncatedData)? as u8;
                let parity = enc.take_bits(8).ok_or(DecodeError::TruncatedData)? as u8;
                structured_append = Some(StructuredAppend { index, total: total + 1, parity });
            }
            MODE_FNC1_FIRST => (),
            MODE_FNC1_SECOND => {
                // Application indicator byte
                enc.take_bits(8).ok_or(DecodeError::TruncatedData)?;
            }
            _ => return Err(DecodeError::Structural("unknown mode indicator")),
        }
    }

    Ok(Payload { text, bytes, structured_append, eci })
}

fn take_count(enc: &mut BitStream, ver: Version, mode: u16) -> DecodeResult<usize> {
    let bits = ver.char_cnt_bits(mode as u8);
    Ok(enc.take_bits(bits).ok_or(DecodeError::TruncatedData)? as usize)
}

fn read_numeric(
    enc: &mut BitStream,
    mut cnt: usize,
    text: &mut String,
    bytes: &mut Vec<u8>,
) -> DecodeResult<()> {
    while cnt > 0 {
        let digits = cnt.min(3);
        let bit_len = [4, 7, 10][digits - 1];
        let chunk = enc.take_bits(bit_len).ok_or(DecodeError::TruncatedData)?;

        let limit = [10u16, 100, 1000][digits - 1];
        if chunk >= limit {
            return Err(DecodeError::Structural("numeric group out of range"));
        }

        let mut divisor = limit / 10;
        for _ in 0..digits {
            let d = b'0' + ((chunk / divisor) % 10) as u8;
            text.push(d as char);
            bytes.push(d);
            divisor = (divisor / 10).max(1);
        }
        cnt -= digits;
    }
    Ok(())
}

fn read_alphanumeric(
    enc: &mut BitStream,
    mut cnt: usize,
    text: &mut String,
    bytes: &mut Vec<u8>,
) -> DecodeResult<()> {
    while cnt > 0 {
        let pair = cnt.min(2);
        let bit_len = if pair == 2 { 11 } else { 6 };
        let chunk = enc.take_bits(bit_len).ok_or(DecodeError::TruncatedData)?;

        let vals = if pair == 2 { [chunk / 45, chunk % 45] } else { [chunk, 0] };
        for &v in vals.iter().take(pair) {
            if v >= 45 {
                return Err(DecodeError::Structural("alphanumeric value out of range"));
            }
            let c = ALPHANUMERIC_CHARS[v as usize];
            text.push(c as char);
            bytes.push(c);
        }
        cnt -= pair;
    }
    Ok(())
}

fn read_bytes(
    enc: &mut BitStream,
    cnt: usize,
    encoding: Option<&'static Encoding>,
    text: &mut String,
    bytes: &mut Vec<u8>,
) -> DecodeResult<()> {
    let mut seg = Vec::with_capacity(cnt);
    for _ in 0..cnt {
        seg.push(enc.take_bits(8).ok_or(DecodeError::TruncatedData)? as u8);
    }

    match encoding {
        Some(encoding) => {
            let (decoded, _, had_errors) = encoding.decode(&seg);
            if had_errors {
                return Err(DecodeError::CharacterSet);
            }
            text.push_str(&decoded);
        }
        // No designator and no hint: UTF-8 when it fits, Latin-1 otherwise
        None => match std::str::from_utf8(&seg) {
            Ok(utf8) => text.push_str(utf8),
            Err(_) => {
                let (decoded, _, had_errors) = WINDOWS_1252.decode(&seg);
                if had_errors {
                    return Err(DecodeError::CharacterSet);
                }
                text.push_str(&decoded);
            }
        },
    }

    bytes.extend(seg);
    Ok(())
}

fn read_kanji(
    enc: &mut BitStream,
    cnt: usize,
    text: &mut String,
    bytes: &mut Vec<u8>,
) -> DecodeResult<()> {
    let mut seg = Vec::with_capacity(cnt * 2);
    for _ in 0..cnt {
        let chunk = enc.take_bits(13).ok_or(DecodeError::TruncatedData)? as u32;
        let assembled = ((chunk / 0xC0) << 8) | (chunk % 0xC0);
        let sjis = if assembled < 0x1F00 { assembled + 0x8140 } else { assembled + 0xC140 };
        seg.push((sjis >> 8) as u8);
        seg.push((sjis & 0xFF) as u8);
    }

    let (decoded, _, had_errors) = SHIFT_JIS.decode(&seg);
    if had_errors {
        return Err(DecodeError::CharacterSet);
    }
    text.push_str(&decoded);
    bytes.extend(seg);
    Ok(())
}

// ECI
//------------------------------------------------------------------------------

// Designators are 1 to 3 bytes long, flagged by the leading bits
fn read_eci_designator(enc: &mut BitStream) -> DecodeResult<u32> {
    let first = enc.take_bits(8).ok_or(DecodeError::TruncatedData)? as u32;
    if first & 0x80 == 0 {
        return Ok(first);
    }
    if first & 0xC0 == 0x80 {
        let second = enc.take_bits(8).ok_or(DecodeError::TruncatedData)? as u32;
        return Ok(((first & 0x3F) << 8) | second);
    }
    if first & 0xE0 == 0xC0 {
        let rest = enc.take_bits(16).ok_or(DecodeError::TruncatedData)? as u32;
        return Ok(((first & 0x1F) << 16) | rest);
    }
    Err(DecodeError::Structural("invalid ECI designator"))
}

fn encoding_for_eci(designator: u32) -> Option<&'static Encoding> {
    let label: &[u8] = match designator {
        1 | 3 => b"ISO-8859-1",
        4 => b"ISO-8859-2",
        5 => b"ISO-8859-3",
        6 => b"ISO-8859-4",
        7 => b"ISO-8859-5",
        9 => b"ISO-8859-7",
        11 => return Some(ISO_8859_8),
        13 => b"ISO-8859-9",
        17 => b"ISO-8859-13",
        18 => b"ISO-8859-14",
        19 => b"ISO-8859-15",
        20 => return Some(SHIFT_JIS),
        22 => b"windows-1251",
        23 => b"windows-1252",
        24 => b"windows-1256",
        25 => b"UTF-16BE",
        26 => return Some(UTF_8),
        28 => b"Big5",
        29 => b"GB18030",
        30 => b"EUC-KR",
        _ => return None,
    };
    Encoding::for_label(label)
}
