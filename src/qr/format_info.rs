use crate::error::{DecodeError, DecodeResult};

use super::version::{ECLevel, Version};

// Format info
//------------------------------------------------------------------------------

// Masked 15-bit format words, indexed by (ec level bits << 3) | mask. The
// underlying BCH(15, 5) code has minimum distance 7, so up to 3 bit errors
// always resolve to the written word.
#[rustfmt::skip]
static FORMAT_INFO: [u16; 32] = [
    0x5412, 0x5125, 0x5E7C, 0x5B4B, 0x45F9, 0x40CE, 0x4F97, 0x4AA0,
    0x77C4, 0x72F3, 0x7DAA, 0x789D, 0x662F, 0x6318, 0x6C41, 0x6976,
    0x1689, 0x13BE, 0x1CE7, 0x19D0, 0x0762, 0x0255, 0x0D0C, 0x083B,
    0x355F, 0x3068, 0x3F31, 0x3A06, 0x24B4, 0x2183, 0x2EDA, 0x2BED,
];

// 18-bit version words for versions 7..=40, BCH(18, 6), minimum distance 8
#[rustfmt::skip]
static VERSION_INFO: [u32; 34] = [
    0x07C94, 0x085BC, 0x09A99, 0x0A4D3, 0x0BBF6, 0x0C762, 0x0D847, 0x0E60D,
    0x0F928, 0x10B78, 0x1145D, 0x12A17, 0x13532, 0x149A6, 0x15683, 0x168C9,
    0x177EC, 0x18EC4, 0x191E1, 0x1AFAB, 0x1B08E, 0x1CC1A, 0x1D33F, 0x1ED75,
    0x1F250, 0x209D5, 0x216F0, 0x228BA, 0x2379F, 0x24B0B, 0x2542E, 0x26A64,
    0x27541, 0x28C69,
];

/// Nearest valid word by Hamming distance, accepted only within the code's
/// guaranteed correction radius.
fn rectify_info(info: u32, valid: impl Iterator<Item = u32>, err_capacity: u32) -> Option<usize> {
    let (idx, dist) = valid
        .enumerate()
        .map(|(i, v)| (i, (info ^ v).count_ones()))
        .min_by_key(|&(_, d)| d)?;

    (dist <= err_capacity).then_some(idx)
}

/// Decodes one 15-bit format info word into its ec level and mask pattern.
/// Tried per copy; both copies failing is a `Structural` error at the call
/// site.
pub fn decode_format_info(raw: u16) -> DecodeResult<(ECLevel, u8)> {
    let idx = rectify_info(raw as u32, FORMAT_INFO.iter().map(|&v| v as u32), 3)
        .ok_or(DecodeError::Structural("format info unrecoverable"))?;

    let bits = idx as u8;
    Ok((ECLevel::from_bits(bits >> 3), bits & 0b111))
}

/// Decodes one 18-bit version info word.
pub fn decode_version_info(raw: u32) -> DecodeResult<Version> {
    let idx = rectify_info(raw, VERSION_INFO.iter().copied(), 3)
        .ok_or(DecodeError::Structural("version info unrecoverable"))?;

    Version::new(idx as u8 + 7)
}
