use crate::config::{DecodeConfig, FormatTag};

use super::{best_pattern_match, pattern_variance, RowDecode};

// Digit patterns
//------------------------------------------------------------------------------

// Left-half "A" (odd parity) patterns; 4 runs summing 7 modules, starting
// with a space
static A_PATTERNS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

// Left-half "B" (even parity) patterns; run-width mirror of A
static B_PATTERNS: [[u8; 4]; 10] = [
    [1, 1, 2, 3],
    [1, 2, 2, 2],
    [2, 2, 1, 2],
    [1, 1, 4, 1],
    [2, 3, 1, 1],
    [1, 3, 2, 1],
    [4, 1, 1, 1],
    [2, 1, 3, 1],
    [3, 1, 2, 1],
    [2, 1, 1, 3],
];

// Right-half patterns share A's run widths (colours invert, widths do not)

/// Parity of the six left digits encodes the implicit first digit;
/// `true` marks a B-pattern position.
static FIRST_DIGIT_PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

static GUARD: [u8; 3] = [1, 1, 1];
static CENTRE_GUARD: [u8; 5] = [1, 1, 1, 1, 1];

const MAX_AVG_VARIANCE: f64 = 0.48;
const MAX_INDIVIDUAL_VARIANCE: f64 = 0.7;

// Row decoding
//------------------------------------------------------------------------------

/// Attempts an EAN-13/UPC-A read over one row's runs (even indices white).
/// Returns the first span that parses with a valid checksum.
pub(crate) fn decode_runs(runs: &[u32], config: &DecodeConfig) -> Option<RowDecode> {
    // 3 + 24 + 5 + 24 + 3 runs from the start guard onward
    for i in (1..runs.len().saturating_sub(58)).step_by(2) {
        if let Some(d) = decode_at(runs, i, config) {
            return Some(d);
        }
    }
    None
}

fn decode_at(runs: &[u32], start: usize, config: &DecodeConfig) -> Option<RowDecode> {
    let guard_total: u32 = runs[start..start + 3].iter().sum();
    if pattern_variance(&runs[start..start + 3], &GUARD, MAX_INDIVIDUAL_VARIANCE)?
        >= MAX_AVG_VARIANCE
    {
        return None;
    }

    // Quiet zone at least the width of the start guard
    if runs[start - 1] < guard_total {
        return None;
    }

    let mut digits = [0u8; 13];
    let mut parity = [false; 6];
    let mut idx = start + 3;

    // Left half: best match across both parities
    let left_patterns: Vec<&[u8]> =
        A_PATTERNS.iter().chain(B_PATTERNS.iter()).map(|p| &p[..]).collect();
    for d in 0..6 {
        let m = best_pattern_match(
            &runs[idx..idx + 4],
            &left_patterns,
            MAX_AVG_VARIANCE,
            MAX_INDIVIDUAL_VARIANCE,
        )?;
        digits[1 + d] = (m % 10) as u8;
        parity[d] = m >= 10;
        idx += 4;
    }

    if pattern_variance(&runs[idx..idx + 5], &CENTRE_GUARD, MAX_INDIVIDUAL_VARIANCE)?
        >= MAX_AVG_VARIANCE
    {
        return None;
    }
    idx += 5;

    // Right half
    let right_patterns: Vec<&[u8]> = A_PATTERNS.iter().map(|p| &p[..]).collect();
    for d in 0..6 {
        let m = best_pattern_match(
            &runs[idx..idx + 4],
            &right_patterns,
            MAX_AVG_VARIANCE,
            MAX_INDIVIDUAL_VARIANCE,
        )?;
        digits[7 + d] = m as u8;
        idx += 4;
    }

    if pattern_variance(&runs[idx..idx + 3], &GUARD, MAX_INDIVIDUAL_VARIANCE)?
        >= MAX_AVG_VARIANCE
    {
        return None;
    }
    let end = idx + 3;

    // Quiet zone after the end guard, unless the symbol closes the row
    if end + 1 < runs.len() && runs[end] < guard_total {
        return None;
    }

    digits[0] = FIRST_DIGIT_PARITY.iter().position(|m| *m == parity)? as u8;

    if !checksum(&digits) {
        return None;
    }

    // UPC-A is EAN-13 with an implicit leading zero; the reported format
    // follows what the caller asked for
    let upca = digits[0] == 0 && config.wants(FormatTag::UpcA) && !config.wants(FormatTag::Ean13);
    if !upca && !config.wants(FormatTag::Ean13) {
        return None;
    }
    let visible = if upca { &digits[1..] } else { &digits[..] };
    let text: String = visible.iter().map(|&d| (b'0' + d) as char).collect();

    let lo: u32 = runs[..start].iter().sum();
    let hi: u32 = runs[..end].iter().sum();

    Some(RowDecode {
        format: if upca { FormatTag::UpcA } else { FormatTag::Ean13 },
        bytes: text.as_bytes().to_vec(),
        text,
        lo,
        hi,
    })
}

fn checksum(digits: &[u8; 13]) -> bool {
    let mut sum = 0u32;
    for (i, &d) in digits.iter().take(12).enumerate() {
        sum += d as u32 * if i % 2 == 0 { 1 } else { 3 };
    }
    (10 - sum % 10) % 10 == digits[12] as u32
}
