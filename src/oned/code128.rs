use crate::config::FormatTag;

use super::{best_pattern_match, pattern_variance, RowDecode};

// Symbol patterns
//------------------------------------------------------------------------------

// 6-run bar/space widths for code values 0..=105; every pattern spans 11
// modules. 103..=105 are the start codes
#[rustfmt::skip]
static CODE_PATTERNS: [[u8; 6]; 106] = [
    [2, 1, 2, 2, 2, 2], [2, 2, 2, 1, 2, 2], [2, 2, 2, 2, 2, 1], [1, 2, 1, 2, 2, 3],
    [1, 2, 1, 3, 2, 2], [1, 3, 1, 2, 2, 2], [1, 2, 2, 2, 1, 3], [1, 2, 2, 3, 1, 2],
    [1, 3, 2, 2, 1, 2], [2, 2, 1, 2, 1, 3], [2, 2, 1, 3, 1, 2], [2, 3, 1, 2, 1, 2],
    [1, 1, 2, 2, 3, 2], [1, 2, 2, 1, 3, 2], [1, 2, 2, 2, 3, 1], [1, 1, 3, 2, 2, 2],
    [1, 2, 3, 1, 2, 2], [1, 2, 3, 2, 2, 1], [2, 2, 3, 2, 1, 1], [2, 2, 1, 1, 3, 2],
    [2, 2, 1, 2, 3, 1], [2, 1, 3, 2, 1, 2], [2, 2, 3, 1, 1, 2], [3, 1, 2, 1, 3, 1],
    [3, 1, 1, 2, 2, 2], [3, 2, 1, 1, 2, 2], [3, 2, 1, 2, 2, 1], [3, 1, 2, 2, 1, 2],
    [3, 2, 2, 1, 1, 2], [3, 2, 2, 2, 1, 1], [2, 1, 2, 1, 2, 3], [2, 1, 2, 3, 2, 1],
    [2, 3, 2, 1, 2, 1], [1, 1, 1, 3, 2, 3], [1, 3, 1, 1, 2, 3], [1, 3, 1, 3, 2, 1],
    [1, 1, 2, 3, 1, 3], [1, 3, 2, 1, 1, 3], [1, 3, 2, 3, 1, 1], [2, 1, 1, 3, 1, 3],
    [2, 3, 1, 1, 1, 3], [2, 3, 1, 3, 1, 1], [1, 1, 2, 1, 3, 3], [1, 1, 2, 3, 3, 1],
    [1, 3, 2, 1, 3, 1], [1, 1, 3, 1, 2, 3], [1, 1, 3, 3, 2, 1], [1, 3, 3, 1, 2, 1],
    [3, 1, 3, 1, 2, 1], [2, 1, 1, 3, 3, 1], [2, 3, 1, 1, 3, 1], [2, 1, 3, 1, 1, 3],
    [2, 1, 3, 3, 1, 1], [2, 1, 3, 1, 3, 1], [3, 1, 1, 1, 2, 3], [3, 1, 1, 3, 2, 1],
    [3, 3, 1, 1, 2, 1], [3, 1, 2, 1, 1, 3], [3, 1, 2, 3, 1, 1], [3, 3, 2, 1, 1, 1],
    [3, 1, 4, 1, 1, 1], [2, 2, 1, 4, 1, 1], [4, 3, 1, 1, 1, 1], [1, 1, 1, 2, 2, 4],
    [1, 1, 1, 4, 2, 2], [1, 2, 1, 1, 2, 4], [1, 2, 1, 4, 2, 1], [1, 4, 1, 1, 2, 2],
    [1, 4, 1, 2, 2, 1], [1, 1, 2, 2, 1, 4], [1, 1, 2, 4, 1, 2], [1, 2, 2, 1, 1, 4],
    [1, 2, 2, 4, 1, 1], [1, 4, 2, 1, 1, 2], [1, 4, 2, 2, 1, 1], [2, 4, 1, 2, 1, 1],
    [2, 2, 1, 1, 1, 4], [4, 1, 3, 1, 1, 1], [2, 4, 1, 1, 1, 2], [1, 3, 4, 1, 1, 1],
    [1, 1, 1, 2, 4, 2], [1, 2, 1, 1, 4, 2], [1, 2, 1, 2, 4, 1], [1, 1, 4, 2, 1, 2],
    [1, 2, 4, 1, 1, 2], [1, 2, 4, 2, 1, 1], [4, 1, 1, 2, 1, 2], [4, 2, 1, 1, 1, 2],
    [4, 2, 1, 2, 1, 1], [2, 1, 2, 1, 4, 1], [2, 1, 4, 1, 2, 1], [4, 1, 2, 1, 2, 1],
    [1, 1, 1, 1, 4, 3], [1, 1, 1, 3, 4, 1], [1, 3, 1, 1, 4, 1], [1, 1, 4, 1, 1, 3],
    [1, 1, 4, 3, 1, 1], [4, 1, 1, 1, 1, 3], [4, 1, 1, 3, 1, 1], [1, 1, 3, 1, 4, 1],
    [1, 1, 4, 1, 3, 1], [3, 1, 1, 1, 4, 1], [4, 1, 1, 1, 3, 1], [2, 1, 1, 4, 1, 2],
    [2, 1, 1, 2, 1, 4], [2, 1, 1, 2, 3, 2],
];

static STOP_PATTERN: [u8; 7] = [2, 3, 3, 1, 1, 1, 2];

const START_A: usize = 103;
const START_B: usize = 104;
const START_C: usize = 105;

const CODE_SHIFT: usize = 98;
const CODE_C: usize = 99;
const CODE_B: usize = 100;
const CODE_A: usize = 101;
const FNC1: usize = 102;

const MAX_AVG_VARIANCE: f64 = 0.25;
const MAX_INDIVIDUAL_VARIANCE: f64 = 0.7;

// Row decoding
//------------------------------------------------------------------------------

/// Attempts a Code 128 read over one row's runs (even indices white).
pub(crate) fn decode_runs(runs: &[u32]) -> Option<RowDecode> {
    // Start, at least one data symbol, checksum, stop
    for i in (1..runs.len().saturating_sub(24)).step_by(2) {
        if let Some(d) = decode_at(runs, i) {
            return Some(d);
        }
    }
    None
}

fn decode_at(runs: &[u32], start: usize) -> Option<RowDecode> {
    let start_patterns: Vec<&[u8]> =
        CODE_PATTERNS[START_A..=START_C].iter().map(|p| &p[..]).collect();
    let m = best_pattern_match(
        &runs[start..start + 6],
        &start_patterns,
        MAX_AVG_VARIANCE,
        MAX_INDIVIDUAL_VARIANCE,
    )?;
    let start_code = START_A + m;

    let window_total: u32 = runs[start..start + 6].iter().sum();
    if runs[start - 1] * 2 < window_total {
        return None;
    }

    let all_patterns: Vec<&[u8]> = CODE_PATTERNS.iter().map(|p| &p[..]).collect();
    let mut codes = vec![start_code];
    let mut idx = start + 6;

    let end = loop {
        if idx + 7 <= runs.len()
            && pattern_variance(&runs[idx..idx + 7], &STOP_PATTERN, MAX_INDIVIDUAL_VARIANCE)
                .is_some_and(|v| v < MAX_AVG_VARIANCE)
        {
            break idx + 7;
        }
        if idx + 6 > runs.len() || codes.len() > 90 {
            return None;
        }
        let code = best_pattern_match(
            &runs[idx..idx + 6],
            &all_patterns,
            MAX_AVG_VARIANCE,
            MAX_INDIVIDUAL_VARIANCE,
        )?;
        codes.push(code);
        idx += 6;
    };

    // Start, one symbol and the check symbol at minimum
    if codes.len() < 3 {
        return None;
    }

    // Quiet zone after the stop, unless the symbol closes the row
    let stop_total: u32 = runs[end - 7..end].iter().sum();
    if end + 1 < runs.len() && runs[end] * 2 < stop_total {
        return None;
    }

    let check = codes.pop().unwrap();
    let mut sum = codes[0];
    for (i, &c) in codes[1..].iter().enumerate() {
        sum += (i + 1) * c;
    }
    if sum % 103 != check {
        return None;
    }

    let text = decode_codes(&codes)?;

    let lo: u32 = runs[..start].iter().sum();
    let hi: u32 = runs[..end].iter().sum();

    Some(RowDecode {
        format: FormatTag::Code128,
        bytes: text.as_bytes().to_vec(),
        text,
        lo,
        hi,
    })
}

// Code set state machine
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Set {
    A,
    B,
    C,
}

fn decode_codes(codes: &[usize]) -> Option<String> {
    let mut set = match codes[0] {
        START_A => Set::A,
        START_B => Set::B,
        START_C => Set::C,
        _ => return None,
    };

    let mut text = String::new();
    let mut shift: Option<Set> = None;

    for &code in &codes[1..] {
        let cur = shift.take().unwrap_or(set);
        match cur {
            Set::C => match code {
                0..=99 => {
                    text.push((b'0' + (code / 10) as u8) as char);
                    text.push((b'0' + (code % 10) as u8) as char);
                }
                CODE_B => set = Set::B,
                CODE_A => set = Set::A,
                FNC1 => (),
                _ => return None,
            },
            Set::B => match code {
                0..=95 => text.push((32 + code as u8) as char),
                CODE_SHIFT => shift = Some(Set::A),
                CODE_C => set = Set::C,
                CODE_A => set = Set::A,
                96 | 97 | CODE_B | FNC1 => (), // FNC2..FNC4
                _ => return None,
            },
            Set::A => match code {
                0..=63 => text.push((32 + code as u8) as char),
                64..=95 => text.push((code as u8 - 64) as char),
                CODE_SHIFT => shift = Some(Set::B),
                CODE_C => set = Set::C,
                CODE_B => set = Set::B,
                96 | 97 | CODE_A | FNC1 => (), // FNC3, FNC2, FNC4
                _ => return None,
            },
        }
    }

    Some(text)
}

#[cfg(test)]
mod code128_tests {

    use test_case::test_case;

    use super::*;

    // Run sequence of an ideal symbol from raw code values, quiet zones and
    // stop pattern included; the checksum is taken as given
    pub(crate) fn synthesize_runs(codes: &[usize], unit: u32) -> Vec<u32> {
        let mut modules: Vec<u8> = vec![11];
        for &c in codes {
            modules.extend(CODE_PATTERNS[c]);
        }
        modules.extend(STOP_PATTERN);
        modules.push(11);
        modules.iter().map(|&m| m as u32 * unit).collect()
    }

    /// Codes for a text in one set plus the correct check symbol.
    pub(crate) fn codes_for(start: usize, values: &[usize]) -> Vec<usize> {
        let mut codes = vec![start];
        codes.extend_from_slice(values);
        let mut sum = codes[0];
        for (i, &c) in codes[1..].iter().enumerate() {
            sum += (i + 1) * c;
        }
        codes.push(sum % 103);
        codes
    }

    #[test]
    fn test_all_patterns_span_eleven_modules() {
        for (i, pat) in CODE_PATTERNS.iter().enumerate() {
            assert_eq!(pat.iter().map(|&m| m as u32).sum::<u32>(), 11, "code {i}");
        }
        assert_eq!(STOP_PATTERN.iter().map(|&m| m as u32).sum::<u32>(), 13);
    }

    #[test_case(1; "unit width")]
    #[test_case(3; "triple width")]
    fn test_decode_set_b_text(unit: u32) {
        // "RUST-128" in set B
        let values: Vec<usize> =
            "RUST-128".bytes().map(|b| (b - 32) as usize).collect();
        let codes = codes_for(START_B, &values);
        let runs = synthesize_runs(&codes, unit);

        let d = decode_runs(&runs).unwrap();
        assert_eq!(d.text, "RUST-128");
        assert_eq!(d.format, FormatTag::Code128);
    }

    #[test]
    fn test_decode_set_c_digits() {
        let codes = codes_for(START_C, &[12, 34, 56]);
        let runs = synthesize_runs(&codes, 2);
        let d = decode_runs(&runs).unwrap();
        assert_eq!(d.text, "123456");
    }

    #[test]
    fn test_decode_set_switch() {
        // Digits in C, then switch to B for letters
        let codes = codes_for(START_C, &[12, CODE_B, ('A' as usize) - 32, ('B' as usize) - 32]);
        let runs = synthesize_runs(&codes, 2);
        let d = decode_runs(&runs).unwrap();
        assert_eq!(d.text, "12AB");
    }

    #[test]
    fn test_decode_shift() {
        // Set B with a one-symbol shift into A for a control char
        let values = vec![('x' as usize) - 32, CODE_SHIFT, 64 + 9, ('y' as usize) - 32];
        let codes = codes_for(START_B, &values);
        let runs = synthesize_runs(&codes, 2);
        let d = decode_runs(&runs).unwrap();
        assert_eq!(d.text, "x\ty");
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let mut codes = codes_for(START_C, &[12, 34, 56]);
        let n = codes.len();
        codes[n - 1] = (codes[n - 1] + 1) % 103;
        let runs = synthesize_runs(&codes, 2);
        assert!(decode_runs(&runs).is_none());
    }

    #[test]
    fn test_fnc1_is_transparent() {
        let codes = codes_for(START_C, &[FNC1, 12, 34]);
        let runs = synthesize_runs(&codes, 2);
        let d = decode_runs(&runs).unwrap();
        assert_eq!(d.text, "1234");
    }

    #[test]
    fn test_span_covers_symbol() {
        let codes = codes_for(START_C, &[12, 34, 56]);
        let runs = synthesize_runs(&codes, 2);
        let d = decode_runs(&runs).unwrap();
        assert_eq!(d.lo, 22);
        // 5 symbols of 11 modules plus the 13-module stop
        assert_eq!(d.hi, 22 + (5 * 11 + 13) * 2);
    }
}
