pub mod code128;
pub mod ean13;

use log::debug;

use crate::binarize::BinaryMatrix;
use crate::config::{DecodeConfig, FormatTag};
use crate::geometry::Point;
use crate::types::DecodedSymbol;

// Pattern variance matching
//------------------------------------------------------------------------------

/// Average deviation between a run window and a module pattern, as a
/// fraction of the window width. `None` when any single run deviates by more
/// than `max_individual` modules' worth.
pub(crate) fn pattern_variance(runs: &[u32], pattern: &[u8], max_individual: f64) -> Option<f64> {
    debug_assert_eq!(runs.len(), pattern.len());

    let total: u32 = runs.iter().sum();
    let modules: u32 = pattern.iter().map(|&p| p as u32).sum();
    if total < modules {
        return None;
    }

    let unit = total as f64 / modules as f64;
    let limit = max_individual * unit;

    let mut variance = 0.0;
    for (&run, &pat) in runs.iter().zip(pattern.iter()) {
        let v = (run as f64 - pat as f64 * unit).abs();
        if v > limit {
            return None;
        }
        variance += v;
    }
    Some(variance / total as f64)
}

/// Best-scoring pattern index under the average-variance cap.
pub(crate) fn best_pattern_match(
    runs: &[u32],
    patterns: &[&[u8]],
    max_avg: f64,
    max_individual: f64,
) -> Option<usize> {
    let mut best = None;
    for (i, pat) in patterns.iter().enumerate() {
        if let Some(v) = pattern_variance(runs, pat, max_individual) {
            if v < max_avg && best.map_or(true, |(_, bv)| v < bv) {
                best = Some((i, v));
            }
        }
    }
    best.map(|(i, _)| i)
}

// Row decode result
//------------------------------------------------------------------------------

/// One successful decode along one scan line, in row-local pixel
/// coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowDecode {
    pub format: FormatTag,
    pub text: String,
    pub bytes: Vec<u8>,
    /// Pixel span of the symbol within the row, start guard to end guard.
    pub lo: u32,
    pub hi: u32,
}

// Runs helpers
//------------------------------------------------------------------------------

/// Mirror of a run sequence that preserves the even-is-white invariant, for
/// right-to-left symbols.
pub(crate) fn reversed_runs(runs: &[u32]) -> Vec<u32> {
    let mut rev: Vec<u32> = runs.to_vec();
    if rev.len() % 2 == 0 {
        // Row ended on a black run; a zero-width white run keeps parity
        rev.push(0);
    }
    rev.reverse();
    rev
}

// Scan driver
//------------------------------------------------------------------------------

struct RowHit {
    decode: RowDecode,
    y: u32,
    rotated: bool,
}

/// Scans rows of the matrix and of its quarter turn, both directions, every
/// `row_step`-th line. Hits on adjacent lines merge into one symbol.
pub(crate) fn detect(img: &BinaryMatrix, config: &DecodeConfig) -> Vec<DecodedSymbol> {
    let want_ean = config.wants(FormatTag::Ean13) || config.wants(FormatTag::UpcA);
    let want_128 = config.wants(FormatTag::Code128);

    let rotated = img.rotate_cw();
    let mut hits: Vec<RowHit> = Vec::new();

    for (mat, is_rotated) in [(img, false), (&rotated, true)] {
        let step = config.effective_row_step();
        let mut y = 0;
        while y < mat.h {
            if config.expired() {
                break;
            }

            let runs = mat.row_runs(y);
            if runs.len() >= 4 {
                scan_row(&runs, mat.w, want_ean, want_128, config, |decode| {
                    hits.push(RowHit { decode, y, rotated: is_rotated });
                });
            }
            y += step;
        }
    }

    debug!("linear scan produced {} row hits", hits.len());
    merge_hits(img, hits, config)
}

fn scan_row(
    runs: &[u32],
    width: u32,
    want_ean: bool,
    want_128: bool,
    config: &DecodeConfig,
    mut sink: impl FnMut(RowDecode),
) {
    let reversed = reversed_runs(runs);

    for (seq, flipped) in [(runs, false), (&reversed[..], true)] {
        if want_ean {
            if let Some(mut d) = ean13::decode_runs(seq, config) {
                if flipped {
                    (d.lo, d.hi) = (width - d.hi, width - d.lo);
                }
                sink(d);
            }
        }
        if want_128 {
            if let Some(mut d) = code128::decode_runs(seq) {
                if flipped {
                    (d.lo, d.hi) = (width - d.hi, width - d.lo);
                }
                sink(d);
            }
        }
    }
}

// Groups row hits that agree on content and overlap horizontally; each
// cluster becomes one DecodedSymbol spanning the rows it was seen on
fn merge_hits(img: &BinaryMatrix, hits: Vec<RowHit>, config: &DecodeConfig) -> Vec<DecodedSymbol> {
    struct Cluster {
        format: FormatTag,
        text: String,
        bytes: Vec<u8>,
        lo: u32,
        hi: u32,
        y_min: u32,
        y_max: u32,
        rotated: bool,
    }

    let row_gap = config.effective_row_step() * 4 + 1;
    let mut clusters: Vec<Cluster> = Vec::new();

    for hit in hits {
        let d = hit.decode;
        let found = clusters.iter_mut().find(|c| {
            c.rotated == hit.rotated
                && c.format == d.format
                && c.text == d.text
                && c.lo < d.hi
                && d.lo < c.hi
                && hit.y.saturating_sub(c.y_max) <= row_gap
        });
        match found {
            Some(c) => {
                c.lo = c.lo.min(d.lo);
                c.hi = c.hi.max(d.hi);
                c.y_min = c.y_min.min(hit.y);
                c.y_max = c.y_max.max(hit.y);
            }
            None => clusters.push(Cluster {
                format: d.format,
                text: d.text,
                bytes: d.bytes,
                lo: d.lo,
                hi: d.hi,
                y_min: hit.y,
                y_max: hit.y,
                rotated: hit.rotated,
            }),
        }
    }

    clusters
        .into_iter()
        .map(|c| {
            let mut corners = [
                Point { x: c.lo as i32, y: c.y_min as i32 },
                Point { x: c.hi as i32, y: c.y_min as i32 },
                Point { x: c.hi as i32, y: c.y_max as i32 },
                Point { x: c.lo as i32, y: c.y_max as i32 },
            ];
            if c.rotated {
                for p in corners.iter_mut() {
                    *p = img.unrotate_point(p);
                }
            }
            DecodedSymbol {
                format: c.format,
                text: c.text,
                bytes: c.bytes,
                corners,
                corrected: 0,
                structured_append: None,
                eci: None,
            }
        })
        .collect()
}
