use log::debug;

use crate::binarize::BinaryMatrix;
use crate::config::DecodeConfig;

// Finder pattern
//------------------------------------------------------------------------------

/// Candidate finder pattern centre with its module size estimate. Merged
/// across scan lines before grouping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub cx: f64,
    pub cy: f64,
    pub module_size: f64,
    hits: u32,
}

impl FinderPattern {
    fn absorb(&mut self, cx: f64, cy: f64, module_size: f64) {
        let n = self.hits as f64;
        self.cx = (self.cx * n + cx) / (n + 1.0);
        self.cy = (self.cy * n + cy) / (n + 1.0);
        self.module_size = (self.module_size * n + module_size) / (n + 1.0);
        self.hits += 1;
    }

    fn matches(&self, cx: f64, cy: f64, module_size: f64) -> bool {
        let near = (self.cx - cx).abs() <= self.module_size * 2.0
            && (self.cy - cy).abs() <= self.module_size * 2.0;
        let similar = module_size <= self.module_size * 2.0
            && self.module_size <= module_size * 2.0;
        near && similar
    }
}

// Run-ratio test
//------------------------------------------------------------------------------

// Validates the 1:1:3:1:1 finder signature with a tolerance of 3/4 module
// per run, the slack needed for moderate blur and perspective
fn is_finder_ratio(runs: &[u32; 5]) -> bool {
    let total: u32 = runs.iter().sum();
    if total < 7 {
        return false;
    }

    let module = total as f64 / 7.0;
    let tol = module * 3.0 / 4.0;

    const RATIO: [f64; 5] = [1.0, 1.0, 3.0, 1.0, 1.0];
    runs.iter().zip(RATIO.iter()).all(|(&run, &r)| (run as f64 - r * module).abs() < tol)
}

// Line scanner
//------------------------------------------------------------------------------

// Rolling window of the last 5 completed run lengths along one scan line.
// Fires whenever a run boundary closes a window in finder ratio, i.e. on a
// black-to-white transition with at least 5 runs behind it
#[derive(Debug, Clone, Copy)]
struct LineScanner {
    runs: [u32; 5],
    current: u32,
    black: bool,
    flips: u32,
    pos: u32,
}

impl LineScanner {
    fn new() -> Self {
        Self { runs: [0; 5], current: 0, black: false, flips: 0, pos: 0 }
    }

    /// Feeds one pixel; returns the window's left edge when a candidate
    /// window just closed.
    fn advance(&mut self, black: bool) -> Option<(u32, [u32; 5])> {
        if black == self.black {
            self.current += 1;
            self.pos += 1;
            return None;
        }

        let closed_black = self.black;
        self.runs.rotate_left(1);
        self.runs[4] = self.current;
        self.current = 1;
        self.black = black;
        self.flips += 1;
        self.pos += 1;

        // The window must end on a black run and hold 5 complete runs
        if !closed_black || self.flips < 6 || !is_finder_ratio(&self.runs) {
            return None;
        }

        let left = self.pos - 1 - self.runs.iter().sum::<u32>();
        Some((left, self.runs))
    }

    /// Flushes the trailing run at end of line, as if one more white pixel
    /// followed. Catches symbols touching the right edge.
    fn finish(&mut self) -> Option<(u32, [u32; 5])> {
        self.advance(!self.black)
    }

    fn reset(&mut self) {
        self.runs = [0; 5];
        self.current = 0;
        self.black = false;
        self.flips = 0;
        self.pos = 0;
    }
}

// Locate finders
//------------------------------------------------------------------------------

/// Scans every row for the finder signature, cross-checking each hit along
/// the column and merging repeated sightings of the same pattern.
pub fn locate_finders(img: &BinaryMatrix, config: &DecodeConfig) -> Vec<FinderPattern> {
    let mut finders: Vec<FinderPattern> = Vec::new();
    let mut scanner = LineScanner::new();

    for y in 0..img.h {
        if config.expired() {
            break;
        }

        scanner.reset();
        let mut consume = |hit: Option<(u32, [u32; 5])>, finders: &mut Vec<FinderPattern>| {
            let (left, runs) = match hit {
                Some(h) => h,
                None => return,
            };
            if let Some((cx, cy, module)) = verify_finder(img, left, y, &runs) {
                match finders.iter_mut().find(|f| f.matches(cx, cy, module)) {
                    Some(f) => f.absorb(cx, cy, module),
                    None => {
                        finders.push(FinderPattern { cx, cy, module_size: module, hits: 1 })
                    }
                }
            }
        };

        for x in 0..img.w {
            let hit = scanner.advance(img.get(x, y));
            consume(hit, &mut finders);
        }
        consume(scanner.finish(), &mut finders);
    }

    // A real pattern is seen by several adjacent scan lines; one-off hits
    // are noise. Single-pixel modules only get one qualifying line, so they
    // are exempt
    finders.retain(|f| config.try_harder || f.module_size < 2.0 || f.hits >= 2);

    debug!("located {} finder candidates", finders.len());
    finders
}

// Cross-checks the ratio along the column through the candidate centre,
// then re-checks the row at the refined y. Returns (cx, cy, module size)
fn verify_finder(img: &BinaryMatrix, left: u32, y: u32, runs: &[u32; 5]) -> Option<(f64, f64, f64)> {
    let total: u32 = runs.iter().sum();
    let cx = left + runs[0] + runs[1] + runs[2] / 2;
    let max_run = total * 2;

    let (cy, _) = cross_check(img, cx, y, max_run, false)?;
    let (cx, module_x) = cross_check(img, cx, cy, max_run, true)?;
    let (cy, module_y) = cross_check(img, cx, cy, max_run, false)?;

    Some((cx as f64, cy as f64, (module_x + module_y) / 2.0))
}

// Walks outward from (cx, cy) along a row (horizontal) or column counting
// the five runs around the centre; validates the ratio and returns the
// refined centre coordinate along the walked axis plus the module estimate
fn cross_check(
    img: &BinaryMatrix,
    cx: u32,
    cy: u32,
    max_run: u32,
    horizontal: bool,
) -> Option<(u32, f64)> {
    let extent = if horizontal { img.w } else { img.h };
    let fixed = if horizontal { cy } else { cx };
    let start = if horizontal { cx } else { cy };

    let at = |i: u32| if horizontal { img.get(i, fixed) } else { img.get(fixed, i) };

    if !at(start) {
        return None;
    }

    let mut counts = [0u32; 5];

    // Centre black run, then white and black going backward
    let mut i = start;
    counts[2] = 1;
    while i > 0 && at(i - 1) {
        counts[2] += 1;
        i -= 1;
        if counts[2] > max_run {
            return None;
        }
    }
    for k in [1, 0] {
        let want_black = k == 0;
        while i > 0 && at(i - 1) == want_black && counts[k] <= max_run {
            counts[k] += 1;
            i -= 1;
        }
        if counts[k] == 0 || counts[k] > max_run {
            return None;
        }
    }

    // Centre run continued, then white and black going forward
    let mut i = start;
    while i + 1 < extent && at(i + 1) {
        counts[2] += 1;
        i += 1;
        if counts[2] > max_run {
            return None;
        }
    }
    for k in [3, 4] {
        let want_black = k == 4;
        while i + 1 < extent && at(i + 1) == want_black && counts[k] <= max_run {
            counts[k] += 1;
            i += 1;
        }
        if counts[k] == 0 || counts[k] > max_run {
            return None;
        }
    }

    if !is_finder_ratio(&counts) {
        return None;
    }

    // One past the last pixel of the trailing run
    let end = i + 1;
    let centre = end - counts[4] - counts[3] - counts[2] / 2;
    Some((centre, counts.iter().sum::<u32>() as f64 / 7.0))
}

// Finder group
//------------------------------------------------------------------------------

/// Three finder patterns arranged as one symbol candidate.
#[derive(Debug, Clone)]
pub struct FinderGroup {
    pub tl: FinderPattern,
    pub tr: FinderPattern,
    pub bl: FinderPattern,
    pub module_size: f64,
    /// Provisional module count per side, snapped to 4v + 17 by the sampler.
    pub dimension: u32,
}

/// Groups candidates into symbol triples: compatible module sizes, a near
/// right angle at the top-left corner, and plausible side lengths. Every
/// plausible triple is scored, then groups are picked best-score-first with
/// each finder joining at most one group, so a data-region pattern that
/// mimics a finder cannot steal a corner from the real symbol.
pub fn group_finders(finders: &[FinderPattern], config: &DecodeConfig) -> Vec<FinderGroup> {
    let mut ordered: Vec<FinderPattern> = finders.to_vec();
    ordered.sort_by(|a, b| (a.cy, a.cx).partial_cmp(&(b.cy, b.cx)).unwrap());

    let tolerance = config.module_size_tolerance.max(0.05);
    let mut all: Vec<(f64, [usize; 3], FinderGroup)> = Vec::new();

    for i in 0..ordered.len() {
        for j in (i + 1)..ordered.len() {
            for k in (j + 1)..ordered.len() {
                if config.expired() {
                    break;
                }

                if let Some((score, group)) =
                    form_group(&ordered[i], &ordered[j], &ordered[k], tolerance)
                {
                    all.push((score, [i, j, k], group));
                }
            }
        }
    }

    all.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    // A finder claimed by a better-scoring group rejects every later group
    // that shares it
    let mut used = vec![false; ordered.len()];
    let mut groups = Vec::new();
    for (_, idx, group) in all {
        if idx.iter().all(|&t| !used[t]) {
            idx.iter().for_each(|&t| used[t] = true);
            groups.push(group);
        }
    }

    debug!("formed {} finder groups", groups.len());
    groups
}

fn form_group(
    a: &FinderPattern,
    b: &FinderPattern,
    c: &FinderPattern,
    tolerance: f64,
) -> Option<(f64, FinderGroup)> {
    // Module size consistency across the triple
    let avg = (a.module_size + b.module_size + c.module_size) / 3.0;
    let mut size_spread = 0.0;
    for f in [a, b, c] {
        let dev = (f.module_size - avg).abs();
        if dev > avg * tolerance {
            return None;
        }
        size_spread += dev / avg;
    }

    // The top-left corner is opposite the longest side
    let dab = dist(a, b);
    let dbc = dist(b, c);
    let dca = dist(c, a);
    let (tl, p, q) = if dbc >= dab && dbc >= dca {
        (a, b, c)
    } else if dca >= dab && dca >= dbc {
        (b, c, a)
    } else {
        (c, a, b)
    };

    // Right angle at the corner, within ~15 degrees
    let v1 = (p.cx - tl.cx, p.cy - tl.cy);
    let v2 = (q.cx - tl.cx, q.cy - tl.cy);
    let (l1, l2) = (dist(tl, p), dist(tl, q));
    if l1 == 0.0 || l2 == 0.0 {
        return None;
    }
    let cos = (v1.0 * v2.0 + v1.1 * v2.1) / (l1 * l2);
    if cos.abs() > 0.26 {
        return None;
    }

    // Sides of the square must be close in length
    let asymmetry = (l1 / l2).max(l2 / l1) - 1.0;
    if asymmetry > tolerance {
        return None;
    }

    // Orient: with y down, TL -> TR cross TL -> BL must be positive
    let cross = v1.0 * v2.1 - v1.1 * v2.0;
    let (tr, bl) = if cross > 0.0 { (p, q) } else { (q, p) };

    // Distance between finder centres spans (dimension - 7) modules
    let raw = ((l1 + l2) / (2.0 * avg)).round() as u32 + 7;
    let dimension = snap_dimension(raw)?;

    // Lower is better; the true corner triple of a symbol scores near zero
    // on all three terms
    let score = size_spread + cos.abs() + asymmetry;

    Some((score, FinderGroup { tl: *tl, tr: *tr, bl: *bl, module_size: avg, dimension }))
}

// Nearest legal dimension (4v + 17); within one module of the estimate
fn snap_dimension(raw: u32) -> Option<u32> {
    for delta in [0i32, 1, -1, 2, -2] {
        let d = raw as i32 + delta;
        if d >= 21 && d <= 177 && (d - 17) % 4 == 0 {
            return Some(d as u32);
        }
    }
    None
}

fn dist(a: &FinderPattern, b: &FinderPattern) -> f64 {
    ((a.cx - b.cx).powi(2) + (a.cy - b.cy).powi(2)).sqrt()
}
