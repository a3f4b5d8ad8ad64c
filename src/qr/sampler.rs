use crate::binarize::BinaryMatrix;
use crate::error::{DecodeError, DecodeResult};
use crate::geometry::{Axis, BresenhamLine, Homography, Point, X, Y};

use super::finder::FinderGroup;
use super::version::Version;

// Module grid
//------------------------------------------------------------------------------

/// Square bit grid sampled from a detected symbol, `true` for dark modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGrid {
    bits: Vec<bool>,
    pub dim: u32,
}

impl ModuleGrid {
    pub fn new(dim: u32) -> Self {
        Self { bits: vec![false; (dim * dim) as usize], dim }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        debug_assert!(x < self.dim && y < self.dim, "Out of grid bounds: ({x}, {y})");
        self.bits[(y * self.dim + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, bit: bool) {
        self.bits[(y * self.dim + x) as usize] = bit;
    }
}

// Grid sampling
//------------------------------------------------------------------------------

/// Resolves a finder group into a module grid. The three finder centres plus
/// either the bottom-right alignment pattern (version 2 and up) or the
/// extrapolated fourth corner anchor a perspective transform; each module is
/// then sampled at its centre with a small majority vote.
pub fn sample_grid(
    img: &BinaryMatrix,
    group: &FinderGroup,
) -> DecodeResult<(ModuleGrid, Version, [Point; 4])> {
    let dim = group.dimension;
    let ver = Version::from_dimension(dim)?;
    let span = (dim - 7) as f64;

    let tl = (group.tl.cx, group.tl.cy);
    let tr = (group.tr.cx, group.tr.cy);
    let bl = (group.bl.cx, group.bl.cy);

    // Affine estimate of a module coordinate, good enough to seed the
    // alignment search and the fallback corner
    let affine = |u: f64, v: f64| {
        let fu = (u - 3.5) / span;
        let fv = (v - 3.5) / span;
        (
            tl.0 + (tr.0 - tl.0) * fu + (bl.0 - tl.0) * fv,
            tl.1 + (tr.1 - tl.1) * fu + (bl.1 - tl.1) * fv,
        )
    };

    // The timing patterns between the finders must show roughly one
    // transition per module, or the triple is not a symbol
    verify_timing(img, dim, affine(8.5, 6.5), affine(dim as f64 - 8.5, 6.5))?;
    verify_timing(img, dim, affine(6.5, 8.5), affine(6.5, dim as f64 - 8.5))?;

    // Fourth correspondence: the bottom-right alignment pattern when the
    // version carries one, the parallelogram corner otherwise
    let (src4, dst4) = if ver.number() >= 2 {
        let centre = dim as f64 - 6.5;
        let est = affine(centre, centre);
        let found = locate_alignment(img, est, group.module_size);
        (
            (centre, centre),
            found.unwrap_or(est),
        )
    } else {
        ((dim as f64 - 3.5, dim as f64 - 3.5), affine(dim as f64 - 3.5, dim as f64 - 3.5))
    };

    let src = [(3.5, 3.5), (dim as f64 - 3.5, 3.5), (3.5, dim as f64 - 3.5), src4];
    let dst = [tl, tr, bl, dst4];
    let h = Homography::compute(src, dst)?;

    // Majority vote over the centre pixel and its 4-neighbourhood; modules
    // under ~2.5 px would vote across module boundaries, so they sample the
    // centre alone
    let vote = group.module_size >= 2.5;
    let mut grid = ModuleGrid::new(dim);
    for y in 0..dim {
        for x in 0..dim {
            let (px, py) = h.map(x as f64 + 0.5, y as f64 + 0.5)?;
            let centre = Point { x: px.round() as i32, y: py.round() as i32 };
            let bit = if vote {
                let mut dark = 0;
                for (dx, dy) in [(0, 0), (1, 0), (-1, 0), (0, 1), (0, -1)] {
                    let p = Point { x: centre.x + dx, y: centre.y + dy };
                    // Off-image samples count as quiet zone
                    if img.get_at(&p).unwrap_or(false) {
                        dark += 1;
                    }
                }
                dark >= 3
            } else {
                img.get_at(&centre).unwrap_or(false)
            };
            grid.set(x, y, bit);
        }
    }

    let corners = [
        h.map_point(0.0, 0.0)?,
        h.map_point(dim as f64, 0.0)?,
        h.map_point(dim as f64, dim as f64)?,
        h.map_point(0.0, dim as f64)?,
    ];

    Ok((grid, ver, corners))
}

// Timing verification
//------------------------------------------------------------------------------

// Counts colour transitions along the line between the first and last
// timing module centres; a real symbol shows dim - 17 of them
fn verify_timing(
    img: &BinaryMatrix,
    dim: u32,
    from: (f64, f64),
    to: (f64, f64),
) -> DecodeResult<()> {
    let from = Point { x: from.0.round() as i32, y: from.1.round() as i32 };
    let to = Point { x: to.0.round() as i32, y: to.1.round() as i32 };

    let transitions = if (to.x - from.x).abs() >= (to.y - from.y).abs() {
        timing_scan::<X>(img, &from, &to)
    } else {
        timing_scan::<Y>(img, &from, &to)
    };

    let expect = dim - 17;
    let slack = expect.div_ceil(2);
    if transitions + slack < expect || transitions > expect + slack {
        return Err(DecodeError::Sample("timing pattern mismatch"));
    }
    Ok(())
}

fn timing_scan<A: Axis>(img: &BinaryMatrix, from: &Point, to: &Point) -> u32
where
    BresenhamLine<A>: Iterator<Item = Point>,
{
    let mut transitions = 0;
    let mut last = None;
    for p in BresenhamLine::<A>::new(from, to) {
        let color = match img.get_at(&p) {
            Some(c) => c,
            None => continue,
        };
        if last.is_some_and(|l| l != color) {
            transitions += 1;
        }
        last = Some(color);
    }
    transitions
}

// Alignment pattern search
//------------------------------------------------------------------------------

// Scans a window around the estimated centre for the 1:1:1 alignment
// signature along the row, cross-checked along the column
fn locate_alignment(img: &BinaryMatrix, est: (f64, f64), module: f64) -> Option<(f64, f64)> {
    let radius = (module * 3.0).ceil() as i32;
    let (ex, ey) = (est.0.round() as i32, est.1.round() as i32);

    let mut best: Option<((f64, f64), f64)> = None;
    for dy in -radius..=radius {
        let y = ey + dy;
        if y < 0 || y as u32 >= img.h {
            continue;
        }
        for dx in -radius..=radius {
            let x = ex + dx;
            if x < 0 || x as u32 >= img.w {
                continue;
            }
            if !img.get(x as u32, y as u32) {
                continue;
            }

            if let Some((cx, cy)) = check_alignment(img, x as u32, y as u32, module) {
                let d = (cx - est.0).powi(2) + (cy - est.1).powi(2);
                if best.map_or(true, |(_, bd)| d < bd) {
                    best = Some(((cx, cy), d));
                }
            }
        }
    }

    best.map(|(c, _)| c)
}

// Verifies a solitary dark square of roughly one module around (x, y)
fn check_alignment(img: &BinaryMatrix, x: u32, y: u32, module: f64) -> Option<(f64, f64)> {
    let max_run = (module * 2.0).ceil() as u32 + 1;

    let run = |horizontal: bool| -> Option<(u32, u32)> {
        let extent = if horizontal { img.w } else { img.h };
        let at = |i: u32| if horizontal { img.get(i, y) } else { img.get(x, i) };
        let start = if horizontal { x } else { y };

        let mut lo = start;
        while lo > 0 && at(lo - 1) {
            lo -= 1;
            if start - lo > max_run {
                return None;
            }
        }
        let mut hi = start;
        while hi + 1 < extent && at(hi + 1) {
            hi += 1;
            if hi - start > max_run {
                return None;
            }
        }
        Some((lo, hi))
    };

    let (lx, hx) = run(true)?;
    let (ly, hy) = run(false)?;

    let w = (hx - lx + 1) as f64;
    let h = (hy - ly + 1) as f64;

    // One module wide within tolerance, in both directions
    if w < module * 0.4 || w > module * 1.8 || h < module * 0.4 || h > module * 1.8 {
        return None;
    }

    Some(((lx + hx) as f64 / 2.0, (ly + hy) as f64 / 2.0))
}
