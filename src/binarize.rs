use image::GrayImage;

use crate::geometry::Point;

// Binary matrix
//------------------------------------------------------------------------------

/// Black/white classification of a grayscale image, row-major, `true` for
/// ink (black). Produced once per decode call and shared read-only by every
/// detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMatrix {
    bits: Vec<bool>,
    pub w: u32,
    pub h: u32,
}

// Block-adaptive binarization
// Steps:
// 1. Divide the image into blocks of 8x8 pixels. The last fractional block
//    along each edge is computed from the trailing 8 pixels, so a few pixels
//    may contribute to 2 blocks
// 2. Average each block; a low-variance block takes its min luminance halved,
//    or inherits its neighbours' average when that is brighter, so flat
//    regions classify as a single colour instead of speckle
// 3. Threshold each block by averaging the 5x5 blocks around it
// 4. A pixel is black if its value is less than or equal to its block
//    threshold. Equal goes to black so an all-zero region thresholds to black
//------------------------------------------------------------------------------

impl BinaryMatrix {
    pub fn binarize(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();

        if w < 8 || h < 8 {
            return Self::binarize_global(img);
        }

        let wsteps = block_count(w);

        let avg = block_averages(img);
        let thresh = block_thresholds(&avg, w, h);

        let mut bits = vec![false; (w * h) as usize];
        for y in 0..h {
            let row_off = y * w;
            let thresh_row_off = (y >> 3) * wsteps;
            for x in 0..w {
                let p = img.get_pixel(x, y)[0];
                let t = thresh[(thresh_row_off + (x >> 3)) as usize];
                if p <= t {
                    bits[(row_off + x) as usize] = true;
                }
            }
        }

        Self { bits, w, h }
    }

    // Midpoint threshold for images too small to carry 8x8 blocks
    fn binarize_global(img: &GrayImage) -> Self {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Self { bits: Vec::new(), w, h };
        }

        let (mut mn, mut mx) = (u8::MAX, u8::MIN);
        for p in img.pixels() {
            mn = mn.min(p[0]);
            mx = mx.max(p[0]);
        }

        // Flat input has no contrast to split on; call it one colour
        if mn == mx {
            let bits = vec![mn <= 127; (w * h) as usize];
            return Self { bits, w, h };
        }

        let t = mn as u16 + (mx as u16 - mn as u16) / 2;
        let bits = img.pixels().map(|p| (p[0] as u16) <= t).collect();
        Self { bits, w, h }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        debug_assert!(x < self.w && y < self.h, "Out of bounds: ({x}, {y})");
        self.bits[(y * self.w + x) as usize]
    }

    pub fn get_at(&self, pt: &Point) -> Option<bool> {
        if pt.x < 0 || pt.y < 0 || pt.x as u32 >= self.w || pt.y as u32 >= self.h {
            return None;
        }
        Some(self.get(pt.x as u32, pt.y as u32))
    }

    /// Clockwise quarter turn. Lets the linear-format scanner reuse its row
    /// driver for vertical symbols.
    pub fn rotate_cw(&self) -> Self {
        let (w, h) = (self.h, self.w);
        let mut bits = vec![false; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                bits[(y * w + x) as usize] = self.get(y, self.h - 1 - x);
            }
        }
        Self { bits, w, h }
    }

    /// Map a point in the rotated matrix back into this matrix's frame.
    pub fn unrotate_point(&self, pt: &Point) -> Point {
        Point { x: pt.y, y: self.h as i32 - 1 - pt.x }
    }

    /// Run-length encoding of one row. The first run is white and may be
    /// zero-width, so even indices are always white and odd indices black.
    pub fn row_runs(&self, y: u32) -> Vec<u32> {
        let mut runs = vec![0u32];
        let mut black = false;
        for x in 0..self.w {
            if self.get(x, y) == black {
                *runs.last_mut().unwrap() += 1;
            } else {
                runs.push(1);
                black = !black;
            }
        }
        runs
    }

    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.w, self.h, |x, y| {
            image::Luma([if self.get(x, y) { 0 } else { 255 }])
        })
    }

    #[cfg(test)]
    pub fn from_fn<F: Fn(u32, u32) -> bool>(w: u32, h: u32, f: F) -> Self {
        let mut bits = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                bits.push(f(x, y));
            }
        }
        Self { bits, w, h }
    }
}

fn block_count(extent: u32) -> u32 {
    let mut steps = extent >> 3;
    if extent & 0b111 != 0 {
        steps += 1;
    }
    steps
}

fn block_averages(img: &GrayImage) -> Vec<usize> {
    let (w, h) = img.dimensions();
    let wsteps = block_count(w);
    let hsteps = block_count(h);
    let len = (wsteps * hsteps) as usize;

    let mut avg = vec![0usize; len];
    let mut min_max = vec![(u8::MAX, u8::MIN); len];

    let mut tally = |idx: usize, p: u8| {
        avg[idx] += p as usize;
        min_max[idx].0 = std::cmp::min(min_max[idx].0, p);
        min_max[idx].1 = std::cmp::max(min_max[idx].1, p);
    };

    // Whole blocks; fractional edge blocks are filled from the trailing 8
    // pixels below
    let (wr, hr) = (w & !0b111, h & !0b111);
    for y in 0..hr {
        let row_off = (y >> 3) * wsteps;
        for x in 0..wr {
            tally((row_off + (x >> 3)) as usize, img.get_pixel(x, y)[0]);
        }
    }

    if wr < w {
        for y in 0..h {
            let idx = (((y >> 3).min(hsteps - 1) + 1) * wsteps - 1) as usize;
            for x in w - 8..w {
                tally(idx, img.get_pixel(x, y)[0]);
            }
        }
    }

    if hr < h {
        let last_row = wsteps * (hsteps - 1);
        for y in h - 8..h {
            for x in 0..wr {
                tally((last_row + (x >> 3)) as usize, img.get_pixel(x, y)[0]);
            }
        }
    }

    // Low-variance blocks (<= 24) have no local contrast to threshold
    // against; assume background unless the neighbourhood disagrees
    let wsteps = wsteps as usize;
    for i in 0..len {
        let (mn, mx) = min_max[i];
        if mx.saturating_sub(mn) <= 24 {
            avg[i] = mn as usize / 2;
            if i > wsteps {
                let ng_avg = (2 * avg[i - 1] + avg[i - wsteps] + avg[i - wsteps - 1]) / 4;
                if (mn as usize) < ng_avg {
                    avg[i] = ng_avg;
                }
            }
        } else {
            avg[i] >>= 6;
        }
    }

    avg
}

fn block_thresholds(avg: &[usize], w: u32, h: u32) -> Vec<u8> {
    let wsteps = block_count(w) as usize;
    let hsteps = block_count(h) as usize;

    let maxx = wsteps.saturating_sub(3).max(2);
    let maxy = hsteps.saturating_sub(3).max(2);
    let mut res = vec![0u8; wsteps * hsteps];

    for y in 0..hsteps {
        let row_off = y * wsteps;
        let cy = y.clamp(2, maxy);
        for x in 0..wsteps {
            let cx = x.clamp(2, maxx);
            let mut sum = 0usize;
            let mut cnt = 0usize;

            for ny in cy.saturating_sub(2)..=(cy + 2).min(hsteps - 1) {
                for nx in cx.saturating_sub(2)..=(cx + 2).min(wsteps - 1) {
                    sum += avg[ny * wsteps + nx];
                    cnt += 1;
                }
            }

            res[row_off + x] = (sum / cnt) as u8;
        }
    }
    res
}
