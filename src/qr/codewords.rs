use crate::common::rs::Block;
use crate::error::{DecodeError, DecodeResult};

use super::format_info::{decode_format_info, decode_version_info};
use super::sampler::ModuleGrid;
use super::version::{BlockLayout, ECLevel, Version};

// Mask pattern
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> Self {
        debug_assert!(pattern < 8, "Invalid mask pattern: {pattern}");
        Self(pattern)
    }

    /// Whether the mask inverts the module at (row i, column j).
    #[inline]
    pub fn inverts(&self, i: u32, j: u32) -> bool {
        let (i, j) = (i as u64, j as u64);
        match self.0 {
            0 => (i + j) % 2 == 0,
            1 => i % 2 == 0,
            2 => j % 3 == 0,
            3 => (i + j) % 3 == 0,
            4 => (i / 2 + j / 3) % 2 == 0,
            5 => (i * j) % 2 + (i * j) % 3 == 0,
            6 => ((i * j) % 2 + (i * j) % 3) % 2 == 0,
            _ => ((i + j) % 2 + (i * j) % 3) % 2 == 0,
        }
    }
}

// Function module map
//------------------------------------------------------------------------------

/// Marks every module that belongs to a function pattern or an info field;
/// the zig-zag walk skips these.
pub struct FunctionMask {
    reserved: Vec<bool>,
    dim: u32,
}

impl FunctionMask {
    pub fn new(ver: Version) -> Self {
        let dim = ver.dimension();
        let mut mask = Self { reserved: vec![false; (dim * dim) as usize], dim };

        // Finders with separators and the format info strips around them
        mask.fill(0, 0, 9, 9);
        mask.fill(dim - 8, 0, 8, 9);
        mask.fill(0, dim - 8, 9, 8);

        // Timing patterns
        mask.fill(0, 6, dim, 1);
        mask.fill(6, 0, 1, dim);

        // Alignment patterns, skipping the three finder corners
        let centres = ver.alignment_centres();
        for &cy in centres {
            for &cx in centres {
                let (cx, cy) = (cx as u32, cy as u32);
                let in_finder = (cx <= 8 && cy <= 8)
                    || (cx >= dim - 9 && cy <= 8)
                    || (cx <= 8 && cy >= dim - 9);
                if !in_finder {
                    mask.fill(cx - 2, cy - 2, 5, 5);
                }
            }
        }

        // Version info blocks
        if ver.has_version_info() {
            mask.fill(dim - 11, 0, 3, 6);
            mask.fill(0, dim - 11, 6, 3);
        }

        mask
    }

    fn fill(&mut self, x: u32, y: u32, w: u32, h: u32) {
        for j in y..y + h {
            for i in x..x + w {
                self.reserved[(j * self.dim + i) as usize] = true;
            }
        }
    }

    #[inline]
    pub fn is_reserved(&self, x: u32, y: u32) -> bool {
        self.reserved[(y * self.dim + x) as usize]
    }

    #[cfg(test)]
    pub fn data_module_count(&self) -> usize {
        self.reserved.iter().filter(|&&r| !r).count()
    }
}

// Info field extraction
//------------------------------------------------------------------------------

/// Reads both format info copies; either one decoding within the BCH
/// correction radius is accepted.
pub fn read_format_info(grid: &ModuleGrid) -> DecodeResult<(ECLevel, MaskPattern)> {
    let dim = grid.dim;

    let mut copy1 = 0u16;
    for (x, y) in [(0, 8), (1, 8), (2, 8), (3, 8), (4, 8), (5, 8), (7, 8), (8, 8), (8, 7)] {
        copy1 = (copy1 << 1) | grid.get(x, y) as u16;
    }
    for y in (0..6).rev() {
        copy1 = (copy1 << 1) | grid.get(8, y) as u16;
    }

    let mut copy2 = 0u16;
    for y in (dim - 7..dim).rev() {
        copy2 = (copy2 << 1) | grid.get(8, y) as u16;
    }
    for x in dim - 8..dim {
        copy2 = (copy2 << 1) | grid.get(x, 8) as u16;
    }

    decode_format_info(copy1)
        .or_else(|_| decode_format_info(copy2))
        .map(|(ecl, mask)| (ecl, MaskPattern::new(mask)))
}

/// Reads both version info copies for symbols large enough to carry them.
pub fn read_version_info(grid: &ModuleGrid) -> DecodeResult<Version> {
    let dim = grid.dim;

    let mut copy1 = 0u32;
    for y in (0..6).rev() {
        for x in (dim - 11..=dim - 9).rev() {
            copy1 = (copy1 << 1) | grid.get(x, y) as u32;
        }
    }

    let mut copy2 = 0u32;
    for x in (0..6).rev() {
        for y in (dim - 11..=dim - 9).rev() {
            copy2 = (copy2 << 1) | grid.get(x, y) as u32;
        }
    }

    decode_version_info(copy1).or_else(|_| decode_version_info(copy2))
}

// Codeword extraction
//------------------------------------------------------------------------------

/// Unmasks the data region and walks the zig-zag column pairs, right to
/// left, packing data modules into codewords. Remainder bits beyond the last
/// codeword are dropped.
pub fn extract_codewords(grid: &ModuleGrid, ver: Version, mask: MaskPattern) -> Vec<u8> {
    let dim = grid.dim;
    let function = FunctionMask::new(ver);
    let total = ver.total_codewords();

    let mut codewords = Vec::with_capacity(total);
    let mut acc = 0u8;
    let mut bits = 0u8;

    let mut col = dim as i32 - 1;
    let mut upward = true;
    while col > 0 {
        // The vertical timing column shifts the walk left by one
        if col == 6 {
            col -= 1;
        }

        let rows: Box<dyn Iterator<Item = u32>> = if upward {
            Box::new((0..dim).rev())
        } else {
            Box::new(0..dim)
        };

        for y in rows {
            for dx in 0..2 {
                let x = (col - dx) as u32;
                if function.is_reserved(x, y) {
                    continue;
                }
                let bit = grid.get(x, y) ^ mask.inverts(y, x);
                acc = (acc << 1) | bit as u8;
                bits += 1;
                if bits == 8 {
                    if codewords.len() < total {
                        codewords.push(acc);
                    }
                    acc = 0;
                    bits = 0;
                }
            }
        }

        upward = !upward;
        col -= 2;
    }

    codewords
}

// Block deinterleaving
//------------------------------------------------------------------------------

/// Splits the interleaved codeword stream back into its error-correction
/// blocks: data codewords round-robin across blocks (short blocks first),
/// then ecc codewords round-robin.
pub fn deinterleave(data: &[u8], layout: BlockLayout) -> DecodeResult<Vec<Block>> {
    let (b1c, b1s) = layout.group1;
    let (b2c, b2s) = layout.group2;
    let total_blks = layout.block_count();
    let data_sz = b1s * b1c + b2s * b2c;

    if data.len() != data_sz + layout.ec_len * total_blks {
        return Err(DecodeError::Structural("codeword count mismatch"));
    }

    let mut dilvd = vec![Vec::with_capacity(b1s.max(b2s) + layout.ec_len); total_blks];

    // Data: every block participates for the first b1s rounds, only group 2
    // blocks after that
    let spl = b1s * total_blks;
    data[..spl]
        .chunks(total_blks)
        .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| dilvd[i].push(*v)));
    if b2c > 0 {
        data[spl..data_sz]
            .chunks(b2c)
            .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| dilvd[b1c + i].push(*v)));
    }

    // Ecc: all blocks share one ecc length
    data[data_sz..]
        .chunks(total_blks)
        .for_each(|ch| ch.iter().enumerate().for_each(|(i, v)| dilvd[i].push(*v)));

    Ok(dilvd
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let dlen = if i < b1c { b1s } else { b2s };
            Block::with_encoded(b, dlen)
        })
        .collect())
}
