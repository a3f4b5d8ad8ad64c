//! Synthetic symbol builders for the integration tests. The library itself
//! is decode-only, so the fixtures render their own symbols: a QR encoder
//! for versions 1..=6 and ideal-row generators for the linear formats.

#![allow(dead_code)]

use barscan::{ECLevel, Version};
use image::GrayImage;

pub const QUIET: u32 = 4;

// Bit buffer
//------------------------------------------------------------------------------

struct Bits(Vec<bool>);

impl Bits {
    fn new() -> Self {
        Bits(Vec::new())
    }

    fn push_bits(&mut self, val: u32, n: usize) {
        for i in (0..n).rev() {
            self.0.push(val >> i & 1 == 1);
        }
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

// Galois field helpers, independent of the library's implementation
//------------------------------------------------------------------------------

fn gf_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    for i in 0..255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= 0x11D;
        }
    }
    for i in 255..512 {
        exp[i] = exp[i - 255];
    }
    (exp, log)
}

fn rs_ecc(data: &[u8], ec_len: usize) -> Vec<u8> {
    let (exp, log) = gf_tables();
    let mul = |a: u8, b: u8| -> u8 {
        if a == 0 || b == 0 {
            0
        } else {
            exp[log[a as usize] as usize + log[b as usize] as usize]
        }
    };

    // Generator polynomial, highest degree first, monic
    let mut gen = vec![1u8];
    for i in 0..ec_len {
        let root = exp[i];
        let mut next = vec![0u8; gen.len() + 1];
        for (j, &c) in gen.iter().enumerate() {
            next[j] ^= c;
            next[j + 1] ^= mul(c, root);
        }
        gen = next;
    }

    // Long division of data * x^ec_len
    let mut rem = vec![0u8; ec_len];
    for &b in data {
        let factor = b ^ rem[0];
        rem.remove(0);
        rem.push(0);
        for (j, r) in rem.iter_mut().enumerate() {
            *r ^= mul(factor, gen[j + 1]);
        }
    }
    rem
}

// Segment encoding
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureMode {
    Auto,
    Numeric,
    Alphanumeric,
    Byte,
}

static ALPHANUMERIC_CHARS: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

fn pick_mode(data: &[u8]) -> FixtureMode {
    if data.iter().all(|b| b.is_ascii_digit()) {
        FixtureMode::Numeric
    } else if data.iter().all(|b| ALPHANUMERIC_CHARS.contains(b)) {
        FixtureMode::Alphanumeric
    } else {
        FixtureMode::Byte
    }
}

fn encode_segment(data: &[u8], mode: FixtureMode, ver: Version, bits: &mut Bits) {
    match mode {
        FixtureMode::Numeric => {
            bits.push_bits(0b0001, 4);
            bits.push_bits(data.len() as u32, ver.char_cnt_bits(0b0001));
            for chunk in data.chunks(3) {
                let val: u32 = chunk.iter().fold(0, |acc, &d| acc * 10 + (d - b'0') as u32);
                bits.push_bits(val, [4, 7, 10][chunk.len() - 1]);
            }
        }
        FixtureMode::Alphanumeric => {
            bits.push_bits(0b0010, 4);
            bits.push_bits(data.len() as u32, ver.char_cnt_bits(0b0010));
            let value = |b: u8| {
                ALPHANUMERIC_CHARS.iter().position(|&c| c == b).expect("not alphanumeric") as u32
            };
            for chunk in data.chunks(2) {
                match chunk {
                    [a, b] => bits.push_bits(value(*a) * 45 + value(*b), 11),
                    [a] => bits.push_bits(value(*a), 6),
                    _ => unreachable!(),
                }
            }
        }
        FixtureMode::Byte => {
            bits.push_bits(0b0100, 4);
            bits.push_bits(data.len() as u32, ver.char_cnt_bits(0b0100));
            for &b in data {
                bits.push_bits(b as u32, 8);
            }
        }
        FixtureMode::Auto => unreachable!("resolve Auto before encoding"),
    }
}

fn encode_codewords(data: &[u8], mode: FixtureMode, ver: Version, ecl: ECLevel) -> Vec<u8> {
    let mode = if mode == FixtureMode::Auto { pick_mode(data) } else { mode };

    let mut bits = Bits::new();
    encode_segment(data, mode, ver, &mut bits);

    let capacity = ver.data_codewords(ecl) * 8;
    assert!(bits.len() <= capacity, "payload does not fit the chosen version");

    // Terminator, byte alignment, pad codewords
    let terminator = (capacity - bits.len()).min(4);
    bits.push_bits(0, terminator);
    while bits.len() % 8 != 0 {
        bits.push_bits(0, 1);
    }

    let mut codewords: Vec<u8> = bits
        .0
        .chunks(8)
        .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | b as u8))
        .collect();
    let pads = [0xEC, 0x11];
    let mut i = 0;
    while codewords.len() < ver.data_codewords(ecl) {
        codewords.push(pads[i % 2]);
        i += 1;
    }
    codewords
}

fn interleave(codewords: &[u8], ver: Version, ecl: ECLevel) -> Vec<u8> {
    let layout = ver.ec_blocks(ecl);
    let (c1, d1) = layout.group1;
    let (c2, d2) = layout.group2;

    let mut blocks: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    let mut off = 0;
    for b in 0..c1 + c2 {
        let dlen = if b < c1 { d1 } else { d2 };
        let data = codewords[off..off + dlen].to_vec();
        let ecc = rs_ecc(&data, layout.ec_len);
        blocks.push((data, ecc));
        off += dlen;
    }

    let mut out = Vec::new();
    for round in 0..d1.max(d2) {
        for (data, _) in &blocks {
            if round < data.len() {
                out.push(data[round]);
            }
        }
    }
    for round in 0..layout.ec_len {
        for (_, ecc) in &blocks {
            out.push(ecc[round]);
        }
    }
    out
}

// Matrix construction
//------------------------------------------------------------------------------

// Masked 15-bit format words indexed by (ec level bits << 3) | mask
#[rustfmt::skip]
static FORMAT_INFO: [u16; 32] = [
    0x5412, 0x5125, 0x5E7C, 0x5B4B, 0x45F9, 0x40CE, 0x4F97, 0x4AA0,
    0x77C4, 0x72F3, 0x7DAA, 0x789D, 0x662F, 0x6318, 0x6C41, 0x6976,
    0x1689, 0x13BE, 0x1CE7, 0x19D0, 0x0762, 0x0255, 0x0D0C, 0x083B,
    0x355F, 0x3068, 0x3F31, 0x3A06, 0x24B4, 0x2183, 0x2EDA, 0x2BED,
];

fn ecl_bits(ecl: ECLevel) -> u8 {
    match ecl {
        ECLevel::L => 0b01,
        ECLevel::M => 0b00,
        ECLevel::Q => 0b11,
        ECLevel::H => 0b10,
    }
}

fn mask_inverts(mask: u8, i: u32, j: u32) -> bool {
    let (i, j) = (i as u64, j as u64);
    match mask {
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

pub struct QrMatrix {
    pub modules: Vec<Vec<bool>>,
    pub dim: u32,
    /// Data module coordinates in placement order, 8 per codeword.
    pub placement: Vec<(u32, u32)>,
}

fn function_map(ver: Version) -> Vec<Vec<bool>> {
    let dim = ver.dimension() as usize;
    let mut reserved = vec![vec![false; dim]; dim];
    let mut fill = |x: usize, y: usize, w: usize, h: usize| {
        for row in reserved.iter_mut().skip(y).take(h) {
            for cell in row.iter_mut().skip(x).take(w) {
                *cell = true;
            }
        }
    };

    fill(0, 0, 9, 9);
    fill(dim - 8, 0, 8, 9);
    fill(0, dim - 8, 9, 8);
    fill(0, 6, dim, 1);
    fill(6, 0, 1, dim);

    let centres = ver.alignment_centres();
    for &cy in centres {
        for &cx in centres {
            let (cx, cy) = (cx as usize, cy as usize);
            let in_finder = (cx <= 8 && cy <= 8)
                || (cx >= dim - 9 && cy <= 8)
                || (cx <= 8 && cy >= dim - 9);
            if !in_finder {
                fill(cx - 2, cy - 2, 5, 5);
            }
        }
    }

    reserved
}

/// Builds the module matrix for a payload. Versions 1..=6 only (no version
/// info block).
pub fn qr_matrix(data: &[u8], version: u8, ecl: ECLevel, mask: u8, mode: FixtureMode) -> QrMatrix {
    assert!((1..=6).contains(&version), "fixture encodes versions 1..=6");
    let ver = Version::new(version).unwrap();
    let dim = ver.dimension();
    let d = dim as usize;

    let mut m = vec![vec![false; d]; d];

    // Finder patterns
    for &(ox, oy) in &[(0i32, 0i32), (d as i32 - 7, 0), (0, d as i32 - 7)] {
        for dy in 0..7i32 {
            for dx in 0..7i32 {
                let ring = dx == 0 || dx == 6 || dy == 0 || dy == 6;
                let stone = (2..=4).contains(&dx) && (2..=4).contains(&dy);
                m[(oy + dy) as usize][(ox + dx) as usize] = ring || stone;
            }
        }
    }

    // Timing patterns
    for c in 8..d - 8 {
        m[6][c] = c % 2 == 0;
        m[c][6] = c % 2 == 0;
    }

    // Alignment patterns
    let centres = ver.alignment_centres();
    for &cy in centres {
        for &cx in centres {
            let (cx, cy) = (cx as usize, cy as usize);
            let in_finder =
                (cx <= 8 && cy <= 8) || (cx >= d - 9 && cy <= 8) || (cx <= 8 && cy >= d - 9);
            if in_finder {
                continue;
            }
            for dy in -2i32..=2 {
                for dx in -2i32..=2 {
                    let dark = dx.abs().max(dy.abs()) != 1;
                    m[(cy as i32 + dy) as usize][(cx as i32 + dx) as usize] = dark;
                }
            }
        }
    }

    // Dark module
    m[d - 8][8] = true;

    // Format info, both copies, most significant bit first
    let word = FORMAT_INFO[((ecl_bits(ecl) << 3) | mask) as usize];
    let mut seq1: Vec<(usize, usize)> =
        vec![(0, 8), (1, 8), (2, 8), (3, 8), (4, 8), (5, 8), (7, 8), (8, 8), (8, 7)];
    seq1.extend((0..6).rev().map(|y| (8, y)));
    let mut seq2: Vec<(usize, usize)> = (d - 7..d).rev().map(|y| (8, y)).collect();
    seq2.extend((d - 8..d).map(|x| (x, 8)));
    for (k, &(x, y)) in seq1.iter().enumerate() {
        m[y][x] = (word >> (14 - k)) & 1 == 1;
    }
    for (k, &(x, y)) in seq2.iter().enumerate() {
        m[y][x] = (word >> (14 - k)) & 1 == 1;
    }

    // Data placement: zig-zag column pairs, right to left
    let reserved = function_map(ver);
    let codewords = interleave(&encode_codewords(data, mode, ver, ecl), ver, ecl);
    let mut bit_iter = codewords.iter().flat_map(|&cw| (0..8).rev().map(move |i| cw >> i & 1 == 1));

    let mut placement = Vec::new();
    let mut col = d as i32 - 1;
    let mut upward = true;
    while col > 0 {
        if col == 6 {
            col -= 1;
        }
        let rows: Vec<usize> =
            if upward { (0..d).rev().collect() } else { (0..d).collect() };
        for y in rows {
            for dx in 0..2 {
                let x = (col - dx) as usize;
                if reserved[y][x] {
                    continue;
                }
                let bit = bit_iter.next().unwrap_or(false);
                m[y][x] = bit ^ mask_inverts(mask, y as u32, x as u32);
                placement.push((x as u32, y as u32));
            }
        }
        upward = !upward;
        col -= 2;
    }

    QrMatrix { modules: m, dim, placement }
}

// Rendering
//------------------------------------------------------------------------------

pub fn render(matrix: &QrMatrix, scale: u32) -> GrayImage {
    let px = (matrix.dim + QUIET * 2) * scale;
    GrayImage::from_fn(px, px, |x, y| {
        let mx = (x / scale) as i64 - QUIET as i64;
        let my = (y / scale) as i64 - QUIET as i64;
        let dark = mx >= 0
            && my >= 0
            && (mx as u32) < matrix.dim
            && (my as u32) < matrix.dim
            && matrix.modules[my as usize][mx as usize];
        image::Luma([if dark { 0 } else { 255 }])
    })
}

pub fn qr_image(data: &[u8], version: u8, ecl: ECLevel, mask: u8, scale: u32) -> GrayImage {
    render(&qr_matrix(data, version, ecl, mask, FixtureMode::Auto), scale)
}

/// Renders with `flips` data modules inverted, each in a different codeword.
pub fn qr_image_with_flips(
    data: &[u8],
    version: u8,
    ecl: ECLevel,
    mask: u8,
    scale: u32,
    flips: usize,
) -> GrayImage {
    let mut matrix = qr_matrix(data, version, ecl, mask, FixtureMode::Byte);
    for f in 0..flips {
        let (x, y) = matrix.placement[f * 8];
        matrix.modules[y as usize][x as usize] = !matrix.modules[y as usize][x as usize];
    }
    render(&matrix, scale)
}

// Linear symbols
//------------------------------------------------------------------------------

static EAN_A: [[u8; 4]; 10] = [
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

static EAN_B: [[u8; 4]; 10] = [
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

static EAN_PARITY: [[bool; 6]; 10] = [
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

/// Appends the correct EAN-13 check digit to 12 digits.
pub fn ean13_with_checksum(digits12: &str) -> String {
    let ds: Vec<u8> = digits12.bytes().map(|b| b - b'0').collect();
    assert_eq!(ds.len(), 12);
    let sum: u32 =
        ds.iter().enumerate().map(|(i, &d)| d as u32 * if i % 2 == 0 { 1 } else { 3 }).sum();
    format!("{digits12}{}", (10 - sum % 10) % 10)
}

fn runs_to_image(modules: &[u8], unit: u32, height: u32) -> GrayImage {
    let width: u32 = modules.iter().map(|&m| m as u32).sum::<u32>() * unit;
    let mut row = Vec::with_capacity(width as usize);
    let mut dark = false;
    for &m in modules {
        for _ in 0..m as u32 * unit {
            row.push(dark);
        }
        dark = !dark;
    }
    GrayImage::from_fn(width, height, |x, _| image::Luma([if row[x as usize] { 0 } else { 255 }]))
}

/// Ideal EAN-13 symbol as an image, quiet zones included.
pub fn ean13_image(digits13: &str, unit: u32, height: u32) -> GrayImage {
    assert_eq!(digits13.len(), 13);
    let ds: Vec<u8> = digits13.bytes().map(|b| b - b'0').collect();
    let parity = EAN_PARITY[ds[0] as usize];

    let mut modules: Vec<u8> = vec![11, 1, 1, 1];
    for (i, &d) in ds[1..7].iter().enumerate() {
        let pat = if parity[i] { EAN_B[d as usize] } else { EAN_A[d as usize] };
        modules.extend(pat);
    }
    modules.extend([1, 1, 1, 1, 1]);
    for &d in &ds[7..13] {
        modules.extend(EAN_A[d as usize]);
    }
    modules.extend([1, 1, 1]);
    modules.push(11);

    runs_to_image(&modules, unit, height)
}

#[rustfmt::skip]
static CODE128_PATTERNS: [[u8; 6]; 106] = [
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

static CODE128_STOP: [u8; 7] = [2, 3, 3, 1, 1, 1, 2];

/// Ideal Code 128 symbol (set B) as an image, quiet zones included.
pub fn code128_image(text: &str, unit: u32, height: u32) -> GrayImage {
    let mut codes: Vec<usize> = vec![104];
    for b in text.bytes() {
        assert!((32..=127).contains(&b), "set B only");
        codes.push((b - 32) as usize);
    }
    let mut sum = codes[0];
    for (i, &c) in codes[1..].iter().enumerate() {
        sum += (i + 1) * c;
    }
    codes.push(sum % 103);

    let mut modules: Vec<u8> = vec![11];
    for &c in &codes {
        modules.extend(CODE128_PATTERNS[c]);
    }
    modules.extend(CODE128_STOP);
    modules.push(11);

    runs_to_image(&modules, unit, height)
}

// Image composition
//------------------------------------------------------------------------------

/// Places two images on one white canvas, side by side.
pub fn side_by_side(a: &GrayImage, b: &GrayImage, gap: u32) -> GrayImage {
    let w = a.width() + gap + b.width();
    let h = a.height().max(b.height());
    GrayImage::from_fn(w, h, |x, y| {
        if x < a.width() && y < a.height() {
            *a.get_pixel(x, y)
        } else if x >= a.width() + gap && y < b.height() {
            *b.get_pixel(x - a.width() - gap, y)
        } else {
            image::Luma([255])
        }
    })
}
