use crate::error::{DecodeError, DecodeResult};

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ECLevel {
    L,
    M,
    Q,
    H,
}

impl ECLevel {
    /// Decodes the 2-bit level field of the format info.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::M,
            0b01 => Self::L,
            0b10 => Self::H,
            _ => Self::Q,
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::L => 0,
            Self::M => 1,
            Self::Q => 2,
            Self::H => 3,
        }
    }
}

// Version
//------------------------------------------------------------------------------

/// QR symbol version, 1..=40. Version v spans 4v + 17 modules per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(u8);

impl Version {
    pub fn new(v: u8) -> DecodeResult<Self> {
        if (1..=40).contains(&v) {
            Ok(Self(v))
        } else {
            Err(DecodeError::Sample("version outside 1..=40"))
        }
    }

    /// Snaps a sampled dimension to the legal size table.
    pub fn from_dimension(dim: u32) -> DecodeResult<Self> {
        if dim < 17 || (dim - 17) % 4 != 0 {
            return Err(DecodeError::Sample("dimension not in legal size table"));
        }
        Self::new(((dim - 17) / 4) as u8)
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    pub fn dimension(&self) -> u32 {
        self.0 as u32 * 4 + 17
    }

    /// Versions 7 and up carry a redundant version info field.
    pub fn has_version_info(&self) -> bool {
        self.0 >= 7
    }

    /// Alignment pattern centre coordinates along each axis.
    pub fn alignment_centres(&self) -> &'static [u8] {
        ALIGNMENT_CENTRES[self.0 as usize - 1]
    }

    /// Width of the character count field for a mode indicator.
    pub fn char_cnt_bits(&self, mode_bits: u8) -> usize {
        let group = match self.0 {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match mode_bits {
            0b0001 => [10, 12, 14][group], // Numeric
            0b0010 => [9, 11, 13][group],  // Alphanumeric
            0b0100 => [8, 16, 16][group],  // Byte
            _ => [8, 10, 12][group],       // Kanji
        }
    }

    /// Total codewords in the symbol; independent of the ec level.
    pub fn total_codewords(&self) -> usize {
        let l = self.ec_blocks(ECLevel::L);
        (l.ec_len + l.group1.1) * l.group1.0 + (l.ec_len + l.group2.1) * l.group2.0
    }

    pub fn data_codewords(&self, ecl: ECLevel) -> usize {
        let b = self.ec_blocks(ecl);
        b.group1.0 * b.group1.1 + b.group2.0 * b.group2.1
    }

    pub fn ec_blocks(&self, ecl: ECLevel) -> BlockLayout {
        let (ec_len, c1, d1, c2, d2) = EC_TABLE[self.0 as usize - 1][ecl.index()];
        BlockLayout {
            ec_len: ec_len as usize,
            group1: (c1 as usize, d1 as usize),
            group2: (c2 as usize, d2 as usize),
        }
    }
}

/// Error-correction block structure for one version/level: every block in a
/// group shares the data length, and every block in the symbol shares the
/// ecc length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub ec_len: usize,
    /// (block count, data codewords per block)
    pub group1: (usize, usize),
    pub group2: (usize, usize),
}

impl BlockLayout {
    pub fn block_count(&self) -> usize {
        self.group1.0 + self.group2.0
    }
}

// (ec codewords per block, group1 count, group1 data len, group2 count,
// group2 data len) indexed by [version - 1][L, M, Q, H]
#[rustfmt::skip]
static EC_TABLE: [[(u8, u8, u8, u8, u8); 4]; 40] = [
    [(7, 1, 19, 0, 0),    (10, 1, 16, 0, 0),   (13, 1, 13, 0, 0),   (17, 1, 9, 0, 0)],
    [(10, 1, 34, 0, 0),   (16, 1, 28, 0, 0),   (22, 1, 22, 0, 0),   (28, 1, 16, 0, 0)],
    [(15, 1, 55, 0, 0),   (26, 1, 44, 0, 0),   (18, 2, 17, 0, 0),   (22, 2, 13, 0, 0)],
    [(20, 1, 80, 0, 0),   (18, 2, 32, 0, 0),   (26, 2, 24, 0, 0),   (16, 4, 9, 0, 0)],
    [(26, 1, 108, 0, 0),  (24, 2, 43, 0, 0),   (18, 2, 15, 2, 16),  (22, 2, 11, 2, 12)],
    [(18, 2, 68, 0, 0),   (16, 4, 27, 0, 0),   (24, 4, 19, 0, 0),   (28, 4, 15, 0, 0)],
    [(20, 2, 78, 0, 0),   (18, 4, 31, 0, 0),   (18, 2, 14, 4, 15),  (26, 4, 13, 1, 14)],
    [(24, 2, 97, 0, 0),   (22, 2, 38, 2, 39),  (22, 4, 18, 2, 19),  (26, 4, 14, 2, 15)],
    [(30, 2, 116, 0, 0),  (22, 3, 36, 2, 37),  (20, 4, 16, 4, 17),  (24, 4, 12, 4, 13)],
    [(18, 2, 68, 2, 69),  (26, 4, 43, 1, 44),  (24, 6, 19, 2, 20),  (28, 6, 15, 2, 16)],
    [(20, 4, 81, 0, 0),   (30, 1, 50, 4, 51),  (28, 4, 22, 4, 23),  (24, 3, 12, 8, 13)],
    [(24, 2, 92, 2, 93),  (22, 6, 36, 2, 37),  (26, 4, 20, 6, 21),  (28, 7, 14, 4, 15)],
    [(26, 4, 107, 0, 0),  (22, 8, 37, 1, 38),  (24, 8, 20, 4, 21),  (22, 12, 11, 4, 12)],
    [(30, 3, 115, 1, 116), (24, 4, 40, 5, 41), (20, 11, 16, 5, 17), (24, 11, 12, 5, 13)],
    [(22, 5, 87, 1, 88),  (24, 5, 41, 5, 42),  (30, 5, 24, 7, 25),  (24, 11, 12, 7, 13)],
    [(24, 5, 98, 1, 99),  (28, 7, 45, 3, 46),  (24, 15, 19, 2, 20), (30, 3, 15, 13, 16)],
    [(28, 1, 107, 5, 108), (28, 10, 46, 1, 47), (28, 1, 22, 15, 23), (28, 2, 14, 17, 15)],
    [(30, 5, 120, 1, 121), (26, 9, 43, 4, 44), (28, 17, 22, 1, 23), (28, 2, 14, 19, 15)],
    [(28, 3, 113, 4, 114), (26, 3, 44, 11, 45), (26, 17, 21, 4, 22), (26, 9, 13, 16, 14)],
    [(28, 3, 107, 5, 108), (26, 3, 41, 13, 42), (30, 15, 24, 5, 25), (28, 15, 15, 10, 16)],
    [(28, 4, 116, 4, 117), (26, 17, 42, 0, 0), (28, 17, 22, 6, 23), (30, 19, 16, 6, 17)],
    [(28, 2, 111, 7, 112), (28, 17, 46, 0, 0), (30, 7, 24, 16, 25), (24, 34, 13, 0, 0)],
    [(30, 4, 121, 5, 122), (28, 4, 47, 14, 48), (30, 11, 24, 14, 25), (30, 16, 15, 14, 16)],
    [(30, 6, 117, 4, 118), (28, 6, 45, 14, 46), (30, 11, 24, 16, 25), (30, 30, 16, 2, 17)],
    [(26, 8, 106, 4, 107), (28, 8, 47, 13, 48), (30, 7, 24, 22, 25), (30, 22, 15, 13, 16)],
    [(28, 10, 114, 2, 115), (28, 19, 46, 4, 47), (28, 28, 22, 6, 23), (30, 33, 16, 4, 17)],
    [(30, 8, 122, 4, 123), (28, 22, 45, 3, 46), (30, 8, 23, 26, 24), (30, 12, 15, 28, 16)],
    [(30, 3, 117, 10, 118), (28, 3, 45, 23, 46), (30, 4, 24, 31, 25), (30, 11, 15, 31, 16)],
    [(30, 7, 116, 7, 117), (28, 21, 45, 7, 46), (30, 1, 23, 37, 24), (30, 19, 15, 26, 16)],
    [(30, 5, 115, 10, 116), (28, 19, 47, 10, 48), (30, 15, 24, 25, 25), (30, 23, 15, 25, 16)],
    [(30, 13, 115, 3, 116), (28, 2, 46, 29, 47), (30, 42, 24, 1, 25), (30, 23, 15, 28, 16)],
    [(30, 17, 115, 0, 0), (28, 10, 46, 23, 47), (30, 10, 24, 35, 25), (30, 19, 15, 35, 16)],
    [(30, 17, 115, 1, 116), (28, 14, 46, 21, 47), (30, 29, 24, 19, 25), (30, 11, 15, 46, 16)],
    [(30, 13, 115, 6, 116), (28, 14, 46, 23, 47), (30, 44, 24, 7, 25), (30, 59, 16, 1, 17)],
    [(30, 12, 121, 7, 122), (28, 12, 47, 26, 48), (30, 39, 24, 14, 25), (30, 22, 15, 41, 16)],
    [(30, 6, 121, 14, 122), (28, 6, 47, 34, 48), (30, 46, 24, 10, 25), (30, 2, 15, 64, 16)],
    [(30, 17, 122, 4, 123), (28, 29, 46, 14, 47), (30, 49, 24, 10, 25), (30, 24, 15, 46, 16)],
    [(30, 4, 122, 18, 123), (28, 13, 46, 32, 47), (30, 48, 24, 14, 25), (30, 42, 15, 32, 16)],
    [(30, 20, 117, 4, 118), (28, 40, 47, 7, 48), (30, 43, 24, 22, 25), (30, 10, 15, 67, 16)],
    [(30, 19, 118, 6, 119), (28, 18, 47, 31, 48), (30, 34, 24, 34, 25), (30, 20, 15, 61, 16)],
];

#[rustfmt::skip]
static ALIGNMENT_CENTRES: [&[u8]; 40] = [
    &[],
    &[6, 18],
    &[6, 22],
    &[6, 26],
    &[6, 30],
    &[6, 34],
    &[6, 22, 38],
    &[6, 24, 42],
    &[6, 26, 46],
    &[6, 28, 50],
    &[6, 30, 54],
    &[6, 32, 58],
    &[6, 34, 62],
    &[6, 26, 46, 66],
    &[6, 26, 48, 70],
    &[6, 26, 50, 74],
    &[6, 30, 54, 78],
    &[6, 30, 56, 82],
    &[6, 30, 58, 86],
    &[6, 34, 62, 90],
    &[6, 28, 50, 72, 94],
    &[6, 26, 50, 74, 98],
    &[6, 30, 54, 78, 102],
    &[6, 28, 54, 80, 106],
    &[6, 32, 58, 84, 110],
    &[6, 30, 58, 86, 114],
    &[6, 34, 62, 90, 118],
    &[6, 26, 50, 74, 98, 122],
    &[6, 30, 54, 78, 102, 126],
    &[6, 26, 52, 78, 104, 130],
    &[6, 30, 56, 82, 108, 134],
    &[6, 34, 60, 86, 112, 138],
    &[6, 30, 58, 86, 114, 142],
    &[6, 34, 62, 90, 118, 146],
    &[6, 30, 54, 78, 102, 126, 150],
    &[6, 24, 50, 76, 102, 128, 154],
    &[6, 28, 54, 80, 106, 132, 158],
    &[6, 32, 58, 84, 110, 136, 162],
    &[6, 26, 54, 82, 110, 138, 166],
    &[6, 30, 58, 86, 114, 142, 170],
];
