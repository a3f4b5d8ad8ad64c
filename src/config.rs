use std::time::Instant;

use crate::error::{DecodeError, DecodeResult};

// Format tag
//------------------------------------------------------------------------------

/// Symbologies the reader knows about. `Aztec` and `DataMatrix` are
/// recognized tags without an implemented decoder; requesting them fails at
/// configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Qr,
    Ean13,
    UpcA,
    Code128,
    Aztec,
    DataMatrix,
}

impl FormatTag {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Aztec | Self::DataMatrix)
    }
}

// Decode configuration
//------------------------------------------------------------------------------

/// Options for one decode call. Formats are attempted in the order given;
/// result order follows it.
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Formats to attempt, in priority order.
    pub formats: Vec<FormatTag>,
    /// Trade latency for recall: scan every row and loosen grouping.
    pub try_harder: bool,
    /// Keep searching after the first successful symbol.
    pub multi_symbol: bool,
    /// Upper bound on returned symbols.
    pub max_symbols: usize,
    /// Label of the character set assumed for byte segments without an ECI
    /// designator, e.g. "ISO-8859-1". UTF-8 is always tried first.
    pub character_set: Option<String>,
    /// Two finder patterns group only if their module size estimates agree
    /// within this relative tolerance.
    pub module_size_tolerance: f64,
    /// Scan every n-th row for linear formats. `try_harder` forces 1.
    pub row_step: u32,
    /// Cooperative cancellation: checked between pattern candidates. Work
    /// found before the deadline is still returned.
    pub deadline: Option<Instant>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            formats: vec![FormatTag::Qr, FormatTag::Ean13, FormatTag::UpcA, FormatTag::Code128],
            try_harder: false,
            multi_symbol: false,
            max_symbols: 8,
            character_set: None,
            module_size_tolerance: 0.5,
            row_step: 4,
            deadline: None,
        }
    }
}

impl DecodeConfig {
    /// Validates the configuration. Runs before any pixel is touched.
    pub fn validate(&self) -> DecodeResult<()> {
        if self.formats.is_empty() {
            return Err(DecodeError::EmptyFormatSet);
        }
        if let Some(tag) = self.formats.iter().find(|t| !t.is_supported()) {
            return Err(DecodeError::UnsupportedFormat(*tag));
        }
        Ok(())
    }

    pub fn effective_row_step(&self) -> u32 {
        if self.try_harder {
            1
        } else {
            self.row_step.max(1)
        }
    }

    pub fn expired(&self) -> bool {
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    pub(crate) fn wants(&self, tag: FormatTag) -> bool {
        self.formats.contains(&tag)
    }
}
