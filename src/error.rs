use std::fmt::{Debug, Display, Error, Formatter};

use crate::config::FormatTag;

// Error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    // Configuration, raised before any image processing
    EmptyFormatSet,
    UnsupportedFormat(FormatTag),

    // Routine outcome of a detection attempt, not exceptional
    NotFound,

    // Format/version metadata unrecoverable
    Structural(&'static str),

    // Degenerate geometry or illegal symbol dimension
    Sample(&'static str),

    // Error correction capacity exceeded
    Uncorrectable,

    // Payload decoding ran out of codewords
    TruncatedData,

    // Byte payload undecodable under the active character set
    CharacterSet,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        match self {
            Self::EmptyFormatSet => f.write_str("No formats requested"),
            Self::UnsupportedFormat(tag) => write!(f, "No decoder implemented for {tag:?}"),
            Self::NotFound => f.write_str("No symbol found"),
            Self::Structural(what) => write!(f, "Unrecoverable symbol structure: {what}"),
            Self::Sample(what) => write!(f, "Cannot sample module grid: {what}"),
            Self::Uncorrectable => f.write_str("Too many errors to correct successfully"),
            Self::TruncatedData => f.write_str("Payload ran out of codewords"),
            Self::CharacterSet => f.write_str("Byte payload undecodable under character set"),
        }
    }
}

impl std::error::Error for DecodeError {}

pub type DecodeResult<T> = Result<T, DecodeError>;
