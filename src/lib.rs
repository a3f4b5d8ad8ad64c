//! # barscan
//!
//! A Rust library for detecting and decoding barcodes from images. One call
//! takes a grayscale image and returns every symbol it can read, across
//! formats, with Reed-Solomon error correction where the format carries it.
//!
//! ## Supported formats
//!
//! - **QR Code**: versions 1-40, all error correction levels and masks,
//!   numeric / alphanumeric / byte / Kanji / ECI segments, structured append
//! - **EAN-13 / UPC-A**: guard-anchored digit decoding with checksum
//! - **Code 128**: code sets A/B/C with switching, shifts and FNC handling
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use barscan::{decode, DecodeConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("label.png")?.to_luma8();
//! let symbols = decode(&img, &DecodeConfig::default())?;
//! for symbol in &symbols {
//!     println!("{:?}: {}", symbol.format, symbol.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Picking formats and scanning for multiple symbols
//!
//! ```rust,no_run
//! use barscan::{decode, DecodeConfig, FormatTag};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = image::open("shelf.png")?.to_luma8();
//! let config = DecodeConfig {
//!     formats: vec![FormatTag::Ean13, FormatTag::Code128],
//!     multi_symbol: true,
//!     try_harder: true,
//!     ..Default::default()
//! };
//! let symbols = decode(&img, &config)?;
//! # Ok(())
//! # }
//! ```
//!
//! The pipeline is stateless and side-effect free: the caller owns the
//! image, every call allocates its own intermediate buffers, and format
//! attempts fan out as independent tasks. Decoding failures are per attempt;
//! an image with nothing readable simply yields an empty result. See
//! [`decode_with_diagnostics`] for the reasons behind failed attempts.

pub mod binarize;
pub mod config;
pub mod error;
pub mod geometry;
pub mod types;

pub(crate) mod common;
pub(crate) mod oned;
pub(crate) mod qr;

mod reader;

pub use config::{DecodeConfig, FormatTag};
pub use error::{DecodeError, DecodeResult};
pub use qr::version::{BlockLayout, ECLevel, Version};
pub use reader::{decode, decode_with_diagnostics};
pub use types::{DecodedSymbol, Diagnostic, Scan, StructuredAppend};
