use image::GrayImage;
use log::debug;
use rayon::prelude::*;

use crate::binarize::BinaryMatrix;
use crate::config::{DecodeConfig, FormatTag};
use crate::error::DecodeResult;
use crate::types::{DecodedSymbol, Diagnostic, Scan};
use crate::{oned, qr};

// Reader orchestrator
//------------------------------------------------------------------------------

/// Decodes every requested symbology from one grayscale image. The image is
/// binarized once; each format family then runs as an independent rayon
/// task over the shared matrix, and results join in the configured priority
/// order. Only configuration problems surface as errors; an undecodable
/// image is an empty vector.
pub fn decode(img: &GrayImage, config: &DecodeConfig) -> DecodeResult<Vec<DecodedSymbol>> {
    decode_with_diagnostics(img, config).map(|scan| scan.symbols)
}

/// Like [`decode`], additionally reporting why individual attempts failed.
pub fn decode_with_diagnostics(img: &GrayImage, config: &DecodeConfig) -> DecodeResult<Scan> {
    config.validate()?;

    let matrix = BinaryMatrix::binarize(img);
    debug!("binarized {}x{} image", matrix.w, matrix.h);

    // Linear formats share one scan pass; QR runs its own pipeline. Fan out
    // per family, writing only to task-local buffers
    let families = family_order(config);
    let outcomes: Vec<(Vec<DecodedSymbol>, Vec<Diagnostic>)> = families
        .par_iter()
        .map(|family| match family {
            Family::Matrix => qr::detect(&matrix, config),
            Family::Linear => (oned::detect(&matrix, config), Vec::new()),
        })
        .collect();

    let mut scan = Scan::default();
    for (symbols, failures) in outcomes {
        for symbol in symbols {
            if !is_duplicate(&scan.symbols, &symbol) {
                scan.symbols.push(symbol);
            }
        }
        scan.failures.extend(failures);
    }

    if !config.multi_symbol {
        scan.symbols.truncate(1);
    }
    scan.symbols.truncate(config.max_symbols);

    // Formats that were requested but never produced a symbol get a routine
    // not-found diagnostic
    for &tag in &config.formats {
        if !scan.symbols.iter().any(|s| s.format == tag)
            && !scan.failures.iter().any(|f| f.format == tag)
        {
            scan.failures.push(Diagnostic { format: tag, reason: crate::error::DecodeError::NotFound });
        }
    }

    debug!("decoded {} symbols, {} failed attempts", scan.symbols.len(), scan.failures.len());
    Ok(scan)
}

// Format families
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Matrix,
    Linear,
}

// Families in the priority order implied by the format list
fn family_order(config: &DecodeConfig) -> Vec<Family> {
    let mut families = Vec::with_capacity(2);
    for tag in &config.formats {
        let family = match tag {
            FormatTag::Qr => Family::Matrix,
            FormatTag::Ean13 | FormatTag::UpcA | FormatTag::Code128 => Family::Linear,
            FormatTag::Aztec | FormatTag::DataMatrix => continue,
        };
        if !families.contains(&family) {
            families.push(family);
        }
    }
    families
}

// Two detections are the same physical symbol when the payload matches and
// the centres sit within one symbol extent of each other
fn is_duplicate(existing: &[DecodedSymbol], candidate: &DecodedSymbol) -> bool {
    existing.iter().any(|s| {
        s.format == candidate.format
            && s.text == candidate.text
            && s.centre().dist_sq(&candidate.centre())
                <= s.extent_sq().max(candidate.extent_sq())
    })
}
