pub mod codewords;
pub mod finder;
pub mod format_info;
pub mod payload;
pub mod sampler;
pub mod version;

use log::debug;

use crate::binarize::BinaryMatrix;
use crate::common::bitstream::BitStream;
use crate::config::{DecodeConfig, FormatTag};
use crate::error::{DecodeError, DecodeResult};
use crate::types::{DecodedSymbol, Diagnostic};

use codewords::{deinterleave, extract_codewords, read_format_info, read_version_info};
use finder::{group_finders, locate_finders, FinderGroup};
use payload::decode_payload;
use sampler::sample_grid;

// QR reader
//------------------------------------------------------------------------------

/// Runs the full QR pipeline over one binarized image: finder location,
/// grouping, sampling, codeword extraction, error correction and payload
/// decoding. One group failing never stops the others.
pub(crate) fn detect(
    img: &BinaryMatrix,
    config: &DecodeConfig,
) -> (Vec<DecodedSymbol>, Vec<Diagnostic>) {
    let mut symbols = Vec::new();
    let mut failures = Vec::new();

    let finders = locate_finders(img, config);
    if finders.len() < 3 {
        return (symbols, failures);
    }

    let groups = group_finders(&finders, config);
    for group in &groups {
        if config.expired() {
            break;
        }

        match decode_group(img, group, config) {
            Ok(symbol) => symbols.push(symbol),
            Err(reason) => failures.push(Diagnostic { format: FormatTag::Qr, reason }),
        }

        if !config.multi_symbol && !symbols.is_empty() {
            break;
        }
    }

    (symbols, failures)
}

fn decode_group(
    img: &BinaryMatrix,
    group: &FinderGroup,
    config: &DecodeConfig,
) -> DecodeResult<DecodedSymbol> {
    let (grid, ver, corners) = sample_grid(img, group)?;
    debug!("sampled candidate grid: version {}", ver.number());

    let (ecl, mask) = read_format_info(&grid)?;

    // The redundant version field must agree with the sampled dimension
    // before the layout tables are trusted
    if ver.has_version_info() && read_version_info(&grid)? != ver {
        return Err(DecodeError::Structural("version info contradicts dimension"));
    }

    let codewords = extract_codewords(&grid, ver, mask);
    let blocks = deinterleave(&codewords, ver.ec_blocks(ecl))?;

    let mut corrected = 0;
    let mut enc = BitStream::new(ver.data_codewords(ecl) << 3);
    for mut block in blocks {
        corrected += block.rectify()?;
        enc.extend(block.data());
    }
    debug!("rectified {} codewords across blocks", corrected);

    let pld = decode_payload(&mut enc, ver, config.character_set.as_deref())?;

    Ok(DecodedSymbol {
        format: FormatTag::Qr,
        text: pld.text,
        bytes: pld.bytes,
        corners,
        corrected,
        structured_append: pld.structured_append,
        eci: pld.eci,
    })
}
