//! Content-transfer decoding, at the contract level described for
//! this crate: base64, quoted-printable, and identity. Failures never
//! abort a fetch — the raw bytes are returned unchanged and the
//! caller logs a warning, consistent with this crate's "never fail
//! the whole session over a single message's content" policy.

use crate::message::Encoding;
use base64::Engine;
use base64::engine::GeneralPurpose;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::alphabet;
use tracing::warn;

fn base64_engine() -> GeneralPurpose {
    // Servers frequently omit trailing padding; decode leniently.
    let config = GeneralPurposeConfig::new()
        .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent);
    GeneralPurpose::new(&alphabet::STANDARD, config)
}

/// Decode `raw` according to `encoding`. On a malformed payload the
/// original bytes are returned unchanged (never a fatal error).
#[must_use]
pub fn decode(raw: &[u8], encoding: &Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Base64 => {
            // Base64 bodies may be wrapped across multiple lines; strip
            // whitespace before decoding.
            let compact: Vec<u8> = raw.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
            match base64_engine().decode(&compact) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!("failed to decode base64 body part: {err}");
                    raw.to_vec()
                }
            }
        }
        Encoding::QuotedPrintable => {
            match quoted_printable::decode(raw, quoted_printable::ParseMode::Robust) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!("failed to decode quoted-printable body part: {err}");
                    raw.to_vec()
                }
            }
        }
        Encoding::SevenBit | Encoding::EightBit | Encoding::Binary | Encoding::Other(_) => {
            raw.to_vec()
        }
    }
}
