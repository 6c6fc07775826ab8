//! Subject identifier helpers.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Italian fiscal code for natural persons (with omocodia substitutions) or
/// an 11-digit VAT number.
static FISCAL_CODE_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(^([A-Za-z]{6}[0-9lmnpqrstuvLMNPQRSTUV]{2}[abcdehlmprstABCDEHLMPRST][0-9lmnpqrstuvLMNPQRSTUV]{2}[A-Za-z][0-9lmnpqrstuvLMNPQRSTUV]{3}[A-Za-z])$)|(^(\d{11})$)",
    )
    .ok()
});

/// Whether `candidate` has the shape of a fiscal code.
pub fn is_valid_fiscal_code(candidate: &str) -> bool {
    FISCAL_CODE_RE
        .as_ref()
        .map(|re| re.is_match(candidate))
        .unwrap_or(false)
}

/// Hex SHA-256 of an identifier. Raw fiscal codes never reach the logs.
pub fn hash_for_log(id: &str) -> String {
    hex::encode(Sha256::digest(id.as_bytes()))
}
