//! Transport encoding for sealed messages
//!
//! The armored OpenPGP message spans several lines. For passing it on a
//! command line or embedding it in a log line it is wrapped in standard,
//! padded base64, which is:
//! - Free of whitespace (including newlines)
//! - Decodable by any stock base64 tool

use crate::error::{ErrorCategory, ErrorKind, Result, SealError};
use base64::{Engine, engine::general_purpose::STANDARD};

/// First line of every armored OpenPGP message
pub const MESSAGE_HEADER: &str = "-----BEGIN PGP MESSAGE-----";

/// Base64-encode the UTF-8 bytes of an armored message
pub fn encode(armored: &str) -> String {
    STANDARD.encode(armored.as_bytes())
}

/// Decode transport text back into the armored message
pub fn decode(encoded: &str) -> Result<String> {
    let body = STANDARD.decode(encoded.trim()).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringDecode,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })?;
    let armored = String::from_utf8(body).map_err(|e| {
        SealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "decoded transport text is not UTF-8",
            e,
        )
    })?;
    if !armored.trim_start().starts_with(MESSAGE_HEADER) {
        return Err(SealError::with_kind(
            ErrorCategory::User,
            ErrorKind::ArmoringInvalid,
            "decoded transport text is not an armored OpenPGP message",
        ));
    }
    Ok(armored)
}
