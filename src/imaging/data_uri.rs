//! `data:` URI encoding for selection previews.
//!
//! A selected image keeps its bytes as `data:<mime>;base64,<payload>`, the
//! same self-contained form a browser's `FileReader.readAsDataURL` produces.
//! The string doubles as preview and as decoder input.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI has no ',' separator")]
    MissingSeparator,
    #[error("only base64 data URIs are supported")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Payload(String),
}

/// Build a base64 data URI for `bytes` declared as `mime`.
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a data URI into its declared MIME type and decoded payload.
pub fn decode(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or(DataUriError::MissingSeparator)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::NotBase64)?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DataUriError::Payload(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}
