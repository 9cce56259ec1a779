//! Inline binary codec: standard base64 with padding, the fallback encoding
//! for binary fields carried directly in XML text content.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::error::{Result, SoapError};

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Strict decode: wrong padding or characters outside the alphabet fail with
/// a client-classified error carrying the codec error string.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|err| SoapError::InvalidFileData(err.to_string()))
}
