//! Operation dispatch: explicit `SOAPAction` routing with a bounded
//! body-sniffing fallback.

use crate::error::{Result, SoapError};

pub const ACTION_LOOKUP: &str = "http://example.com/soap/records/Lookup";
pub const ACTION_INLINE_UPLOAD: &str = "http://example.com/soap/records/InlineUpload";
pub const ACTION_OPTIMIZED_UPLOAD: &str = "http://example.com/soap/records/OptimizedUpload";

/// How many leading body bytes the sniffer inspects. Enough to cover the
/// XML declaration, envelope open tag, and the operation element name.
pub const SNIFF_WINDOW: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Lookup,
    InlineUpload,
    OptimizedUpload,
}

impl Operation {
    /// Map a `SOAPAction` header token to an operation. One pair of
    /// surrounding double quotes is stripped; the match is exact.
    pub fn from_action(raw: &str) -> Option<Self> {
        match strip_quotes(raw) {
            ACTION_LOOKUP => Some(Self::Lookup),
            ACTION_INLINE_UPLOAD => Some(Self::InlineUpload),
            ACTION_OPTIMIZED_UPLOAD => Some(Self::OptimizedUpload),
            _ => None,
        }
    }

    /// Sniff the operation from the leading bytes of the body by testing
    /// the request element names as literal markers, in fixed priority
    /// order: lookup, then optimized upload, then inline upload.
    pub fn sniff(body: &[u8]) -> Option<Self> {
        let window = &body[..body.len().min(SNIFF_WINDOW)];
        let prefix = String::from_utf8_lossy(window);
        if prefix.contains("LookupRequest") {
            Some(Self::Lookup)
        } else if prefix.contains("OptimizedUploadRequest") {
            Some(Self::OptimizedUpload)
        } else if prefix.contains("InlineUploadRequest") {
            Some(Self::InlineUpload)
        } else {
            None
        }
    }
}

/// Classify a request. A recognized action header wins unconditionally and
/// never inspects the body; otherwise the body prefix is sniffed. Neither
/// matching is a client fault.
pub fn classify(action: Option<&str>, body: &[u8]) -> Result<Operation> {
    if let Some(operation) = action.and_then(Operation::from_action) {
        return Ok(operation);
    }
    Operation::sniff(body).ok_or(SoapError::UnknownOperation)
}

fn strip_quotes(token: &str) -> &str {
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        &token[1..token.len() - 1]
    } else {
        token
    }
}
