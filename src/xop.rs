//! XOP external-reference resolution.
//!
//! An MTOM `fileData` field either carries inline base64 or an
//! `xop:Include` element whose `href` names an attachment part through the
//! `cid:` scheme. Identifier matching against `Content-ID`s is exact and
//! case-sensitive; the first matching attachment wins.

use crate::{
    error::{Result, SoapError},
    inline,
    multipart::MultipartPart,
    xml,
};

pub const CID_SCHEME: &str = "cid:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    /// Bytes decoded from inline base64 content.
    Inline(Vec<u8>),
    /// Content identifier of the attachment part carrying the bytes.
    Reference(String),
}

/// Classify a raw `fileData` field: an `Include` element yields a reference,
/// anything else is treated as inline base64.
pub fn resolve(raw_field: &str) -> Result<FileData> {
    if let Some(tag) = xml::open_tag(raw_field, "Include") {
        return Ok(FileData::Reference(include_content_id(tag)?));
    }
    let text = raw_field.trim();
    if text.is_empty() {
        return Ok(FileData::Inline(Vec::new()));
    }
    Ok(FileData::Inline(inline::decode(text)?))
}

/// Bytes of the first attachment whose content id matches, verbatim.
pub fn match_attachment<'a>(
    content_id: &str,
    attachments: &'a [MultipartPart],
) -> Result<&'a [u8]> {
    attachments
        .iter()
        .find(|part| part.content_id.as_deref() == Some(content_id))
        .map(|part| part.data.as_slice())
        .ok_or_else(|| SoapError::ReferenceNotFound(content_id.to_string()))
}

fn include_content_id(tag: &str) -> Result<String> {
    let href_at = find_href_attribute(tag)
        .ok_or_else(|| SoapError::InvalidXml("xop:Include is missing an href attribute".into()))?;
    let rest = &tag[href_at + "href=".len()..];
    let quote = match rest.chars().next() {
        Some(c @ ('"' | '\'')) => c,
        _ => return Err(SoapError::InvalidXml("xop:Include href is not quoted".into())),
    };
    let value_end = rest[1..]
        .find(quote)
        .ok_or_else(|| SoapError::InvalidXml("unterminated href attribute".into()))?;
    let value = &rest[1..1 + value_end];
    let content_id = value.strip_prefix(CID_SCHEME).ok_or_else(|| {
        SoapError::InvalidXml(format!("href does not use the {CID_SCHEME} scheme: {value}"))
    })?;
    if content_id.is_empty() {
        return Err(SoapError::InvalidXml("empty content id in href".into()));
    }
    Ok(content_id.to_string())
}

/// Position of the `href` attribute. The name must start at an attribute
/// boundary, so `xhref=` or `data-href=` never matches.
fn find_href_attribute(tag: &str) -> Option<usize> {
    let mut search = 0;
    while let Some(offset) = tag[search..].find("href=") {
        let at = search + offset;
        if tag[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_whitespace())
        {
            return Some(at);
        }
        search = at + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(id: &str, data: &[u8]) -> MultipartPart {
        MultipartPart {
            content_id: Some(id.to_string()),
            content_type: "application/octet-stream".to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn extracts_reference_from_include_element() {
        let field = r#"<xop:Include xmlns:xop="http://www.w3.org/2004/08/xop/include" href="cid:payload-1"/>"#;
        assert_eq!(
            resolve(field).unwrap(),
            FileData::Reference("payload-1".to_string())
        );
    }

    #[test]
    fn accepts_single_quoted_href_and_bare_prefix() {
        let field = "<Include href='cid:abc@host'/>";
        assert_eq!(
            resolve(field).unwrap(),
            FileData::Reference("abc@host".to_string())
        );
    }

    #[test]
    fn plain_text_is_inline_base64() {
        assert_eq!(
            resolve("aGVsbG8=").unwrap(),
            FileData::Inline(b"hello".to_vec())
        );
    }

    #[test]
    fn invalid_inline_base64_is_a_client_error() {
        let err = resolve("@@@").unwrap_err();
        assert!(matches!(err, SoapError::InvalidFileData(_)));
    }

    #[test]
    fn href_must_start_an_attribute() {
        // A name merely ending in "href" is a different attribute.
        let err = resolve(r#"<Include xhref="cid:decoy"/>"#).unwrap_err();
        assert!(matches!(err, SoapError::InvalidXml(_)));

        let field = r#"<Include xhref="cid:decoy" href="cid:real"/>"#;
        assert_eq!(
            resolve(field).unwrap(),
            FileData::Reference("real".to_string())
        );
    }

    #[test]
    fn rejects_non_cid_scheme() {
        let err = resolve(r#"<Include href="https://example.com/p"/>"#).unwrap_err();
        assert!(matches!(err, SoapError::InvalidXml(_)));
    }

    #[test]
    fn matches_attachment_verbatim() {
        let payload = [0u8, 0xff, 0x10, 0x00, 0x7f];
        let parts = vec![attachment("other", b"nope"), attachment("p1", &payload)];
        assert_eq!(match_attachment("p1", &parts).unwrap(), payload);
    }

    #[test]
    fn first_match_wins_on_duplicate_ids() {
        let parts = vec![attachment("p1", b"first"), attachment("p1", b"second")];
        assert_eq!(match_attachment("p1", &parts).unwrap(), b"first");
    }

    #[test]
    fn matching_is_case_sensitive() {
        let parts = vec![attachment("Payload", b"x")];
        let err = match_attachment("payload", &parts).unwrap_err();
        assert_eq!(err.to_string(), "reference not found: payload");
    }
}
