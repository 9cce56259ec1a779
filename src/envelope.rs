//! SOAP 1.1 envelope codec: typed request decoding, response rendering, and
//! fault rendering. All rendered text content is entity-escaped; the decode
//! side unescapes, so field values round-trip through the wire format.

use crate::{
    error::{Result, SoapError},
    store::Record,
    upload::StoredFile,
    xml,
};

pub const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SERVICE_NS: &str = "http://example.com/soap/records";
pub const TEXT_XML: &str = "text/xml; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineUploadRequest {
    pub file_name: String,
    /// Base64 text content of `fileData`.
    pub file_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedUploadRequest {
    pub file_name: String,
    /// Raw inner markup of `fileData`: either base64 text or an
    /// `xop:Include` reference element. The resolver decides which.
    pub file_data: String,
}

pub fn decode_lookup(xml_text: &str) -> Result<LookupRequest> {
    let body = body(xml_text)?;
    let request = operation_element(body, "LookupRequest")?;
    let id = xml::element_text(request, "id").unwrap_or_default();
    Ok(LookupRequest { id })
}

pub fn decode_inline_upload(xml_text: &str) -> Result<InlineUploadRequest> {
    let body = body(xml_text)?;
    let request = operation_element(body, "InlineUploadRequest")?;
    Ok(InlineUploadRequest {
        file_name: xml::element_text(request, "fileName").unwrap_or_default(),
        file_data: xml::element_text(request, "fileData").unwrap_or_default(),
    })
}

pub fn decode_optimized_upload(xml_text: &str) -> Result<OptimizedUploadRequest> {
    let body = body(xml_text)?;
    let request = operation_element(body, "OptimizedUploadRequest")?;
    // fileData stays raw: an xop:Include child must survive as markup.
    let file_data = xml::element_block(request, "fileData")
        .map(|block| block.trim().to_string())
        .unwrap_or_default();
    Ok(OptimizedUploadRequest {
        file_name: xml::element_text(request, "fileName").unwrap_or_default(),
        file_data,
    })
}

pub fn encode_lookup_response(record: &Record) -> String {
    encode_response(
        "LookupResponse",
        &[
            ("id", &record.id),
            ("name", &record.name),
            ("email", &record.email),
            ("createdAt", &record.created_at),
        ],
    )
}

pub fn encode_upload_response(element: &str, stored: &StoredFile) -> String {
    let size = stored.size.to_string();
    encode_response(
        element,
        &[
            ("fileId", &stored.file_id),
            ("fileName", &stored.file_name),
            ("size", &size),
            ("path", &stored.path),
        ],
    )
}

pub fn encode_fault(code: &str, message: &str, detail: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="{ENVELOPE_NS}">
    <soap:Body>
        <soap:Fault>
            <faultcode>{code}</faultcode>
            <faultstring>{}</faultstring>
            <detail>{}</detail>
        </soap:Fault>
    </soap:Body>
</soap:Envelope>"#,
        xml::escape_text(message),
        xml::escape_text(detail),
    )
}

fn encode_response(element: &str, fields: &[(&str, &str)]) -> String {
    let mut children = String::new();
    for (name, value) in fields {
        children.push_str(&format!(
            "            <{name}>{}</{name}>\n",
            xml::escape_text(value)
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="{ENVELOPE_NS}">
    <soap:Body>
        <{element} xmlns="{SERVICE_NS}">
{children}        </{element}>
    </soap:Body>
</soap:Envelope>"#
    )
}

fn body(xml_text: &str) -> Result<&str> {
    let envelope_tag = xml::open_tag(xml_text, "Envelope")
        .ok_or_else(|| SoapError::InvalidXml("missing Envelope element".into()))?;
    if !envelope_tag.contains(ENVELOPE_NS) {
        return Err(SoapError::InvalidXml(format!(
            "Envelope is not in the {ENVELOPE_NS} namespace"
        )));
    }
    let envelope = xml::element_block(xml_text, "Envelope")
        .ok_or_else(|| SoapError::InvalidXml("unterminated Envelope element".into()))?;
    xml::element_block(envelope, "Body")
        .ok_or_else(|| SoapError::InvalidXml("missing Body element".into()))
}

fn operation_element<'a>(body: &'a str, element: &str) -> Result<&'a str> {
    xml::element_block(body, element)
        .ok_or_else(|| SoapError::InvalidXml(format!("missing {element} element")))
}
