//! MIME multipart parsing for MTOM (`multipart/related`) requests.
//!
//! A message splits into exactly one XML control part (the SOAP envelope)
//! and any number of binary attachment parts keyed by `Content-ID`. Parts
//! are framed by CRLF-delimited boundary lines per RFC 2046: a boundary
//! candidate must start a line and be followed by CRLF or the `--`
//! terminator.

use std::collections::HashMap;

use crate::error::{Result, SoapError};

/// Media types that mark the control (XML) part of an MTOM message.
const XML_MEDIA_TYPES: &[&str] = &[
    "application/xop+xml",
    "text/xml",
    "application/soap+xml",
    "application/xml",
];

#[derive(Debug, Clone)]
pub struct MultipartPart {
    /// `Content-ID` with surrounding angle brackets stripped.
    pub content_id: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct MultipartMessage {
    pub control: MultipartPart,
    /// Attachment parts in received order.
    pub attachments: Vec<MultipartPart>,
}

pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/")
}

/// Extract the `boundary` parameter from a multipart Content-Type header.
pub fn parse_boundary(content_type: &str) -> Result<String> {
    for param in content_type.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() {
                return Err(SoapError::BoundaryNotFound);
            }
            return Ok(boundary.to_string());
        }
    }
    Err(SoapError::BoundaryNotFound)
}

pub fn parse(body: &[u8], content_type: &str, max_bytes: usize) -> Result<MultipartMessage> {
    if body.len() > max_bytes {
        return Err(SoapError::PayloadTooLarge {
            size: body.len(),
            max: max_bytes,
        });
    }
    let boundary = parse_boundary(content_type)?;
    let delimiter = format!("--{boundary}").into_bytes();

    let mut control: Option<MultipartPart> = None;
    let mut attachments = Vec::new();

    let mut pos = find_boundary(body, 0, &delimiter)?;
    loop {
        let boundary_end = pos + delimiter.len();
        if body[boundary_end..].starts_with(b"--") {
            break;
        }
        if !body[boundary_end..].starts_with(b"\r\n") {
            return Err(SoapError::InvalidMultipart(
                "expected CRLF after boundary".into(),
            ));
        }

        let (headers, data_start) = parse_part_headers(body, boundary_end + 2)?;
        let data_end = find_boundary(body, data_start, &delimiter)?;
        // Part data excludes the CRLF that introduces the next boundary line.
        let data = &body[data_start..data_end.saturating_sub(2).max(data_start)];

        let content_id = headers
            .get("content-id")
            .map(|id| id.trim_matches(|c| c == '<' || c == '>').to_string());
        let part_content_type = headers
            .get("content-type")
            .cloned()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let part = MultipartPart {
            content_id,
            content_type: part_content_type,
            data: data.to_vec(),
        };

        if is_xml_part(&part.content_type) {
            if control.is_some() {
                return Err(SoapError::AmbiguousControlPart);
            }
            control = Some(part);
        } else {
            attachments.push(part);
        }

        pos = data_end;
    }

    let control = control.ok_or(SoapError::MissingControlPart)?;
    Ok(MultipartMessage {
        control,
        attachments,
    })
}

fn is_xml_part(content_type: &str) -> bool {
    XML_MEDIA_TYPES
        .iter()
        .any(|media_type| content_type.contains(media_type))
}

/// Next boundary occurrence at or after `start`. Boundaries must begin the
/// body or a CRLF-delimited line, and be followed by CRLF or `--`.
fn find_boundary(body: &[u8], start: usize, delimiter: &[u8]) -> Result<usize> {
    if body.len() < delimiter.len() {
        return Err(SoapError::InvalidMultipart(
            "unexpected end of multipart data".into(),
        ));
    }
    let end = body.len() - delimiter.len() + 1;
    for i in start..end {
        if !body[i..].starts_with(delimiter) {
            continue;
        }
        if i != 0 && (i < 2 || &body[i - 2..i] != b"\r\n") {
            continue;
        }
        let after = &body[i + delimiter.len()..];
        if after.starts_with(b"\r\n") || after.starts_with(b"--") {
            return Ok(i);
        }
    }
    Err(SoapError::InvalidMultipart(
        "unexpected end of multipart data".into(),
    ))
}

fn parse_part_headers(body: &[u8], start: usize) -> Result<(HashMap<String, String>, usize)> {
    let mut headers = HashMap::new();
    let mut pos = start;
    loop {
        let line_end = find_crlf(body, pos)?;
        let line = &body[pos..line_end];
        if line.is_empty() {
            return Ok((headers, line_end + 2));
        }
        let line = std::str::from_utf8(line)
            .map_err(|_| SoapError::InvalidMultipart("invalid UTF-8 in part header".into()))?;
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
        pos = line_end + 2;
    }
}

fn find_crlf(body: &[u8], start: usize) -> Result<usize> {
    if body.len() >= 2 {
        for i in start..body.len() - 1 {
            if &body[i..i + 2] == b"\r\n" {
                return Ok(i);
            }
        }
    }
    Err(SoapError::InvalidMultipart(
        "unexpected end of multipart data".into(),
    ))
}
