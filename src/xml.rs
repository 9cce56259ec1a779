//! Minimal XML scanning used by the envelope codec.
//!
//! The documents this service exchanges are flat: an envelope, a body, one
//! operation element with string-valued children. Matching is by local name
//! so any namespace prefix (or none) is accepted; unknown siblings are
//! skipped rather than rejected.

/// Inner content of the first element whose local name matches, or `None`
/// if no such element exists. Self-closing elements yield an empty slice.
pub fn element_block<'a>(xml: &'a str, local_name: &str) -> Option<&'a str> {
    let mut pos = 0;
    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        let after = &xml[start + 1..];
        if after.starts_with('/') || after.starts_with('!') || after.starts_with('?') {
            pos = start + 1;
            continue;
        }
        let name_end = after
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(after.len());
        if local_part(&after[..name_end]) == local_name {
            let tag_close = start + xml[start..].find('>')?;
            if xml[..tag_close].ends_with('/') {
                return Some(&xml[tag_close..tag_close]);
            }
            let content_start = tag_close + 1;
            let close = find_closing(xml, content_start, local_name)?;
            return Some(&xml[content_start..close]);
        }
        pos = start + 1;
    }
    None
}

/// The raw opening tag (`<name ...>`) of the first matching element.
pub fn open_tag<'a>(xml: &'a str, local_name: &str) -> Option<&'a str> {
    let mut pos = 0;
    while let Some(offset) = xml[pos..].find('<') {
        let start = pos + offset;
        let after = &xml[start + 1..];
        if after.starts_with('/') || after.starts_with('!') || after.starts_with('?') {
            pos = start + 1;
            continue;
        }
        let name_end = after
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(after.len());
        if local_part(&after[..name_end]) == local_name {
            let tag_close = start + xml[start..].find('>')?;
            return Some(&xml[start..=tag_close]);
        }
        pos = start + 1;
    }
    None
}

/// Trimmed, entity-decoded text content of the first matching element.
pub fn element_text(xml: &str, local_name: &str) -> Option<String> {
    element_block(xml, local_name).map(|block| unescape_text(block.trim()))
}

pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let replaced = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .iter()
        .find(|(entity, _)| tail.starts_with(entity));
        match replaced {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn find_closing(xml: &str, from: usize, local_name: &str) -> Option<usize> {
    let mut pos = from;
    while let Some(offset) = xml[pos..].find("</") {
        let start = pos + offset;
        let after = &xml[start + 2..];
        let name_end = after
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(after.len());
        if local_part(&after[..name_end]) == local_name {
            return Some(start);
        }
        pos = start + 2;
    }
    None
}
