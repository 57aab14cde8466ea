//! Minimal S3 XML handling.
//!
//! The S3 responses we consume are flat and well-formed, so element bodies are
//! located by plain tag scanning rather than a full XML parser.

use chrono::{DateTime, Utc};

use mediafs_common::backend::{BackendError, ListingPage, ObjectSummary};

/// Bodies of every `<tag>…</tag>` element, in document order.
fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut out = Vec::new();
    let mut remaining = xml;
    while let Some(start) = remaining.find(&open) {
        remaining = &remaining[start + open.len()..];
        match remaining.find(&close) {
            Some(end) => {
                out.push(&remaining[..end]);
                remaining = &remaining[end + close.len()..];
            }
            None => break,
        }
    }
    out
}

/// Unescaped body of the first `<tag>` element.
fn element(xml: &str, tag: &str) -> Option<String> {
    elements(xml, tag).first().map(|s| unescape(s))
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Parse a ListObjects (v1) `ListBucketResult` document.
pub fn parse_list_objects(xml: &str) -> Result<ListingPage, BackendError> {
    let mut objects = Vec::new();
    for contents in elements(xml, "Contents") {
        let key = element(contents, "Key")
            .ok_or_else(|| BackendError::Malformed("Contents without Key".to_string()))?;
        let size = element(contents, "Size")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        let last_modified = element(contents, "LastModified")
            .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        objects.push(ObjectSummary {
            key,
            size,
            last_modified,
        });
    }

    let common_prefixes = elements(xml, "CommonPrefixes")
        .into_iter()
        .filter_map(|cp| element(cp, "Prefix"))
        .collect();

    let is_truncated = element(xml, "IsTruncated")
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let next_marker = element(xml, "NextMarker").filter(|m| !m.is_empty());

    Ok(ListingPage {
        objects,
        common_prefixes,
        is_truncated,
        next_marker,
    })
}

/// Request body for a quiet multi-object delete.
pub fn delete_request_body(keys: &[String]) -> String {
    let mut body = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Delete><Quiet>true</Quiet>"#);
    for key in keys {
        body.push_str("<Object><Key>");
        body.push_str(&escape(key));
        body.push_str("</Key></Object>");
    }
    body.push_str("</Delete>");
    body
}

/// Keys reported in `<Error>` entries of a `DeleteResult` document.
pub fn parse_delete_errors(xml: &str) -> Vec<String> {
    elements(xml, "Error")
        .into_iter()
        .filter_map(|e| element(e, "Key"))
        .collect()
}

/// Human-readable summary of an S3 `<Error>` response body.
pub fn error_message(xml: &str) -> String {
    match (element(xml, "Code"), element(xml, "Message")) {
        (Some(code), Some(msg)) => format!("{}: {}", code, msg),
        (Some(code), None) => code,
        (None, Some(msg)) => msg,
        (None, None) => xml.trim().chars().take(200).collect(),
    }
}
