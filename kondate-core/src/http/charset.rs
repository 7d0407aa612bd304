//! Charset detection for fetched and cached pages.
//!
//! Cached detail pages are stored as raw bytes without headers, and many of
//! the broadcaster sites still serve Shift_JIS or EUC-JP. Detection order:
//!
//! 1. `charset=` in the Content-Type header, when one is known
//! 2. `charset=` inside a `<meta>` tag in the first 1024 bytes
//! 3. the bytes as UTF-8, if they are valid
//! 4. Shift_JIS, then EUC-JP, whichever decodes without errors
//! 5. lossy UTF-8

use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS};

const META_SCAN_LEN: usize = 1024;

/// Decode page bytes to a UTF-8 string.
pub fn decode_bytes_to_utf8(bytes: &[u8], content_type: Option<&str>) -> String {
    let declared = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_html_meta(bytes));

    if let Some(encoding) = declared {
        // decode() sniffs a BOM first, so `used` can differ from `encoding`.
        let (decoded, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            tracing::debug!(
                declared = encoding.name(),
                used = used.name(),
                "declared charset had decode errors"
            );
        }
        return decoded.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    for encoding in [SHIFT_JIS, EUC_JP] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            tracing::debug!(charset = encoding.name(), "detected charset");
            return text.into_owned();
        }
    }

    tracing::debug!("falling back to lossy UTF-8 conversion");
    String::from_utf8_lossy(bytes).into_owned()
}

/// `text/html; charset=Shift_JIS` -> SHIFT_JIS
fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let lower = content_type.to_ascii_lowercase();
    let (_, rest) = lower.split_once("charset=")?;
    label_to_encoding(rest.as_bytes())
}

/// Find `charset=` inside the first `<meta ...>` tag that declares one.
fn charset_from_html_meta(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(META_SCAN_LEN)];
    let mut offset = 0;

    while let Some(pos) = find_ignore_case(&head[offset..], b"charset=") {
        let charset_pos = offset + pos;
        let tag_start = head[..charset_pos].iter().rposition(|&b| b == b'<');
        let inside_meta = tag_start
            .map(|start| {
                let tag = &head[start..charset_pos];
                !tag.contains(&b'>') && find_ignore_case(tag, b"<meta").is_some()
            })
            .unwrap_or(false);

        let value = &head[charset_pos + b"charset=".len()..];
        if inside_meta {
            return label_to_encoding(value);
        }
        offset = charset_pos + 1;
    }
    None
}

/// Read a charset label up to the first delimiter and look it up.
fn label_to_encoding(value: &[u8]) -> Option<&'static Encoding> {
    let value = match value.first() {
        Some(b'"') | Some(b'\'') => &value[1..],
        _ => value,
    };
    let end = value
        .iter()
        .position(|b| {
            matches!(b, b'"' | b'\'' | b';' | b',' | b'>' | b'/') || b.is_ascii_whitespace()
        })
        .unwrap_or(value.len());
    let label = &value[..end];
    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label)
}

fn find_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}
