//! Message body parsing and MIME handling
//!
//! Parses the fetched `TEXT` body part using `mailparse`, re-attaching the
//! fetched header block so content type and transfer encoding are honoured.
//! HTML-like tags are removed with a pattern substitution; this is a
//! best-effort cleanup, not an HTML renderer.

use mailparse::{DispositionType, ParsedMail};
use regex::Regex;

use crate::errors::{AppError, AppResult};

/// Parse a fetched text body part into plain text
///
/// Prefers the first inline `text/plain` part, falling back to the first
/// inline `text/html` part. Returns an empty string when the body has no
/// textual part.
///
/// # Errors
///
/// - `Parse` if the MIME structure or a part's transfer encoding is invalid
pub fn parse_text_part(header: Option<&[u8]>, text: &[u8]) -> AppResult<String> {
    let raw = assemble_message(header, text);
    let parsed = mailparse::parse_mail(&raw)
        .map_err(|e| AppError::Parse(format!("failed to parse MIME body: {e}")))?;

    let mut plain = None;
    let mut html = None;
    walk_parts(&parsed, &mut plain, &mut html)?;

    let body = plain.or(html).unwrap_or_default();
    strip_tags(&body)
}

/// Join header and body with exactly one blank line between them
///
/// Without a header block the body is prefixed by an empty header section so
/// that body lines are never mistaken for headers.
fn assemble_message(header: Option<&[u8]>, text: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(header.map_or(0, <[u8]>::len) + text.len() + 4);
    if let Some(header) = header {
        let trimmed = trim_trailing_newlines(header);
        raw.extend_from_slice(trimmed);
        if !trimmed.is_empty() {
            raw.extend_from_slice(b"\r\n");
        }
    }
    raw.extend_from_slice(b"\r\n");
    raw.extend_from_slice(text);
    raw
}

fn trim_trailing_newlines(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != b'\r' && *b != b'\n')
        .map_or(0, |idx| idx + 1);
    &bytes[..end]
}

/// Walk MIME part tree depth-first collecting the first text bodies
fn walk_parts(
    part: &ParsedMail<'_>,
    plain: &mut Option<String>,
    html: &mut Option<String>,
) -> AppResult<()> {
    if part.subparts.is_empty() {
        let ctype = part.ctype.mimetype.to_ascii_lowercase();
        let disp = part.get_content_disposition();
        let is_attachment = disp.disposition == DispositionType::Attachment
            || disp.params.contains_key("filename");
        if is_attachment {
            return Ok(());
        }

        let slot = match ctype.as_str() {
            "text/plain" if plain.is_none() => plain,
            "text/html" if html.is_none() => html,
            _ => return Ok(()),
        };
        let body = part
            .get_body()
            .map_err(|e| AppError::Parse(format!("failed decoding {ctype} part: {e}")))?;
        *slot = Some(body);
        return Ok(());
    }

    for sub in &part.subparts {
        walk_parts(sub, plain, html)?;
    }
    Ok(())
}

/// Remove anything that looks like a markup tag
pub fn strip_tags(input: &str) -> AppResult<String> {
    let tag = Regex::new(r"<[^>]*>")
        .map_err(|e| AppError::Internal(format!("invalid tag regex: {e}")))?;
    Ok(tag.replace_all(input, "").into_owned())
}

/// Truncate string to maximum characters (Unicode-aware)
///
/// Preserves complete characters, never splitting multi-byte sequences.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

/// Decode a header value that may contain RFC 2047 encoded words
pub fn decode_header_value(raw: &[u8]) -> String {
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    match mailparse::parse_header(&line) {
        Ok((header, _)) => header.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}
