//! Body extraction and text normalization
//!
//! Picks the readable part out of a mailbox MIME tree, decodes its base64url
//! payload, and turns HTML into plain text through a fixed sequence of
//! regex passes:
//!
//! 1. drop `<script>`/`<style>` blocks with their content
//! 2. `<br>` → newline, `</p>` → blank line
//! 3. every remaining tag → a single space
//! 4. decode HTML entities
//! 5. drop tokens starting with `http`
//! 6. collapse whitespace and trim
//!
//! Each pass is its own function so it can be tested in isolation.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;

use crate::models::MessagePart;

/// Base64url engine that accepts padded and unpadded input
const BASE64URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

static SCRIPT_OR_STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script.*?>.*?</script>|<style.*?>.*?</style>").expect("static regex")
});
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<br\s*/?>").expect("static regex"));
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static URL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)http\S*").expect("static regex"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Extract readable body text from a message payload
///
/// For multipart payloads the tree is searched depth-first for the first
/// `text/html` part, then for the first `text/plain` part. Attachments and
/// other media types are ignored. A payload without usable parts falls back
/// to its own body data. Returns an empty string when nothing is found.
pub fn extract_body(payload: &MessagePart) -> String {
    if !payload.parts.is_empty()
        && let Some(part) = find_part(payload, "text/html").or_else(|| find_part(payload, "text/plain"))
    {
        return normalize(part);
    }

    if payload.body.data.is_some() {
        return normalize(payload);
    }

    String::new()
}

/// Normalize a single leaf part into plain text
///
/// `text/plain` is only decoded; every other media type goes through
/// [`clean_html`]. A part without data yields an empty string.
pub fn normalize(part: &MessagePart) -> String {
    let Some(data) = part.body.data.as_deref() else {
        return String::new();
    };
    let text = decode_text(data);
    if part.mime_type.eq_ignore_ascii_case("text/plain") {
        text
    } else {
        clean_html(&text)
    }
}

/// Depth-first search for the first inline leaf part of `mime_type`
fn find_part<'a>(part: &'a MessagePart, mime_type: &str) -> Option<&'a MessagePart> {
    part.parts.iter().find_map(|sub| {
        if sub.parts.is_empty() {
            is_inline_body(sub, mime_type).then_some(sub)
        } else {
            find_part(sub, mime_type)
        }
    })
}

fn is_inline_body(part: &MessagePart, mime_type: &str) -> bool {
    part.mime_type.eq_ignore_ascii_case(mime_type)
        && part.body.attachment_id.is_none()
        && part.filename.as_deref().is_none_or(str::is_empty)
        && part.body.data.as_deref().is_some_and(|d| !d.is_empty())
}

/// Decode base64url data into text
///
/// Invalid UTF-8 sequences are replaced; undecodable base64 yields an empty
/// string.
pub fn decode_text(data: &str) -> String {
    match BASE64URL_LENIENT.decode(data.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::warn!("discarding undecodable body part: {e}");
            String::new()
        }
    }
}

/// Convert an HTML fragment into a single line of plain text
pub fn clean_html(html: &str) -> String {
    let text = strip_script_and_style(html);
    let text = replace_line_breaks(&text);
    let text = strip_tags(&text);
    let text = decode_entities(&text);
    let text = strip_urls(&text);
    collapse_whitespace(&text)
}

/// Remove `<script>` and `<style>` blocks including their content
///
/// One leftmost scan: whichever block opens first is removed up to its own
/// closing tag, so interleaved blocks behave as a single pass would.
pub fn strip_script_and_style(html: &str) -> String {
    SCRIPT_OR_STYLE_BLOCK.replace_all(html, "").into_owned()
}

/// `<br>` (any form) → `\n`, `</p>` → `\n\n`
pub fn replace_line_breaks(html: &str) -> String {
    LINE_BREAK.replace_all(html, "\n").replace("</p>", "\n\n")
}

/// Replace every remaining tag with a single space
pub fn strip_tags(html: &str) -> String {
    ANY_TAG.replace_all(html, " ").into_owned()
}

/// Decode named and numeric HTML entities
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Drop whitespace-delimited tokens that start with `http`
pub fn strip_urls(text: &str) -> String {
    URL_TOKEN.replace_all(text, "$1").into_owned()
}

/// Collapse whitespace runs to one space and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_owned()
}

/// Truncate string to maximum characters (Unicode-aware)
///
/// Preserves complete characters, never splitting multi-byte sequences.
pub fn truncate_chars(input: String, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].to_owned(),
        None => input,
    }
}
