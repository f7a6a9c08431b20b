//! Open-redirect-safe resolution of the `next` query parameter.

use std::fmt::Write;

use crate::error::Error;

/// Message returned when `next` carries a scheme or host.
pub const ABSOLUTE_NEXT_MESSAGE: &str =
    "Absolute URLs are not allowed in the `next` parameter for security reasons";

/// Resolves an untrusted `next` hint to a root-relative path.
///
/// When the parameter was supplied more than once, the last value wins. An
/// empty slice means the parameter was absent and resolves to `/`.
///
/// Tabs and line breaks are dropped and backslashes read as slashes before
/// inspection, matching what a browser does with a `Location` value.
///
/// # Errors
///
/// Returns [`Error::BadRequest`] if the candidate is an absolute or
/// protocol-relative URL.
pub fn resolve_next<S: AsRef<str>>(values: &[S]) -> Result<String, Error> {
    let candidate = values.last().map_or("", AsRef::as_ref);
    let normalized: String = candidate
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();

    if has_host(&normalized) {
        tracing::warn!(next = %candidate, "Rejected absolute URL in next parameter");
        return Err(Error::BadRequest(ABSOLUTE_NEXT_MESSAGE.into()));
    }

    Ok(encode_location(&resolve_from_root(&normalized)))
}

fn has_host(candidate: &str) -> bool {
    let trimmed = candidate.trim_start_matches(|c: char| c.is_ascii_control() || c == ' ');
    trimmed.starts_with("//") || has_scheme(trimmed)
}

/// `scheme ":"` per RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn has_scheme(candidate: &str) -> bool {
    let Some((scheme, _)) = candidate.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// POSIX `resolve("/", path)`: never climbs above the root.
fn resolve_from_root(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

fn encode_location(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_graphic() {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
