//! Minimal URL decomposition for `scheme://host[:port][/path][?query]`.
//!
//! # Design
//! No URI grammar is applied. Each component is found by searching for a
//! handful of delimiters, and every result borrows from the input string.
//! Scheme, host and path require the `"://"` delimiter; the query does not
//! look for it at all, so `"not-a-url?x=1"` still has the query `x=1`.
//!
//! The path begins at the first `/` after the scheme delimiter even when a
//! `?` appears earlier, so `"http://h?a=/b"` has the path `/b`.

use crate::error::UrlError;

const SCHEME_DELIMITER: &str = "://";

/// Characters that end the host component.
const HOST_TERMINATORS: [char; 3] = ['/', ':', '?'];

/// All four components of a URL, borrowed from the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlParts<'u> {
    pub scheme: &'u str,
    pub host: &'u str,
    pub path: &'u str,
    pub query: &'u str,
}

/// Byte offset of the `"://"` delimiter.
fn delimiter_start(url: &str) -> Result<usize, UrlError> {
    url.find(SCHEME_DELIMITER)
        .ok_or_else(|| UrlError::MissingSchemeDelimiter {
            url: url.to_string(),
        })
}

/// Everything after the `"://"` delimiter.
fn after_delimiter(url: &str) -> Result<&str, UrlError> {
    let start = delimiter_start(url)? + SCHEME_DELIMITER.len();
    Ok(&url[start..])
}

/// Substring before `"://"`.
pub fn scheme(url: &str) -> Result<&str, UrlError> {
    let end = delimiter_start(url)?;
    Ok(&url[..end])
}

/// Substring after `"://"` up to the first `/`, `:` or `?`.
pub fn host(url: &str) -> Result<&str, UrlError> {
    let rest = after_delimiter(url)?;
    let end = rest.find(HOST_TERMINATORS).unwrap_or(rest.len());
    Ok(&rest[..end])
}

/// Substring from the first `/` after `"://"` up to the next `?`.
///
/// Returns the empty string when no `/` follows the delimiter.
pub fn path(url: &str) -> Result<&str, UrlError> {
    let rest = after_delimiter(url)?;
    let Some(slash) = rest.find('/') else {
        return Ok("");
    };
    let tail = &rest[slash..];
    let end = tail.find('?').unwrap_or(tail.len());
    Ok(&tail[..end])
}

/// Substring after the first `?`, or the empty string. Never fails.
pub fn query(url: &str) -> &str {
    match url.find('?') {
        Some(mark) => &url[mark + 1..],
        None => "",
    }
}

/// Extract every component in one call.
pub fn decompose(url: &str) -> Result<UrlParts<'_>, UrlError> {
    Ok(UrlParts {
        scheme: scheme(url)?,
        host: host(url)?,
        path: path(url)?,
        query: query(url),
    })
}
