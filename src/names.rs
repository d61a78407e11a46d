//! XML name and lexical-form validation
//!
//! This module provides the lexical checks behind the primitive datatypes
//! the attribute checker delegates to: NCName, ID, QName, token, language
//! and anyURI.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}",
        r"\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}",
        r"\u{FDF0}-\u{FFFD}\u{10000}-\u{EFFFF}]",
        r"[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}",
        r"\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}",
        r"\u{FDF0}-\u{FFFD}\u{10000}-\u{EFFFF}\-\.0-9\u{B7}\u{300}-\u{36F}\u{203F}-\u{2040}]*$"
    ))
    .unwrap()
});

static LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap());

static URI_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([^0-9A-Fa-f]|.[^0-9A-Fa-f]|.?$)").unwrap());

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    !name.is_empty() && NCNAME.is_match(name)
}

/// Check if a string is a valid QName (qualified name)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Check if a string is in the lexical space of `xs:token`
pub fn is_valid_token(value: &str) -> bool {
    !value.contains(&['\n', '\r', '\t'][..])
        && !value.starts_with(' ')
        && !value.ends_with(' ')
        && !value.contains("  ")
}

/// Check if a string is a valid `xs:language` value
pub fn is_valid_language(value: &str) -> bool {
    LANGUAGE.is_match(value)
}

/// Check if a string is a plausible `xs:anyURI`
///
/// Characters that need escaping are tolerated; malformed percent escapes
/// and more than one fragment separator are not.
pub fn is_valid_any_uri(value: &str) -> bool {
    value.matches('#').count() <= 1 && !URI_ESCAPE.is_match(value)
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Validate a QName and return an error if invalid
pub fn validate_qname(name: &str) -> Result<()> {
    if is_valid_qname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid QName: '{}'", name)))
    }
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Trim XML whitespace (space, tab, CR, LF) from both ends
pub fn trim_xml(value: &str) -> &str {
    value.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// Split on XML whitespace, skipping empty tokens
pub fn xml_tokens(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .filter(|t| !t.is_empty())
}
