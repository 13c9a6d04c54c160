//! SQL identifier quoting and validation.

use std::sync::OnceLock;

use regex::Regex;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap_or_else(|e| {
            unreachable!("identifier pattern is a literal: {e}");
        })
    })
}

/// True if `name` is a plain, unquoted-safe SQL identifier.
///
/// Descriptors are checked against this when a registry is built so that a
/// drifted or hand-edited descriptor fails fast instead of producing SQL that
/// only breaks at execution time.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Quote an identifier with double quotes (ANSI, PostgreSQL, SQLite).
///
/// Embedded quotes are doubled.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for ch in name.chars() {
        if ch == '"' {
            out.push('"');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
