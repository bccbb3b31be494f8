// src/naming.rs

//! Filesystem-safe unit names.
//!
//! The sanitized name is the join key between the ledger, the source file,
//! the log file and the scheduler line, so every entry point must go through
//! [`sanitize_name`] before touching any of them.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, RunledgerError};

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("literal pattern compiles"));

/// Strip path separators, `..`, `~` and anything outside `[a-zA-Z0-9._-]`,
/// then trim leading and trailing `.`/`-`.
///
/// Returns an empty string when nothing usable is left.
pub fn sanitize(raw: &str) -> String {
    let mut name = raw.replace(['/', '\\', '~'], "");
    name = DISALLOWED.replace_all(&name, "").into_owned();

    // Removing one `..` can glue two dots together again ("...." -> ".."),
    // so repeat until stable.
    while name.contains("..") {
        name = name.replace("..", "");
    }

    name.trim_matches(|c| c == '.' || c == '-').to_string()
}

/// Like [`sanitize`], but rejects names that sanitize to nothing.
pub fn sanitize_name(raw: &str) -> Result<String> {
    let name = sanitize(raw);
    if name.is_empty() {
        return Err(RunledgerError::InvalidName(raw.to_string()));
    }
    Ok(name)
}
