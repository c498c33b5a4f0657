//! Request validation shared by indexing and search

use std::path::Path;

use globset::Glob;

use crate::error::{IndexError, Result};
use crate::utils::path::canonical_key;
use crate::vector::{SplitterKind, UnknownSplitter};

/// Resolve a caller path to its snapshot key, requiring an existing directory
pub fn resolve_codebase_path(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IndexError::validation(raw, "path must not be empty"));
    }

    let key = canonical_key(raw);
    let path = Path::new(&key);
    if !path.exists() {
        return Err(IndexError::validation(
            &key,
            format!("path '{}' does not exist", raw),
        ));
    }
    if !path.is_dir() {
        return Err(IndexError::validation(
            &key,
            format!("path '{}' is not a directory", raw),
        ));
    }
    Ok(key)
}

/// Snapshot key for read-only lookups; the directory need not exist any more
pub fn lookup_key(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(IndexError::validation(raw, "path must not be empty"));
    }
    Ok(canonical_key(raw))
}

pub fn is_valid_extension(ext: &str) -> bool {
    ext.len() > 1 && ext.starts_with('.') && !ext.contains(char::is_whitespace)
}

/// Check every extension and name all offending entries in one error
pub fn validate_extensions(key: &str, extensions: &[String]) -> Result<Vec<String>> {
    let invalid: Vec<&str> = extensions
        .iter()
        .map(String::as_str)
        .filter(|ext| !is_valid_extension(ext))
        .collect();

    if !invalid.is_empty() {
        return Err(IndexError::validation(
            key,
            format!(
                "invalid file extensions: {}. Extensions must start with '.' and contain no whitespace",
                invalid.join(", ")
            ),
        ));
    }
    Ok(extensions.to_vec())
}

/// Ignore patterns must be non-empty globs without whitespace
pub fn validate_ignore_patterns(key: &str, patterns: &[String]) -> Result<Vec<String>> {
    let invalid: Vec<&str> = patterns
        .iter()
        .map(String::as_str)
        .filter(|p| p.is_empty() || p.contains(char::is_whitespace) || Glob::new(p).is_err())
        .collect();

    if !invalid.is_empty() {
        return Err(IndexError::validation(
            key,
            format!("invalid ignore patterns: {}", invalid.join(", ")),
        ));
    }
    Ok(patterns.to_vec())
}

/// `None` selects the default splitter
pub fn parse_splitter(key: &str, name: Option<&str>) -> Result<SplitterKind> {
    match name {
        None => Ok(SplitterKind::default()),
        Some(name) => name
            .parse()
            .map_err(|e: UnknownSplitter| IndexError::validation(key, e.to_string())),
    }
}
