//! Codebase path normalization
//!
//! Snapshot keys are canonical absolute paths with forward slashes, so the
//! same directory always maps to the same record regardless of how the
//! caller spelled it.

use std::path::{Path, PathBuf};

/// Convert a path to its forward-slash string form
pub fn to_forward_slashes(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    // Strip the Windows verbatim prefix produced by canonicalize
    match raw.strip_prefix("//?/") {
        Some(rest) => rest.to_string(),
        None => raw,
    }
}

/// Resolve a caller-supplied path into an absolute, canonical key.
///
/// Existing paths are canonicalized (symlinks resolved). Paths that do not
/// exist are made absolute against the current directory without touching the
/// filesystem, so lookups for deleted directories still find their records.
pub fn canonical_key(input: &str) -> String {
    let normalized = input.trim().replace('\\', "/");
    let path = PathBuf::from(&normalized);

    if let Ok(canonical) = std::fs::canonicalize(&path) {
        return trim_trailing_slash(to_forward_slashes(&canonical));
    }

    let absolute = if path.is_absolute() {
        path
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path,
        }
    };
    trim_trailing_slash(to_forward_slashes(&absolute))
}

fn trim_trailing_slash(s: String) -> String {
    if s.len() > 1 && s.ends_with('/') {
        s.trim_end_matches('/').to_string()
    } else {
        s
    }
}

/// Normalize a relative path string (for chunk paths)
pub fn normalize_relative_path(path: &str) -> String {
    path.replace('\\', "/")
}
