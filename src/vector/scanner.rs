//! Codebase file scanner
//!
//! Walks a codebase, honouring `.gitignore`, the default exclude list and any
//! per-run ignore globs, and returns decoded, sanitized text files.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use encoding_rs::{GB18030, GBK, UTF_8, WINDOWS_1252};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::Config;
use crate::utils::path::normalize_relative_path;

/// Maximum file size in bytes (500KB)
pub const MAX_FILE_SIZE: usize = 500 * 1024;

/// A text file ready to be split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the codebase root, forward slashes
    pub relative_path: String,
    /// Lower-case extension including the dot, empty when none
    pub extension: String,
    pub content: String,
}

/// File scanner for one codebase
pub struct FileScanner {
    root: PathBuf,
    text_extensions: HashSet<String>,
    text_filenames: HashSet<String>,
    compiled_patterns: Vec<(String, Option<Regex>)>,
    ignore_globs: GlobSet,
}

impl FileScanner {
    pub fn new(
        config: &Config,
        root: PathBuf,
        custom_extensions: &[String],
        ignore_patterns: &[String],
    ) -> Result<Self> {
        // Precompile exclude patterns to regex
        let compiled_patterns = config
            .exclude_patterns
            .iter()
            .map(|pattern| (pattern.clone(), compile_wildcard(pattern)))
            .collect();

        let mut builder = GlobSetBuilder::new();
        for pattern in ignore_patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| anyhow!("Invalid ignore pattern '{}': {}", pattern, e))?;
            builder.add(glob);
        }
        let ignore_globs = builder.build()?;

        let mut text_extensions = config.text_extensions.clone();
        text_extensions.extend(custom_extensions.iter().map(|e| e.to_lowercase()));

        Ok(Self {
            root,
            text_extensions,
            text_filenames: config.text_filenames.clone(),
            compiled_patterns,
            ignore_globs,
        })
    }

    /// Load gitignore patterns
    fn load_gitignore(&self) -> Option<Gitignore> {
        let gitignore_path = self.root.join(".gitignore");
        if !gitignore_path.exists() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        if let Some(err) = builder.add(&gitignore_path) {
            warn!(
                "Error parsing .gitignore (continuing with valid patterns): {}",
                err
            );
        }

        builder.build().ok()
    }

    /// Check if a path should be excluded
    pub fn should_exclude(&self, path: &Path, is_dir: bool, gitignore: Option<&Gitignore>) -> bool {
        let relative_path = match path.strip_prefix(&self.root) {
            Ok(p) => p,
            Err(_) => return false,
        };

        let path_str = normalize_relative_path(&relative_path.to_string_lossy());
        if path_str.is_empty() {
            return false;
        }

        if let Some(gi) = gitignore {
            if gi.matched(&path_str, is_dir).is_ignore() {
                return true;
            }
        }

        let path_parts: Vec<&str> = path_str.split('/').collect();

        if self.ignore_globs.is_match(&path_str)
            || path_parts.iter().any(|part| self.ignore_globs.is_match(part))
        {
            return true;
        }

        for (pattern, compiled_regex) in &self.compiled_patterns {
            match compiled_regex {
                Some(regex) => {
                    if path_parts.iter().any(|part| regex.is_match(part))
                        || regex.is_match(&path_str)
                    {
                        return true;
                    }
                }
                None => {
                    if path_parts.iter().any(|part| part == pattern) || path_str == *pattern {
                        return true;
                    }
                }
            }
        }

        false
    }

    fn is_candidate(&self, path: &Path) -> Option<String> {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();

        let is_known_filename = self.text_filenames.contains(filename);
        let is_known_extension = !ext.is_empty() && self.text_extensions.contains(&ext);
        (is_known_filename || is_known_extension).then_some(ext)
    }

    /// Collect all indexable files
    pub fn collect_files(&self) -> Result<Vec<ScannedFile>> {
        let mut files = Vec::new();
        let gitignore = self.load_gitignore();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !self.should_exclude(e.path(), e.file_type().is_dir(), gitignore.as_ref())
            })
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to access entry during directory walk: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(extension) = self.is_candidate(path) else {
                continue;
            };

            let relative_path = normalize_relative_path(
                &path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy(),
            );

            // Check file size before reading to avoid memory spikes
            match fs::metadata(path) {
                Ok(metadata) if metadata.len() > MAX_FILE_SIZE as u64 => {
                    warn!(
                        "Skipping large file: {} ({}KB)",
                        relative_path,
                        metadata.len() / 1024
                    );
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to get metadata for {}: {}, skipping", relative_path, e);
                    continue;
                }
            }

            let content = match read_file_with_encoding(path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Failed to read file {}: {}", relative_path, e);
                    continue;
                }
            };

            if is_binary_content(&content) {
                continue;
            }

            let content = sanitize_content(&content);
            if content.trim().is_empty() {
                continue;
            }

            files.push(ScannedFile {
                relative_path,
                extension,
                content,
            });
        }

        Ok(files)
    }
}

/// Compile a `*`/`?` wildcard into an anchored regex
pub fn compile_wildcard(pattern: &str) -> Option<Regex> {
    let regex_pattern = pattern
        .replace('.', "\\.")
        .replace('*', ".*")
        .replace('?', ".");
    Regex::new(&format!("^{}$", regex_pattern)).ok()
}

/// Read file with encoding detection
pub fn read_file_with_encoding(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;

    for encoding in [UTF_8, GBK, GB18030, WINDOWS_1252] {
        let (content, _, had_errors) = encoding.decode(&bytes);
        if !had_errors {
            let replacement_count = content.matches('\u{FFFD}').count();
            let threshold = if content.len() < 100 {
                5
            } else {
                (content.len() as f64 * 0.05) as usize
            };

            if replacement_count <= threshold {
                return Ok(content.into_owned());
            }
        }
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Remove control characters other than newline, carriage return and tab
pub fn sanitize_content(content: &str) -> String {
    content
        .chars()
        .filter(|c| !matches!(*c, '\x00'..='\x08' | '\x0B' | '\x0C' | '\x0E'..='\x1F' | '\x7F'))
        .collect()
}

/// Check if content appears to be binary (more than 10% control characters)
pub fn is_binary_content(content: &str) -> bool {
    let total_chars = content.chars().count();
    if total_chars == 0 {
        return false;
    }
    let non_printable = content
        .chars()
        .filter(|c| matches!(*c, '\x00'..='\x08' | '\x0E'..='\x1F' | '\x7F'))
        .count();
    non_printable > total_chars / 10
}
