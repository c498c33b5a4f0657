//! Code splitters
//!
//! Two strategies turn file content into chunks with line ranges:
//! - `langchain`: fixed-size character windows with overlap, cut on line boundaries
//! - `ast`: packs top-level declaration blocks together, falling back to windows
//!   for blocks that are too large on their own

use std::fmt;

/// Splitter selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SplitterKind {
    #[default]
    Ast,
    Langchain,
}

impl SplitterKind {
    pub const NAMES: [&'static str; 2] = ["ast", "langchain"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ast => "ast",
            Self::Langchain => "langchain",
        }
    }

    /// Default (chunk size in characters, overlap in characters)
    pub fn default_settings(&self) -> (usize, usize) {
        match self {
            Self::Ast => (2500, 300),
            Self::Langchain => (1000, 200),
        }
    }

    /// Split `content` with this strategy's default settings
    pub fn split(&self, content: &str) -> Vec<CodeChunk> {
        let (chunk_size, overlap) = self.default_settings();
        match self {
            Self::Ast => split_blocks(content, chunk_size, overlap),
            Self::Langchain => split_windows(content, chunk_size, overlap),
        }
    }
}

impl fmt::Display for SplitterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk of file content with 1-based inclusive line numbers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChunk {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// Character-window split
pub fn split_windows(content: &str, chunk_size: usize, overlap: usize) -> Vec<CodeChunk> {
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();
    window_lines(&lines, 1, chunk_size.max(1), overlap, &mut chunks);
    chunks
}

/// Declaration-block split
pub fn split_blocks(content: &str, chunk_size: usize, overlap: usize) -> Vec<CodeChunk> {
    let chunk_size = chunk_size.max(1);
    let lines: Vec<&str> = content.lines().collect();
    let mut chunks = Vec::new();

    // Pending packed range [start, end) and its size
    let mut pending: Option<(usize, usize)> = None;
    let mut pending_size = 0usize;

    for (start, end) in block_ranges(&lines) {
        let size = range_size(&lines[start..end]);

        if size > chunk_size {
            if let Some((s, e)) = pending.take() {
                push_chunk(&lines[s..e], s + 1, &mut chunks);
            }
            pending_size = 0;
            window_lines(&lines[start..end], start + 1, chunk_size, overlap, &mut chunks);
            continue;
        }

        match pending {
            Some((s, _)) if pending_size + size <= chunk_size => {
                pending = Some((s, end));
                pending_size += size;
            }
            Some((s, e)) => {
                push_chunk(&lines[s..e], s + 1, &mut chunks);
                pending = Some((start, end));
                pending_size = size;
            }
            None => {
                pending = Some((start, end));
                pending_size = size;
            }
        }
    }

    if let Some((s, e)) = pending {
        push_chunk(&lines[s..e], s + 1, &mut chunks);
    }

    chunks
}

/// Top-level blocks: a block starts at a non-indented line that follows a blank line
fn block_ranges(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0;

    for i in 1..lines.len() {
        let line = lines[i];
        let starts_block = lines[i - 1].trim().is_empty()
            && !line.trim().is_empty()
            && !line.starts_with(char::is_whitespace)
            && !line.starts_with(['}', ')', ']']);
        if starts_block {
            ranges.push((start, i));
            start = i;
        }
    }

    if start < lines.len() {
        ranges.push((start, lines.len()));
    }
    ranges
}

fn range_size(lines: &[&str]) -> usize {
    lines.iter().map(|l| l.chars().count() + 1).sum()
}

fn window_lines(
    lines: &[&str],
    first_line: usize,
    chunk_size: usize,
    overlap: usize,
    chunks: &mut Vec<CodeChunk>,
) {
    let mut start = 0;

    while start < lines.len() {
        let mut end = start;
        let mut size = 0usize;
        while end < lines.len() {
            let len = lines[end].chars().count() + 1;
            if end > start && size + len > chunk_size {
                break;
            }
            size += len;
            end += 1;
        }

        if end == start + 1 && size > chunk_size + 1 {
            // A single line longer than a chunk is cut into character windows
            let chars: Vec<char> = lines[start].chars().collect();
            for piece in chars.chunks(chunk_size) {
                let text: String = piece.iter().collect();
                if !text.trim().is_empty() {
                    chunks.push(CodeChunk {
                        content: text,
                        start_line: first_line + start,
                        end_line: first_line + start,
                    });
                }
            }
        } else {
            push_chunk(&lines[start..end], first_line + start, chunks);
        }

        if end >= lines.len() {
            break;
        }

        // Step back over trailing lines that fit in the overlap budget
        let mut back = end;
        let mut overlap_size = 0usize;
        while back > start + 1 {
            let len = lines[back - 1].chars().count() + 1;
            if overlap_size + len > overlap {
                break;
            }
            overlap_size += len;
            back -= 1;
        }
        start = back;
    }
}

fn push_chunk(lines: &[&str], start_line: usize, chunks: &mut Vec<CodeChunk>) {
    if lines.is_empty() {
        return;
    }
    let content = lines.join("\n");
    if content.trim().is_empty() {
        return;
    }
    chunks.push(CodeChunk {
        content,
        start_line,
        end_line: start_line + lines.len() - 1,
    });
}

/// Language name for a file extension (with or without the leading dot)
pub fn language_for_extension(ext: &str) -> &'static str {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "go" => "go",
        "rs" => "rust",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "php" => "php",
        "rb" => "ruby",
        "swift" => "swift",
        "m" | "mm" => "objective-c",
        "lua" => "lua",
        "dart" => "dart",
        "ex" | "exs" => "elixir",
        "erl" => "erlang",
        "hs" => "haskell",
        "zig" => "zig",
        "sol" => "solidity",
        "sh" => "shell",
        "sql" => "sql",
        "vue" => "vue",
        "svelte" => "svelte",
        "html" => "html",
        "css" | "scss" => "css",
        "md" | "markdown" => "markdown",
        "ipynb" => "jupyter",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => "text",
    }
}
