//! Stdio framing for MCP messages
//!
//! Two framings are supported: newline-delimited JSON (`Line`) and
//! `Content-Length` headers as used by LSP (`Lsp`). When no mode is forced
//! the first non-blank line decides.

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum line length in line mode (10MB)
const MAX_LINE_LENGTH: usize = 10 * 1024 * 1024;

/// Maximum header line length in LSP mode
const MAX_HEADER_LENGTH: usize = 1024;

/// Maximum number of header lines, skipped blank lines included
pub const MAX_HEADER_COUNT: usize = 100;

/// Maximum LSP payload (10MB)
const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransportMode {
    Lsp,
    Line,
}

pub fn is_header_line(line: &str) -> bool {
    match line.split_once(':') {
        Some((name, _)) => {
            let name = name.trim();
            name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("content-type")
        }
        None => false,
    }
}

/// `Some(length)` for a valid Content-Length header, `None` for any other line
pub fn parse_content_length(line: &str) -> Result<Option<usize>> {
    let Some((name, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return Ok(None);
    }

    value
        .trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|e| anyhow!("Invalid Content-Length header: {}", e))
}

/// Read one line without its terminator. `None` at end of input.
async fn read_trimmed_line<R>(reader: &mut R, max_len: usize) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    if line.len() > max_len {
        bail!(
            "Line length {} exceeds maximum allowed size of {} bytes",
            line.len(),
            max_len
        );
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn read_line_message<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = read_trimmed_line(reader, MAX_LINE_LENGTH).await? {
        if !line.is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

/// Read headers then the payload. `first_line` is a header already consumed
/// during auto-detection.
async fn read_lsp_message<R>(reader: &mut R, first_line: Option<String>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length = None;
    let mut pending = first_line;
    let mut seen_header = false;

    for _ in 0..MAX_HEADER_COUNT {
        let line = match pending.take() {
            Some(line) => line,
            None => match read_trimmed_line(reader, MAX_HEADER_LENGTH).await? {
                Some(line) => line,
                None => return Ok(None),
            },
        };

        if line.is_empty() {
            if seen_header {
                return read_lsp_payload(reader, content_length).await.map(Some);
            }
            continue;
        }

        seen_header = true;
        if let Some(len) = parse_content_length(&line)? {
            content_length = Some(len);
        }
    }

    bail!(
        "Too many header lines or skipped blank lines (limit {})",
        MAX_HEADER_COUNT
    )
}

async fn read_lsp_payload<R>(reader: &mut R, content_length: Option<usize>) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let length =
        content_length.ok_or_else(|| anyhow!("Missing Content-Length header in LSP message"))?;
    if length > MAX_MESSAGE_SIZE {
        bail!(
            "Content-Length {} exceeds maximum allowed size of {} bytes",
            length,
            MAX_MESSAGE_SIZE
        );
    }

    let mut buf = vec![0u8; length];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| anyhow!("Invalid UTF-8 payload: {}", e))
}

/// Read the next message, fixing `mode` on the first message when it is unset
pub async fn read_message<R>(reader: &mut R, mode: &mut Option<TransportMode>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match mode {
        Some(TransportMode::Line) => read_line_message(reader).await,
        Some(TransportMode::Lsp) => read_lsp_message(reader, None).await,
        None => {
            let Some(first) = read_line_message(reader).await? else {
                return Ok(None);
            };
            if is_header_line(&first) {
                *mode = Some(TransportMode::Lsp);
                return read_lsp_message(reader, Some(first)).await;
            }
            *mode = Some(TransportMode::Line);
            Ok(Some(first))
        }
    }
}

pub async fn write_message<W>(writer: &mut W, mode: TransportMode, payload: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buffer = Vec::with_capacity(payload.len() + 32);
    match mode {
        TransportMode::Line => {
            buffer.extend_from_slice(payload.as_bytes());
            buffer.push(b'\n');
        }
        TransportMode::Lsp => {
            buffer.extend_from_slice(format!("Content-Length: {}\r\n\r\n", payload.len()).as_bytes());
            buffer.extend_from_slice(payload.as_bytes());
        }
    }

    writer.write_all(&buffer).await?;
    writer.flush().await?;
    Ok(())
}
