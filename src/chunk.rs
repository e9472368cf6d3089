//! Sliding line-window chunker.
//!
//! Splits document text into overlapping [`Chunk`]s of `chunk_lines` lines,
//! advancing by `chunk_lines - chunk_overlap` lines per window. Each chunk
//! carries its exact 1-based line range plus the token statistics the
//! ranking engine needs (token count and a term-frequency map).
//!
//! The tokenizer here is shared with query normalization so that chunk terms
//! and query terms are always produced the same way.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Accession number shape: 10-digit filer id, 2-digit year, 6-digit sequence.
static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{10}-\d{2}-\d{6}").expect("valid accession regex"));

/// Minimum token length kept by [`tokenize`].
const MIN_TOKEN_CHARS: usize = 2;

/// Check window parameters before any chunking happens.
pub fn validate_window(chunk_lines: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_lines == 0 {
        return Err(Error::validation("chunk_lines must be > 0"));
    }
    if chunk_overlap >= chunk_lines {
        return Err(Error::validation(format!(
            "chunk_overlap ({}) must be smaller than chunk_lines ({})",
            chunk_overlap, chunk_lines
        )));
    }
    Ok(())
}

/// Split `text` into line windows.
///
/// Windows whose text trims to empty are skipped. When the terminal window
/// is reached the loop stops, so every line is covered by at most
/// `ceil(lines / step)` windows. Returns chunks in document order.
pub fn chunk_text(
    source: &Path,
    text: &str,
    chunk_lines: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_window(chunk_lines, chunk_overlap)?;

    let lines: Vec<&str> = text.lines().collect();
    let step = chunk_lines - chunk_overlap;
    let reference_id = extract_reference_id(source);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < lines.len() {
        let end = (start + chunk_lines).min(lines.len());
        let window = lines[start..end].join("\n");
        let trimmed = window.trim();

        if !trimmed.is_empty() {
            chunks.push(make_chunk(
                source,
                reference_id.clone(),
                start + 1,
                end,
                trimmed,
            ));
        }

        if end == lines.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

fn make_chunk(
    source: &Path,
    reference_id: Option<String>,
    line_start: usize,
    line_end: usize,
    text: &str,
) -> Chunk {
    let tokens = tokenize(text);
    let token_count = tokens.len();

    let mut term_freqs: HashMap<String, u32> = HashMap::new();
    for token in tokens {
        *term_freqs.entry(token).or_insert(0) += 1;
    }

    Chunk {
        source: source.to_path_buf(),
        reference_id,
        line_start,
        line_end,
        text: text.to_string(),
        token_count,
        term_freqs,
    }
}

/// Lowercase `text` and return its maximal alphanumeric runs of two or more
/// characters, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Pull an accession-shaped id out of a document path, if one is present.
pub fn extract_reference_id(path: &Path) -> Option<String> {
    let s = path.to_string_lossy();
    ACCESSION_RE.find(&s).map(|m| m.as_str().to_string())
}
