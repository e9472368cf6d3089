//! Core data models used throughout the filing context engine.
//!
//! These types represent the chunks, ranked results, filings and cached
//! documents that flow through the sync and retrieval pipeline.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A line-range window over one source document.
///
/// Chunks are transient: they are recomputed for every query and dropped
/// when ranking returns.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Path of the document this chunk was cut from.
    pub source: PathBuf,
    /// Accession-shaped reference id extracted from `source`, if any.
    pub reference_id: Option<String>,
    /// 1-based inclusive first line.
    pub line_start: usize,
    /// 1-based inclusive last line.
    pub line_end: usize,
    /// Trimmed text of the window.
    pub text: String,
    pub token_count: usize,
    pub term_freqs: HashMap<String, u32>,
}

impl Chunk {
    pub fn term_frequency(&self, term: &str) -> u32 {
        self.term_freqs.get(term).copied().unwrap_or(0)
    }
}

/// A ranked chunk returned from the lexical ranking engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    /// 1-based position in the result list.
    pub rank: usize,
    /// Adjusted score, rounded to 6 decimal places.
    pub score: f64,
    /// BM25 score before heuristic adjustment, rounded to 6 decimal places.
    pub base_score: f64,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub line_start: usize,
    pub line_end: usize,
    /// Query terms that occur in this chunk, in query order.
    pub matched_terms: Vec<String>,
    pub excerpt: String,
}

/// Canonical identity of a filer, as returned by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Zero-padded canonical identifier (CIK).
    pub cik: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One filing row as listed by the filing catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRow {
    pub accession: String,
    pub form: String,
    #[serde(default)]
    pub filing_date: Option<String>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A filing whose normalized content lives in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub accession: String,
    pub form: String,
    #[serde(default)]
    pub filing_date: Option<String>,
    #[serde(default)]
    pub report_date: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    pub path: PathBuf,
}

impl CachedDocument {
    pub fn from_filing(row: &FilingRow, path: PathBuf) -> Self {
        Self {
            accession: row.accession.clone(),
            form: row.form.clone(),
            filing_date: row.filing_date.clone(),
            report_date: row.report_date.clone(),
            url: row.url.clone(),
            path,
        }
    }
}

/// A filing the sync could not fetch, with the reason it was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFiling {
    pub accession: String,
    pub form: String,
    pub reason: String,
}
