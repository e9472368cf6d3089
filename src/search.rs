//! Lexical ranking engine: BM25 with filing-specific re-ranking.
//!
//! Statistics are computed per call over the candidate chunk set; nothing is
//! indexed or cached between queries.
//!
//! # Scoring Algorithm
//!
//! 1. Normalize the query into deduplicated, stop-word-filtered terms and
//!    derive adjacent-term bigrams.
//! 2. Compute document frequency per query term and the mean chunk length.
//! 3. Score each chunk with BM25 (`k1 = 1.2`, `b = 0.75`).
//! 4. Adjust: hard coverage filter, coverage multiplier, bigram boost and
//!    cover-page boilerplate downranking.
//! 5. Drop non-positive scores, stable-sort descending (ties keep discovery
//!    order), truncate to `top_k`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::chunk::tokenize;
use crate::error::{Error, Result};
use crate::models::{Chunk, ScoredResult};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Boilerplate is only penalized near the top of a document.
const BOILERPLATE_MAX_LINE: usize = 140;
const BOILERPLATE_FACTOR: f64 = 0.45;

const BIGRAM_STEP: f64 = 0.08;
const BIGRAM_CAP: f64 = 0.24;

/// Maximum excerpt length in characters before truncation.
pub const EXCERPT_MAX_CHARS: usize = 1200;
const ELLIPSIS: &str = "...";

static STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has",
    "have", "how", "if", "in", "into", "is", "it", "its", "me", "more", "most", "my", "no", "not",
    "of", "on", "or", "our", "over", "should", "so", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "to", "under", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Cover-page phrasing found at the top of periodic and current reports.
static BOILERPLATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)securities\s+registered\s+pursuant\s+to\s+section\s+12",
        r"(?i)indicate\s+by\s+check\s+mark",
        r"(?i)commission\s+file\s+number",
        r"(?i)exact\s+name\s+of\s+registrant",
        r"(?i)i\.?r\.?s\.?\s+employer\s+identification",
        r"(?i)for\s+the\s+(fiscal\s+year|quarterly\s+period|transition\s+period)\s+ended",
        r"(?i)pursuant\s+to\s+section\s+13\s+or\s+15\s*\(d\)",
        r"(?i)large\s+accelerated\s+filer",
        r"(?i)emerging\s+growth\s+company",
        r"(?i)trading\s+symbol",
        r"(?i)state\s+or\s+other\s+jurisdiction\s+of\s+incorporation",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid boilerplate regex"))
    .collect()
});

static HORIZONTAL_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid whitespace regex"));
static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// A normalized query: terms in first-occurrence order plus bigrams.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    pub text: String,
    pub terms: Vec<String>,
    pub bigrams: Vec<String>,
}

impl Query {
    /// Tokenize and filter a free-text query.
    ///
    /// Stop words are removed unless that would leave nothing, in which case
    /// the unfiltered tokens are kept. Fails if the query has no
    /// alphanumeric content at all.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text);
        let filtered: Vec<String> = tokens
            .iter()
            .filter(|t| !STOP_WORDS.contains(&t.as_str()))
            .cloned()
            .collect();
        let kept = if filtered.is_empty() { tokens } else { filtered };

        let terms = dedup_in_order(kept);
        if terms.is_empty() {
            return Err(Error::validation(format!(
                "query has no searchable terms: {:?}",
                text
            )));
        }

        let bigrams = dedup_in_order(
            terms
                .windows(2)
                .map(|pair| format!("{} {}", pair[0], pair[1]))
                .collect(),
        );

        Ok(Self {
            text: text.to_string(),
            terms,
            bigrams,
        })
    }
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Per-query statistics over the active chunk set.
#[derive(Debug, Clone)]
pub struct CorpusStats {
    /// Total candidate chunks (`N`).
    pub chunk_count: usize,
    /// Document frequency per query term, aligned with `Query::terms`.
    pub doc_freqs: Vec<usize>,
    pub avg_tokens: f64,
}

impl CorpusStats {
    pub fn compute(query: &Query, chunks: &[Chunk]) -> Self {
        let doc_freqs = query
            .terms
            .iter()
            .map(|term| {
                chunks
                    .iter()
                    .filter(|c| c.term_freqs.contains_key(term))
                    .count()
            })
            .collect();

        let total_tokens: usize = chunks.iter().map(|c| c.token_count).sum();
        let avg_tokens = if chunks.is_empty() {
            0.0
        } else {
            total_tokens as f64 / chunks.len() as f64
        };

        Self {
            chunk_count: chunks.len(),
            doc_freqs,
            avg_tokens,
        }
    }

    fn idf(&self, df: usize) -> f64 {
        let n = self.chunk_count as f64;
        let df = df as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

/// BM25 base score of one chunk.
pub fn bm25_score(query: &Query, stats: &CorpusStats, chunk: &Chunk) -> f64 {
    let len_ratio = if stats.avg_tokens > 0.0 {
        chunk.token_count as f64 / stats.avg_tokens
    } else {
        0.0
    };
    let norm = BM25_K1 * (1.0 - BM25_B + BM25_B * len_ratio);

    query
        .terms
        .iter()
        .zip(&stats.doc_freqs)
        .filter_map(|(term, &df)| {
            let tf = chunk.term_frequency(term) as f64;
            (tf > 0.0).then(|| stats.idf(df) * (tf * (BM25_K1 + 1.0)) / (tf + norm))
        })
        .sum()
}

/// Apply the re-ranking heuristics on top of a BM25 base score.
pub fn adjust_score(query: &Query, chunk: &Chunk, base: f64) -> f64 {
    if base <= 0.0 {
        return 0.0;
    }

    let total = query.terms.len();
    let matched = query
        .terms
        .iter()
        .filter(|t| chunk.term_freqs.contains_key(t.as_str()))
        .count();

    if total >= 3 && matched < 2 {
        return 0.0;
    }

    let coverage = matched as f64 / total as f64;
    let coverage_mult = if coverage >= 1.0 {
        1.25
    } else if coverage >= 0.7 {
        1.15
    } else if coverage >= 0.5 {
        1.08
    } else if total >= 3 && coverage <= 0.25 {
        0.8
    } else {
        1.0
    };

    let mut score = base * coverage_mult;

    if !query.bigrams.is_empty() {
        let haystack = chunk.text.to_lowercase();
        let hits = query
            .bigrams
            .iter()
            .filter(|bg| haystack.contains(bg.as_str()))
            .count();
        score *= 1.0 + BIGRAM_CAP.min(hits as f64 * BIGRAM_STEP);
    }

    if chunk.line_start <= BOILERPLATE_MAX_LINE && is_boilerplate(&chunk.text) {
        score *= BOILERPLATE_FACTOR;
    }

    score
}

pub fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Rank `chunks` against `query`, returning at most `top_k` results.
///
/// Chunks are expected in discovery order (document order, then line
/// order); equal scores keep that order. An empty chunk set yields an empty
/// result list.
pub fn rank(query: &Query, chunks: &[Chunk], top_k: usize) -> Vec<ScoredResult> {
    if chunks.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let stats = CorpusStats::compute(query, chunks);

    struct Scored<'a> {
        chunk: &'a Chunk,
        base: f64,
        score: f64,
    }

    let mut scored: Vec<Scored> = chunks
        .iter()
        .filter_map(|chunk| {
            let base = bm25_score(query, &stats, chunk);
            let score = adjust_score(query, chunk, base);
            (score > 0.0).then_some(Scored { chunk, base, score })
        })
        .collect();

    // `sort_by` is stable, which preserves discovery order on ties.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);

    debug!(
        chunks = stats.chunk_count,
        avg_tokens = stats.avg_tokens,
        kept = scored.len(),
        "ranked chunks"
    );

    scored
        .into_iter()
        .enumerate()
        .map(|(i, s)| ScoredResult {
            rank: i + 1,
            score: round6(s.score),
            base_score: round6(s.base),
            source: s.chunk.source.display().to_string(),
            reference_id: s.chunk.reference_id.clone(),
            line_start: s.chunk.line_start,
            line_end: s.chunk.line_end,
            matched_terms: query
                .terms
                .iter()
                .filter(|t| s.chunk.term_freqs.contains_key(t.as_str()))
                .cloned()
                .collect(),
            excerpt: make_excerpt(&s.chunk.text),
        })
        .collect()
}

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}

/// Compact whitespace and cap the excerpt at [`EXCERPT_MAX_CHARS`].
pub fn make_excerpt(text: &str) -> String {
    let compact = HORIZONTAL_WS_RE.replace_all(text, " ");
    let compact = BLANK_LINES_RE.replace_all(&compact, "\n\n");
    let compact = compact.trim();

    if compact.chars().count() <= EXCERPT_MAX_CHARS {
        return compact.to_string();
    }

    let keep = EXCERPT_MAX_CHARS - ELLIPSIS.len();
    let mut out: String = compact.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use std::path::Path;

    fn chunks_of(text: &str, lines: usize, overlap: usize) -> Vec<Chunk> {
        chunk_text(Path::new("doc.md"), text, lines, overlap).unwrap()
    }

    #[test]
    fn test_query_drops_stop_words() {
        let q = Query::parse("what changed in the latest quarter guidance").unwrap();
        assert_eq!(q.terms, vec!["changed", "latest", "quarter", "guidance"]);
        assert_eq!(
            q.bigrams,
            vec!["changed latest", "latest quarter", "quarter guidance"]
        );
    }

    #[test]
    fn test_query_all_stop_words_falls_back() {
        let q = Query::parse("what is the").unwrap();
        assert_eq!(q.terms, vec!["what", "is", "the"]);
    }

    #[test]
    fn test_query_dedups_terms() {
        let q = Query::parse("revenue Revenue growth revenue").unwrap();
        assert_eq!(q.terms, vec!["revenue", "growth"]);
        assert_eq!(q.bigrams, vec!["revenue growth"]);
    }

    #[test]
    fn test_query_without_terms_is_validation_error() {
        assert!(matches!(Query::parse("?? - !"), Err(Error::Validation(_))));
        assert!(matches!(Query::parse(""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_empty_candidate_set() {
        let q = Query::parse("revenue").unwrap();
        assert!(rank(&q, &[], 5).is_empty());
    }

    #[test]
    fn test_non_matching_chunk_never_returned() {
        let chunks = chunks_of("revenue grew strongly\nnothing else here", 1, 0);
        let q = Query::parse("revenue").unwrap();
        let results = rank(&q, &chunks, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_start, 1);
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_hard_filter_requires_two_terms() {
        let chunks = chunks_of("dividend policy\nrevenue only", 1, 0);
        let q = Query::parse("dividend policy revenue outlook").unwrap();
        let stats = CorpusStats::compute(&q, &chunks);
        let base = bm25_score(&q, &stats, &chunks[1]);
        assert!(base > 0.0);
        assert_eq!(adjust_score(&q, &chunks[1], base), 0.0);

        let results = rank(&q, &chunks, 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_start, 1);
        assert_eq!(results[0].matched_terms, vec!["dividend", "policy"]);
    }

    #[test]
    fn test_bigram_boost_capped() {
        let q = Query::parse("alpha beta gamma delta epsilon").unwrap();
        let chunk = &chunks_of("alpha beta gamma delta epsilon", 10, 0)[0];
        let adjusted = adjust_score(&q, chunk, 1.0);
        // full coverage 1.25, four bigram hits capped at 0.24
        assert!((adjusted - 1.25 * 1.24).abs() < 1e-9);
    }

    #[test]
    fn test_bigram_requires_literal_substring() {
        let q = Query::parse("share repurchase").unwrap();

        let split = &chunks_of("the share\nrepurchase program", 10, 0)[0];
        assert!((adjust_score(&q, split, 1.0) - 1.25).abs() < 1e-9);

        let doubled = &chunks_of("the share  repurchase program", 10, 0)[0];
        assert!((adjust_score(&q, doubled, 1.0) - 1.25).abs() < 1e-9);

        let literal = &chunks_of("The Share Repurchase program", 10, 0)[0];
        assert!((adjust_score(&q, literal, 1.0) - 1.25 * 1.08).abs() < 1e-9);
    }

    #[test]
    fn test_boilerplate_downranked_only_near_top() {
        let q = Query::parse("registrant").unwrap();
        let mut chunk = chunks_of("Exact name of registrant as specified in its charter", 10, 0)
            .remove(0);
        assert!((adjust_score(&q, &chunk, 1.0) - 1.25 * 0.45).abs() < 1e-9);

        chunk.line_start = 141;
        assert!((adjust_score(&q, &chunk, 1.0) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_ties_keep_discovery_order() {
        let chunks = chunks_of("merger agreement\nfiller text\nmerger agreement", 1, 0);
        let q = Query::parse("merger agreement").unwrap();
        let results = rank(&q, &chunks, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, results[1].score);
        assert_eq!(results[0].line_start, 1);
        assert_eq!(results[1].line_start, 3);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[1].rank, 2);
    }

    #[test]
    fn test_top_k_truncates() {
        let text = (0..10)
            .map(|i| format!("capital expenditure item {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunks_of(&text, 1, 0);
        let q = Query::parse("capital expenditure").unwrap();
        assert_eq!(rank(&q, &chunks, 3).len(), 3);
    }

    #[test]
    fn test_score_rounded_to_six_places() {
        let chunks = chunks_of("goodwill impairment charge\nunrelated", 1, 0);
        let q = Query::parse("goodwill impairment").unwrap();
        let r = &rank(&q, &chunks, 1)[0];
        assert_eq!(r.score, (r.score * 1e6).round() / 1e6);
    }

    #[test]
    fn test_excerpt_compaction() {
        let text = "a  \t b\n\n\n\n c   d ";
        assert_eq!(make_excerpt(text), "a b\n\n c d");
    }

    #[test]
    fn test_excerpt_truncated() {
        let text = "word ".repeat(400);
        let excerpt = make_excerpt(&text);
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= EXCERPT_MAX_CHARS);
    }
}
