//! Query entry points.
//!
//! Two ways to get a corpus in front of the ranking engine:
//!
//! - [`ask_explicit`] takes document paths (files or directories) or a
//!   manifest file and ranks them directly, never touching the network.
//! - [`ask_by_entity`] reads the cached manifest for an entity/profile,
//!   syncing first when the policy allows and the cache is empty.
//!
//! Documents are read concurrently. The first read failure fails the whole
//! call and partial results are discarded.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info};

use crate::chunk::{chunk_text, validate_window};
use crate::config::Config;
use crate::connector_edgar::EdgarClient;
use crate::connector_fs::expand_document_paths;
use crate::error::{Error, Result};
use crate::ingest::{print_report, sync_corpus, Collaborators, SyncReport};
use crate::manifest::{load_manifest, CacheLayout, Manifest};
use crate::models::{CachedDocument, Entity, ScoredResult};
use crate::profiles;
use crate::search::{rank, Query};

/// Chunking and result-size parameters for one query.
#[derive(Debug, Clone, Copy)]
pub struct AskParams {
    pub top_k: usize,
    pub chunk_lines: usize,
    pub chunk_overlap: usize,
}

impl AskParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            chunk_lines: config.chunking.chunk_lines,
            chunk_overlap: config.chunking.chunk_overlap,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::validation("top_k must be >= 1"));
        }
        validate_window(self.chunk_lines, self.chunk_overlap)
    }
}

/// Where explicit documents come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Files and/or directories, in caller order.
    Paths(Vec<PathBuf>),
    /// A manifest whose descriptor paths are used in manifest order.
    Manifest(PathBuf),
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResult {
    pub query: String,
    pub query_terms: Vec<String>,
    pub chunk_count: usize,
    pub result_count: usize,
    pub results: Vec<ScoredResult>,
}

/// Result of an entity-scoped query.
#[derive(Debug, Clone, Serialize)]
pub struct EntityAskResult {
    #[serde(flatten)]
    pub ask: AskResult,
    pub entity: Entity,
    pub profile: String,
    pub corpus_docs_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_summary: Option<SyncReport>,
}

/// When an entity-scoped query may trigger a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Sync only when no usable manifest exists.
    #[default]
    Auto,
    /// Always sync, re-fetching every selected filing.
    Force,
    /// Never sync; use whatever is cached.
    Never,
}

/// Narrows a manifest's documents before ranking.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    /// Form types to keep (case-insensitive); empty keeps all.
    pub forms: Vec<String>,
    /// Inclusive lower bound on filing date.
    pub since: Option<NaiveDate>,
    /// Inclusive upper bound on filing date.
    pub until: Option<NaiveDate>,
    /// Keep only the first N documents after the other filters.
    pub latest: Option<usize>,
}

impl ScopeFilter {
    pub fn apply<'a>(&self, docs: &'a [CachedDocument]) -> Vec<&'a CachedDocument> {
        let date = |d: &CachedDocument| {
            d.filing_date
                .as_deref()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };

        docs.iter()
            .filter(|d| {
                self.forms.is_empty() || self.forms.iter().any(|f| f.eq_ignore_ascii_case(&d.form))
            })
            .filter(|d| match self.since {
                Some(since) => date(*d).is_some_and(|fd| fd >= since),
                None => true,
            })
            .filter(|d| match self.until {
                Some(until) => date(*d).is_some_and(|fd| fd <= until),
                None => true,
            })
            .take(self.latest.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Read all documents concurrently, failing on the first error.
pub async fn read_documents(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    let reads = paths.iter().map(|path| async move {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::from_io(e, path))?;
        Ok::<_, Error>((path.clone(), String::from_utf8_lossy(&bytes).into_owned()))
    });
    try_join_all(reads).await
}

/// Chunk and rank a fixed list of documents.
pub async fn rank_documents(query: &Query, paths: &[PathBuf], params: AskParams) -> Result<AskResult> {
    params.validate()?;
    let docs = read_documents(paths).await?;

    let mut chunks = Vec::new();
    for (path, text) in &docs {
        chunks.extend(chunk_text(path, text, params.chunk_lines, params.chunk_overlap)?);
    }

    let results = rank(query, &chunks, params.top_k);
    debug!(
        documents = docs.len(),
        chunks = chunks.len(),
        results = results.len(),
        "ranked documents"
    );

    Ok(AskResult {
        query: query.text.clone(),
        query_terms: query.terms.clone(),
        chunk_count: chunks.len(),
        result_count: results.len(),
        results,
    })
}

/// Rank explicitly supplied documents against `query`.
pub async fn ask_explicit(
    query: &str,
    source: &DocumentSource,
    include_globs: &[String],
    params: AskParams,
) -> Result<AskResult> {
    params.validate()?;
    let query = Query::parse(query)?;

    let paths = match source {
        DocumentSource::Paths(inputs) => expand_document_paths(inputs, include_globs)?,
        DocumentSource::Manifest(path) => load_manifest(path)?.document_paths(),
    };

    rank_documents(&query, &paths, params).await
}

/// Rank an entity's cached corpus against `query`.
#[allow(clippy::too_many_arguments)]
pub async fn ask_by_entity(
    collab: Collaborators<'_>,
    layout: &CacheLayout,
    entity_id: &str,
    query: &str,
    profile: &str,
    scope: &ScopeFilter,
    refresh: RefreshPolicy,
    params: AskParams,
) -> Result<EntityAskResult> {
    params.validate()?;
    let query = Query::parse(query)?;
    let profile = profiles::get(profile)?.name;

    let entity = collab.resolver.resolve(entity_id).await?;
    let (manifest, sync_summary) =
        ensure_corpus(collab, layout, &entity, profile, refresh).await?;

    let documents_required = || Error::DocumentsRequired {
        entity: entity_id.to_string(),
        profile: profile.to_string(),
    };

    let manifest = manifest
        .filter(|m| !m.documents.is_empty())
        .ok_or_else(documents_required)?;

    let scoped = scope.apply(&manifest.documents);
    if scoped.is_empty() {
        return Err(documents_required());
    }
    let paths: Vec<PathBuf> = scoped.iter().map(|d| d.path.clone()).collect();

    info!(
        entity = %entity.cik,
        profile,
        documents = paths.len(),
        synced = sync_summary.is_some(),
        "querying cached corpus"
    );

    let ask = rank_documents(&query, &paths, params).await?;
    Ok(EntityAskResult {
        ask,
        entity,
        profile: profile.to_string(),
        corpus_docs_count: paths.len(),
        sync_summary,
    })
}

/// Read the manifest, syncing first when `refresh` calls for it.
async fn ensure_corpus(
    collab: Collaborators<'_>,
    layout: &CacheLayout,
    entity: &Entity,
    profile: &str,
    refresh: RefreshPolicy,
) -> Result<(Option<Manifest>, Option<SyncReport>)> {
    let cached = match refresh {
        RefreshPolicy::Force => None,
        RefreshPolicy::Auto | RefreshPolicy::Never => layout.read_manifest(&entity.cik, profile)?,
    };

    let usable = cached.as_ref().is_some_and(|m| !m.documents.is_empty());
    if usable || refresh == RefreshPolicy::Never {
        return Ok((cached, None));
    }

    let report = sync_corpus(
        collab,
        layout,
        &entity.cik,
        profile,
        refresh == RefreshPolicy::Force,
    )
    .await?;
    let manifest = layout.read_manifest(&entity.cik, profile)?;
    Ok((manifest, Some(report)))
}

/// Options for the `fctx ask` command.
#[derive(Debug, Clone)]
pub struct AskCommand {
    pub query: String,
    pub docs: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub entity: Option<String>,
    pub profile: String,
    pub scope: ScopeFilter,
    pub refresh: RefreshPolicy,
    pub params: AskParams,
    pub json: bool,
}

/// CLI entry point for `fctx ask`.
pub async fn run_ask(config: &Config, cache_root: &Path, cmd: AskCommand) -> anyhow::Result<()> {
    if let Some(ref entity_id) = cmd.entity {
        let client = EdgarClient::from_config(&config.edgar)?;
        let layout = CacheLayout::new(cache_root);
        let result = ask_by_entity(
            Collaborators::uniform(&client),
            &layout,
            entity_id,
            &cmd.query,
            &cmd.profile,
            &cmd.scope,
            cmd.refresh,
            cmd.params,
        )
        .await?;

        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }
        if let Some(ref report) = result.sync_summary {
            print_report(report);
            println!();
        }
        println!(
            "corpus: {} ({}), {} documents",
            result.entity.ticker.as_deref().unwrap_or(&result.entity.cik),
            result.profile,
            result.corpus_docs_count
        );
        print_results(&result.ask);
        return Ok(());
    }

    let source = match cmd.manifest {
        Some(path) => DocumentSource::Manifest(path),
        None if !cmd.docs.is_empty() => DocumentSource::Paths(cmd.docs),
        None => anyhow::bail!("one of --doc, --manifest or --entity is required"),
    };

    let result = ask_explicit(
        &cmd.query,
        &source,
        &config.retrieval.include_globs,
        cmd.params,
    )
    .await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_results(&result);
    }
    Ok(())
}

fn print_results(result: &AskResult) {
    println!("terms: {}", result.query_terms.join(", "));
    println!("chunks: {}", result.chunk_count);
    println!();

    if result.results.is_empty() {
        println!("No results.");
        return;
    }

    for r in &result.results {
        let reference = r
            .reference_id
            .as_deref()
            .map(|id| format!(" ({})", id))
            .unwrap_or_default();
        println!("{}. [{:.4}] {}{}", r.rank, r.score, r.source, reference);
        println!("    lines: {}-{}", r.line_start, r.line_end);
        println!("    matched: {}", r.matched_terms.join(", "));
        println!("    excerpt: \"{}\"", r.excerpt.replace('\n', " ").trim());
        println!();
    }
}
