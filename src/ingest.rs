//! Corpus sync orchestration.
//!
//! Coordinates the full sync flow: identity resolution → profile rule
//! evaluation → filing selection → cache reuse or fetch → manifest write.
//!
//! Rules are evaluated strictly in order because accession dedup is
//! first-rule-wins. A filing whose content cannot be located is skipped;
//! any other failure aborts the sync before a manifest is written.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connector_edgar::EdgarClient;
use crate::error::{Error, Result};
use crate::manifest::{write_atomic_async, CacheLayout, Manifest};
use crate::models::{CachedDocument, Entity, FilingRow, SkippedFiling};
use crate::profiles::{self, SyncRule};
use crate::traits::{ContentProvider, FilingCatalog, FilingQuery, IdentityResolver, OutputFormat};

/// The three remote collaborators a sync needs.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub resolver: &'a dyn IdentityResolver,
    pub catalog: &'a dyn FilingCatalog,
    pub content: &'a dyn ContentProvider,
}

impl<'a> Collaborators<'a> {
    /// Use one value for all three roles.
    pub fn uniform<T>(backend: &'a T) -> Self
    where
        T: IdentityResolver + FilingCatalog + ContentProvider,
    {
        Self {
            resolver: backend,
            catalog: backend,
            content: backend,
        }
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub entity: Entity,
    pub profile: String,
    pub docs_count: usize,
    pub fetched_count: usize,
    pub reused_count: usize,
    pub skipped_count: usize,
    pub skipped: Vec<SkippedFiling>,
    pub docs: Vec<CachedDocument>,
    pub manifest_path: PathBuf,
}

/// Ordered accumulator for the rule fold: keeps the first row seen for each
/// accession, in insertion order.
#[derive(Debug, Default)]
struct Selection {
    seen: HashSet<String>,
    rows: Vec<FilingRow>,
}

impl Selection {
    fn extend(&mut self, rows: impl IntoIterator<Item = FilingRow>) -> usize {
        let before = self.rows.len();
        for row in rows {
            if self.seen.insert(row.accession.clone()) {
                self.rows.push(row);
            }
        }
        self.rows.len() - before
    }

    /// Newest filing date first; rows without a date sort last.
    fn into_sorted(mut self) -> Vec<FilingRow> {
        self.rows.sort_by(|a, b| {
            let da = a.filing_date.as_deref().unwrap_or("");
            let db = b.filing_date.as_deref().unwrap_or("");
            db.cmp(da)
        });
        self.rows
    }
}

/// Catalog query for one rule, relative to `today`.
pub fn rule_query(rule: &SyncRule, today: NaiveDate) -> FilingQuery {
    FilingQuery {
        form: Some(rule.form.to_string()),
        date_from: rule
            .within_days
            .map(|days| today - Duration::days(i64::from(days))),
        date_to: None,
        limit: Some(rule.limit),
        offset: None,
    }
}

/// Select, fetch and cache the filings named by `profile` for `entity_id`.
pub async fn sync_corpus(
    collab: Collaborators<'_>,
    layout: &CacheLayout,
    entity_id: &str,
    profile: &str,
    refresh: bool,
) -> Result<SyncReport> {
    let profile = profiles::get(profile)?;
    let entity = collab.resolver.resolve(entity_id).await?;
    let today = Utc::now().date_naive();

    info!(
        entity = %entity.cik,
        profile = profile.name,
        refresh,
        "starting sync"
    );

    let mut selection = Selection::default();
    for rule in profile.rules {
        let rows = collab
            .catalog
            .list(&entity.cik, &rule_query(rule, today))
            .await?;
        let added = selection.extend(rows.into_iter().take(rule.limit));
        debug!(form = rule.form, added, "evaluated sync rule");
    }
    let selected = selection.into_sorted();

    let mut docs = Vec::with_capacity(selected.len());
    let mut skipped = Vec::new();
    let mut fetched_count = 0usize;
    let mut reused_count = 0usize;

    for filing in &selected {
        let path = layout.document_path(&entity.cik, &filing.accession);

        let cached = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::from_io(e, &path))?;
        if !refresh && cached {
            debug!(accession = %filing.accession, "reusing cached filing");
            reused_count += 1;
            docs.push(CachedDocument::from_filing(filing, path));
            continue;
        }

        match collab
            .content
            .fetch(&entity.cik, filing, OutputFormat::Text)
            .await
        {
            Ok(text) => {
                write_atomic_async(&path, text.as_bytes()).await?;
                debug!(accession = %filing.accession, bytes = text.len(), "fetched filing");
                fetched_count += 1;
                docs.push(CachedDocument::from_filing(filing, path));
            }
            Err(e) if e.is_not_found() => {
                warn!(accession = %filing.accession, error = %e, "skipping filing");
                skipped.push(SkippedFiling {
                    accession: filing.accession.clone(),
                    form: filing.form.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let manifest = Manifest::new(entity.clone(), profile.name, docs);
    let manifest_path = layout.write_manifest_async(&manifest).await?;

    let report = SyncReport {
        entity,
        profile: profile.name.to_string(),
        docs_count: manifest.documents.len(),
        fetched_count,
        reused_count,
        skipped_count: skipped.len(),
        skipped,
        docs: manifest.documents,
        manifest_path,
    };

    info!(
        entity = %report.entity.cik,
        docs = report.docs_count,
        fetched = report.fetched_count,
        reused = report.reused_count,
        skipped = report.skipped_count,
        "sync complete"
    );

    Ok(report)
}

/// CLI entry point for `fctx sync`.
pub async fn run_sync(
    config: &Config,
    cache_root: &Path,
    entity_id: &str,
    profile: &str,
    refresh: bool,
    json: bool,
) -> anyhow::Result<()> {
    let client = EdgarClient::from_config(&config.edgar)?;
    let layout = CacheLayout::new(cache_root);

    let report = sync_corpus(
        Collaborators::uniform(&client),
        &layout,
        entity_id,
        profile,
        refresh,
    )
    .await
    .with_context(|| format!("sync failed for '{}'", entity_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    println!("ok");
    Ok(())
}

pub(crate) fn print_report(report: &SyncReport) {
    println!("sync {} ({})", report.entity.cik, report.profile);
    if let Some(ref ticker) = report.entity.ticker {
        println!("  ticker: {}", ticker);
    }
    if let Some(ref name) = report.entity.name {
        println!("  name: {}", name);
    }
    println!("  documents: {}", report.docs_count);
    println!("  fetched: {}", report.fetched_count);
    println!("  reused: {}", report.reused_count);
    println!("  skipped: {}", report.skipped_count);
    for s in &report.skipped {
        println!("    - {} {}: {}", s.accession, s.form, s.reason);
    }
    println!("  manifest: {}", report.manifest_path.display());
}
