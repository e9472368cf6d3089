#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use filing_context::error::{Error, Result};
use filing_context::models::{Entity, FilingRow};
use filing_context::traits::{
    ContentProvider, FilingCatalog, FilingQuery, IdentityResolver, OutputFormat,
};

pub const CIK: &str = "0000000042";

/// In-memory stand-in for the three EDGAR collaborators.
#[derive(Default)]
pub struct FakeEdgar {
    pub rows: Vec<FilingRow>,
    pub content: HashMap<String, String>,
    /// Accessions whose fetch reports not-found.
    pub missing: HashSet<String>,
    /// Accessions whose fetch fails with a transport error.
    pub broken: HashSet<String>,
    pub fetches: AtomicUsize,
    pub queries: Mutex<Vec<FilingQuery>>,
}

pub fn row(accession: &str, form: &str, date: &str) -> FilingRow {
    FilingRow {
        accession: accession.to_string(),
        form: form.to_string(),
        filing_date: Some(date.to_string()),
        report_date: None,
        url: Some(format!("https://example.test/{}.htm", accession)),
    }
}

impl FakeEdgar {
    /// A small corpus matching the `core` profile: one 10-K, two 10-Qs and
    /// two 8-Ks.
    pub fn acme() -> Self {
        let mut fake = FakeEdgar::default();
        let filings = [
            (
                row("0000000042-24-000010", "10-K", "2024-02-20"),
                "Annual report\nManagement changed its full-year revenue guidance.\nThe guidance reflects weaker demand.",
            ),
            (
                row("0000000042-24-000030", "10-Q", "2024-05-02"),
                "Quarterly report\nRevenue increased in the quarter.\nMargins were stable.",
            ),
            (
                row("0000000042-24-000050", "10-Q", "2024-08-01"),
                "Quarterly report\nRevenue decreased in the quarter.\nInventory built up.",
            ),
            (
                row("0000000042-24-000060", "8-K", "2024-09-12"),
                "# Item 5.02\nPersis Drell resigned from the Board effective immediately.\nNo disagreement with company operations.",
            ),
            (
                row("0000000042-24-000070", "8-K", "2024-10-03"),
                "# Item 8.01\nThe company announced a share repurchase program.",
            ),
        ];
        for (r, body) in filings {
            fake.content.insert(r.accession.clone(), body.to_string());
            fake.rows.push(r);
        }
        fake
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityResolver for FakeEdgar {
    async fn resolve(&self, id: &str) -> Result<Entity> {
        match id.to_uppercase().as_str() {
            "ACME" | CIK | "42" => Ok(Entity {
                cik: CIK.to_string(),
                ticker: Some("ACME".to_string()),
                name: Some("Acme Corp".to_string()),
            }),
            _ => Err(Error::not_found(format!("unknown ticker or CIK: {}", id))),
        }
    }
}

#[async_trait]
impl FilingCatalog for FakeEdgar {
    async fn list(&self, cik: &str, query: &FilingQuery) -> Result<Vec<FilingRow>> {
        assert_eq!(cik, CIK);
        self.queries.lock().unwrap().push(query.clone());

        // Newest first, as EDGAR serves them.
        let mut rows: Vec<FilingRow> = self
            .rows
            .iter()
            .filter(|r| {
                query
                    .form
                    .as_deref()
                    .map_or(true, |f| r.form.eq_ignore_ascii_case(f))
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
        rows.truncate(query.limit.unwrap_or(usize::MAX));
        Ok(rows)
    }
}

#[async_trait]
impl ContentProvider for FakeEdgar {
    async fn fetch(&self, _cik: &str, filing: &FilingRow, _format: OutputFormat) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(&filing.accession) {
            return Err(Error::not_found(format!("no document for {}", filing.accession)));
        }
        if self.broken.contains(&filing.accession) {
            return Err(Error::Http("EDGAR error 403 Forbidden".to_string()));
        }
        self.content
            .get(&filing.accession)
            .cloned()
            .ok_or_else(|| Error::not_found(filing.accession.clone()))
    }
}
