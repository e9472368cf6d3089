//! Collaborator traits consumed by the sync orchestrator.
//!
//! The orchestrator never talks to a remote service directly. It resolves
//! entities, lists filings and fetches content through these three traits,
//! so tests and alternative backends can supply their own implementations.
//!
//! ```text
//! ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │ IdentityResolver │  │  FilingCatalog   │  │ ContentProvider  │
//! └────────┬─────────┘  └────────┬─────────┘  └────────┬─────────┘
//!          └─────────────────────┼─────────────────────┘
//!                                ▼
//!                     ingest::sync_corpus()
//! ```
//!
//! [`EdgarClient`](crate::connector_edgar::EdgarClient) implements all three
//! against SEC EDGAR.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Entity, FilingRow};

/// Maps a user-facing identifier (ticker or numeric id) to a canonical entity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns [`Error::NotFound`](crate::error::Error::NotFound) for unknown
    /// identifiers.
    async fn resolve(&self, id: &str) -> Result<Entity>;
}

/// Parameters for one catalog listing call.
#[derive(Debug, Clone, Default)]
pub struct FilingQuery {
    pub form: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Lists filings for a canonical entity.
#[async_trait]
pub trait FilingCatalog: Send + Sync {
    /// Rows are returned in the catalog's own order (newest first for EDGAR).
    async fn list(&self, cik: &str, query: &FilingQuery) -> Result<Vec<FilingRow>>;
}

/// Requested representation of fetched filing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Html,
}

/// Fetches normalized filing content.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Returns [`Error::NotFound`](crate::error::Error::NotFound) when the
    /// filing or its primary document does not exist.
    async fn fetch(&self, cik: &str, filing: &FilingRow, format: OutputFormat) -> Result<String>;
}
