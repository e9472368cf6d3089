//! # Filing Context
//!
//! A local-first filing corpus cache and lexical retrieval engine.
//!
//! Filing Context syncs regulatory filings for an entity into an on-disk
//! cache according to a named selection profile, then answers free-text
//! queries by chunking the cached documents into line windows and ranking
//! them with BM25 plus filing-specific heuristics.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ EDGAR / fake │──▶│    ingest     │──▶│ cache + JSON  │
//! │ collaborators│   │ profile rules │   │  manifests    │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                   explicit docs ─────────────┤
//!                                              ▼
//!                                   ┌────────────────────┐
//!                                   │ chunk → BM25 rank  │
//!                                   └────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! fctx sync AAPL --profile core             # populate the cache
//! fctx ask "board resigned" --entity AAPL   # query the cached corpus
//! fctx ask "guidance" --doc ./filings/      # query local files directly
//! fctx profiles                             # list selection profiles
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Line-window chunking and tokenization |
//! | [`search`] | BM25 ranking with re-ranking heuristics |
//! | [`manifest`] | Cache layout and versioned manifests |
//! | [`profiles`] | Named selection profiles |
//! | [`ingest`] | Corpus sync orchestration |
//! | [`ask`] | Explicit and entity-scoped query entry points |
//! | [`traits`] | Collaborator traits |
//! | [`connector_edgar`] | SEC EDGAR collaborator implementation |
//! | [`connector_fs`] | Local document discovery |
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod connector_edgar;
pub mod connector_fs;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod models;
pub mod profiles;
pub mod search;
pub mod traits;
