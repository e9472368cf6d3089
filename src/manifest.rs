//! On-disk cache layout and versioned corpus manifests.
//!
//! Layout under the configured cache root:
//!
//! ```text
//! <cache_root>/
//! └── <cik>/
//!     ├── filings/<accession>.txt      normalized filing text
//!     └── manifests/<profile>.json     one manifest per profile
//! ```
//!
//! Manifests are written wholesale: every sync replaces the file with a
//! complete new version through a temp-file-and-rename, so readers never
//! observe a partially written manifest. There is no locking; a single
//! writer per `(cache_root, entity, profile)` is assumed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{CachedDocument, Entity};

/// Schema tag carried by every manifest this version reads and writes.
pub const MANIFEST_VERSION: &str = "filing-context/manifest/v1";

const FILINGS_DIR: &str = "filings";
const MANIFESTS_DIR: &str = "manifests";
const DOCUMENT_EXT: &str = "txt";

/// Persisted record of one synced corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub entity: Entity,
    pub profile: String,
    pub synced_at: DateTime<Utc>,
    pub documents: Vec<CachedDocument>,
}

impl Manifest {
    pub fn new(entity: Entity, profile: &str, documents: Vec<CachedDocument>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            entity,
            profile: profile.to_string(),
            synced_at: Utc::now(),
            documents,
        }
    }

    /// Structural checks applied to every manifest read from disk.
    pub fn validate(&self) -> Result<()> {
        if self.version != MANIFEST_VERSION {
            return Err(Error::validation(format!(
                "unsupported manifest version '{}' (expected '{}')",
                self.version, MANIFEST_VERSION
            )));
        }
        if self.entity.cik.trim().is_empty() {
            return Err(Error::validation("manifest entity.cik is empty"));
        }
        if self.profile.trim().is_empty() {
            return Err(Error::validation("manifest profile is empty"));
        }
        for (i, doc) in self.documents.iter().enumerate() {
            if doc.accession.trim().is_empty() {
                return Err(Error::validation(format!(
                    "manifest document #{} has no accession",
                    i
                )));
            }
            if doc.path.as_os_str().is_empty() {
                return Err(Error::validation(format!(
                    "manifest document {} has no path",
                    doc.accession
                )));
            }
        }
        Ok(())
    }

    pub fn document_paths(&self) -> Vec<PathBuf> {
        self.documents.iter().map(|d| d.path.clone()).collect()
    }
}

/// Deterministic paths under a cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_dir(&self, cik: &str) -> PathBuf {
        self.root.join(sanitize_component(cik))
    }

    pub fn document_path(&self, cik: &str, accession: &str) -> PathBuf {
        self.entity_dir(cik)
            .join(FILINGS_DIR)
            .join(format!("{}.{}", sanitize_component(accession), DOCUMENT_EXT))
    }

    pub fn manifest_path(&self, cik: &str, profile: &str) -> PathBuf {
        self.entity_dir(cik)
            .join(MANIFESTS_DIR)
            .join(format!("{}.json", sanitize_component(profile)))
    }

    /// Read the manifest for `(cik, profile)`, or `None` if none was written.
    pub fn read_manifest(&self, cik: &str, profile: &str) -> Result<Option<Manifest>> {
        let path = self.manifest_path(cik, profile);
        if !path.exists() {
            return Ok(None);
        }
        load_manifest(&path).map(Some)
    }

    /// Persist `manifest`, replacing any previous version. Returns its path.
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<PathBuf> {
        let (path, json) = self.encode_manifest(manifest)?;
        write_atomic(&path, json.as_bytes())?;
        debug!(
            path = %path.display(),
            documents = manifest.documents.len(),
            "wrote manifest"
        );
        Ok(path)
    }

    /// Same as [`CacheLayout::write_manifest`] without blocking the runtime.
    pub async fn write_manifest_async(&self, manifest: &Manifest) -> Result<PathBuf> {
        let (path, json) = self.encode_manifest(manifest)?;
        write_atomic_async(&path, json.as_bytes()).await?;
        debug!(
            path = %path.display(),
            documents = manifest.documents.len(),
            "wrote manifest"
        );
        Ok(path)
    }

    fn encode_manifest(&self, manifest: &Manifest) -> Result<(PathBuf, String)> {
        manifest.validate()?;
        let path = self.manifest_path(&manifest.entity.cik, &manifest.profile);
        let json = serde_json::to_string_pretty(manifest)
            .map_err(|e| Error::parse(format!("failed to serialize manifest: {}", e)))?;
        Ok((path, json))
    }
}

/// Load and validate a manifest from an explicit path.
///
/// Malformed JSON is a [`Error::Parse`]; well-formed JSON with missing
/// fields or the wrong version is a [`Error::Validation`].
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::from_io(e, path))?;

    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        Error::parse(format!("manifest {} is not valid JSON: {}", path.display(), e))
    })?;

    let manifest: Manifest = serde_json::from_value(value).map_err(|e| {
        Error::validation(format!("manifest {} has invalid shape: {}", path.display(), e))
    })?;

    manifest.validate()?;
    Ok(manifest)
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::validation(format!("path has no parent: {}", path.display())))?;
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

/// Async counterpart of [`write_atomic`] for callers on the runtime.
pub async fn write_atomic_async(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::validation(format!("path has no parent: {}", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Keep path components to a safe character set.
///
/// Empty and all-dot components (`.`, `..`) become `_` so a component can
/// never name the current or parent directory.
fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        return "_".to_string();
    }
    cleaned
}

/// CLI entry point: print the cached manifest for an entity/profile.
pub fn run_show(layout: &CacheLayout, cik: &str, profile: &str, json: bool) -> Result<()> {
    let manifest = layout.read_manifest(cik, profile)?.ok_or_else(|| {
        Error::not_found(format!(
            "no manifest for entity '{}' (profile '{}') under {}",
            cik,
            profile,
            layout.root().display()
        ))
    })?;

    if json {
        let out = serde_json::to_string_pretty(&manifest)
            .map_err(|e| Error::parse(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    println!("--- Manifest ---");
    println!("entity:    {}", manifest.entity.cik);
    if let Some(ref ticker) = manifest.entity.ticker {
        println!("ticker:    {}", ticker);
    }
    if let Some(ref name) = manifest.entity.name {
        println!("name:      {}", name);
    }
    println!("profile:   {}", manifest.profile);
    println!("synced_at: {}", manifest.synced_at.to_rfc3339());
    println!("path:      {}", layout.manifest_path(cik, profile).display());
    println!();
    println!("--- Documents ({}) ---", manifest.documents.len());
    for doc in &manifest.documents {
        println!(
            "{}  {:<8} {}  {}",
            doc.accession,
            doc.form,
            doc.filing_date.as_deref().unwrap_or("----------"),
            doc.path.display()
        );
    }
    Ok(())
}
