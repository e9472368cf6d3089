use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub edgar: EdgarConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
        }
    }
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("./data/cache")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_lines")]
    pub chunk_lines: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_lines: default_chunk_lines(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_lines() -> usize {
    40
}
fn default_chunk_overlap() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            include_globs: default_include_globs(),
        }
    }
}

fn default_top_k() -> usize {
    8
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.htm".to_string(),
        "**/*.html".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EdgarConfig {
    /// SEC requires a descriptive User-Agent with contact details.
    #[serde(default)]
    pub user_agent: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_archives_url")]
    pub archives_url: String,
    #[serde(default = "default_tickers_url")]
    pub tickers_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            base_url: default_base_url(),
            archives_url: default_archives_url(),
            tickers_url: default_tickers_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://data.sec.gov".to_string()
}
fn default_archives_url() -> String {
    "https://www.sec.gov/Archives/edgar/data".to_string()
}
fn default_tickers_url() -> String {
    "https://www.sec.gov/files/company_tickers.json".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if given; otherwise use `default_path` when it exists, else
/// built-in defaults.
pub fn load_or_default(path: Option<&Path>, default_path: &Path) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None if default_path.exists() => load_config(default_path),
        None => Ok(Config::default()),
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_lines == 0 {
        bail!("chunking.chunk_lines must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_lines {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_lines ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_lines
        );
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate edgar
    if config.edgar.timeout_secs == 0 {
        bail!("edgar.timeout_secs must be > 0");
    }

    Ok(())
}

impl EdgarConfig {
    /// The User-Agent is only required once a remote call is about to happen.
    pub fn require_user_agent(&self) -> Result<&str> {
        let ua = self.user_agent.trim();
        if ua.is_empty() {
            bail!(
                "edgar.user_agent must be set (e.g. \"Example Corp ops@example.com\") before syncing"
            );
        }
        Ok(ua)
    }
}
