//! SEC EDGAR connector.
//!
//! Implements the three sync collaborators against EDGAR's public endpoints:
//!
//! | Trait | Endpoint |
//! |-------|----------|
//! | [`IdentityResolver`] | `company_tickers.json` (ticker → CIK) |
//! | [`FilingCatalog`] | `data.sec.gov/submissions/CIK##########.json` |
//! | [`ContentProvider`] | primary document under `Archives/edgar/data` |
//!
//! # Configuration
//!
//! ```toml
//! [edgar]
//! user_agent = "Example Corp ops@example.com"
//! timeout_secs = 30
//! max_retries = 3
//! ```
//!
//! SEC rejects requests without a descriptive `User-Agent`, so one must be
//! configured before any sync.
//!
//! # Retries
//!
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 404 → [`Error::NotFound`], no retry
//! - other HTTP 4xx → fail immediately
//! - network error → retry

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::EdgarConfig;
use crate::error::{Error, Result};
use crate::models::{Entity, FilingRow};
use crate::traits::{ContentProvider, FilingCatalog, FilingQuery, IdentityResolver, OutputFormat};

/// HTTP client for EDGAR, implementing all three collaborator traits.
pub struct EdgarClient {
    http: reqwest::Client,
    config: EdgarConfig,
    tickers: OnceCell<HashMap<String, TickerEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
    title: String,
}

impl EdgarClient {
    pub fn from_config(config: &EdgarConfig) -> anyhow::Result<Self> {
        let user_agent = config.require_user_agent()?;
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
            tickers: OnceCell::new(),
        })
    }

    /// GET `url` with retry/backoff and return the body text.
    async fn get_text(&self, url: &str) -> Result<String> {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.http.get(url).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.text().await?);
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(Error::not_found(format!("EDGAR returned 404 for {}", url)));
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%url, %status, attempt, "EDGAR request failed, retrying");
                        last_err = Some(Error::Http(format!("EDGAR error {} for {}", status, url)));
                        continue;
                    }

                    return Err(Error::Http(format!("EDGAR error {} for {}", status, url)));
                }
                Err(e) => {
                    warn!(%url, error = %e, attempt, "EDGAR request error, retrying");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Http(format!("request failed: {}", url))))
    }

    async fn ticker_map(&self) -> Result<&HashMap<String, TickerEntry>> {
        self.tickers
            .get_or_try_init(|| async {
                let body = self.get_text(&self.config.tickers_url).await?;
                parse_tickers(&body)
            })
            .await
    }
}

fn parse_tickers(body: &str) -> Result<HashMap<String, TickerEntry>> {
    let raw: HashMap<String, TickerEntry> = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("invalid company tickers JSON: {}", e)))?;
    Ok(raw
        .into_values()
        .map(|entry| (entry.ticker.to_uppercase(), entry))
        .collect())
}

/// Zero-pad a numeric identifier to the 10-digit CIK form.
pub fn normalize_cik(id: &str) -> Option<String> {
    let trimmed = id.trim().trim_start_matches("CIK").trim_start_matches("cik");
    if trimmed.is_empty() || trimmed.len() > 10 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>10}", trimmed))
}

fn entity_from(entry: &TickerEntry) -> Entity {
    Entity {
        cik: format!("{:010}", entry.cik_str),
        ticker: Some(entry.ticker.clone()),
        name: Some(entry.title.clone()),
    }
}

#[async_trait]
impl IdentityResolver for EdgarClient {
    async fn resolve(&self, id: &str) -> Result<Entity> {
        if let Some(cik) = normalize_cik(id) {
            // Many filers have no ticker; a numeric id stands on its own.
            let known = match self.ticker_map().await {
                Ok(map) => map
                    .values()
                    .find(|e| format!("{:010}", e.cik_str) == cik)
                    .map(entity_from),
                Err(e) => {
                    debug!(error = %e, "ticker map unavailable, using bare CIK");
                    None
                }
            };
            return Ok(known.unwrap_or(Entity {
                cik,
                ticker: None,
                name: None,
            }));
        }

        let key = id.trim().to_uppercase().replace('.', "-");
        self.ticker_map()
            .await?
            .get(&key)
            .map(entity_from)
            .ok_or_else(|| Error::not_found(format!("unknown ticker or CIK: {}", id)))
    }
}

#[derive(Debug, Deserialize)]
struct Submissions {
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

/// Columnar arrays, one entry per filing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    accession_number: Vec<String>,
    form: Vec<String>,
    #[serde(default)]
    filing_date: Vec<String>,
    #[serde(default)]
    report_date: Vec<String>,
    #[serde(default)]
    primary_document: Vec<String>,
}

fn non_empty(v: Option<&String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty()).cloned()
}

/// Turn a submissions document into filing rows, newest first as served.
fn parse_submissions(body: &str, cik: &str, archives_url: &str) -> Result<Vec<FilingRow>> {
    let subs: Submissions = serde_json::from_str(body)
        .map_err(|e| Error::parse(format!("invalid submissions JSON for {}: {}", cik, e)))?;
    let recent = subs.filings.recent;

    if recent.form.len() != recent.accession_number.len() {
        return Err(Error::parse(format!(
            "submissions for {} have mismatched column lengths",
            cik
        )));
    }

    let cik_num = cik.trim_start_matches('0');
    let base = archives_url.trim_end_matches('/');

    Ok(recent
        .accession_number
        .iter()
        .enumerate()
        .map(|(i, accession)| {
            let url = non_empty(recent.primary_document.get(i)).map(|doc| {
                format!("{}/{}/{}/{}", base, cik_num, accession.replace('-', ""), doc)
            });
            FilingRow {
                accession: accession.clone(),
                form: recent.form[i].clone(),
                filing_date: non_empty(recent.filing_date.get(i)),
                report_date: non_empty(recent.report_date.get(i)),
                url,
            }
        })
        .collect())
}

/// Apply form, date range, offset and limit filters to catalog rows.
fn filter_rows(rows: Vec<FilingRow>, query: &FilingQuery) -> Vec<FilingRow> {
    let parse = |d: &Option<String>| {
        d.as_deref()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
    };

    rows.into_iter()
        .filter(|r| {
            query
                .form
                .as_deref()
                .map_or(true, |f| r.form.eq_ignore_ascii_case(f))
        })
        .filter(|r| match (query.date_from, parse(&r.filing_date)) {
            (Some(from), Some(d)) => d >= from,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .filter(|r| match (query.date_to, parse(&r.filing_date)) {
            (Some(to), Some(d)) => d <= to,
            (Some(_), None) => false,
            (None, _) => true,
        })
        .skip(query.offset.unwrap_or(0))
        .take(query.limit.unwrap_or(usize::MAX))
        .collect()
}

#[async_trait]
impl FilingCatalog for EdgarClient {
    async fn list(&self, cik: &str, query: &FilingQuery) -> Result<Vec<FilingRow>> {
        let url = format!(
            "{}/submissions/CIK{}.json",
            self.config.base_url.trim_end_matches('/'),
            cik
        );
        let body = self.get_text(&url).await?;
        let rows = parse_submissions(&body, cik, &self.config.archives_url)?;
        Ok(filter_rows(rows, query))
    }
}

#[async_trait]
impl ContentProvider for EdgarClient {
    async fn fetch(&self, _cik: &str, filing: &FilingRow, format: OutputFormat) -> Result<String> {
        let url = filing.url.as_deref().ok_or_else(|| {
            Error::not_found(format!("filing {} has no primary document", filing.accession))
        })?;
        let body = self.get_text(url).await?;

        Ok(match format {
            OutputFormat::Html => body,
            OutputFormat::Text if looks_like_html(&body) => html_to_text(&body),
            OutputFormat::Text => body,
        })
    }
}

// ============ HTML → text ============

/// Elements whose content never reaches the text output.
const SKIPPED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "ix:header",
];

/// Elements that start and end on their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "br", "div", "dl", "dt", "dd", "footer", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p", "pre", "section", "table",
    "title", "tr", "ul",
];

static INLINE_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid whitespace regex"));
static MANY_NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

fn looks_like_html(body: &str) -> bool {
    let head: String = body.chars().take(2048).collect::<String>().to_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<body")
}

/// Extract the text of an HTML filing, keeping block structure as line
/// breaks. Entities are decoded by the parser.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::with_capacity(html.len() / 2);
    collect_text(document.root_element(), &mut raw);

    let compact = INLINE_WS_RE.replace_all(&raw, " ");
    let lines: Vec<&str> = compact.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    MANY_NEWLINES_RE
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
        } else if let Node::Text(text) = child.value() {
            // Source line breaks inside a text run are layout, not content.
            out.extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
        }
    }

    if block {
        out.push('\n');
    } else if name == "td" || name == "th" {
        out.push(' ');
    }
}
