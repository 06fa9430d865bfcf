//! Candidate-event extraction.
//!
//! Each recorded bulletin is summarised once by an external model CLI; the
//! JSON array it returns is cached next to the PDF (`2025-03-09.json`) and
//! reused on later runs. The model reads an excerpt of the schedule pages
//! when they're configured. Cached items are then staged as candidate events
//! with the provenance the model doesn't know: source and bulletin URL.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bulletin_common::parishes::{format_churches, parish_for_source, UNKNOWN_LOCATION};
use bulletin_common::{BulletinRecord, CandidateEvent};
use bulletin_store::write_json_atomic;
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::excerpt::{self, Excerpt};

static JSON_ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

// ---------------------------------------------------------------------------
// BulletinExtractor
// ---------------------------------------------------------------------------

#[async_trait]
pub trait BulletinExtractor: Send + Sync {
    /// Run the model over one PDF and return its raw text response.
    async fn extract(&self, prompt: &str, pdf_path: &Path) -> Result<String>;
}

/// Invokes a model CLI non-interactively: prompt on stdin, response on
/// stdout, read access limited to the one PDF.
pub struct CliExtractor {
    command: String,
    timeout: Duration,
}

impl CliExtractor {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl BulletinExtractor for CliExtractor {
    async fn extract(&self, prompt: &str, pdf_path: &Path) -> Result<String> {
        let started = Instant::now();
        let mut child = tokio::process::Command::new(&self.command)
            .args([
                "--print".to_string(),
                "--allowedTools".to_string(),
                format!("Read({})", pdf_path.display()),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to send prompt to extractor")?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| anyhow!("{} timed out after {}s", self.command, self.timeout.as_secs()))?
            .with_context(|| format!("Failed waiting for {}", self.command))?;

        info!(
            command = %self.command,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Extractor finished"
        );

        if !output.status.success() {
            bail!("{} exited with {}", self.command, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// `pages` are the full-bulletin page numbers the PDF at `pdf_path` holds,
/// or empty when it is the whole bulletin.
pub fn build_prompt(
    bulletin: &BulletinRecord,
    pdf_path: &Path,
    pages: &[u32],
    weeks_ahead: u32,
) -> String {
    let parish = parish_for_source(&bulletin.source)
        .map(|p| p.name)
        .unwrap_or(bulletin.source.as_str());
    let churches = format_churches(&bulletin.source);
    let date = bulletin.date;
    let (reading, page_rule) = match pages {
        [] => (
            "Read the parish bulletin PDF at".to_string(),
            "1-based page number of the PDF where this was found".to_string(),
        ),
        [first, ..] => {
            let list: Vec<String> = pages.iter().map(u32::to_string).collect();
            (
                format!("Read the excerpt (pages {} of the full bulletin) at", list.join(",")),
                format!(
                    "page number in the full bulletin, not the excerpt (the excerpt's first page is page {first})"
                ),
            )
        }
    };

    format!(
        r#"You have access to the Read tool only. Do not request any other tools.
{reading}: {pdf}
Bulletin date: {date}
It is for the {parish} Parish, which has these churches:
{churches}

Output a JSON array of events. Each object:
  "type": "misc" | "mass" | "adoration" | "confession"
  "location": church code, one of:
{churches}
    - Other: "{unknown}"
  "datetime": "YYYY-MM-DDTHH:MM:00"
  "time_desc": description of the time as printed; may be a span, or something like "3pm until mass"
  "details": short description of the event (may be empty)
  "page": {page_rule}

Optional fields (include only when applicable):
  "cancelled": true, only if the bulletin explicitly says the event is cancelled
  "concern": anything about a listing that doesn't fit this structure

Rules:
- Sometimes a bulletin lists mass times under the heading "Mass Intentions".
- Daily masses (weekdays, and Saturday before 4pm) last 30 minutes when working out times "after mass".
- For recurring schedules, output every occurrence from the bulletin date through {weeks_ahead} week(s) after it. One object per distinct time slot.
- Silence is not cancellation; omit events that aren't mentioned.
- "Reconciliation" is "confession".

Output ONLY the JSON array, nothing else."#,
        pdf = pdf_path.display(),
        unknown = UNKNOWN_LOCATION,
    )
}

// ---------------------------------------------------------------------------
// Response parsing and staging
// ---------------------------------------------------------------------------

/// The JSON array in a model response: the whole text if it parses, else the
/// outermost `[...]` span.
pub fn extract_json_array(text: &str) -> Result<Vec<Value>> {
    let text = text.trim();
    if let Ok(items) = serde_json::from_str::<Vec<Value>>(text) {
        return Ok(items);
    }
    if let Some(m) = JSON_ARRAY_RE.find(text) {
        if let Ok(items) = serde_json::from_str::<Vec<Value>>(m.as_str()) {
            return Ok(items);
        }
    }
    let head: String = text.chars().take(500).collect();
    bail!("Could not find a JSON array in the extractor response. First 500 chars:\n{head}")
}

/// Cached summary for a bulletin PDF: same path, `.json` extension.
pub fn summary_path(local_path: &Path) -> PathBuf {
    local_path.with_extension("json")
}

/// Turn one model item into a candidate event for `bulletin`.
pub fn stage_item(item: &Value, bulletin: &BulletinRecord) -> Result<CandidateEvent, String> {
    let Value::Object(fields) = item else {
        return Err(format!("expected an object, got {item}"));
    };
    let mut event: Map<String, Value> = fields.clone();

    event.insert("id".into(), Value::Null);
    event.insert("source".into(), Value::String(bulletin.source.clone()));
    event.insert("bulletin_url".into(), Value::String(bulletin.url.clone()));

    if let Some(page) = event.remove("page") {
        event.entry("bulletin_page").or_insert(page);
    }
    if let Some(Value::String(concern)) = event.remove("concern") {
        let details = event
            .get("details")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let merged = if details.is_empty() {
            format!("Concern: {concern}")
        } else {
            format!("{details} (concern: {concern})")
        };
        event.insert("details".into(), Value::String(merged));
    }
    event
        .entry("location")
        .or_insert_with(|| Value::String(UNKNOWN_LOCATION.into()));
    event
        .entry("time_desc")
        .or_insert_with(|| Value::String(String::new()));

    if let Some(raw) = event.get("datetime").and_then(Value::as_str).map(str::to_string) {
        let datetime = parse_datetime(&raw).ok_or_else(|| format!("unreadable datetime {raw:?}"))?;
        event.insert("datetime".into(), Value::String(datetime.to_rfc3339()));
    }

    serde_json::from_value(Value::Object(event)).map_err(|e| e.to_string())
}

/// RFC 3339 as given; naive timestamps are taken as local time.
fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessStats {
    pub bulletins: u32,
    pub cached: u32,
    pub extracted: u32,
    pub failed: u32,
    pub items_rejected: u32,
    pub staged: u32,
}

impl std::fmt::Display for ProcessStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Processing Complete ===")?;
        writeln!(f, "Bulletins:        {}", self.bulletins)?;
        writeln!(f, "From cache:       {}", self.cached)?;
        writeln!(f, "Extracted:        {}", self.extracted)?;
        writeln!(f, "Failed:           {}", self.failed)?;
        writeln!(f, "Items rejected:   {}", self.items_rejected)?;
        writeln!(f, "Events staged:    {}", self.staged)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ProcessOutcome {
    pub candidates: Vec<CandidateEvent>,
    /// `(source, date)` of every bulletin that yielded a summary.
    pub processed: Vec<(String, NaiveDate)>,
    pub stats: ProcessStats,
}

pub struct Processor<E: BulletinExtractor> {
    extractor: E,
    weeks_ahead: u32,
    /// Full-bulletin pages the model reads. Empty means the whole PDF.
    pages: Vec<u32>,
}

impl<E: BulletinExtractor> Processor<E> {
    pub fn new(extractor: E, weeks_ahead: u32) -> Self {
        Self {
            extractor,
            weeks_ahead,
            pages: Vec::new(),
        }
    }

    /// Hand the model only these 1-based pages of each bulletin.
    pub fn with_pages(mut self, pages: Vec<u32>) -> Self {
        self.pages = pages;
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Summarise and stage every bulletin. One bulletin failing doesn't stop
    /// the others.
    pub async fn run(&self, bulletins: &[BulletinRecord]) -> ProcessOutcome {
        let mut outcome = ProcessOutcome::default();

        for bulletin in bulletins {
            outcome.stats.bulletins += 1;
            info!(source = %bulletin.source, date = %bulletin.date, "Processing bulletin");

            let items = match self.summary(bulletin, &mut outcome.stats).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(source = %bulletin.source, date = %bulletin.date, error = %e, "Bulletin processing failed");
                    outcome.stats.failed += 1;
                    continue;
                }
            };

            for (i, item) in items.iter().enumerate() {
                match stage_item(item, bulletin) {
                    Ok(candidate) => outcome.candidates.push(candidate),
                    Err(reason) => {
                        warn!(source = %bulletin.source, date = %bulletin.date, item = i, reason, "Rejected extracted item");
                        outcome.stats.items_rejected += 1;
                    }
                }
            }
            outcome
                .processed
                .push((bulletin.source.clone(), bulletin.date));
        }

        outcome.stats.staged = outcome.candidates.len() as u32;
        outcome
    }

    /// The cached summary, or a fresh one from the extractor (then cached).
    pub async fn summary(&self, bulletin: &BulletinRecord, stats: &mut ProcessStats) -> Result<Vec<Value>> {
        let local_path = Path::new(&bulletin.local_path);
        let cache = summary_path(local_path);

        if cache.exists() {
            let text = std::fs::read_to_string(&cache)
                .with_context(|| format!("Failed to read {}", cache.display()))?;
            let items = serde_json::from_str(&text)
                .with_context(|| format!("Cached summary {} is not a JSON array", cache.display()))?;
            stats.cached += 1;
            return Ok(items);
        }

        let pdf_path = std::fs::canonicalize(local_path)
            .with_context(|| format!("Bulletin PDF {} is missing", local_path.display()))?;
        let excerpt = self.excerpt(&pdf_path);
        let (read_path, pages) = match &excerpt {
            Some(excerpt) => (excerpt.path(), excerpt.pages()),
            None => (pdf_path.as_path(), &[][..]),
        };
        let prompt = build_prompt(bulletin, read_path, pages, self.weeks_ahead);
        let response = self.extractor.extract(&prompt, read_path).await?;
        let items = extract_json_array(&response)?;

        write_json_atomic(&cache, &items)?;
        info!(path = %cache.display(), items = items.len(), "Saved summary");
        stats.extracted += 1;
        Ok(items)
    }
}

impl<E: BulletinExtractor> Processor<E> {
    /// The configured pages cut out of the bulletin. Falls back to the whole
    /// PDF when no pages are configured, none exist, or the PDF can't be cut.
    fn excerpt(&self, pdf_path: &Path) -> Option<Excerpt> {
        if self.pages.is_empty() {
            return None;
        }
        match excerpt::cut(pdf_path, &self.pages) {
            Ok(Some(excerpt)) => Some(excerpt),
            Ok(None) => {
                warn!(path = %pdf_path.display(), pages = ?self.pages, "Bulletin has none of the pages; using the whole PDF");
                None
            }
            Err(e) => {
                warn!(path = %pdf_path.display(), error = %e, "Could not cut excerpt; using the whole PDF");
                None
            }
        }
    }
}

/// Write staged candidates as one JSON array, atomically.
pub fn write_staged(path: &Path, candidates: &[CandidateEvent]) -> Result<()> {
    write_json_atomic(path, candidates)?;
    info!(path = %path.display(), events = candidates.len(), "Wrote staged events");
    Ok(())
}
