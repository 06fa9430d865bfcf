// Command implementations behind the `bulletin` binary.
//
// Each takes explicit paths and settings so it can be driven from tests
// without touching the process environment.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use bulletin_common::parishes::{SourceProfile, SOURCES};
use bulletin_common::Config;
use bulletin_diff::schema::{candidate_schema, diff_schema};
use bulletin_diff::{Diff, ValidatedDiff, ValidationPolicy, Validator};
use bulletin_engine::{Enactor, Summary};
use bulletin_scout::extract::write_staged;
use bulletin_scout::{CliExtractor, HttpFetcher, ProcessStats, Processor, ScrapeStats, Scraper};
use bulletin_store::{Store, StoreFile};
use chrono::NaiveDate;
use tracing::info;

// ---------------------------------------------------------------------------
// Diff commands
// ---------------------------------------------------------------------------

pub fn read_diff(path: &Path) -> Result<Diff> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read diff {}", path.display()))?;
    Ok(Diff::parse(&json)?)
}

/// Load the store and validate a diff against it. Rejections come back as a
/// `ValidationFailure` listing every problem.
pub fn validate(
    store_file: &StoreFile,
    diff_path: &Path,
    policy: ValidationPolicy,
) -> Result<(Store, ValidatedDiff)> {
    let store = store_file.load()?;
    let diff = read_diff(diff_path)?;
    let validated = Validator::new(policy).validate(&store, &diff)?;
    info!(
        add = validated.additions().len(),
        cancel = validated.cancellations().len(),
        update = validated.updates().len(),
        remove = validated.removals().len(),
        "Diff is valid"
    );
    Ok((store, validated))
}

/// Validate, enact, and (unless `dry_run`) save the result.
pub fn enact(
    store_file: &StoreFile,
    diff_path: &Path,
    policy: ValidationPolicy,
    today: NaiveDate,
    dry_run: bool,
) -> Result<Summary> {
    let (store, validated) = validate(store_file, diff_path, policy)?;
    let (next, summary) = Enactor::new(today).enact(&store, &validated)?;

    if dry_run {
        info!("Dry run, store not written");
    } else {
        store_file.save(&next)?;
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Store report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReport {
    pub events: usize,
    pub cancelled: usize,
    pub next_id: u64,
    pub sources: usize,
    pub bulletins: usize,
    pub unprocessed: usize,
}

impl fmt::Display for StoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Store OK")?;
        writeln!(f, "Events:      {} ({} cancelled)", self.events, self.cancelled)?;
        writeln!(f, "Next id:     {}", self.next_id)?;
        writeln!(f, "Sources:     {}", self.sources)?;
        writeln!(f, "Bulletins:   {} ({} unprocessed)", self.bulletins, self.unprocessed)?;
        Ok(())
    }
}

/// Load the store, which checks every invariant, and summarise it.
pub fn check(store_file: &StoreFile) -> Result<StoreReport> {
    let store = store_file.load()?;
    Ok(StoreReport {
        events: store.events.len(),
        cancelled: store.events.iter().filter(|e| e.cancelled).count(),
        next_id: store.next_id,
        sources: store.sources.len(),
        bulletins: store.bulletins.len(),
        unprocessed: store.bulletins.iter().filter(|b| !b.processed).count(),
    })
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemaKind {
    /// The staged candidate-event list
    Candidate,
    /// The proposed diff document
    Diff,
}

pub fn schema(kind: SchemaKind) -> Result<String> {
    let schema = match kind {
        SchemaKind::Candidate => candidate_schema(),
        SchemaKind::Diff => diff_schema(),
    };
    Ok(serde_json::to_string_pretty(&schema)?)
}

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// Profiles for the requested source ids, or all of them.
pub fn select_sources(ids: &[String]) -> Result<Vec<SourceProfile>> {
    if ids.is_empty() {
        return Ok(SOURCES.to_vec());
    }
    ids.iter()
        .map(|id| match SOURCES.iter().find(|s| s.id == id.as_str()) {
            Some(profile) => Ok(*profile),
            None => {
                let known: Vec<&str> = SOURCES.iter().map(|s| s.id).collect();
                bail!("Unknown source {id:?}; known sources: {}", known.join(", "))
            }
        })
        .collect()
}

pub async fn scrape(
    config: &Config,
    store_file: &StoreFile,
    sources: &[SourceProfile],
    today: NaiveDate,
) -> Result<ScrapeStats> {
    let mut store = store_file.load_or_init()?;
    let fetcher = HttpFetcher::new(config.http_timeout)?;
    let scraper = Scraper::new(fetcher, &config.bulletins_dir, config.lookback_weeks);
    scraper.run(store_file, &mut store, sources, today).await
}

pub async fn process(config: &Config, store_file: &StoreFile, staged_path: &Path) -> Result<ProcessStats> {
    if !store_file.exists() {
        bail!(
            "{} not found; run `bulletin scrape` first",
            store_file.path().display()
        );
    }
    let mut store = store_file.load()?;
    if store.bulletins.is_empty() {
        info!("No bulletins recorded; run `bulletin scrape` first");
        return Ok(ProcessStats::default());
    }

    let extractor = CliExtractor::new(&config.extractor_cmd, config.extractor_timeout);
    let processor =
        Processor::new(extractor, config.weeks_ahead).with_pages(config.bulletin_pages.clone());
    let outcome = processor.run(&store.bulletins).await;

    write_staged(staged_path, &outcome.candidates)?;

    let mut marked = 0;
    for bulletin in &mut store.bulletins {
        let done = outcome
            .processed
            .iter()
            .any(|(source, date)| *source == bulletin.source && *date == bulletin.date);
        if done && !bulletin.processed {
            bulletin.processed = true;
            marked += 1;
        }
    }
    if marked > 0 {
        store_file.save(&store)?;
    }

    Ok(outcome.stats)
}
