//! Bulletin discovery and download.
//!
//! For each source, finds bulletins dated after the source's cursor, downloads
//! the ones not yet on disk, records them in the store, and moves the cursor
//! forward. A failure on one bulletin is logged and skipped, and the cursor
//! stops short of it so the next run tries again. The store is saved after
//! every source so a partial run keeps its progress.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bulletin_common::parishes::{ScrapeStrategy, SourceProfile};
use bulletin_common::BulletinRecord;
use bulletin_store::{Store, StoreFile};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use scraper::{Html, Selector};
use tracing::{error, info, warn};

use crate::fetch::BulletinFetcher;

/// Link text format on discovermass parish pages, e.g. "Mar 02, 2025".
const LINK_DATE_FORMAT: &str = "%b %d, %Y";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrapeStats {
    pub sources_scraped: u32,
    pub sources_failed: u32,
    pub downloaded: u32,
    pub already_on_disk: u32,
    pub not_found: u32,
    pub failed: u32,
}

impl std::fmt::Display for ScrapeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scrape Complete ===")?;
        writeln!(f, "Sources scraped:  {}", self.sources_scraped)?;
        writeln!(f, "Sources failed:   {}", self.sources_failed)?;
        writeln!(f, "Downloaded:       {}", self.downloaded)?;
        writeln!(f, "Already on disk:  {}", self.already_on_disk)?;
        writeln!(f, "Not published:    {}", self.not_found)?;
        writeln!(f, "Failed:           {}", self.failed)?;
        Ok(())
    }
}

pub struct Scraper<F: BulletinFetcher> {
    fetcher: F,
    bulletins_dir: PathBuf,
    lookback_weeks: u32,
}

impl<F: BulletinFetcher> Scraper<F> {
    pub fn new(fetcher: F, bulletins_dir: impl Into<PathBuf>, lookback_weeks: u32) -> Self {
        Self {
            fetcher,
            bulletins_dir: bulletins_dir.into(),
            lookback_weeks,
        }
    }

    /// Scrape every source in order, saving the store after each one.
    pub async fn run(
        &self,
        store_file: &StoreFile,
        store: &mut Store,
        sources: &[SourceProfile],
        today: NaiveDate,
    ) -> Result<ScrapeStats> {
        let mut stats = ScrapeStats::default();

        for profile in sources {
            info!(source = profile.id, "Scraping source");
            match self.scrape_source(store, profile, today, &mut stats).await {
                Ok(()) => stats.sources_scraped += 1,
                Err(e) => {
                    error!(source = profile.id, error = %e, "Source scrape failed");
                    stats.sources_failed += 1;
                }
            }
            store_file
                .save(store)
                .with_context(|| format!("Failed to save store after scraping {}", profile.id))?;
        }

        info!(
            downloaded = stats.downloaded,
            on_disk = stats.already_on_disk,
            failed = stats.failed,
            "Scrape finished"
        );
        Ok(stats)
    }

    pub async fn scrape_source(
        &self,
        store: &mut Store,
        profile: &SourceProfile,
        today: NaiveDate,
        stats: &mut ScrapeStats,
    ) -> Result<()> {
        let since = self.collected_through(store, profile.id, today);
        let progress = match profile.strategy {
            ScrapeStrategy::ParishesOnline { base_url } => {
                self.scrape_parishes_online(store, profile.id, base_url, since, today, stats)
                    .await
            }
            ScrapeStrategy::DiscoverMass { url } => {
                self.scrape_discover_mass(store, profile.id, url, since, today, stats)
                    .await?
            }
        };

        if let Some(through) = progress.settled_through() {
            store.advance_cursor(profile.id, through);
        }
        if let Some(first) = progress.first_failure() {
            info!(source = profile.id, %first, "Cursor held before failed bulletin");
        }
        Ok(())
    }

    /// The cursor, or the lookback horizon for a source never collected.
    fn collected_through(&self, store: &Store, source: &str, today: NaiveDate) -> NaiveDate {
        store
            .last_collected(source)
            .unwrap_or_else(|| today - Duration::weeks(i64::from(self.lookback_weeks)))
    }

    async fn scrape_parishes_online(
        &self,
        store: &mut Store,
        source: &str,
        base_url: &str,
        since: NaiveDate,
        today: NaiveDate,
        stats: &mut ScrapeStats,
    ) -> Progress {
        let mut progress = Progress::default();
        for date in sundays_after(since, today) {
            let url = parishes_online_url(base_url, date);
            let path = bulletin_path(&self.bulletins_dir, source, date);
            if path.exists() {
                self.keep_existing(store, source, date, &url, &path, stats);
                progress.done.push(date);
                continue;
            }
            match self.fetcher.probe(&url).await {
                Ok(true) => {
                    let ok = self.download(store, source, date, &url, &path, stats).await;
                    progress.note(date, ok);
                }
                Ok(false) => {
                    info!(source, %date, "No bulletin published");
                    stats.not_found += 1;
                }
                Err(e) => {
                    warn!(source, %date, error = %e, "Probe failed");
                    stats.failed += 1;
                    progress.failed.push(date);
                }
            }
        }
        progress
    }

    async fn scrape_discover_mass(
        &self,
        store: &mut Store,
        source: &str,
        page_url: &str,
        since: NaiveDate,
        today: NaiveDate,
        stats: &mut ScrapeStats,
    ) -> Result<Progress> {
        let html = self.fetcher.fetch_text(page_url).await?;
        let mut progress = Progress::default();

        for (date, url) in parse_discovermass_links(&html) {
            if date <= since || date > today {
                continue;
            }
            let path = bulletin_path(&self.bulletins_dir, source, date);
            if path.exists() {
                self.keep_existing(store, source, date, &url, &path, stats);
                progress.done.push(date);
                continue;
            }
            let ok = self.download(store, source, date, &url, &path, stats).await;
            progress.note(date, ok);
        }
        Ok(progress)
    }

    fn keep_existing(
        &self,
        store: &mut Store,
        source: &str,
        date: NaiveDate,
        url: &str,
        path: &Path,
        stats: &mut ScrapeStats,
    ) {
        info!(source, %date, "Already on disk");
        record(store, source, date, url, path);
        stats.already_on_disk += 1;
    }

    async fn download(
        &self,
        store: &mut Store,
        source: &str,
        date: NaiveDate,
        url: &str,
        path: &Path,
        stats: &mut ScrapeStats,
    ) -> bool {
        let result = async {
            let bytes = self.fetcher.fetch_bytes(url).await?;
            save_pdf(path, &bytes)
        }
        .await;

        match result {
            Ok(()) => {
                info!(source, %date, url, "Downloaded bulletin");
                record(store, source, date, url, path);
                stats.downloaded += 1;
                true
            }
            Err(e) => {
                warn!(source, %date, url, error = %e, "Bulletin download failed");
                stats.failed += 1;
                false
            }
        }
    }
}

/// Bulletin dates one source run recorded or failed on.
#[derive(Debug, Default)]
struct Progress {
    done: Vec<NaiveDate>,
    failed: Vec<NaiveDate>,
}

impl Progress {
    fn note(&mut self, date: NaiveDate, ok: bool) {
        if ok {
            self.done.push(date);
        } else {
            self.failed.push(date);
        }
    }

    fn first_failure(&self) -> Option<NaiveDate> {
        self.failed.iter().min().copied()
    }

    /// Newest recorded date that no failure precedes.
    fn settled_through(&self) -> Option<NaiveDate> {
        let first_failure = self.first_failure();
        self.done
            .iter()
            .copied()
            .filter(|date| first_failure.map_or(true, |failed| *date < failed))
            .max()
    }
}

fn record(store: &mut Store, source: &str, date: NaiveDate, url: &str, path: &Path) {
    store.record_bulletin(BulletinRecord {
        source: source.to_string(),
        date,
        url: url.to_string(),
        local_path: path.to_string_lossy().into_owned(),
        processed: false,
    });
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Every Sunday strictly after `after`, through `through` inclusive.
pub fn sundays_after(after: NaiveDate, through: NaiveDate) -> Vec<NaiveDate> {
    let mut day = after + Duration::days(1);
    while day.weekday() != Weekday::Sun {
        day += Duration::days(1);
    }
    let mut sundays = Vec::new();
    while day <= through {
        sundays.push(day);
        day += Duration::weeks(1);
    }
    sundays
}

pub fn parishes_online_url(base_url: &str, date: NaiveDate) -> String {
    format!("{base_url}{}B.pdf", date.format("%Y%m%d"))
}

/// `<dir>/<source>/<YYYY-MM-DD>.pdf`
pub fn bulletin_path(dir: &Path, source: &str, date: NaiveDate) -> PathBuf {
    dir.join(source).join(format!("{date}.pdf"))
}

/// Bulletin links on a discovermass parish page: the current one first, then
/// the archive. Links whose text isn't a date are skipped.
pub fn parse_discovermass_links(html: &str) -> Vec<(NaiveDate, String)> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for (selector, first_only) in [
        ("span.bulletin-current a", true),
        ("span.bulletin-archive a", false),
    ] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let anchors = document.select(&selector).take(if first_only { 1 } else { usize::MAX });
        for a in anchors {
            let text = a.text().collect::<String>();
            let text = text.trim();
            let href = a.value().attr("href").unwrap_or("").trim();
            if text.is_empty() || href.is_empty() {
                continue;
            }
            match NaiveDate::parse_from_str(text, LINK_DATE_FORMAT) {
                Ok(date) => links.push((date, href.to_string())),
                Err(_) => warn!(text, "Could not parse date from bulletin link"),
            }
        }
    }

    links
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Write a downloaded bulletin into place, refusing anything that isn't a PDF.
fn save_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    if !looks_like_pdf(bytes) {
        bail!("response does not look like a PDF ({} bytes)", bytes.len());
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
