use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BulletinError;

/// Application configuration loaded from environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Files
    pub store_path: PathBuf,
    pub staged_path: PathBuf,
    pub bulletins_dir: PathBuf,

    // Extraction
    /// How far past the bulletin date recurring schedules are materialized.
    pub weeks_ahead: u32,
    /// 1-based bulletin pages handed to the extractor. Empty means all.
    pub bulletin_pages: Vec<u32>,
    pub extractor_cmd: String,
    pub extractor_timeout: Duration,

    // Scraping
    /// First-run lookback for sources without a cursor.
    pub lookback_weeks: u32,
    pub http_timeout: Duration,

    // Validation
    pub allow_cancel_in_update: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("store.json"),
            staged_path: PathBuf::from("staged_events.json"),
            bulletins_dir: PathBuf::from("bulletins"),
            weeks_ahead: 2,
            bulletin_pages: vec![2, 3],
            extractor_cmd: "claude".to_string(),
            extractor_timeout: Duration::from_secs(600),
            lookback_weeks: 8,
            http_timeout: Duration::from_secs(30),
            allow_cancel_in_update: false,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    /// if present. Unset variables fall back to defaults.
    pub fn from_env() -> Result<Self, BulletinError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BulletinError> {
        let defaults = Self::default();

        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);

        Ok(Self {
            store_path: path("BULLETIN_STORE_PATH", defaults.store_path),
            staged_path: path("BULLETIN_STAGED_PATH", defaults.staged_path),
            bulletins_dir: path("BULLETIN_DIR", defaults.bulletins_dir),
            weeks_ahead: parsed(&lookup, "BULLETIN_WEEKS_AHEAD")?.unwrap_or(defaults.weeks_ahead),
            bulletin_pages: match lookup("BULLETIN_PAGES") {
                Some(raw) => parse_pages(&raw)?,
                None => defaults.bulletin_pages,
            },
            extractor_cmd: lookup("BULLETIN_EXTRACTOR_CMD")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.extractor_cmd),
            extractor_timeout: parsed(&lookup, "BULLETIN_EXTRACTOR_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.extractor_timeout),
            lookback_weeks: parsed(&lookup, "BULLETIN_LOOKBACK_WEEKS")?
                .unwrap_or(defaults.lookback_weeks),
            http_timeout: parsed(&lookup, "BULLETIN_HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            allow_cancel_in_update: parsed(&lookup, "BULLETIN_ALLOW_CANCEL_IN_UPDATE")?
                .unwrap_or(defaults.allow_cancel_in_update),
        })
    }

    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  BULLETIN_STORE_PATH: {}", self.store_path.display());
        tracing::info!("  BULLETIN_STAGED_PATH: {}", self.staged_path.display());
        tracing::info!("  BULLETIN_DIR: {}", self.bulletins_dir.display());
        tracing::info!("  BULLETIN_WEEKS_AHEAD: {}", self.weeks_ahead);
        tracing::info!("  BULLETIN_PAGES: {:?}", self.bulletin_pages);
        tracing::info!("  BULLETIN_EXTRACTOR_CMD: {}", self.extractor_cmd);
        tracing::info!(
            "  BULLETIN_EXTRACTOR_TIMEOUT_SECS: {}",
            self.extractor_timeout.as_secs()
        );
        tracing::info!("  BULLETIN_LOOKBACK_WEEKS: {}", self.lookback_weeks);
        tracing::info!("  BULLETIN_HTTP_TIMEOUT_SECS: {}", self.http_timeout.as_secs());
        tracing::info!(
            "  BULLETIN_ALLOW_CANCEL_IN_UPDATE: {}",
            self.allow_cancel_in_update
        );
    }
}

/// `2,3` style page list; `all` (or blank) for the whole bulletin.
fn parse_pages(raw: &str) -> Result<Vec<u32>, BulletinError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|part| match part.trim().parse::<u32>() {
            Ok(page) if page > 0 => Ok(page),
            _ => Err(BulletinError::Config(format!(
                "BULLETIN_PAGES={raw:?}: {part:?} is not a page number"
            ))),
        })
        .collect()
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, BulletinError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BulletinError::Config(format!("{key}={raw:?}: {e}"))),
    }
}
