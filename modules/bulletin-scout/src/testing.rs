// Test doubles for the scout stages.
//
// - MockFetcher (BulletinFetcher): HashMap-based URL → response
// - MockExtractor (BulletinExtractor): PDF file name → model response

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::extract::BulletinExtractor;
use crate::fetch::BulletinFetcher;

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Returns `Err` for unregistered pages and files; unregistered probes answer
/// `false`. Builder pattern: `.on_page()`, `.on_file()`, `.on_broken()`.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Registers a downloadable file; probes for it answer `true`.
    pub fn on_file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Every request for this URL fails.
    pub fn on_broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    /// Every URL requested so far, in order, prefixed by the method.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn log(&self, method: &str, url: &str) -> Result<()> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(format!("{method} {url}"));
        }
        if self.broken.contains(url) {
            anyhow::bail!("MockFetcher: {url} is broken");
        }
        Ok(())
    }
}

#[async_trait]
impl BulletinFetcher for MockFetcher {
    async fn probe(&self, url: &str) -> Result<bool> {
        self.log("HEAD", url)?;
        Ok(self.files.contains_key(url))
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.log("GET", url)?;
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockFetcher: no page registered for {url}"))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.log("GET", url)?;
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockFetcher: no file registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Answers by the PDF's file name (`2025-03-09.pdf`). Records every prompt.
#[derive(Default)]
pub struct MockExtractor {
    responses: HashMap<String, String>,
    calls: Mutex<Vec<(PathBuf, String)>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pdf(mut self, file_name: &str, response: &str) -> Self {
        self.responses
            .insert(file_name.to_string(), response.to_string());
        self
    }

    /// `(pdf_path, prompt)` for every invocation so far.
    pub fn calls(&self) -> Vec<(PathBuf, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BulletinExtractor for MockExtractor {
    async fn extract(&self, prompt: &str, pdf_path: &Path) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((pdf_path.to_path_buf(), prompt.to_string()));
        }
        let name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.responses
            .get(&name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockExtractor: no response registered for {name}"))
    }
}
