//! Bulletin excerpts: the schedule pages cut out of a full PDF so the model
//! reads only those.
//!
//! The excerpt lives in its own temporary directory next to the bulletin and
//! keeps the bulletin's file name. Both are removed when the `Excerpt` drops.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lopdf::Document;
use tempfile::TempDir;
use tracing::debug;

pub struct Excerpt {
    _dir: TempDir,
    path: PathBuf,
    pages: Vec<u32>,
}

impl Excerpt {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1-based page numbers of the full bulletin, in order.
    pub fn pages(&self) -> &[u32] {
        &self.pages
    }
}

/// Write an excerpt holding `pages` (1-based) of `pdf_path`. Requested pages
/// past the end are skipped; `None` when none of them exist.
pub fn cut(pdf_path: &Path, pages: &[u32]) -> Result<Option<Excerpt>> {
    let mut doc = Document::load(pdf_path)
        .with_context(|| format!("Failed to read PDF {}", pdf_path.display()))?;

    let all: Vec<u32> = doc.get_pages().keys().copied().collect();
    let kept: Vec<u32> = all.iter().copied().filter(|n| pages.contains(n)).collect();
    if kept.is_empty() {
        return Ok(None);
    }
    let dropped: Vec<u32> = all.iter().copied().filter(|n| !kept.contains(n)).collect();
    doc.delete_pages(&dropped);
    doc.prune_objects();

    let parent = pdf_path.parent().unwrap_or_else(|| Path::new("."));
    let dir = tempfile::Builder::new()
        .prefix(".excerpt-")
        .tempdir_in(parent)
        .with_context(|| format!("Failed to create excerpt dir in {}", parent.display()))?;
    let file_name = pdf_path.file_name().unwrap_or_else(|| OsStr::new("bulletin.pdf"));
    let path = dir.path().join(file_name);

    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    doc.save_to(&mut file)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!(source = %pdf_path.display(), pages = ?kept, total = all.len(), "Cut bulletin excerpt");
    Ok(Some(Excerpt {
        _dir: dir,
        path,
        pages: kept,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    /// A blank PDF with `count` pages.
    pub(crate) fn blank_pdf(path: &Path, count: u32) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..count {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::from(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(count),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn keeps_only_the_requested_pages() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("2025-03-09.pdf");
        blank_pdf(&pdf, 6);

        let excerpt = cut(&pdf, &[2, 3]).unwrap().unwrap();

        assert_eq!(excerpt.pages(), &[2, 3]);
        assert_eq!(excerpt.path().file_name().unwrap(), "2025-03-09.pdf");
        let trimmed = Document::load(excerpt.path()).unwrap();
        assert_eq!(trimmed.get_pages().len(), 2);
    }

    #[test]
    fn pages_past_the_end_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("short.pdf");
        blank_pdf(&pdf, 2);

        let excerpt = cut(&pdf, &[2, 3]).unwrap().unwrap();
        assert_eq!(excerpt.pages(), &[2]);

        assert!(cut(&pdf, &[5]).unwrap().is_none());
    }

    #[test]
    fn excerpt_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("2025-03-09.pdf");
        blank_pdf(&pdf, 3);

        let excerpt = cut(&pdf, &[2]).unwrap().unwrap();
        let path = excerpt.path().to_path_buf();
        assert!(path.exists());

        drop(excerpt);
        assert!(!path.exists());
        assert!(pdf.exists());
    }

    #[test]
    fn unreadable_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, b"%PDF-1.7 truncated").unwrap();

        assert!(cut(&pdf, &[2]).is_err());
    }
}
