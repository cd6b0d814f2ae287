//! Debug artifacts for a single inspected target.
//!
//! `check --out DIR` leaves the raw page behind so a broken selector or a
//! challenge page can be looked at offline.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::models::{FetchStatus, Signature, TargetKind};
use crate::pipeline::TargetDetail;
use crate::services::SignatureExtractor;

pub const PAGE_HTML: &str = "page.html";
pub const PAGE_TEXT: &str = "page.txt";
pub const PAGE_META: &str = "page_meta.json";

/// Summary written to `page_meta.json`.
#[derive(Debug, Serialize)]
pub struct CheckMeta<'a> {
    pub url: &'a str,
    pub kind: TargetKind,
    pub status: Option<u16>,
    pub final_url: Option<&'a str>,
    pub title: Option<&'a str>,
    pub fetch_status: Option<FetchStatus>,
    pub cookie_clicked: bool,
    pub attempts: u32,
    /// Counter found in the page text, whatever the target kind
    pub comment_count: Option<u64>,
    pub classification: Option<String>,
    pub signature: Option<&'a Signature>,
    pub error: Option<String>,
    pub first_lines: Vec<&'a str>,
}

impl<'a> CheckMeta<'a> {
    pub fn new(detail: &'a TargetDetail, extractor: &SignatureExtractor, lines: usize) -> Self {
        let target = &detail.result.target;
        let snapshot = detail.page.as_ref().map(|p| p.snapshot());

        Self {
            url: &target.url,
            kind: target.kind,
            status: snapshot.and_then(|s| s.http_status),
            final_url: snapshot.and_then(|s| s.final_url.as_deref()),
            title: snapshot.and_then(|s| s.page_title.as_deref()),
            fetch_status: detail.page.as_ref().map(|p| p.status),
            cookie_clicked: detail.overlay_dismissed,
            attempts: detail.result.attempts,
            comment_count: snapshot.and_then(|s| extractor.parse_comment_count(&s.rendered_text)),
            classification: detail.classification.as_ref().map(|c| format!("{c:?}")),
            signature: detail.result.signature(),
            error: detail.result.failure().map(|f| f.to_string()),
            first_lines: snapshot
                .map(|s| s.rendered_text.lines().take(lines).collect())
                .unwrap_or_default(),
        }
    }
}

/// Write the page markup, its text and a metadata file into `dir`.
///
/// The page files are skipped when no page was observed.
pub async fn write_check_artifacts(
    dir: &Path,
    detail: &TargetDetail,
    extractor: &SignatureExtractor,
    lines: usize,
) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    if let Some(page) = &detail.page {
        let snapshot = page.snapshot();
        tokio::fs::write(dir.join(PAGE_HTML), &snapshot.html).await?;
        tokio::fs::write(dir.join(PAGE_TEXT), &snapshot.rendered_text).await?;
    }

    let meta = CheckMeta::new(detail, extractor, lines);
    tokio::fs::write(dir.join(PAGE_META), serde_json::to_vec_pretty(&meta)?).await?;
    Ok(())
}
