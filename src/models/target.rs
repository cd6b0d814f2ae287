// src/models/target.rs

//! Watched targets and the target-list loader.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Extraction strategy selected for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// "Total comments: N" counter, reported when it increases
    CommentCount,
    /// First plausible comment block on the page
    LatestCommentBlock,
    /// Hash of the whole visible document
    #[default]
    FullDocumentHash,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::CommentCount => "comment_count",
            TargetKind::LatestCommentBlock => "latest_comment_block",
            TargetKind::FullDocumentHash => "full_document_hash",
        }
    }

    /// Parse a kind tag, falling back to the whole-document strategy.
    pub fn parse_lenient(tag: Option<&str>) -> Self {
        tag.and_then(|t| t.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "comment_count" | "comments_count" | "count" => Ok(TargetKind::CommentCount),
            "latest_comment_block" | "latest_comment" | "comment_block" => {
                Ok(TargetKind::LatestCommentBlock)
            }
            "full_document_hash" | "document_hash" | "hash" | "page" => {
                Ok(TargetKind::FullDocumentHash)
            }
            other => Err(AppError::validation(format!("unknown target kind '{other}'"))),
        }
    }
}

/// A page to watch. Identity is the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub kind: TargetKind,
    pub url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, kind: TargetKind, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            url: url.into(),
        }
    }
}

/// One entry of the raw target list: a bare URL or a `{name, kind, url}` record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetEntry {
    Url(String),
    Record {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

/// Normalize raw entries into typed targets.
///
/// Entries with an empty or unparsable URL are skipped, as are repeated URLs.
pub fn normalize_targets(entries: Vec<TargetEntry>) -> Vec<Target> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for entry in entries {
        let (name, kind, url) = match entry {
            TargetEntry::Url(url) => (None, TargetKind::default(), url),
            TargetEntry::Record { name, kind, url } => (
                name,
                TargetKind::parse_lenient(kind.as_deref()),
                url.unwrap_or_default(),
            ),
        };

        let url = url.trim().to_string();
        if url.is_empty() {
            log::debug!("Skipping target entry without url");
            continue;
        }
        if let Err(e) = url::Url::parse(&url) {
            log::warn!("Skipping target with invalid url '{}': {}", url, e);
            continue;
        }
        if !seen.insert(url.clone()) {
            log::warn!("Skipping duplicate target url {}", url);
            continue;
        }

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| url.clone());

        targets.push(Target { name, kind, url });
    }

    targets
}

/// Parse a JSON target list.
pub fn parse_targets(json: &str) -> Result<Vec<Target>> {
    let entries: Vec<TargetEntry> = serde_json::from_str(json)?;
    Ok(normalize_targets(entries))
}

/// Load and normalize the target list, rejecting a missing or empty list.
pub fn load_targets(path: impl AsRef<Path>) -> Result<Vec<Target>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("cannot read target list {}: {}", path.display(), e))
    })?;
    let targets = parse_targets(&content)
        .map_err(|e| AppError::config(format!("invalid target list {}: {}", path.display(), e)))?;

    if targets.is_empty() {
        return Err(AppError::config(format!(
            "target list {} contains no usable targets",
            path.display()
        )));
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_entries() {
        let json = r#"[
            "https://example.com/a",
            {"name": "Forum", "kind": "comment_count", "url": "https://example.com/b"},
            {"name": "Member", "kind": "latest_comment_block", "url": "https://example.com/c"}
        ]"#;
        let targets = parse_targets(json).unwrap();

        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].kind, TargetKind::FullDocumentHash);
        assert_eq!(targets[0].name, "https://example.com/a");
        assert_eq!(targets[1].kind, TargetKind::CommentCount);
        assert_eq!(targets[1].name, "Forum");
        assert_eq!(targets[2].kind, TargetKind::LatestCommentBlock);
    }

    #[test]
    fn test_unknown_or_missing_kind_defaults_to_hash() {
        let json = r#"[
            {"name": "x", "kind": "mystery", "url": "https://example.com/x"},
            {"name": "y", "url": "https://example.com/y"}
        ]"#;
        let targets = parse_targets(json).unwrap();
        assert!(
            targets
                .iter()
                .all(|t| t.kind == TargetKind::FullDocumentHash)
        );
    }

    #[test]
    fn test_empty_url_and_duplicates_skipped() {
        let json = r#"[
            {"name": "empty", "url": ""},
            {"name": "none"},
            "https://example.com/a",
            {"name": "again", "url": "https://example.com/a"}
        ]"#;
        let targets = parse_targets(json).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].url, "https://example.com/a");
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(
            "Comment-Count".parse::<TargetKind>().unwrap(),
            TargetKind::CommentCount
        );
        assert_eq!(
            "hash".parse::<TargetKind>().unwrap(),
            TargetKind::FullDocumentHash
        );
        assert!("nope".parse::<TargetKind>().is_err());
    }

    #[test]
    fn test_load_targets_rejects_empty_list() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("targets.json");
        std::fs::write(&path, r#"[{"name": "x", "url": ""}]"#).unwrap();

        assert!(matches!(load_targets(&path), Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_targets_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_targets(tmp.path().join("missing.json")).is_err());
    }
}
