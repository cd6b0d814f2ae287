//! Change events handed to the notifier.

use serde::{Deserialize, Serialize};

use crate::models::TargetKind;

/// A confirmed, reportable change of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub target_name: String,
    pub url: String,
    pub kind: TargetKind,
    /// Previous comparison value (count or abbreviated hash)
    pub previous: String,
    /// Current comparison value (count or abbreviated hash)
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl ChangeEvent {
    /// Single-line form used inside batched messages.
    pub fn summary_line(&self) -> String {
        match self.kind {
            TargetKind::CommentCount => format!(
                "{}: {} → {} comments {}",
                self.target_name, self.previous, self.current, self.url
            ),
            _ => format!("{}: content changed {}", self.target_name, self.url),
        }
    }

    /// Stand-alone message for per-event delivery.
    pub fn message(&self) -> String {
        let mut text = format!("🔔 {}\n", self.target_name);
        match self.kind {
            TargetKind::CommentCount => {
                text.push_str(&format!("Comments: {} → {}\n", self.previous, self.current));
            }
            _ => text.push_str("Content changed\n"),
        }
        if let Some(preview) = &self.preview {
            text.push_str(&format!("“{}”\n", preview));
        }
        text.push_str(&self.url);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_event() -> ChangeEvent {
        ChangeEvent {
            target_name: "Forum".into(),
            url: "https://example.com/f".into(),
            kind: TargetKind::CommentCount,
            previous: "100".into(),
            current: "105".into(),
            preview: Some("New post".into()),
        }
    }

    #[test]
    fn test_count_summary_line() {
        assert_eq!(
            count_event().summary_line(),
            "Forum: 100 → 105 comments https://example.com/f"
        );
    }

    #[test]
    fn test_message_includes_preview_and_url() {
        let text = count_event().message();
        assert!(text.starts_with("🔔 Forum\n"));
        assert!(text.contains("Comments: 100 → 105"));
        assert!(text.contains("New post"));
        assert!(text.ends_with("https://example.com/f"));
    }
}
