//! Block/challenge page detection.
//!
//! Runs before extraction so that an anti-bot interstitial never becomes a
//! baseline or a "change".

use crate::models::{Classification, DetectorConfig, PageSnapshot};
use crate::utils::contains_any;

/// Classifies fetched pages as usable, blocked, or unparsable.
#[derive(Debug, Clone, Default)]
pub struct BlockDetector {
    config: DetectorConfig,
}

impl BlockDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Classify a navigation result.
    pub fn classify(
        &self,
        http_status: Option<u16>,
        page_title: Option<&str>,
        rendered_text: &str,
    ) -> Classification {
        if let Some(status) = http_status {
            if self.config.blocked_statuses.contains(&status) {
                return Classification::Blocked {
                    reason: format!("HTTP {status}"),
                };
            }
            // Error pages must never become a signature.
            if !(200..400).contains(&status) {
                return Classification::ParseFailure {
                    reason: format!("HTTP {status}"),
                };
            }
        }

        if let Some(title) = page_title {
            if let Some(phrase) = contains_any(&title.to_lowercase(), &self.config.title_phrases) {
                return Classification::Blocked {
                    reason: format!("challenge title '{phrase}'"),
                };
            }
        }

        let body = rendered_text.to_lowercase();
        if let Some(vendor) = contains_any(&body, &self.config.vendor_markers) {
            if let Some(phrase) = contains_any(&body, &self.config.challenge_phrases) {
                return Classification::Blocked {
                    reason: format!("{vendor} challenge ('{phrase}')"),
                };
            }
        }

        if rendered_text.trim().is_empty() {
            return Classification::ParseFailure {
                reason: "page has no visible text".to_string(),
            };
        }

        Classification::Ok
    }

    /// Classify a snapshot, looking at markup as well when the text alone is clean.
    pub fn classify_snapshot(&self, snapshot: &PageSnapshot) -> Classification {
        let verdict = self.classify(
            snapshot.http_status,
            snapshot.page_title.as_deref(),
            &snapshot.rendered_text,
        );
        if verdict != Classification::Ok || snapshot.html.is_empty() {
            return verdict;
        }

        // Vendor fingerprints often live only in script URLs and ids.
        let markup = snapshot.html.to_lowercase();
        match (
            contains_any(&markup, &self.config.vendor_markers),
            contains_any(&snapshot.rendered_text.to_lowercase(), &self.config.challenge_phrases),
        ) {
            (Some(vendor), Some(phrase)) => Classification::Blocked {
                reason: format!("{vendor} challenge ('{phrase}')"),
            },
            _ => Classification::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> BlockDetector {
        BlockDetector::new(DetectorConfig::default())
    }

    #[test]
    fn test_blocked_statuses() {
        let d = detector();
        for status in [401, 403, 429] {
            assert!(matches!(
                d.classify(Some(status), None, "some content"),
                Classification::Blocked { .. }
            ));
        }
        assert_eq!(d.classify(Some(200), None, "content"), Classification::Ok);
        assert_eq!(d.classify(Some(304), None, "content"), Classification::Ok);
        assert_eq!(d.classify(None, None, "content"), Classification::Ok);
    }

    #[test]
    fn test_error_statuses_are_parse_failures() {
        let d = detector();
        for status in [404, 500, 503] {
            assert_eq!(
                d.classify(Some(status), Some("Error"), "Something went wrong"),
                Classification::ParseFailure {
                    reason: format!("HTTP {status}")
                }
            );
        }
    }

    #[test]
    fn test_blocked_list_is_configurable() {
        let d = BlockDetector::new(DetectorConfig {
            blocked_statuses: vec![503],
            ..DetectorConfig::default()
        });
        assert!(matches!(
            d.classify(Some(503), None, "busy"),
            Classification::Blocked { .. }
        ));
        assert!(matches!(
            d.classify(Some(403), None, "denied"),
            Classification::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_challenge_title() {
        let d = detector();
        assert_eq!(
            d.classify(Some(200), Some("Just a moment..."), "loading"),
            Classification::Blocked {
                reason: "challenge title 'just a moment'".into()
            }
        );
    }

    #[test]
    fn test_vendor_marker_needs_challenge_phrase() {
        let d = detector();
        let challenge = "Performance & security by Cloudflare\nVerify you are human by completing the action below.";
        assert!(matches!(
            d.classify(Some(200), Some("example.com"), challenge),
            Classification::Blocked { .. }
        ));

        // A page that merely mentions the vendor is fine.
        let article = "Cloudflare reported strong quarterly results.";
        assert_eq!(d.classify(Some(200), Some("News"), article), Classification::Ok);
    }

    #[test]
    fn test_empty_page_is_parse_failure() {
        let d = detector();
        assert!(matches!(
            d.classify(Some(200), Some("Title"), "  \n "),
            Classification::ParseFailure { .. }
        ));
    }

    #[test]
    fn test_snapshot_markup_fingerprint() {
        let d = detector();
        let snapshot = PageSnapshot {
            http_status: Some(200),
            page_title: Some("example.com".into()),
            rendered_text: "Please verify you are human".into(),
            html: r#"<script src="/cdn-cgi/challenge-platform/cf-chl.js"></script>"#.into(),
            final_url: None,
        };
        assert!(matches!(
            d.classify_snapshot(&snapshot),
            Classification::Blocked { .. }
        ));
    }
}
