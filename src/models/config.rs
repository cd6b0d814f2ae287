//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Fetching, concurrency and anti-spam settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Signature extraction rules
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Challenge page detection rules
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Notification channel settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// File locations relative to the storage directory
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let m = &self.monitor;
        if m.max_concurrency == 0 {
            return Err(AppError::validation("monitor.max_concurrency must be > 0"));
        }
        if m.nav_timeout_ms == 0 {
            return Err(AppError::validation("monitor.nav_timeout_ms must be > 0"));
        }
        if m.user_agent.trim().is_empty() {
            return Err(AppError::validation("monitor.user_agent is empty"));
        }

        let e = &self.extraction;
        if e.count_labels.is_empty() {
            return Err(AppError::validation("extraction.count_labels is empty"));
        }
        if e.min_block_chars >= e.max_block_chars {
            return Err(AppError::validation(
                "extraction.min_block_chars must be < extraction.max_block_chars",
            ));
        }
        if e.block_truncate_chars == 0 || e.fallback_prefix_chars == 0 {
            return Err(AppError::validation(
                "extraction truncation lengths must be > 0",
            ));
        }
        if e.strategies.iter().any(|s| s.selectors.is_empty()) {
            return Err(AppError::validation(
                "every extraction strategy needs at least one selector",
            ));
        }

        if self.notify.max_message_chars < 100 {
            return Err(AppError::validation(
                "notify.max_message_chars must be >= 100",
            ));
        }
        if self.paths.targets_file.trim().is_empty() || self.paths.state_file.trim().is_empty() {
            return Err(AppError::validation("paths must not be empty"));
        }
        Ok(())
    }
}

/// Immutable settings handed to the fetch orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum pages fetched at the same time
    #[serde(default = "defaults::max_concurrency")]
    pub max_concurrency: usize,

    /// Hard timeout per navigation in milliseconds
    #[serde(default = "defaults::nav_timeout_ms")]
    pub nav_timeout_ms: u64,

    /// Retries granted to a blocked page (timeouts are never retried)
    #[serde(default = "defaults::retry_count")]
    pub retry_count: u32,

    /// Cool-down before retrying a blocked page
    #[serde(default = "defaults::retry_cooldown_ms")]
    pub retry_cooldown_ms: u64,

    /// Fixed delay before every fetch
    #[serde(default = "defaults::stagger_ms")]
    pub stagger_ms: u64,

    /// Extra wait after navigation before reading the page
    #[serde(default)]
    pub settle_ms: u64,

    /// Simultaneous changes at or above which the run's events are suppressed (0 disables)
    #[serde(default = "defaults::anti_spam_threshold")]
    pub anti_spam_threshold: usize,

    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept-Language header for page requests
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Also decline stylesheets
    #[serde(default)]
    pub block_stylesheets: bool,

    /// Labels of consent/overlay buttons to try dismissing
    #[serde(default = "defaults::consent_selectors")]
    pub consent_selectors: Vec<String>,
}

impl MonitorConfig {
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }

    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::max_concurrency(),
            nav_timeout_ms: defaults::nav_timeout_ms(),
            retry_count: defaults::retry_count(),
            retry_cooldown_ms: defaults::retry_cooldown_ms(),
            stagger_ms: defaults::stagger_ms(),
            settle_ms: 0,
            anti_spam_threshold: defaults::anti_spam_threshold(),
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            block_stylesheets: false,
            consent_selectors: defaults::consent_selectors(),
        }
    }
}

/// One named family of DOM candidates, tried in table order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateStrategy {
    pub name: String,
    pub selectors: Vec<String>,
}

/// Signature extraction parameters. Kept as data so locales can be swapped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Labels preceding the total comment counter
    #[serde(default = "defaults::count_labels")]
    pub count_labels: Vec<String>,

    /// Headers after which the newest comment is listed
    #[serde(default = "defaults::comments_header_labels")]
    pub comments_header_labels: Vec<String>,

    /// UI chrome removed from comparison text and skipped in previews
    #[serde(default = "defaults::junk_tokens")]
    pub junk_tokens: Vec<String>,

    /// Markers of login forms and navigation menus
    #[serde(default = "defaults::login_markers")]
    pub login_markers: Vec<String>,

    #[serde(default = "defaults::min_block_chars")]
    pub min_block_chars: usize,

    #[serde(default = "defaults::max_block_chars")]
    pub max_block_chars: usize,

    /// Length the chosen comment block is cut to before hashing
    #[serde(default = "defaults::block_truncate_chars")]
    pub block_truncate_chars: usize,

    /// Body prefix hashed when no candidate qualifies
    #[serde(default = "defaults::fallback_prefix_chars")]
    pub fallback_prefix_chars: usize,

    #[serde(default = "defaults::preview_chars")]
    pub preview_chars: usize,

    /// Asset headers longer than this are not skipped in previews
    #[serde(default = "defaults::max_asset_header_chars")]
    pub max_asset_header_chars: usize,

    /// Candidate families in priority order
    #[serde(default = "defaults::strategies")]
    pub strategies: Vec<CandidateStrategy>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            count_labels: defaults::count_labels(),
            comments_header_labels: defaults::comments_header_labels(),
            junk_tokens: defaults::junk_tokens(),
            login_markers: defaults::login_markers(),
            min_block_chars: defaults::min_block_chars(),
            max_block_chars: defaults::max_block_chars(),
            block_truncate_chars: defaults::block_truncate_chars(),
            fallback_prefix_chars: defaults::fallback_prefix_chars(),
            preview_chars: defaults::preview_chars(),
            max_asset_header_chars: defaults::max_asset_header_chars(),
            strategies: defaults::strategies(),
        }
    }
}

/// Block/challenge detection phrases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "defaults::blocked_statuses")]
    pub blocked_statuses: Vec<u16>,

    /// Titles of known interstitial pages
    #[serde(default = "defaults::title_phrases")]
    pub title_phrases: Vec<String>,

    /// Anti-bot vendor fingerprints in the body
    #[serde(default = "defaults::vendor_markers")]
    pub vendor_markers: Vec<String>,

    /// Phrases that only appear on challenge pages
    #[serde(default = "defaults::challenge_phrases")]
    pub challenge_phrases: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blocked_statuses: defaults::blocked_statuses(),
            title_phrases: defaults::title_phrases(),
            vendor_markers: defaults::vendor_markers(),
            challenge_phrases: defaults::challenge_phrases(),
        }
    }
}

/// How events are turned into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    /// One summary message per run
    #[default]
    Batch,
    /// One message per event
    PerEvent,
}

/// Notification channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub mode: NotifyMode,

    /// Bot token; falls back to `TELEGRAM_BOT_TOKEN`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Destination chat; falls back to `TELEGRAM_CHAT_ID`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            mode: NotifyMode::default(),
            bot_token: None,
            chat_id: None,
            api_base: defaults::api_base(),
            timeout_secs: defaults::notify_timeout(),
            max_message_chars: defaults::max_message_chars(),
        }
    }
}

/// File locations relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::targets_file")]
    pub targets_file: String,

    #[serde(default = "defaults::state_file")]
    pub state_file: String,
}

impl PathsConfig {
    pub fn targets_path(&self, root: &Path) -> PathBuf {
        root.join(&self.targets_file)
    }

    pub fn state_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_file)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            targets_file: defaults::targets_file(),
            state_file: defaults::state_file(),
        }
    }
}

mod defaults {
    use super::CandidateStrategy;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Monitor defaults
    pub fn max_concurrency() -> usize {
        2
    }
    pub fn nav_timeout_ms() -> u64 {
        45_000
    }
    pub fn retry_count() -> u32 {
        1
    }
    pub fn retry_cooldown_ms() -> u64 {
        5_000
    }
    pub fn stagger_ms() -> u64 {
        400
    }
    pub fn anti_spam_threshold() -> usize {
        2
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36"
            .into()
    }
    pub fn accept_language() -> String {
        "it-IT,it;q=0.9,en;q=0.8".into()
    }
    pub fn consent_selectors() -> Vec<String> {
        strings(&[
            "Accetta tutto",
            "Accetta e continua",
            "Accetta",
            "Accetto",
            "I Agree",
            "Accept",
            "Agree",
        ])
    }

    // Extraction defaults
    pub fn count_labels() -> Vec<String> {
        strings(&["Totale dei commenti", "Totale commenti", "Total comments"])
    }
    pub fn comments_header_labels() -> Vec<String> {
        strings(&["Commenti di", "Comments by"])
    }
    pub fn junk_tokens() -> Vec<String> {
        strings(&[
            "Rispondi",
            "Condividi",
            "Segnala",
            "Mi piace",
            "Non mi piace",
            "Mostra altro",
            "Reply",
            "Share",
            "Report",
            "Like",
            "Dislike",
            "Show more",
        ])
    }
    pub fn login_markers() -> Vec<String> {
        strings(&[
            "accedi",
            "registrati",
            "password",
            "log in",
            "sign in",
            "sign up",
            "menu",
        ])
    }
    pub fn min_block_chars() -> usize {
        40
    }
    pub fn max_block_chars() -> usize {
        2000
    }
    pub fn block_truncate_chars() -> usize {
        600
    }
    pub fn fallback_prefix_chars() -> usize {
        1500
    }
    pub fn preview_chars() -> usize {
        200
    }
    pub fn max_asset_header_chars() -> usize {
        24
    }
    pub fn strategies() -> Vec<CandidateStrategy> {
        vec![
            CandidateStrategy {
                name: "comment_text".into(),
                selectors: strings(&[
                    ".comment_text",
                    "[data-test='comment-text']",
                    ".js-comment-text",
                ]),
            },
            CandidateStrategy {
                name: "comment_marker".into(),
                selectors: strings(&[
                    "[class*='comment']",
                    "[id*='comment']",
                    "[data-test*='comment']",
                ]),
            },
            CandidateStrategy {
                name: "generic_block".into(),
                selectors: strings(&["article", "li", "section", "div"]),
            },
        ]
    }

    // Detector defaults
    pub fn blocked_statuses() -> Vec<u16> {
        vec![401, 403, 429]
    }
    pub fn title_phrases() -> Vec<String> {
        strings(&[
            "just a moment",
            "attention required",
            "access denied",
            "checking your browser",
            "verify you are human",
            "pardon our interruption",
            "un momento",
            "accesso negato",
        ])
    }
    pub fn vendor_markers() -> Vec<String> {
        strings(&[
            "cloudflare",
            "cf-chl",
            "perimeterx",
            "px-captcha",
            "datadome",
            "akamai",
            "incapsula",
            "captcha",
        ])
    }
    pub fn challenge_phrases() -> Vec<String> {
        strings(&[
            "verify you are human",
            "checking your browser",
            "enable javascript and cookies",
            "are you a robot",
            "unusual traffic",
            "press & hold",
            "verifica di essere umano",
        ])
    }

    // Notify defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn notify_timeout() -> u64 {
        15
    }
    pub fn max_message_chars() -> usize {
        4000
    }

    // Path defaults
    pub fn targets_file() -> String {
        "targets.json".into()
    }
    pub fn state_file() -> String {
        "state.json".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.monitor.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_block_band() {
        let mut config = Config::default();
        config.extraction.min_block_chars = 3000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            max_concurrency = 3
            anti_spam_threshold = 5

            [notify]
            mode = "per_event"
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.max_concurrency, 3);
        assert_eq!(config.monitor.anti_spam_threshold, 5);
        assert_eq!(config.monitor.retry_count, 1);
        assert_eq!(config.notify.mode, NotifyMode::PerEvent);
        assert_eq!(config.detector.blocked_statuses, vec![401, 403, 429]);
        assert_eq!(config.extraction.strategies.len(), 3);
    }

    #[test]
    fn to_toml_round_trips_defaults() {
        let rendered = Config::default().to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.monitor.nav_timeout_ms, 45_000);
        assert_eq!(parsed.extraction.strategies[0].name, "comment_text");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
