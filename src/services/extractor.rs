// src/services/extractor.rs

//! Signature extraction.
//!
//! Turns a rendered page into a `Signature` whose `stable_id` ignores the
//! volatile parts of the page (relative timestamps, UI chrome). Comment
//! regions are located through an ordered table of named candidate
//! strategies; the first plausible candidate wins, and a hashed body prefix
//! is used when none qualifies.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, ExtractionFailure, Result};
use crate::models::{
    ClassifiedOutcome, Confidence, ExtractionConfig, FetchStatus, PageSnapshot, Signature,
    TargetKind,
};
use crate::utils::html::{element_lines, visible_text};
use crate::utils::{grapheme_len, normalize_whitespace, sha256_hex, truncate_graphemes};

const RELATIVE_TIME: &str = r"(?i)\b(?:\d+|an?|one|un|una|uno)\s+(?:seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?|second[oi]|minut[oi]|ora|ore|giorn[oi]|settiman[ae]|mes[ei]|ann[oi])\s+(?:ago|fa)\b|\b(?:just now|adesso|poco fa)\b";
const ABSOLUTE_TIME: &str = r"\b\d{1,2}\.\d{1,2}\.\d{4},?\s+\d{1,2}:\d{2}\b";

/// Result of one candidate strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockMatch {
    Match { strategy: String, text: String },
    NoMatch,
}

/// A candidate strategy with its selectors compiled into one document-order group.
#[derive(Debug)]
struct CompiledStrategy {
    name: String,
    selector: Selector,
}

/// Derives signatures from fetched pages.
#[derive(Debug)]
pub struct SignatureExtractor {
    config: ExtractionConfig,
    count_pattern: Regex,
    relative_time: Regex,
    absolute_time: Regex,
    chrome: Option<Regex>,
    login: Option<Regex>,
    strategies: Vec<CompiledStrategy>,
}

impl SignatureExtractor {
    /// Compile the extraction table.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let labels: Vec<String> = config
            .count_labels
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| regex::escape(l.trim()))
            .collect();
        if labels.is_empty() {
            return Err(AppError::config("extraction.count_labels is empty"));
        }
        let count_pattern = Self::compile(&format!(
            r"(?i)(?:{})\s*[:：]?\s*(\d{{1,3}}(?:[.,'’\u{{00A0}}\u{{202F}}]\d{{3}})+|\d+)",
            labels.join("|")
        ))?;

        let chrome = Self::word_alternation(&config.junk_tokens)?;

        let login = Self::word_alternation(&config.login_markers)?;

        let strategies = config
            .strategies
            .iter()
            .map(|s| {
                for sel in &s.selectors {
                    Self::parse_selector(sel)?;
                }
                Ok(CompiledStrategy {
                    name: s.name.clone(),
                    selector: Self::parse_selector(&s.selectors.join(", "))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            count_pattern,
            relative_time: Self::compile(RELATIVE_TIME)?,
            absolute_time: Self::compile(ABSOLUTE_TIME)?,
            chrome,
            login,
            strategies,
            config,
        })
    }

    /// Derive the signature of a classified page for the given strategy kind.
    pub fn extract(
        &self,
        kind: TargetKind,
        outcome: &ClassifiedOutcome,
    ) -> std::result::Result<Signature, ExtractionFailure> {
        if outcome.status != FetchStatus::Ok {
            return Err(ExtractionFailure::new(format!(
                "page not usable ({})",
                outcome.status
            )));
        }
        let snapshot = outcome.snapshot();
        match kind {
            TargetKind::FullDocumentHash => self.document_hash(snapshot),
            TargetKind::CommentCount => self.comment_count(snapshot),
            TargetKind::LatestCommentBlock => self.latest_comment_block(snapshot),
        }
    }

    fn document_hash(
        &self,
        snapshot: &PageSnapshot,
    ) -> std::result::Result<Signature, ExtractionFailure> {
        let text = normalize_whitespace(&Self::document_text(snapshot));
        if text.is_empty() {
            return Err(ExtractionFailure::new("document is empty"));
        }
        Ok(Signature::new(sha256_hex(&text)).with_strategy("document", Confidence::High))
    }

    fn comment_count(
        &self,
        snapshot: &PageSnapshot,
    ) -> std::result::Result<Signature, ExtractionFailure> {
        let mut text = snapshot.rendered_text.clone();
        let mut count = self.parse_comment_count(&text);
        if count.is_none() && !snapshot.html.is_empty() {
            text = visible_text(&Html::parse_document(&snapshot.html));
            count = self.parse_comment_count(&text);
        }
        let count =
            count.ok_or_else(|| ExtractionFailure::new("no total comment counter found"))?;

        Ok(Signature::new(sha256_hex(&format!("count:{count}")))
            .with_count(count)
            .with_preview(self.newest_comment_preview(&text))
            .with_strategy("comment_count", Confidence::High))
    }

    fn latest_comment_block(
        &self,
        snapshot: &PageSnapshot,
    ) -> std::result::Result<Signature, ExtractionFailure> {
        if !snapshot.html.is_empty() {
            let document = Html::parse_document(&snapshot.html);
            if let BlockMatch::Match { strategy, text } = self.find_comment_block(&document) {
                let text = truncate_graphemes(&text, self.config.block_truncate_chars);
                log::debug!("Comment block matched by strategy '{}'", strategy);
                return Ok(Signature::new(sha256_hex(&text))
                    .with_preview(Some(truncate_graphemes(&text, self.config.preview_chars)))
                    .with_strategy(strategy, Confidence::High));
            }
        }

        let body = self.comparison_text(&Self::document_text(snapshot));
        if body.is_empty() {
            return Err(ExtractionFailure::new(
                "no comment block and no visible body text",
            ));
        }
        let prefix = truncate_graphemes(&body, self.config.fallback_prefix_chars);
        Ok(Signature::new(sha256_hex(&prefix))
            .with_preview(Some(truncate_graphemes(&prefix, self.config.preview_chars)))
            .with_strategy("body_prefix", Confidence::Fallback))
    }

    /// Try each strategy in priority order; the first plausible candidate wins.
    pub fn find_comment_block(&self, document: &Html) -> BlockMatch {
        self.strategies
            .iter()
            .find_map(|strategy| {
                document
                    .select(&strategy.selector)
                    .find_map(|el| self.qualify_candidate(el))
                    .map(|text| BlockMatch::Match {
                        strategy: strategy.name.clone(),
                        text,
                    })
            })
            .unwrap_or(BlockMatch::NoMatch)
    }

    /// Normalized comparison text of a candidate, if it is plausibly a comment.
    fn qualify_candidate(&self, element: ElementRef<'_>) -> Option<String> {
        let text = self.comparison_text(&element_lines(element).join("\n"));
        let len = grapheme_len(&text);
        if len < self.config.min_block_chars || len > self.config.max_block_chars {
            return None;
        }
        if let Some(marker) = self.login.as_ref().and_then(|re| re.find(&text)) {
            log::trace!(
                "Skipping candidate containing login/menu marker '{}'",
                marker.as_str()
            );
            return None;
        }
        Some(text)
    }

    /// Parse the "total comments: N" counter.
    pub fn parse_comment_count(&self, text: &str) -> Option<u64> {
        let caps = self.count_pattern.captures(text)?;
        let digits: String = caps
            .get(1)?
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    /// First meaningful line after a "comments by" header.
    pub fn newest_comment_preview(&self, text: &str) -> Option<String> {
        let labels: Vec<String> = self
            .config
            .comments_header_labels
            .iter()
            .map(|l| l.to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();

        let mut lines = text.lines().map(str::trim);
        lines.find(|line| {
            let lower = line.to_lowercase();
            labels.iter().any(|l| lower.contains(l.as_str()))
        })?;

        lines
            .filter(|line| !line.is_empty())
            .find(|line| {
                !self.is_timestamp_line(line)
                    && !self.is_chrome_line(line)
                    && !self.is_asset_header(line)
            })
            .map(|line| truncate_graphemes(line, self.config.preview_chars))
    }

    /// Drop chrome lines and volatile timestamps, then collapse whitespace.
    ///
    /// Chrome tokens are only removed as whole lines; the same words inside
    /// comment prose are content.
    pub fn comparison_text(&self, text: &str) -> String {
        let kept: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !self.is_chrome_line(line))
            .collect();
        let mut joined = kept.join(" ");
        joined = self.relative_time.replace_all(&joined, " ").into_owned();
        joined = self.absolute_time.replace_all(&joined, " ").into_owned();
        normalize_whitespace(&joined)
    }

    fn is_timestamp_line(&self, line: &str) -> bool {
        [&self.relative_time, &self.absolute_time].iter().any(|re| {
            re.find(line)
                .is_some_and(|m| m.start() == 0 && m.end() == line.len())
        })
    }

    /// A line made only of UI chrome tokens, counters and punctuation.
    fn is_chrome_line(&self, line: &str) -> bool {
        let Some(chrome) = &self.chrome else {
            return false;
        };
        if !chrome.is_match(line) {
            return false;
        }
        !chrome
            .replace_all(line, "")
            .chars()
            .any(|c| c.is_alphabetic())
    }

    /// Short title-cased header such as an instrument or asset name.
    fn is_asset_header(&self, line: &str) -> bool {
        if grapheme_len(line) > self.config.max_asset_header_chars {
            return false;
        }
        if line.ends_with(['.', '!', '?', ',', ':']) {
            return false;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        !words.is_empty()
            && words.len() <= 3
            && words.iter().all(|w| {
                w.chars()
                    .next()
                    .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
            })
    }

    fn document_text(snapshot: &PageSnapshot) -> String {
        if snapshot.html.is_empty() {
            snapshot.rendered_text.clone()
        } else {
            visible_text(&Html::parse_document(&snapshot.html))
        }
    }

    /// Case-insensitive whole-word match of any phrase, longest first so
    /// "Non mi piace" wins over "Mi piace".
    fn word_alternation(phrases: &[String]) -> Result<Option<Regex>> {
        let mut phrases: Vec<&str> = phrases
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if phrases.is_empty() {
            return Ok(None);
        }
        phrases.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let alternation: Vec<String> = phrases.iter().map(|p| regex::escape(p)).collect();
        Self::compile(&format!(r"(?i)\b(?:{})\b", alternation.join("|"))).map(Some)
    }

    fn compile(pattern: &str) -> Result<Regex> {
        Regex::new(pattern).map_err(|e| AppError::config(format!("invalid pattern: {e}")))
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateStrategy, FetchOutcome, Target};

    fn extractor() -> SignatureExtractor {
        SignatureExtractor::new(ExtractionConfig::default()).unwrap()
    }

    fn classified(kind: TargetKind, text: &str, html: &str) -> ClassifiedOutcome {
        ClassifiedOutcome {
            outcome: FetchOutcome {
                target: Target::new("t", kind, "https://example.com/t"),
                snapshot: PageSnapshot {
                    http_status: Some(200),
                    page_title: None,
                    rendered_text: text.to_string(),
                    html: html.to_string(),
                    final_url: None,
                },
            },
            status: FetchStatus::Ok,
        }
    }

    const MEMBER_PAGE: &str = "Profilo\nTotale dei commenti: 1.234\nCommenti di Mario\nEUR/USD\n2 ore fa\nRispondi\nIl cambio tornerà sopra 1,10 entro fine mese.\nAltro commento";

    #[test]
    fn test_count_patterns() {
        let ex = extractor();
        assert_eq!(ex.parse_comment_count("Totale dei commenti: 793"), Some(793));
        assert_eq!(ex.parse_comment_count("Totale dei commenti：1.234"), Some(1234));
        assert_eq!(ex.parse_comment_count("Total comments: 12,345"), Some(12345));
        assert_eq!(ex.parse_comment_count("total comments:\n42"), Some(42));
        assert_eq!(ex.parse_comment_count("Totale dei commenti: 1\u{a0}000"), Some(1000));
        assert_eq!(ex.parse_comment_count("no counter here"), None);
    }

    #[test]
    fn test_comment_count_signature() {
        let ex = extractor();
        let sig = ex
            .extract(TargetKind::CommentCount, &classified(TargetKind::CommentCount, MEMBER_PAGE, ""))
            .unwrap();

        assert_eq!(sig.numeric_count, Some(1234));
        assert_eq!(
            sig.preview.as_deref(),
            Some("Il cambio tornerà sopra 1,10 entro fine mese.")
        );
        assert_eq!(sig.confidence, Confidence::High);
    }

    #[test]
    fn test_comment_count_missing_fails() {
        let ex = extractor();
        let err = ex
            .extract(
                TargetKind::CommentCount,
                &classified(TargetKind::CommentCount, "Nothing to see", ""),
            )
            .unwrap_err();
        assert_eq!(err.reason, "no total comment counter found");
    }

    #[test]
    fn test_comment_count_falls_back_to_html_text() {
        let ex = extractor();
        let html = "<html><body><span>Total comments:</span><b>77</b></body></html>";
        let sig = ex
            .extract(TargetKind::CommentCount, &classified(TargetKind::CommentCount, "", html))
            .unwrap();
        assert_eq!(sig.numeric_count, Some(77));
    }

    #[test]
    fn test_preview_skips_absolute_timestamps_and_chrome() {
        let ex = extractor();
        let text = "Comments by Anna\n12.03.2024 14:05\nReply Share\nLike 3\nFirst real line here";
        assert_eq!(
            ex.newest_comment_preview(text).as_deref(),
            Some("First real line here")
        );
        assert_eq!(ex.newest_comment_preview("no header\nline"), None);
    }

    #[test]
    fn test_document_hash_ignores_markup_and_whitespace() {
        let ex = extractor();
        let a = "<html><head><script>var t = Date.now();</script></head><body><p>Hello   world</p></body></html>";
        let b = "<html><head><script>var t = 12345;</script></head><body>\n<p>Hello\nworld</p>\n</body></html>";
        let kind = TargetKind::FullDocumentHash;

        let sig_a = ex.extract(kind, &classified(kind, "", a)).unwrap();
        let sig_b = ex.extract(kind, &classified(kind, "", b)).unwrap();
        assert_eq!(sig_a.stable_id, sig_b.stable_id);

        let c = "<html><body><p>Hello there world</p></body></html>";
        let sig_c = ex.extract(kind, &classified(kind, "", c)).unwrap();
        assert_ne!(sig_a.stable_id, sig_c.stable_id);
    }

    #[test]
    fn test_document_hash_empty_fails() {
        let ex = extractor();
        let kind = TargetKind::FullDocumentHash;
        assert!(ex.extract(kind, &classified(kind, "   \n ", "")).is_err());
    }

    #[test]
    fn test_comment_block_prefers_comment_text_class() {
        let ex = extractor();
        let html = r#"<html><body>
            <nav class="menu">Home Markets News</nav>
            <div class="comment_text">Secondo me il mercato scenderà ancora nelle prossime settimane.</div>
            <div class="comment_text">Commento più vecchio che non deve essere scelto come firma.</div>
        </body></html>"#;
        let kind = TargetKind::LatestCommentBlock;
        let sig = ex.extract(kind, &classified(kind, "", html)).unwrap();

        assert_eq!(sig.strategy.as_deref(), Some("comment_text"));
        assert_eq!(sig.confidence, Confidence::High);
        assert_eq!(
            sig.preview.as_deref(),
            Some("Secondo me il mercato scenderà ancora nelle prossime settimane.")
        );
    }

    #[test]
    fn test_comment_block_ignores_relative_timestamps() {
        let ex = extractor();
        let kind = TargetKind::LatestCommentBlock;
        let page = |age: &str| {
            format!(
                r#"<html><body><div class="comment-item"><span>{age}</span>
                <p>Questo commento è abbastanza lungo da essere un candidato valido.</p>
                <a>Rispondi</a></div></body></html>"#
            )
        };
        let first = ex.extract(kind, &classified(kind, "", &page("2 ore fa"))).unwrap();
        let later = ex.extract(kind, &classified(kind, "", &page("5 hours ago"))).unwrap();

        assert_eq!(first.strategy.as_deref(), Some("comment_marker"));
        assert_eq!(first.stable_id, later.stable_id);
    }

    #[test]
    fn test_comment_block_skips_login_blocks() {
        let ex = extractor();
        let html = r#"<html><body>
            <div class="comment-login">Accedi o registrati per lasciare un commento su questa pagina.</div>
            <div class="comment-body">Il primo commento reale della discussione, con testo sufficiente.</div>
        </body></html>"#;
        let block = ex.find_comment_block(&Html::parse_document(html));
        assert_eq!(
            block,
            BlockMatch::Match {
                strategy: "comment_marker".into(),
                text: "Il primo commento reale della discussione, con testo sufficiente.".into(),
            }
        );
    }

    #[test]
    fn test_comment_block_fallback_is_flagged() {
        let ex = extractor();
        let kind = TargetKind::LatestCommentBlock;
        let sig = ex
            .extract(kind, &classified(kind, "Short page\nwith little text", ""))
            .unwrap();

        assert_eq!(sig.confidence, Confidence::Fallback);
        assert_eq!(sig.strategy.as_deref(), Some("body_prefix"));
    }

    #[test]
    fn test_chrome_words_inside_prose_are_content() {
        let ex = extractor();
        let kind = TargetKind::LatestCommentBlock;
        let page = |body: &str| {
            format!(
                r#"<html><body><div class="comment_text"><p>{body}</p><a>Like</a><a>Reply</a></div></body></html>"#
            )
        };
        let liked = ex
            .extract(kind, &classified(kind, "", &page("I like this stock a lot and will report back after earnings.")))
            .unwrap();
        let disliked = ex
            .extract(kind, &classified(kind, "", &page("I dislike this stock a lot and will share back after earnings.")))
            .unwrap();

        assert_ne!(liked.stable_id, disliked.stable_id);
        assert_eq!(
            liked.preview.as_deref(),
            Some("I like this stock a lot and will report back after earnings.")
        );
    }

    #[test]
    fn test_login_markers_match_whole_words() {
        let ex = extractor();
        let html = r#"<html><body>
            <div class="comment-nav">Menu principale e collegamenti rapidi del sito di discussione</div>
            <div class="comment-body">Ho provato il menù degustazione, ottimo rapporto qualità prezzo davvero.</div>
        </body></html>"#;

        assert!(matches!(
            ex.find_comment_block(&Html::parse_document(html)),
            BlockMatch::Match { ref text, .. } if text.starts_with("Ho provato il menù")
        ));
    }

    #[test]
    fn test_blocked_page_is_not_extracted() {
        let mut outcome = classified(TargetKind::FullDocumentHash, "Just a moment...", "");
        outcome.status = FetchStatus::Blocked;

        let err = extractor()
            .extract(TargetKind::FullDocumentHash, &outcome)
            .unwrap_err();
        assert_eq!(err.reason, "page not usable (blocked)");
    }

    #[test]
    fn test_strategy_table_is_data() {
        let config = ExtractionConfig {
            strategies: vec![CandidateStrategy {
                name: "quote".into(),
                selectors: vec!["blockquote".into()],
            }],
            ..ExtractionConfig::default()
        };
        let ex = SignatureExtractor::new(config).unwrap();
        let html = "<html><body><blockquote>A quoted message with more than forty characters in it.</blockquote></body></html>";

        assert!(matches!(
            ex.find_comment_block(&Html::parse_document(html)),
            BlockMatch::Match { ref strategy, .. } if strategy == "quote"
        ));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = ExtractionConfig {
            strategies: vec![CandidateStrategy {
                name: "broken".into(),
                selectors: vec!["[[invalid".into()],
            }],
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            SignatureExtractor::new(config),
            Err(AppError::Selector { .. })
        ));
    }
}
