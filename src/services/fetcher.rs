// src/services/fetcher.rs

//! Page fetching capability.
//!
//! The orchestrator only depends on the `PageFetcher` trait. `HttpPageFetcher`
//! is the bundled implementation: it downloads the document with reqwest and
//! renders its visible text with scraper. Browser-backed fetchers can plug in
//! overlay dismissal through the same trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;

use crate::error::FetchError;
use crate::models::{MonitorConfig, PageSnapshot};
use crate::utils::html::{page_title, visible_text};

/// Sub-resource categories a fetcher may decline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Script,
    Image,
    Media,
    Font,
    Other,
}

impl ResourceType {
    /// Infer the resource type from a `Content-Type` header value.
    pub fn from_content_type(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match mime.as_str() {
            "" | "text/html" | "application/xhtml+xml" | "text/plain" => ResourceType::Document,
            "text/css" => ResourceType::Stylesheet,
            "application/javascript" | "text/javascript" => ResourceType::Script,
            m if m.starts_with("image/") => ResourceType::Image,
            m if m.starts_with("video/") || m.starts_with("audio/") => ResourceType::Media,
            m if m.starts_with("font/") || m.contains("font") => ResourceType::Font,
            _ => ResourceType::Other,
        }
    }
}

/// Resource types declined at the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePolicy {
    blocked: Vec<ResourceType>,
}

impl ResourcePolicy {
    /// Decline images, media and fonts, and optionally stylesheets.
    pub fn conservative(block_stylesheets: bool) -> Self {
        let mut blocked = vec![ResourceType::Image, ResourceType::Media, ResourceType::Font];
        if block_stylesheets {
            blocked.push(ResourceType::Stylesheet);
        }
        Self { blocked }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::conservative(config.block_stylesheets)
    }

    pub fn blocks(&self, resource: ResourceType) -> bool {
        self.blocked.contains(&resource)
    }
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self::conservative(false)
    }
}

/// Capability to load a page and observe it.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Navigate to `url` and capture status, title, text and markup.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageSnapshot, FetchError>;

    /// Best-effort click on the first matching consent/overlay control.
    ///
    /// Returns true when something was dismissed and the page should be reloaded.
    async fn dismiss_overlay(&self, _url: &str, _candidates: &[String]) -> bool {
        false
    }

    /// The resource-blocking rules this fetcher applies.
    fn resource_policy(&self) -> &ResourcePolicy;
}

/// Plain HTTP fetcher: requests only the document, never sub-resources.
pub struct HttpPageFetcher {
    client: Client,
    policy: ResourcePolicy,
}

impl HttpPageFetcher {
    pub fn new(client: Client, policy: ResourcePolicy) -> Self {
        Self { client, policy }
    }

    /// Build the document snapshot from a response body.
    pub fn snapshot_from_body(status: u16, final_url: String, body: String) -> PageSnapshot {
        let document = Html::parse_document(&body);
        PageSnapshot {
            http_status: Some(status),
            page_title: page_title(&document),
            rendered_text: visible_text(&document),
            html: body,
            final_url: Some(final_url),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<PageSnapshot, FetchError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let resource = ResourceType::from_content_type(&content_type);
        if self.policy.blocks(resource) {
            return Err(FetchError::Unusable(format!(
                "declined {content_type} response"
            )));
        }

        let body = response.text().await?;
        Ok(Self::snapshot_from_body(status, final_url, body))
    }

    fn resource_policy(&self) -> &ResourcePolicy {
        &self.policy
    }
}
