//! Upstream version detection.
//!
//! A checkver is a page URL plus a regular expression. The page is fetched
//! with a browser-like User-Agent, and the first capture group of the first
//! match is the latest version. Nothing here returns an error: network and
//! pattern problems become [`VersionCheck::Failed`] or
//! [`VersionCheck::NoMatch`], both of which read as "unknown" downstream.

use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::manifest::Checkver;

// ============================================================================
// Check Result
// ============================================================================

/// Result of looking up the latest version of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// The pattern matched and its first group captured this (non-empty) version.
    Found(String),
    /// The page was fetched but the pattern didn't match, had no capture
    /// group, or captured an empty string.
    NoMatch,
    /// The page could not be fetched or the pattern could not be compiled.
    Failed(String),
}

impl VersionCheck {
    /// The detected version, or `""` when it is unknown.
    pub fn version(&self) -> &str {
        match self {
            Self::Found(version) => version,
            Self::NoMatch | Self::Failed(_) => "",
        }
    }

    /// Returns true if a version was detected.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Applies `pattern` to `body` and returns the first capture group of the
/// first match.
pub fn extract_version(body: &str, pattern: &str) -> VersionCheck {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => return VersionCheck::Failed(format!("invalid pattern: {e}")),
    };

    match re
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    {
        Some(version) if !version.is_empty() => VersionCheck::Found(version.to_string()),
        _ => VersionCheck::NoMatch,
    }
}

// ============================================================================
// Version Checker
// ============================================================================

/// Something that can find the latest version described by a checkver.
#[async_trait]
pub trait VersionChecker: Send + Sync {
    async fn check(&self, checkver: &Checkver) -> VersionCheck;
}

/// Checks versions by fetching the checkver page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVersionChecker {
    client: reqwest::Client,
}

impl HttpVersionChecker {
    /// Creates a checker that sends `user_agent` and gives up after `timeout`.
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_settings(settings: &Settings) -> reqwest::Result<Self> {
        Self::new(&settings.user_agent, settings.check_timeout())
    }

    async fn fetch(&self, url: &str) -> reqwest::Result<String> {
        self.client.get(url).send().await?.text().await
    }
}

#[async_trait]
impl VersionChecker for HttpVersionChecker {
    async fn check(&self, checkver: &Checkver) -> VersionCheck {
        debug!(url = %checkver.url, "Fetching checkver page");

        let body = match self.fetch(&checkver.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %checkver.url, error = %e, "Checkver request failed");
                return VersionCheck::Failed(e.to_string());
            }
        };

        extract_version(&body, &checkver.pattern)
    }
}
