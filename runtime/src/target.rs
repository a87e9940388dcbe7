// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crawl targets and URL normalization.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::CrawlError;

/// A parsed crawl target: a bare domain, a URL, or a collection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    raw: String,
    url: Url,
}

impl Target {
    /// Parse a target identifier. A missing scheme means `https`.
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CrawlError::InvalidTarget("empty target".into()));
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed.trim_start_matches('/'))
        };

        let url = Url::parse(&candidate)
            .map_err(|e| CrawlError::InvalidTarget(format!("{trimmed}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(CrawlError::InvalidTarget(format!(
                "{trimmed}: expected an http(s) URL or domain"
            )));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            url,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// `scheme://host[:port]`, without a trailing slash.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Whether the host is `domain` or a subdomain of it.
    pub fn host_matches(&self, domain: &str) -> bool {
        let host = self.host().to_ascii_lowercase();
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        !domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
    }

    /// Non-empty path segments, still percent-encoded.
    pub fn path_segments(&self) -> Vec<&str> {
        self.url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default()
    }

    /// The segment following `marker` in the path, e.g. the collection
    /// handle after `collections`.
    pub fn segment_after(&self, marker: &str) -> Option<&str> {
        let segments = self.path_segments();
        let idx = segments.iter().position(|s| *s == marker)?;
        segments.get(idx + 1).copied()
    }
}

impl FromStr for Target {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// `//cdn.example/x.jpg` -> `https://cdn.example/x.jpg`; anything else is
/// returned trimmed.
pub fn normalize_scheme(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => trimmed.to_string(),
    }
}

/// Resolve a card link: absolute first, then root-relative against the
/// site origin, then relative against the current page.
pub fn resolve_link(raw: &str, origin: &Url, page: &Url) -> Option<String> {
    let href = normalize_scheme(raw);
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    if let Ok(abs) = Url::parse(&href) {
        return matches!(abs.scheme(), "http" | "https").then(|| abs.to_string());
    }

    let base = if href.starts_with('/') { origin } else { page };
    base.join(&href).ok().map(|u| u.to_string())
}
