// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for crawling, image fetching and search requests.
//!
//! None of these escalate past a search: crawl errors become an empty
//! catalog, fetch errors skip one product, and only a bad query image
//! rejects the request, before any crawling starts.

use shoplens_vision::VisionError;

/// A crawl or catalog fetch that could not produce products.
#[derive(thiserror::Error, Debug)]
pub enum CrawlError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("HTTP request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed catalog payload from {url}: {reason}")]
    Payload { url: String, reason: String },

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("browser error: {0}")]
    Browser(String),
}

/// Fetching or decoding one product image failed.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("timed out fetching {0}")]
    Timeout(String),

    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("undecodable image from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: VisionError,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode { .. } => false,
        }
    }
}

/// A search request rejected before any crawling.
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("query image could not be decoded: {0}")]
    InvalidImage(#[source] VisionError),

    #[error("query image could not be embedded: {0}")]
    Embedding(#[source] VisionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Timeout("u".into()).is_transient());
        assert!(FetchError::Network {
            url: "u".into(),
            reason: "reset".into()
        }
        .is_transient());
        assert!(FetchError::Status {
            url: "u".into(),
            status: 503
        }
        .is_transient());
        assert!(!FetchError::Status {
            url: "u".into(),
            status: 404
        }
        .is_transient());
        assert!(!FetchError::Decode {
            url: "u".into(),
            source: VisionError::InvalidInput("x".into())
        }
        .is_transient());
    }

    #[test]
    fn test_messages() {
        let e = CrawlError::Status {
            url: "https://shop.test/products.json".into(),
            status: 404,
        };
        assert_eq!(e.to_string(), "https://shop.test/products.json returned HTTP 404");
    }
}
