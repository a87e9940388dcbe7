// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured catalog acquisition over plain HTTP.
//!
//! Sites exposing a JSON product feed are fetched directly, bypassing the
//! browser entirely. These clients are fast-fail: a non-success status or
//! malformed payload ends the fetch with an error and no products.

pub mod fakestore;
pub mod http_client;
pub mod shopify;

use serde::de::DeserializeOwned;

use crate::error::CrawlError;
use http_client::HttpClient;

/// Item cap when the caller gives none.
pub const DEFAULT_MAX_PRODUCTS: usize = 50;

/// Report progress after every this many processed items.
pub(crate) const PROGRESS_EVERY: usize = 5;

/// GET `url` once and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    http: &HttpClient,
    url: &str,
) -> Result<T, CrawlError> {
    let resp = http.get(url).await.map_err(|e| CrawlError::Http {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !resp.is_success() {
        return Err(CrawlError::Status {
            url: url.to_string(),
            status: resp.status,
        });
    }

    serde_json::from_slice(&resp.body).map_err(|e| CrawlError::Payload {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Render a feed price as `$<price>`. Empty or missing prices give `None`.
pub(crate) fn format_price(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(format!("${}", s.trim())),
        serde_json::Value::Number(n) => Some(format!("${n}")),
        _ => None,
    }
}
