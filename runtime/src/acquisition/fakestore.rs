// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! FakeStore-style category feed client.
//!
//! `GET {origin}/products/category/{category}` returns a bare JSON array of
//! `{ id, title, price, image }`. Items carry no product page, so links are
//! synthesized as `{origin}/products/{id}`.

use async_trait::async_trait;
use serde::Deserialize;

use super::http_client::HttpClient;
use super::{format_price, read_json, DEFAULT_MAX_PRODUCTS, PROGRESS_EVERY};
use crate::error::CrawlError;
use crate::listing::{CrawlResult, ProductListing, UNNAMED_PRODUCT};
use crate::orchestrator::CrawlStrategy;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::target::{normalize_scheme, Target};

pub const FAKESTORE_DOMAIN: &str = "fakestoreapi.com";

pub const DEFAULT_CATEGORY: &str = "women's clothing";

#[derive(Debug, Deserialize)]
struct Item {
    id: serde_json::Value,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    price: Option<serde_json::Value>,
    #[serde(default)]
    image: Option<String>,
}

pub struct FakeStoreClient {
    http: HttpClient,
    domains: Vec<String>,
    max_products: usize,
}

impl FakeStoreClient {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            domains: vec![FAKESTORE_DOMAIN.to_string()],
            max_products: DEFAULT_MAX_PRODUCTS,
        }
    }

    pub fn with_domains(mut self, domains: impl IntoIterator<Item = String>) -> Self {
        self.domains.extend(domains);
        self
    }

    pub fn with_max_products(mut self, max: usize) -> Self {
        self.max_products = max;
        self
    }

    /// Category feed URL. Targets already pointing at a category keep their
    /// path; anything else gets the default category.
    pub fn feed_url(target: &Target) -> String {
        let mut url = target.url().clone();
        url.set_query(None);
        url.set_fragment(None);
        if target.segment_after("category").is_none() {
            url.set_path("/products/category/");
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(DEFAULT_CATEGORY);
            }
        }
        url.to_string()
    }

    fn to_listing(item: Item, origin: &str, site: &str) -> Option<ProductListing> {
        let image = item.image.filter(|s| !s.trim().is_empty())?;
        let id = match &item.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let title = item.title.unwrap_or_else(|| UNNAMED_PRODUCT.to_string());
        Some(ProductListing::new(
            &title,
            format!("{origin}/products/{id}"),
            normalize_scheme(&image),
            item.price.as_ref().and_then(format_price),
            site,
        ))
    }
}

#[async_trait]
impl CrawlStrategy for FakeStoreClient {
    fn name(&self) -> &str {
        "fakestore"
    }

    fn matches(&self, target: &Target) -> bool {
        self.domains.iter().any(|d| target.host_matches(d))
    }

    async fn crawl(
        &self,
        target: &Target,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlResult, CrawlError> {
        let max = max_products.unwrap_or(self.max_products);
        let url = Self::feed_url(target);
        let site = target.host().to_string();

        tracing::info!(%url, "fetching category feed");
        progress.report(ProgressSnapshot::running(0, format!("Connecting to {site}...")));

        let items: Vec<Item> = read_json(&self.http, &url).await?;
        let found = items.len();
        progress.report(ProgressSnapshot::running(
            found,
            format!("Processing {found} products..."),
        ));

        let origin = target.origin();
        let mut products = Vec::new();
        for item in items.into_iter().take(max) {
            if let Some(listing) = Self::to_listing(item, &origin, &site) {
                products.push(listing);
                if products.len() % PROGRESS_EVERY == 0 {
                    progress.report(ProgressSnapshot::running(
                        products.len(),
                        format!("Processed {} products...", products.len()),
                    ));
                }
            }
        }

        tracing::info!(found, kept = products.len(), "category feed processed");
        Ok(CrawlResult::new(products, found.min(max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_category_url() {
        let t = Target::parse("fakestoreapi.com").unwrap();
        assert_eq!(
            FakeStoreClient::feed_url(&t),
            "https://fakestoreapi.com/products/category/women's%20clothing"
        );
    }

    #[test]
    fn test_explicit_category_kept() {
        let t = Target::parse("https://fakestoreapi.com/products/category/jewelery?x=1").unwrap();
        assert_eq!(
            FakeStoreClient::feed_url(&t),
            "https://fakestoreapi.com/products/category/jewelery"
        );
    }

    #[test]
    fn test_listing_link_from_id() {
        let item: Item = serde_json::from_value(serde_json::json!({
            "id": 15,
            "title": "Rain Jacket",
            "price": 39.99,
            "image": "https://fakestoreapi.com/img/71.jpg"
        }))
        .unwrap();
        let l = FakeStoreClient::to_listing(item, "https://fakestoreapi.com", "fakestoreapi.com")
            .unwrap();
        assert_eq!(l.link, "https://fakestoreapi.com/products/15");
        assert_eq!(l.price.as_deref(), Some("$39.99"));
    }
}
