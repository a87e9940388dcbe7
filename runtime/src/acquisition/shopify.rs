// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shopify storefront feed client.
//!
//! `GET {origin}/collections/{handle}/products.json?limit=N`, or
//! `{origin}/products.json` for the `all` handle. One request, no retries.

use async_trait::async_trait;
use serde::Deserialize;

use super::http_client::HttpClient;
use super::{format_price, read_json, DEFAULT_MAX_PRODUCTS, PROGRESS_EVERY};
use crate::error::CrawlError;
use crate::listing::{CrawlResult, ProductListing, UNNAMED_PRODUCT};
use crate::orchestrator::CrawlStrategy;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::target::{normalize_scheme, Target};

/// Shopify caps `limit` at 250 per page.
pub const SHOPIFY_PAGE_LIMIT: usize = 250;

/// Handle used when the target names no collection.
pub const DEFAULT_COLLECTION: &str = "all";

#[derive(Debug, Deserialize)]
struct Feed {
    products: Vec<FeedProduct>,
}

#[derive(Debug, Deserialize)]
struct FeedProduct {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    handle: String,
    #[serde(default)]
    variants: Vec<FeedVariant>,
    #[serde(default)]
    images: Vec<FeedImage>,
}

#[derive(Debug, Deserialize)]
struct FeedVariant {
    #[serde(default)]
    price: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FeedImage {
    #[serde(default)]
    src: Option<String>,
}

pub struct ShopifyClient {
    http: HttpClient,
    /// Custom storefront domains served by Shopify.
    domains: Vec<String>,
    max_products: usize,
}

impl ShopifyClient {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            domains: Vec::new(),
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

    /// Build the feed URL for a target.
    pub fn feed_url(target: &Target, limit: usize) -> String {
        let handle = target
            .segment_after("collections")
            .unwrap_or(DEFAULT_COLLECTION);
        let path = if handle == DEFAULT_COLLECTION {
            "/products.json".to_string()
        } else {
            format!("/collections/{handle}/products.json")
        };
        format!("{}{}?limit={}", target.origin(), path, limit)
    }

    fn to_listing(item: FeedProduct, origin: &str, site: &str) -> Option<ProductListing> {
        let image = item
            .images
            .into_iter()
            .find_map(|img| img.src.filter(|s| !s.trim().is_empty()))?;
        let price = item
            .variants
            .first()
            .and_then(|v| v.price.as_ref())
            .and_then(format_price);
        let title = item.title.unwrap_or_else(|| UNNAMED_PRODUCT.to_string());

        Some(ProductListing::new(
            &title,
            format!("{origin}/products/{}", item.handle),
            normalize_scheme(&image),
            price,
            site,
        ))
    }
}

#[async_trait]
impl CrawlStrategy for ShopifyClient {
    fn name(&self) -> &str {
        "shopify"
    }

    fn matches(&self, target: &Target) -> bool {
        target.host_matches("myshopify.com")
            || target.segment_after("collections").is_some()
            || self.domains.iter().any(|d| target.host_matches(d))
    }

    async fn crawl(
        &self,
        target: &Target,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlResult, CrawlError> {
        let max = max_products.unwrap_or(self.max_products);
        let url = Self::feed_url(target, max.min(SHOPIFY_PAGE_LIMIT));
        let site = target.host().to_string();

        tracing::info!(store = %site, %url, max, "fetching Shopify feed");
        progress.report(ProgressSnapshot::running(0, format!("Connecting to {site}...")));

        let feed: Feed = read_json(&self.http, &url).await?;
        let found = feed.products.len();
        progress.report(ProgressSnapshot::running(
            found,
            format!("Processing {found} products..."),
        ));

        let origin = target.origin();
        let mut products = Vec::new();
        for item in feed.products.into_iter().take(max) {
            match Self::to_listing(item, &origin, &site) {
                Some(listing) => products.push(listing),
                None => tracing::debug!("skipping Shopify product without an image"),
            }
            if products.len() % PROGRESS_EVERY == 0 && !products.is_empty() {
                progress.report(ProgressSnapshot::running(
                    products.len(),
                    format!("Processed {} products...", products.len()),
                ));
            }
        }

        tracing::info!(store = %site, found, kept = products.len(), "Shopify feed processed");
        Ok(CrawlResult::new(products, found.min(max)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_url_defaults_to_all() {
        let t = Target::parse("bouldergear.com").unwrap();
        assert_eq!(
            ShopifyClient::feed_url(&t, 50),
            "https://bouldergear.com/products.json?limit=50"
        );
    }

    #[test]
    fn test_feed_url_with_collection() {
        let t = Target::parse("https://allbirds.com/collections/womens-shoes").unwrap();
        assert_eq!(
            ShopifyClient::feed_url(&t, 250),
            "https://allbirds.com/collections/womens-shoes/products.json?limit=250"
        );
    }

    #[test]
    fn test_matches() {
        let client = ShopifyClient::new(HttpClient::new(1_000))
            .with_domains(vec!["bouldergear.com".to_string()]);
        assert!(client.matches(&Target::parse("demo.myshopify.com").unwrap()));
        assert!(client.matches(&Target::parse("shop.test/collections/mens").unwrap()));
        assert!(client.matches(&Target::parse("bouldergear.com").unwrap()));
        assert!(!client.matches(&Target::parse("www2.hm.com/en_us/ladies").unwrap()));
    }

    #[test]
    fn test_listing_mapping() {
        let item: FeedProduct = serde_json::from_value(serde_json::json!({
            "title": "Trail Jacket",
            "handle": "trail-jacket",
            "variants": [{"price": "89.00"}, {"price": "99.00"}],
            "images": [{"src": "//cdn.shopify.com/a.jpg"}, {"src": "https://cdn.shopify.com/b.jpg"}]
        }))
        .unwrap();
        let listing = ShopifyClient::to_listing(item, "https://store.test", "store.test").unwrap();
        assert_eq!(listing.link, "https://store.test/products/trail-jacket");
        assert_eq!(listing.image_url, "https://cdn.shopify.com/a.jpg");
        assert_eq!(listing.price.as_deref(), Some("$89.00"));
    }

    #[test]
    fn test_product_without_image_dropped() {
        let item: FeedProduct = serde_json::from_value(serde_json::json!({
            "title": "Ghost",
            "handle": "ghost",
            "images": []
        }))
        .unwrap();
        assert!(ShopifyClient::to_listing(item, "https://s.test", "s.test").is_none());
    }
}
