// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Normalized product records and crawl results.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Product names are cut to this many characters.
pub const MAX_NAME_LEN: usize = 100;

/// Name used when a card carries no usable title.
pub const UNNAMED_PRODUCT: &str = "Unnamed Product";

/// One discovered catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    /// Display name, trimmed and truncated to [`MAX_NAME_LEN`].
    pub name: String,
    /// Name with a trailing `, <variant>` suffix removed, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Absolute product URL.
    pub link: String,
    /// Absolute image URL; never a placeholder.
    pub image_url: String,
    #[serde(default)]
    pub price: Option<String>,
    /// Host the listing was discovered on.
    pub source_site: String,
}

impl ProductListing {
    /// Build a listing, normalizing the name and deriving `base_name`.
    pub fn new(
        name: &str,
        link: impl Into<String>,
        image_url: impl Into<String>,
        price: Option<String>,
        source_site: impl Into<String>,
    ) -> Self {
        let name = normalize_name(name);
        let base_name = strip_variant_suffix(&name);
        Self {
            name,
            base_name,
            link: link.into(),
            image_url: image_url.into(),
            price,
            source_site: source_site.into(),
        }
    }
}

/// Trim, collapse to the fallback when empty, and truncate on a char boundary.
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNNAMED_PRODUCT.to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect::<String>().trim_end().to_string()
}

/// `"Knit Sweater, Red"` -> `Some("Knit Sweater")`.
pub fn strip_variant_suffix(name: &str) -> Option<String> {
    let (base, suffix) = name.rsplit_once(',')?;
    let base = base.trim();
    if base.is_empty() || suffix.trim().is_empty() {
        return None;
    }
    Some(base.to_string())
}

/// Output of one crawl or catalog fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub products: Vec<ProductListing>,
    /// Raw number of candidate cards seen, before skips and deduplication.
    pub total_cards_found: usize,
    /// Always equal to `products.len()`.
    pub unique_count: usize,
}

impl CrawlResult {
    /// Build a result, keeping `unique_count == products.len()` and
    /// `total_cards_found >= unique_count`.
    pub fn new(products: Vec<ProductListing>, total_cards_found: usize) -> Self {
        let unique_count = products.len();
        Self {
            products,
            total_cards_found: total_cards_found.max(unique_count),
            unique_count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// How duplicate listings from one source are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Keep every card, e.g. one per colourway.
    #[default]
    None,
    /// Drop cards whose name was already seen.
    ExactName,
    /// Compare case-insensitively after stripping the variant suffix.
    BaseName,
}

impl DedupPolicy {
    fn key(&self, listing: &ProductListing) -> Option<String> {
        match self {
            DedupPolicy::None => None,
            DedupPolicy::ExactName => Some(listing.name.clone()),
            DedupPolicy::BaseName => Some(
                listing
                    .base_name
                    .as_deref()
                    .unwrap_or(&listing.name)
                    .to_lowercase(),
            ),
        }
    }

    /// Keep the first listing per key. Returns the kept listings and the
    /// number dropped.
    pub fn apply(&self, listings: Vec<ProductListing>) -> (Vec<ProductListing>, usize) {
        if *self == DedupPolicy::None {
            return (listings, 0);
        }
        let before = listings.len();
        let mut seen = HashSet::new();
        let kept: Vec<ProductListing> = listings
            .into_iter()
            .filter(|l| self.key(l).map(|k| seen.insert(k)).unwrap_or(true))
            .collect();
        let dropped = before - kept.len();
        (kept, dropped)
    }
}
