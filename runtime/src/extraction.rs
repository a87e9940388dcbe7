// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-card extraction: link, image and name resolution.
//!
//! Each field walks an ordered fallback chain. Cards whose link or image
//! cannot be resolved are skipped and counted, never treated as errors.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::crawler::capture::recover_image;
use crate::listing::{DedupPolicy, ProductListing, UNNAMED_PRODUCT};
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::renderer::RawCard;
use crate::target::{normalize_scheme, resolve_link};

/// Explicit image source attribute.
pub const PRIMARY_IMAGE_ATTRIBUTES: &[&str] = &["src"];

/// Lazy-load attribute variants, tried in order.
pub const LAZY_IMAGE_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "data-lazy",
    "data-srcset-src",
];

/// Responsive source sets; only the first entry is used.
pub const SRCSET_ATTRIBUTES: &[&str] = &["srcset", "data-srcset"];

/// Counters for one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_cards: usize,
    pub extracted: usize,
    pub skipped_no_link: usize,
    pub skipped_no_image: usize,
    pub recovered_from_network: usize,
    pub duplicates: usize,
}

impl ExtractionStats {
    /// Extracted cards as a percentage of all cards.
    pub fn success_rate(&self) -> f64 {
        if self.total_cards == 0 {
            0.0
        } else {
            self.extracted as f64 * 100.0 / self.total_cards as f64
        }
    }
}

/// Where a resolved image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Attribute,
    NetworkCapture,
}

/// Page-level inputs shared by every card.
pub struct PageContext<'a> {
    pub origin: Url,
    pub page: Url,
    pub site: String,
    /// Site-specific data attributes, tried after the standard ones.
    pub vendor_attributes: &'a [String],
    /// Filtered network capture log, in arrival order.
    pub captures: &'a [String],
}

/// True for values that are not a real image: empty, inline data URIs and
/// common spacer images.
pub fn is_placeholder(src: &str) -> bool {
    let s = src.trim().to_ascii_lowercase();
    s.is_empty()
        || s.starts_with("data:")
        || s == "about:blank"
        || s.ends_with("/blank.gif")
        || s.ends_with("/spacer.gif")
        || s.ends_with("/transparent.png")
        || s.contains("/placeholder")
}

/// First URL of a `srcset` value.
pub fn first_srcset_entry(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .next()
        .and_then(|entry| entry.split_whitespace().next())
        .filter(|s| !s.is_empty())
}

fn attribute_candidates<'c>(card: &'c RawCard, ctx: &PageContext<'_>) -> Vec<&'c str> {
    let attr = |name: &str| card.attributes.get(name).map(String::as_str);

    let mut out = Vec::new();
    out.extend(PRIMARY_IMAGE_ATTRIBUTES.iter().filter_map(|n| attr(n)));
    out.extend(LAZY_IMAGE_ATTRIBUTES.iter().filter_map(|n| attr(n)));
    out.extend(
        SRCSET_ATTRIBUTES
            .iter()
            .filter_map(|n| attr(n))
            .filter_map(first_srcset_entry),
    );
    out.extend(ctx.vendor_attributes.iter().filter_map(|n| attr(n)));
    out
}

/// Resolve a card's image, falling back to the network capture log.
pub fn resolve_image(
    card: &RawCard,
    link: &str,
    ctx: &PageContext<'_>,
) -> Option<(String, ImageSource)> {
    let from_attributes = attribute_candidates(card, ctx)
        .into_iter()
        .map(normalize_scheme)
        .filter(|s| !is_placeholder(s))
        .find_map(|s| resolve_link(&s, &ctx.origin, &ctx.page));

    if let Some(url) = from_attributes {
        return Some((url, ImageSource::Attribute));
    }

    recover_image(link, ctx.captures).map(|url| (url.to_string(), ImageSource::NetworkCapture))
}

/// Title-like attribute, then alt text, then text content, then a fixed
/// fallback.
pub fn resolve_name(card: &RawCard) -> String {
    [&card.title, &card.alt, &card.text]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .unwrap_or(UNNAMED_PRODUCT)
        .to_string()
}

/// Run every card through the pipeline, then apply `dedup`.
pub fn extract_cards(
    cards: &[RawCard],
    ctx: &PageContext<'_>,
    dedup: DedupPolicy,
    progress: &dyn ProgressSink,
    milestone_every: usize,
) -> (Vec<ProductListing>, ExtractionStats) {
    let mut stats = ExtractionStats {
        total_cards: cards.len(),
        ..Default::default()
    };
    let mut listings = Vec::with_capacity(cards.len());

    for card in cards {
        let Some(link) = card
            .href
            .as_deref()
            .and_then(|h| resolve_link(h, &ctx.origin, &ctx.page))
        else {
            stats.skipped_no_link += 1;
            continue;
        };

        let Some((image_url, source)) = resolve_image(card, &link, ctx) else {
            tracing::debug!(%link, "no resolvable image, skipping card");
            stats.skipped_no_image += 1;
            continue;
        };
        if source == ImageSource::NetworkCapture {
            stats.recovered_from_network += 1;
        }

        listings.push(ProductListing::new(
            &resolve_name(card),
            link,
            image_url,
            None,
            ctx.site.clone(),
        ));

        if milestone_every > 0 && listings.len() % milestone_every == 0 {
            progress.report(ProgressSnapshot::running(
                listings.len(),
                format!("Extracted {} products...", listings.len()),
            ));
        }
    }

    let (kept, duplicates) = dedup.apply(listings);
    stats.duplicates = duplicates;
    stats.extracted = kept.len();

    tracing::info!(
        total = stats.total_cards,
        extracted = stats.extracted,
        no_link = stats.skipped_no_link,
        no_image = stats.skipped_no_image,
        recovered = stats.recovered_from_network,
        duplicates = stats.duplicates,
        "extraction summary, success rate {:.1}%",
        stats.success_rate()
    );

    (kept, stats)
}
