// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-site crawl tuning.
//!
//! A profile names the card selectors to try, the overlays to dismiss, the
//! termination thresholds and the wait times for one retail site. The
//! `generic` profile covers everything else.

use serde::{Deserialize, Serialize};

use crate::listing::DedupPolicy;
use crate::renderer::ClickTarget;
use crate::target::Target;

/// Termination thresholds for the scroll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Termination {
    /// Consecutive iterations without new cards before stopping.
    pub patience: u32,
    /// Of those idle iterations, how many must also sit at the document
    /// bottom, when the context can tell.
    pub bottom_patience: u32,
    /// Hard cap on scroll iterations.
    pub max_iterations: u32,
}

/// Wait times in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    pub navigation_timeout_ms: u64,
    /// After navigation, before looking for cards.
    pub initial_wait_ms: u64,
    /// After each overlay dismissal attempt that clicked something.
    pub overlay_wait_ms: u64,
    /// After each scroll.
    pub scroll_wait_ms: u64,
    /// After clicking a "load more" control.
    pub load_more_wait_ms: u64,
    /// Extra pause at checkpoints.
    pub checkpoint_wait_ms: u64,
    /// Between settle-pass steps.
    pub settle_wait_ms: u64,
}

impl Timing {
    /// No waiting at all, for simulated pages.
    pub fn instant() -> Self {
        Self {
            navigation_timeout_ms: 10_000,
            initial_wait_ms: 0,
            overlay_wait_ms: 0,
            scroll_wait_ms: 0,
            load_more_wait_ms: 0,
            checkpoint_wait_ms: 0,
            settle_wait_ms: 0,
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 60_000,
            initial_wait_ms: 5_000,
            overlay_wait_ms: 1_000,
            scroll_wait_ms: 2_000,
            load_more_wait_ms: 3_000,
            checkpoint_wait_ms: 3_000,
            settle_wait_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    /// Hosts this profile applies to, subdomains included.
    pub domains: Vec<String>,
    /// Card selectors in priority order. The first that matches anything
    /// is used for the rest of the session.
    pub card_selectors: Vec<String>,
    #[serde(default)]
    pub link_selector: Option<String>,
    /// Site-specific image or card data attributes.
    #[serde(default)]
    pub vendor_attributes: Vec<String>,
    #[serde(default)]
    pub overlays: Vec<ClickTarget>,
    #[serde(default)]
    pub load_more: Vec<ClickTarget>,
    /// Regex selecting image responses worth recording. `None` keeps all.
    #[serde(default)]
    pub capture_pattern: Option<String>,
    pub termination: Termination,
    /// Report crawl progress each time the card count passes a multiple of
    /// this.
    pub milestone_every: usize,
    /// Pause for `checkpoint_wait_ms` every this many iterations.
    #[serde(default)]
    pub checkpoint_every: Option<u32>,
    #[serde(default)]
    pub dedup: DedupPolicy,
    #[serde(default)]
    pub timing: Timing,
}

impl SiteProfile {
    pub fn matches(&self, target: &Target) -> bool {
        self.domains.iter().any(|d| target.host_matches(d))
    }

    /// Replace all waits, e.g. with [`Timing::instant`].
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn cookie_banners() -> Vec<ClickTarget> {
    vec![
        ClickTarget::css("#onetrust-accept-btn-handler"),
        ClickTarget::css("button[id*='accept']"),
        ClickTarget::with_text("button", "Accept"),
        ClickTarget::with_text("button", "Allow all"),
    ]
}

fn promo_closers() -> Vec<ClickTarget> {
    vec![
        ClickTarget::css("button[aria-label='Close']"),
        ClickTarget::css("button.close"),
        ClickTarget::css("button[title='Close']"),
        ClickTarget::css("[data-testid='close-button']"),
        ClickTarget::css(".lightbox-close"),
        ClickTarget::css(".modal-close"),
    ]
}

fn load_more_buttons() -> Vec<ClickTarget> {
    vec![
        ClickTarget::css("button[data-auto-id='loadMoreProducts']"),
        ClickTarget::with_text("a", "Load more"),
        ClickTarget::with_text("button", "Load more"),
        ClickTarget::with_text("button", "Show more"),
        ClickTarget::with_text("button", "View more"),
        ClickTarget::css("button.loadMore"),
        ClickTarget::css(".load-more"),
    ]
}

/// H&M: small grids that load within a few scrolls.
pub fn hm() -> SiteProfile {
    let mut overlays = cookie_banners();
    overlays.extend(promo_closers());
    SiteProfile {
        name: "hm".into(),
        domains: strings(&["hm.com"]),
        card_selectors: strings(&["article[data-articlecode]"]),
        link_selector: Some("a[href*='/productpage']".into()),
        vendor_attributes: strings(&["data-altimage"]),
        overlays,
        load_more: load_more_buttons(),
        capture_pattern: Some(r"image\.hm\.com|lp2\.hm\.com|hmgoepprod".into()),
        termination: Termination {
            patience: 3,
            bottom_patience: 2,
            max_iterations: 10,
        },
        milestone_every: 20,
        checkpoint_every: None,
        dedup: DedupPolicy::None,
        timing: Timing::default(),
    }
}

/// ASOS: catalogs of thousands of items, loaded in batches.
pub fn asos() -> SiteProfile {
    SiteProfile {
        name: "asos".into(),
        domains: strings(&["asos.com"]),
        card_selectors: strings(&[r#"li[id^="product-"]"#, r#"a[href*="/prd/"]"#]),
        link_selector: Some(r#"a[href*="/prd/"]"#.into()),
        vendor_attributes: Vec::new(),
        overlays: vec![ClickTarget::css("#onetrust-accept-btn-handler")],
        load_more: load_more_buttons(),
        capture_pattern: Some(r"images\.asos-media\.com/products/".into()),
        termination: Termination {
            patience: 8,
            bottom_patience: 2,
            max_iterations: 200,
        },
        milestone_every: 50,
        checkpoint_every: Some(20),
        dedup: DedupPolicy::None,
        timing: Timing::default(),
    }
}

/// Tommy Hilfiger: anchors wrap the whole card; one entry per name.
pub fn tommy() -> SiteProfile {
    SiteProfile {
        name: "tommy".into(),
        domains: strings(&["tommy.com"]),
        card_selectors: strings(&["a.pdpurl"]),
        link_selector: None,
        vendor_attributes: strings(&["data-image", "data-hover-image"]),
        overlays: vec![ClickTarget::with_text("button", "Accept")],
        load_more: load_more_buttons(),
        capture_pattern: Some(r"scene7\.com|/dw/image/".into()),
        termination: Termination {
            patience: 2,
            bottom_patience: 1,
            max_iterations: 60,
        },
        milestone_every: 20,
        checkpoint_every: None,
        dedup: DedupPolicy::ExactName,
        timing: Timing {
            scroll_wait_ms: 5_000,
            navigation_timeout_ms: 120_000,
            ..Timing::default()
        },
    }
}

/// Fallback for unknown storefronts.
pub fn generic() -> SiteProfile {
    let mut overlays = cookie_banners();
    overlays.extend(promo_closers());
    SiteProfile {
        name: "generic".into(),
        domains: Vec::new(),
        card_selectors: strings(&[
            "[data-product-id]",
            "[data-testid*='product-card']",
            "article[class*='product']",
            "li[class*='product']",
            "div[class*='product-card']",
            "div[class*='product-tile']",
            "a[href*='/product']",
            "a[href*='/p/']",
        ]),
        link_selector: None,
        vendor_attributes: strings(&["data-image", "data-img", "data-image-src"]),
        overlays,
        load_more: load_more_buttons(),
        capture_pattern: Some(r"(?i)\.(?:jpe?g|png|webp|avif)(?:[?#]|$)".into()),
        termination: Termination {
            patience: 5,
            bottom_patience: 2,
            max_iterations: 60,
        },
        milestone_every: 20,
        checkpoint_every: None,
        dedup: DedupPolicy::None,
        timing: Timing::default(),
    }
}

/// Site-tuned profiles, without `generic`.
pub fn builtin() -> Vec<SiteProfile> {
    vec![hm(), asos(), tommy()]
}
