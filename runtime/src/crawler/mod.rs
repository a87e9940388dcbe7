// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adaptive scroll crawler.
//!
//! Drives one browser context through a lazily loaded product grid:
//!
//! ```text
//! Loading -> Scrolling <-> Stalled -> Done | Failed
//! ```
//!
//! Each iteration optionally clicks a "load more" control, scrolls to the
//! bottom, waits, and re-counts cards. The crawl ends once the count has not
//! moved for `patience` iterations (and, when the page can report it, the
//! viewport sat at the bottom for `bottom_patience` of them), or when the
//! iteration cap is hit. Cards found before stopping are always extracted.

pub mod capture;
pub mod profile;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CrawlError;
use crate::extraction::{
    extract_cards, ExtractionStats, PageContext, LAZY_IMAGE_ATTRIBUTES,
    PRIMARY_IMAGE_ATTRIBUTES, SRCSET_ATTRIBUTES,
};
use crate::listing::CrawlResult;
use crate::orchestrator::CrawlStrategy;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::renderer::{CardQuery, RenderContext, Renderer, Scroll};
use crate::target::Target;
use capture::filter_captures;
use profile::{SiteProfile, Termination};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    Loading,
    Scrolling,
    Stalled,
    Done,
    Failed,
}

impl CrawlState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CrawlState::Done | CrawlState::Failed)
    }
}

/// Termination bookkeeping for the scroll loop, independent of the browser.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    termination: Termination,
    state: CrawlState,
    iterations: u32,
    count: usize,
    idle: u32,
    idle_at_bottom: u32,
}

impl ScrollTracker {
    pub fn new(termination: Termination) -> Self {
        Self {
            termination,
            state: CrawlState::Loading,
            iterations: 0,
            count: 0,
            idle: 0,
            idle_at_bottom: 0,
        }
    }

    /// Leave `Loading` with the card count seen once the page settled.
    pub fn start(&mut self, initial_count: usize) {
        self.count = initial_count;
        self.state = if self.termination.max_iterations == 0 {
            self.cap_state()
        } else {
            CrawlState::Scrolling
        };
    }

    /// Record one scroll iteration and return the new state.
    pub fn observe(&mut self, count: usize, at_bottom: Option<bool>) -> CrawlState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.iterations += 1;

        if count != self.count {
            self.count = count;
            self.idle = 0;
            self.idle_at_bottom = 0;
            self.state = CrawlState::Scrolling;
        } else {
            self.idle += 1;
            if at_bottom == Some(true) {
                self.idle_at_bottom += 1;
            }
            self.state = CrawlState::Stalled;
        }

        let patience = self.termination.patience.max(1);
        let bottom_needed = self.termination.bottom_patience.min(patience);
        let bottom_ok = at_bottom.is_none() || self.idle_at_bottom >= bottom_needed;

        if self.idle >= patience && bottom_ok {
            self.state = CrawlState::Done;
        } else if self.iterations >= self.termination.max_iterations {
            self.state = self.cap_state();
        }
        self.state
    }

    fn cap_state(&self) -> CrawlState {
        if self.count > 0 {
            CrawlState::Done
        } else {
            CrawlState::Failed
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Everything one scroll crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub result: CrawlResult,
    pub stats: ExtractionStats,
    pub state: CrawlState,
    pub iterations: u32,
    /// The card selector locked in for the session.
    pub selector: Option<String>,
}

/// Browser-driven crawl strategy for one site profile.
pub struct ScrollCrawler {
    renderer: Arc<dyn Renderer>,
    profile: SiteProfile,
    capture_re: Option<Regex>,
    /// Match any target; used for the generic fallback.
    catch_all: bool,
}

impl ScrollCrawler {
    pub fn new(renderer: Arc<dyn Renderer>, profile: SiteProfile) -> Self {
        let capture_re = profile
            .capture_pattern
            .as_deref()
            .and_then(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(profile = %profile.name, "ignoring bad capture pattern: {e}");
                    None
                }
            });
        Self {
            renderer,
            profile,
            capture_re,
            catch_all: false,
        }
    }

    /// A crawler that accepts every target.
    pub fn fallback(renderer: Arc<dyn Renderer>, profile: SiteProfile) -> Self {
        Self {
            catch_all: true,
            ..Self::new(renderer, profile)
        }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    async fn pause(ms: u64) {
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// First card selector that matches anything.
    async fn detect_selector(&self, ctx: &dyn RenderContext) -> Option<(String, usize)> {
        for selector in &self.profile.card_selectors {
            match ctx.count(selector).await {
                Ok(n) if n > 0 => return Some((selector.clone(), n)),
                Ok(_) => {}
                Err(e) => tracing::debug!(selector, "selector probe failed: {e}"),
            }
        }
        None
    }

    async fn dismiss_overlays(&self, ctx: &dyn RenderContext) {
        for overlay in &self.profile.overlays {
            match ctx.click_first(std::slice::from_ref(overlay)).await {
                Ok(Some(_)) => {
                    tracing::debug!(selector = %overlay.css, "dismissed overlay");
                    Self::pause(self.profile.timing.overlay_wait_ms).await;
                }
                Ok(None) => {}
                Err(e) => tracing::trace!(selector = %overlay.css, "overlay click failed: {e}"),
            }
        }
    }

    /// Scroll back to the top, then down in thirds, so lazy images attach.
    async fn settle(&self, ctx: &dyn RenderContext) {
        let wait = self.profile.timing.settle_wait_ms;
        let steps = [
            Scroll::ToTop,
            Scroll::ToFraction(1.0 / 3.0),
            Scroll::ToFraction(2.0 / 3.0),
            Scroll::ToFraction(1.0),
        ];
        for step in steps {
            if let Err(e) = ctx.scroll(step).await {
                tracing::debug!("settle scroll failed: {e}");
                break;
            }
            Self::pause(wait).await;
        }
    }

    fn card_query(&self, selector: &str) -> CardQuery {
        let image_attributes = PRIMARY_IMAGE_ATTRIBUTES
            .iter()
            .chain(LAZY_IMAGE_ATTRIBUTES)
            .chain(SRCSET_ATTRIBUTES)
            .map(|s| s.to_string())
            .chain(self.profile.vendor_attributes.iter().cloned())
            .collect();
        CardQuery {
            selector: selector.to_string(),
            link_selector: self.profile.link_selector.clone(),
            image_attributes,
            card_attributes: self.profile.vendor_attributes.clone(),
        }
    }

    /// Crawl `target` in an already open context.
    pub async fn run(
        &self,
        ctx: &mut dyn RenderContext,
        target: &Target,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlReport, CrawlError> {
        let timing = self.profile.timing;
        let site = target.host().to_string();

        tracing::info!(profile = %self.profile.name, url = %target, "starting scroll crawl");
        progress.report(ProgressSnapshot::running(0, format!("Loading {site}...")));

        let nav = ctx
            .navigate(target.url().as_str(), timing.navigation_timeout_ms)
            .await
            .map_err(|e| CrawlError::Navigation {
                url: target.to_string(),
                reason: format!("{e:#}"),
            })?;
        tracing::debug!(final_url = %nav.final_url, ms = nav.load_time_ms, "page loaded");
        progress.report(ProgressSnapshot::running(0, "Page loaded, waiting for products..."));

        self.dismiss_overlays(ctx).await;
        Self::pause(timing.initial_wait_ms).await;

        let mut selector = self.detect_selector(ctx).await;
        let mut tracker = ScrollTracker::new(self.profile.termination);
        tracker.start(selector.as_ref().map(|(_, n)| *n).unwrap_or(0));
        let milestone = self.profile.milestone_every;
        let mut last_milestone = 0;

        while !tracker.state().is_terminal() {
            if !self.profile.load_more.is_empty() {
                if let Ok(Some(idx)) = ctx.click_first(&self.profile.load_more).await {
                    tracing::debug!(button = %self.profile.load_more[idx].css, "clicked load more");
                    Self::pause(timing.load_more_wait_ms).await;
                }
            }

            let at_bottom = match ctx.scroll(Scroll::ToBottom).await {
                Ok(pos) => pos.at_bottom,
                Err(e) => {
                    tracing::debug!("scroll failed: {e}");
                    None
                }
            };
            Self::pause(timing.scroll_wait_ms).await;

            let count = match &selector {
                Some((sel, _)) => ctx.count(sel).await.unwrap_or_else(|e| {
                    tracing::debug!("card count failed: {e}");
                    tracker.count()
                }),
                None => {
                    selector = self.detect_selector(ctx).await;
                    if let Some((sel, _)) = &selector {
                        tracing::info!(selector = %sel, "card selector locked");
                    }
                    selector.as_ref().map(|(_, n)| *n).unwrap_or(0)
                }
            };

            let previous = tracker.count();
            let state = tracker.observe(count, at_bottom);
            if count != previous {
                tracing::debug!(
                    iteration = tracker.iterations(),
                    count,
                    added = count as i64 - previous as i64,
                    "cards loaded"
                );
            }
            if milestone > 0 && count / milestone > last_milestone {
                last_milestone = count / milestone;
                progress.report(ProgressSnapshot::running(
                    count,
                    format!("Loading products... ({count} loaded)"),
                ));
            }

            if let Some(every) = self.profile.checkpoint_every {
                if !state.is_terminal() && every > 0 && tracker.iterations() % every == 0 {
                    tracing::info!(count, "checkpoint");
                    Self::pause(timing.checkpoint_wait_ms).await;
                }
            }
        }

        let state = tracker.state();
        tracing::info!(
            ?state,
            iterations = tracker.iterations(),
            cards = tracker.count(),
            "scrolling finished"
        );

        let Some((selector, _)) = selector else {
            tracing::warn!(url = %target, "no product cards found");
            return Ok(CrawlReport {
                result: CrawlResult::empty(),
                stats: ExtractionStats::default(),
                state,
                iterations: tracker.iterations(),
                selector: None,
            });
        };

        self.settle(ctx).await;

        let cards = ctx
            .snapshot_cards(&self.card_query(&selector))
            .await
            .map_err(|e| CrawlError::Browser(format!("reading cards: {e:#}")))?;
        progress.report(ProgressSnapshot::running(
            cards.len(),
            format!("Found {} products, processing...", cards.len()),
        ));

        let page = ctx
            .get_url()
            .await
            .ok()
            .and_then(|u| Url::parse(&u).ok())
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or_else(|| target.url().clone());
        let origin = Url::parse(&page.origin().ascii_serialization())
            .unwrap_or_else(|_| target.url().clone());
        let captures = filter_captures(ctx.captured_images(), self.capture_re.as_ref());
        tracing::debug!(captured = captures.len(), "network captures available");

        let page_ctx = PageContext {
            origin,
            page,
            site,
            vendor_attributes: &self.profile.vendor_attributes,
            captures: &captures,
        };
        let (mut products, stats) =
            extract_cards(&cards, &page_ctx, self.profile.dedup, progress, milestone);
        if let Some(max) = max_products {
            products.truncate(max);
        }

        Ok(CrawlReport {
            result: CrawlResult::new(products, cards.len()),
            stats,
            state,
            iterations: tracker.iterations(),
            selector: Some(selector),
        })
    }
}

#[async_trait]
impl CrawlStrategy for ScrollCrawler {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn matches(&self, target: &Target) -> bool {
        self.catch_all || self.profile.matches(target)
    }

    async fn crawl(
        &self,
        target: &Target,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlResult, CrawlError> {
        let mut ctx = self
            .renderer
            .new_context()
            .await
            .map_err(|e| CrawlError::Browser(format!("{e:#}")))?;

        let outcome = self.run(ctx.as_mut(), target, max_products, progress).await;
        if let Err(e) = ctx.close().await {
            tracing::debug!("closing context: {e}");
        }
        outcome.map(|report| report.result)
    }
}
