// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Crawl dispatch.
//!
//! Strategies are tried in registration order and the first whose matcher
//! accepts the target runs. The site-tuned crawlers match on exact domains
//! and go first, so a known storefront is never taken for a Shopify store by
//! its `/collections/` path. Catalog feeds follow, and the generic crawler
//! comes last, so it only sees targets nothing else claimed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::acquisition::fakestore::FakeStoreClient;
use crate::acquisition::http_client::HttpClient;
use crate::acquisition::shopify::ShopifyClient;
use crate::config::RuntimeConfig;
use crate::crawler::profile::{self, Timing};
use crate::crawler::ScrollCrawler;
use crate::error::CrawlError;
use crate::listing::CrawlResult;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::renderer::Renderer;
use crate::target::Target;

/// One way of turning a target into product listings.
#[async_trait]
pub trait CrawlStrategy: Send + Sync {
    /// Short identifier, shown by `shoplens sites` and in logs.
    fn name(&self) -> &str;

    /// Whether this strategy handles `target`.
    fn matches(&self, target: &Target) -> bool;

    /// Crawl `target`. Skipped cards are not errors; an error means the
    /// whole crawl produced nothing usable.
    async fn crawl(
        &self,
        target: &Target,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlResult, CrawlError>;
}

/// Ordered registry of crawl strategies.
#[derive(Default)]
pub struct Orchestrator {
    strategies: Vec<Arc<dyn CrawlStrategy>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy; earlier registrations take precedence.
    pub fn register(mut self, strategy: Arc<dyn CrawlStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// The site-tuned crawlers, catalog feeds, then the generic fallback.
    pub fn with_defaults(config: &RuntimeConfig, renderer: Arc<dyn Renderer>) -> Self {
        let http = HttpClient::new(config.catalog_timeout_ms);
        let mut orchestrator = Self::new();

        // Slow sites keep their own longer navigation timeout.
        for site in profile::builtin() {
            let timing = Timing {
                navigation_timeout_ms: site
                    .timing
                    .navigation_timeout_ms
                    .max(config.navigation_timeout_ms),
                ..site.timing
            };
            orchestrator = orchestrator.register(Arc::new(ScrollCrawler::new(
                renderer.clone(),
                site.with_timing(timing),
            )));
        }

        let generic = profile::generic();
        let timing = Timing {
            navigation_timeout_ms: config.navigation_timeout_ms,
            ..generic.timing
        };
        orchestrator
            .register(Arc::new(
                ShopifyClient::new(http.clone())
                    .with_domains(config.shopify_domains.iter().cloned())
                    .with_max_products(config.max_products),
            ))
            .register(Arc::new(
                FakeStoreClient::new(http)
                    .with_domains(config.fakestore_domains.iter().cloned())
                    .with_max_products(config.max_products),
            ))
            .register(Arc::new(ScrollCrawler::fallback(
                renderer,
                generic.with_timing(timing),
            )))
    }

    /// First strategy accepting `target`.
    pub fn select(&self, target: &Target) -> Option<&Arc<dyn CrawlStrategy>> {
        self.strategies.iter().find(|s| s.matches(target))
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Parse, dispatch and crawl, surfacing the failure.
    pub async fn try_crawl(
        &self,
        raw_target: &str,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> Result<CrawlResult, CrawlError> {
        let target = Target::parse(raw_target)?;
        let strategy = self
            .select(&target)
            .ok_or_else(|| CrawlError::InvalidTarget(format!("no strategy handles {target}")))?;

        tracing::info!(strategy = strategy.name(), target = %target, "dispatching crawl");
        let result = strategy.crawl(&target, max_products, progress).await?;
        tracing::info!(
            strategy = strategy.name(),
            found = result.total_cards_found,
            unique = result.unique_count,
            "crawl finished"
        );
        Ok(result)
    }

    /// Like [`try_crawl`](Self::try_crawl) but never fails: errors become
    /// an empty result and a progress message.
    pub async fn crawl(
        &self,
        raw_target: &str,
        max_products: Option<usize>,
        progress: &dyn ProgressSink,
    ) -> CrawlResult {
        match self.try_crawl(raw_target, max_products, progress).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(target = raw_target, "crawl failed: {e}");
                progress.report(ProgressSnapshot::running(0, format!("Crawl failed: {e}")));
                CrawlResult::empty()
            }
        }
    }
}
