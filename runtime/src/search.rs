// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Visual product search.
//!
//! One run: validate and embed the query image, crawl the target, then
//! fetch, embed and score every product image in turn. Products whose image
//! cannot be fetched after bounded retries are skipped; the rest of the
//! batch is still scored. Only a bad query image rejects the request, and
//! that happens before any crawling.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use shoplens_vision::{
    decode_image, diversify, embed_image, embed_text, score, EmbeddingModel, EmbeddingSet,
    Rankable, ScoreMode,
};
use tokio::sync::Mutex;

use crate::acquisition::http_client::HttpClient;
use crate::config::RuntimeConfig;
use crate::error::{FetchError, SearchError};
use crate::listing::{CrawlResult, ProductListing};
use crate::orchestrator::Orchestrator;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::retry::{retry, Attempted, RetryPolicy};

/// Result count when the request names none.
pub const DEFAULT_TOP_X: usize = 5;

/// Report matching progress after every this many products.
const MATCH_PROGRESS_EVERY: usize = 5;

/// Downloads product images.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[async_trait]
impl ImageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get_bytes(url).await
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Encoded query image.
    pub image: Vec<u8>,
    pub top_x: usize,
    /// Storefront domain or URL.
    pub target: String,
    /// Rerank for lexical diversity.
    pub diversity: bool,
    /// Blend in text similarity when the model has a text encoder.
    pub hybrid: bool,
    /// Overrides the catalog item cap.
    pub max_products: Option<usize>,
}

impl SearchRequest {
    pub fn new(image: Vec<u8>, target: impl Into<String>) -> Self {
        Self {
            image,
            top_x: DEFAULT_TOP_X,
            target: target.into(),
            diversity: false,
            hybrid: false,
            max_products: None,
        }
    }

    pub fn top_x(mut self, top_x: usize) -> Self {
        self.top_x = top_x;
        self
    }

    pub fn diversity(mut self, on: bool) -> Self {
        self.diversity = on;
        self
    }

    pub fn hybrid(mut self, on: bool) -> Self {
        self.hybrid = on;
        self
    }
}

/// A scored product. Scores compare only within one search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub product: ProductListing,
    pub score: f32,
}

impl Rankable for MatchResult {
    fn rank_score(&self) -> f32 {
        self.score
    }

    fn rank_label(&self) -> &str {
        &self.product.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<MatchResult>,
    /// Products the crawl returned.
    pub total_products_searched: usize,
    /// Cards seen on the page, before skips and deduplication.
    pub total_cards_loaded: usize,
    pub matches_returned: usize,
    /// Products dropped because their image could not be fetched or embedded.
    #[serde(default)]
    pub products_skipped: usize,
}

/// Query embeddings plus the scoring mode they support.
struct Query {
    set: EmbeddingSet,
    mode: ScoreMode,
}

pub struct SearchEngine {
    orchestrator: Arc<Orchestrator>,
    model: Mutex<Box<dyn EmbeddingModel>>,
    fetcher: Arc<dyn ImageFetcher>,
    retry: RetryPolicy,
    text_weight: f32,
    diversity_weight: f32,
    query_description: String,
}

impl SearchEngine {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        model: Box<dyn EmbeddingModel>,
        fetcher: Arc<dyn ImageFetcher>,
        config: &RuntimeConfig,
    ) -> Self {
        Self {
            orchestrator,
            model: Mutex::new(model),
            fetcher,
            retry: config.retry,
            text_weight: config.text_weight,
            diversity_weight: config.diversity_weight,
            query_description: config.query_description.clone(),
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    async fn embed_query(&self, image: &[u8], hybrid: bool) -> Result<Query, SearchError> {
        let img = decode_image(image).map_err(SearchError::InvalidImage)?;
        let mut model = self.model.lock().await;
        let set = embed_image(model.as_mut(), &img).map_err(SearchError::Embedding)?;

        if !hybrid {
            return Ok(Query {
                set,
                mode: ScoreMode::ImageOnly,
            });
        }
        if !model.supports_text() {
            tracing::warn!(model = model.name(), "no text encoder, using image-only scoring");
            return Ok(Query {
                set,
                mode: ScoreMode::ImageOnly,
            });
        }
        let text = embed_text(model.as_mut(), &self.query_description)
            .map_err(SearchError::Embedding)?;
        Ok(Query {
            set: set.with_text(text),
            mode: ScoreMode::hybrid(self.text_weight),
        })
    }

    async fn fetch_image(&self, url: &str) -> Result<DynamicImage, FetchError> {
        let bytes = self.fetcher.fetch(url).await?;
        decode_image(&bytes).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Embed one product image, plus its name in hybrid mode. A failed
    /// name embedding only downgrades that product to image-only scoring.
    async fn embed_product(
        &self,
        img: &DynamicImage,
        product: &ProductListing,
        mode: ScoreMode,
    ) -> Option<EmbeddingSet> {
        let mut model = self.model.lock().await;
        let set = match embed_image(model.as_mut(), img) {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(link = %product.link, "embedding failed, skipping: {e}");
                return None;
            }
        };
        if matches!(mode, ScoreMode::Hybrid { .. }) {
            match embed_text(model.as_mut(), &product.name) {
                Ok(text) => return Some(set.with_text(text)),
                Err(e) => tracing::debug!(name = %product.name, "name embedding failed: {e}"),
            }
        }
        Some(set)
    }

    /// Score every product in `crawl` against the query, in crawl order.
    async fn score_products(
        &self,
        query: &Query,
        crawl: &CrawlResult,
        progress: &dyn ProgressSink,
    ) -> (Vec<MatchResult>, usize) {
        let total = crawl.products.len();
        let mut matches = Vec::with_capacity(total);
        let mut skipped = 0;

        for (i, product) in crawl.products.iter().enumerate() {
            let url = product.image_url.as_str();
            let fetched = retry(&self.retry, |_| self.fetch_image(url), FetchError::is_transient).await;

            match fetched {
                Attempted::Succeeded { value: img, .. } => {
                    match self.embed_product(&img, product, query.mode).await {
                        Some(set) => match score(&query.set, &set, query.mode) {
                            Some(s) => matches.push(MatchResult {
                                product: product.clone(),
                                score: s,
                            }),
                            None => skipped += 1,
                        },
                        None => skipped += 1,
                    }
                }
                Attempted::Exhausted { error, attempts } | Attempted::Aborted { error, attempts } => {
                    tracing::warn!(link = %product.link, attempts, "skipping product: {error}");
                    skipped += 1;
                }
            }

            let processed = i + 1;
            if processed % MATCH_PROGRESS_EVERY == 0 || processed == total {
                progress.report(ProgressSnapshot::running(
                    processed,
                    format!("Analyzing products... ({processed}/{total})"),
                ));
            }
        }

        (matches, skipped)
    }

    /// Run a search. `progress` is reset first and always ends on a terminal
    /// snapshot, including when the query image is rejected.
    pub async fn search(
        &self,
        request: &SearchRequest,
        progress: &dyn ProgressSink,
    ) -> Result<SearchResponse, SearchError> {
        progress.reset("Starting search...");
        let query = match self.embed_query(&request.image, request.hybrid).await {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(target = %request.target, "search rejected: {e}");
                progress.report(ProgressSnapshot::finished(0, format!("Error: {e}")));
                return Err(e);
            }
        };
        tracing::info!(
            target = %request.target,
            top_x = request.top_x,
            diversity = request.diversity,
            mode = ?query.mode,
            "search started"
        );

        let crawl = self
            .orchestrator
            .crawl(&request.target, request.max_products, progress)
            .await;

        if crawl.is_empty() {
            progress.report(ProgressSnapshot::finished(0, "No products found"));
            return Ok(SearchResponse {
                results: Vec::new(),
                total_products_searched: 0,
                total_cards_loaded: crawl.total_cards_found,
                matches_returned: 0,
                products_skipped: 0,
            });
        }

        progress.report(ProgressSnapshot::running(
            0,
            format!("Matching {} products...", crawl.unique_count),
        ));
        let (mut matches, skipped) = self.score_products(&query, &crawl, progress).await;

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        let results = if request.diversity && matches.len() > request.top_x {
            diversify(matches, request.top_x, self.diversity_weight)
        } else {
            matches.truncate(request.top_x);
            matches
        };

        tracing::info!(
            searched = crawl.unique_count,
            skipped,
            returned = results.len(),
            "search finished"
        );
        progress.report(ProgressSnapshot::finished(
            results.len(),
            format!("Found {} matches", results.len()),
        ));

        Ok(SearchResponse {
            matches_returned: results.len(),
            results,
            total_products_searched: crawl.unique_count,
            total_cards_loaded: crawl.total_cards_found,
            products_skipped: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::orchestrator::CrawlStrategy;
    use crate::progress::ProgressTracker;
    use crate::target::Target;
    use image::{ImageFormat, Rgb, RgbImage};
    use shoplens_vision::HistogramModel;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::time::Duration;

    fn png(rgb: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb(rgb)));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    struct Catalog(Vec<ProductListing>);

    #[async_trait]
    impl CrawlStrategy for Catalog {
        fn name(&self) -> &str {
            "catalog"
        }
        fn matches(&self, _target: &Target) -> bool {
            true
        }
        async fn crawl(
            &self,
            _target: &Target,
            _max: Option<usize>,
            _progress: &dyn ProgressSink,
        ) -> Result<CrawlResult, CrawlError> {
            Ok(CrawlResult::new(self.0.clone(), self.0.len()))
        }
    }

    struct Images(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ImageFetcher for Images {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Timeout(url.to_string()))
        }
    }

    /// Records the tracker's state after every update it receives.
    #[derive(Default)]
    struct Recorder {
        tracker: ProgressTracker,
        seen: std::sync::Mutex<Vec<ProgressSnapshot>>,
    }

    impl Recorder {
        fn record(&self) {
            self.seen.lock().unwrap().push(self.tracker.snapshot());
        }

        fn take(&self) -> Vec<ProgressSnapshot> {
            std::mem::take(&mut *self.seen.lock().unwrap())
        }
    }

    impl ProgressSink for Recorder {
        fn report(&self, snapshot: ProgressSnapshot) {
            self.tracker.report(snapshot);
            self.record();
        }

        fn reset(&self, message: &str) {
            self.tracker.reset(message);
            self.record();
        }
    }

    fn listing(name: &str, image: &str) -> ProductListing {
        ProductListing::new(
            name,
            format!("https://shop.test/p/{}", name.replace(' ', "-")),
            image.to_string(),
            None,
            "shop.test",
        )
    }

    fn engine(products: Vec<ProductListing>, images: &[(&str, [u8; 3])]) -> SearchEngine {
        let orchestrator = Orchestrator::new().register(Arc::new(Catalog(products)));
        let fetcher = Images(
            images
                .iter()
                .map(|(url, rgb)| (url.to_string(), png(*rgb)))
                .collect(),
        );
        let config = RuntimeConfig {
            retry: RetryPolicy::new(3, Duration::ZERO),
            ..RuntimeConfig::default()
        };
        SearchEngine::new(
            Arc::new(orchestrator),
            Box::new(HistogramModel::new()),
            Arc::new(fetcher),
            &config,
        )
    }

    #[tokio::test]
    async fn test_ranks_closest_colour_first() {
        let e = engine(
            vec![
                listing("Blue Shirt", "https://cdn.test/b.png"),
                listing("Red Shirt", "https://cdn.test/r.png"),
            ],
            &[("https://cdn.test/r.png", [250, 10, 10]), ("https://cdn.test/b.png", [10, 10, 250])],
        );
        let tracker = ProgressTracker::new();
        let req = SearchRequest::new(png([240, 20, 20]), "shop.test").top_x(2);
        let resp = e.search(&req, &tracker).await.unwrap();

        let names: Vec<_> = resp.results.iter().map(|m| m.product.name.as_str()).collect();
        assert_eq!(names, vec!["Red Shirt", "Blue Shirt"]);
        assert_eq!(resp.matches_returned, 2);
        assert!(tracker.is_done());
        assert_eq!(tracker.snapshot().count, 2);
    }

    #[tokio::test]
    async fn test_missing_image_is_skipped() {
        let e = engine(
            vec![
                listing("Red Shirt", "https://cdn.test/r.png"),
                listing("Lost Shirt", "https://cdn.test/gone.png"),
            ],
            &[("https://cdn.test/r.png", [250, 10, 10])],
        );
        let req = SearchRequest::new(png([250, 10, 10]), "shop.test");
        let resp = e.search(&req, &ProgressTracker::new()).await.unwrap();
        assert_eq!(resp.matches_returned, 1);
        assert_eq!(resp.products_skipped, 1);
        assert_eq!(resp.total_products_searched, 2);
    }

    #[tokio::test]
    async fn test_bad_query_image_rejected_before_crawl() {
        let e = engine(vec![listing("Red Shirt", "https://cdn.test/r.png")], &[]);
        let tracker = ProgressTracker::new();
        let req = SearchRequest::new(b"not an image".to_vec(), "shop.test");
        let err = e.search(&req, &tracker).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidImage(_)));
        let last = tracker.snapshot();
        assert!(last.done);
        assert_eq!(last.count, 0);
        assert!(last.message.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_second_search_on_same_tracker_starts_fresh() {
        let e = engine(
            vec![listing("Red Shirt", "https://cdn.test/r.png")],
            &[("https://cdn.test/r.png", [250, 10, 10])],
        );
        let rec = Recorder::default();
        let req = SearchRequest::new(png([250, 10, 10]), "shop.test");

        e.search(&req, &rec).await.unwrap();
        assert!(rec.tracker.is_done());
        rec.take();

        e.search(&req, &rec).await.unwrap();
        let seen = rec.take();
        assert_eq!(
            seen.first(),
            Some(&ProgressSnapshot::running(0, "Starting search..."))
        );
        assert!(seen.iter().filter(|s| !s.done).count() >= 2);
        assert_eq!(seen.iter().filter(|s| s.done).count(), 1);
        assert_eq!(seen.last(), Some(&ProgressSnapshot::finished(1, "Found 1 matches")));
    }

    #[tokio::test]
    async fn test_final_milestone_sent_when_last_product_skipped() {
        let e = engine(
            vec![
                listing("Red Shirt", "https://cdn.test/r.png"),
                listing("Lost Shirt", "https://cdn.test/gone.png"),
            ],
            &[("https://cdn.test/r.png", [250, 10, 10])],
        );
        let rec = Recorder::default();
        let req = SearchRequest::new(png([250, 10, 10]), "shop.test");

        let resp = e.search(&req, &rec).await.unwrap();

        assert_eq!(resp.products_skipped, 1);
        assert!(rec
            .take()
            .contains(&ProgressSnapshot::running(2, "Analyzing products... (2/2)")));
    }

    #[tokio::test]
    async fn test_hybrid_without_text_encoder_falls_back() {
        let e = engine(
            vec![listing("Red Shirt", "https://cdn.test/r.png")],
            &[("https://cdn.test/r.png", [250, 10, 10])],
        );
        let req = SearchRequest::new(png([250, 10, 10]), "shop.test").hybrid(true);
        let resp = e.search(&req, &ProgressTracker::new()).await.unwrap();
        assert_eq!(resp.matches_returned, 1);
        assert!(resp.results[0].score > 0.99);
    }

    #[tokio::test]
    async fn test_diversity_applies_only_above_top_x() {
        let products = vec![
            listing("Red Knit Sweater", "https://cdn.test/1.png"),
            listing("Red Knit Cardigan", "https://cdn.test/2.png"),
            listing("Red Jeans", "https://cdn.test/3.png"),
        ];
        let images = [
            ("https://cdn.test/1.png", [250, 10, 10]),
            ("https://cdn.test/2.png", [250, 10, 10]),
            ("https://cdn.test/3.png", [250, 10, 10]),
        ];
        let e = engine(products, &images);
        let req = SearchRequest::new(png([250, 10, 10]), "shop.test")
            .top_x(2)
            .diversity(true);
        let resp = e.search(&req, &ProgressTracker::new()).await.unwrap();
        let names: Vec<_> = resp.results.iter().map(|m| m.product.name.as_str()).collect();
        // equal scores; the sweater comes first, then the least overlapping name
        assert_eq!(names, vec!["Red Knit Sweater", "Red Jeans"]);
    }

    #[tokio::test]
    async fn test_empty_catalog_finishes() {
        let e = engine(Vec::new(), &[]);
        let tracker = ProgressTracker::new();
        let resp = e
            .search(&SearchRequest::new(png([1, 2, 3]), "shop.test"), &tracker)
            .await
            .unwrap();
        assert!(resp.results.is_empty());
        assert!(tracker.is_done());
        assert_eq!(tracker.snapshot().message, "No products found");
    }
}
