//! `shoplens search <image> <target>`: find catalog products that look like
//! a query image.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use shoplens_vision::load_model;

use super::output::{self, follow, is_json, print_json, spinner, truncate};
use crate::acquisition::http_client::HttpClient;
use crate::config::RuntimeConfig;
use crate::progress::{FanoutSink, ProgressRegistry, TracingSink};
use crate::search::{SearchEngine, SearchRequest, SearchResponse};

pub struct SearchArgs<'a> {
    pub image: &'a Path,
    pub target: &'a str,
    pub top_x: usize,
    pub diversity: bool,
    pub hybrid: bool,
    pub max_products: Option<usize>,
}

/// Run the search command.
pub async fn run(args: SearchArgs<'_>, config: &RuntimeConfig) -> Result<()> {
    let image = std::fs::read(args.image)
        .with_context(|| format!("failed to read query image {}", args.image.display()))?;

    let model = load_model(&config.clip_paths()).context("failed to load embedding model")?;
    let orchestrator = Arc::new(super::default_orchestrator(config));
    let fetcher = Arc::new(HttpClient::new(config.image_timeout_ms));
    let engine = SearchEngine::new(orchestrator, model, fetcher, config);

    let registry = ProgressRegistry::new();
    let (id, tracker) = registry.create();
    let sink = FanoutSink::new()
        .with(Arc::new(tracker.clone()))
        .with(Arc::new(TracingSink));

    let bar = spinner("Starting...");
    let feed = follow(
        &tracker,
        &bar,
        Duration::from_millis(config.progress_interval_ms),
    );

    let request = SearchRequest {
        max_products: args.max_products,
        ..SearchRequest::new(image, args.target)
            .top_x(args.top_x)
            .diversity(args.diversity)
            .hybrid(args.hybrid)
    };
    let outcome = engine.search(&request, &sink).await;
    if let Err(e) = feed.await {
        tracing::debug!(%id, "progress feed task ended abnormally: {e}");
    }
    bar.finish_and_clear();
    registry.remove(&id);

    let response = outcome?;
    if is_json() {
        print_json(&response);
    } else {
        print_table(&response);
    }
    Ok(())
}

fn print_table(response: &SearchResponse) {
    output::status(&format!(
        "Searched {} products ({} cards loaded), {} matches:",
        response.total_products_searched, response.total_cards_loaded, response.matches_returned
    ));
    if response.products_skipped > 0 {
        output::status(&format!(
            "  ({} skipped: image unavailable)",
            response.products_skipped
        ));
    }
    println!();
    for (i, m) in response.results.iter().enumerate() {
        println!(
            "{:>3}. {:<48} {:>8.4}  {}",
            i + 1,
            truncate(&m.product.name, 48),
            m.score,
            m.product.price.as_deref().unwrap_or("-")
        );
        println!("     {}", m.product.link);
    }
}
