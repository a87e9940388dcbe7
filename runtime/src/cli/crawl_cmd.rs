//! `shoplens crawl <target>`: crawl only, printing the discovered listings.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::output::{self, follow, is_json, print_json, spinner, truncate};
use crate::config::RuntimeConfig;
use crate::progress::{FanoutSink, ProgressSink, ProgressSnapshot, ProgressTracker, TracingSink};

/// Run the crawl command. `strict` turns a failed crawl into an error
/// instead of an empty result.
pub async fn run(
    target: &str,
    max_products: Option<usize>,
    strict: bool,
    config: &RuntimeConfig,
) -> Result<()> {
    let orchestrator = super::default_orchestrator(config);

    let tracker = ProgressTracker::new();
    let sink = FanoutSink::new()
        .with(Arc::new(tracker.clone()))
        .with(Arc::new(TracingSink));
    let bar = spinner(&format!("Crawling {target}..."));
    let feed = follow(
        &tracker,
        &bar,
        Duration::from_millis(config.progress_interval_ms),
    );

    let outcome = if strict {
        orchestrator.try_crawl(target, max_products, &sink).await
    } else {
        Ok(orchestrator.crawl(target, max_products, &sink).await)
    };
    let count = outcome.as_ref().map(|r| r.unique_count).unwrap_or(0);
    sink.report(ProgressSnapshot::finished(count, "Crawl complete"));
    let _ = feed.await;
    bar.finish_and_clear();

    let result = outcome?;
    if is_json() {
        print_json(&result);
        return Ok(());
    }

    output::status(&format!(
        "{} products ({} cards found)",
        result.unique_count, result.total_cards_found
    ));
    for p in &result.products {
        println!(
            "  {:<48} {:>10}  {}",
            truncate(&p.name, 48),
            p.price.as_deref().unwrap_or("-"),
            p.link
        );
    }
    Ok(())
}
