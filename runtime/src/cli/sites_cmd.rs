//! `shoplens sites`: list the registered crawl strategies.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::output::{is_json, print_json};
use crate::config::RuntimeConfig;
use crate::crawler::profile;
use crate::orchestrator::Orchestrator;
use crate::renderer::NoopRenderer;

#[derive(Debug, Serialize)]
struct SiteInfo {
    strategy: String,
    kind: &'static str,
    domains: Vec<String>,
}

fn describe(config: &RuntimeConfig) -> Vec<SiteInfo> {
    let orchestrator = Orchestrator::with_defaults(config, Arc::new(NoopRenderer));
    let profiles = profile::builtin();

    orchestrator
        .strategy_names()
        .into_iter()
        .map(|name| {
            let (kind, domains) = match name {
                "shopify" => {
                    let mut d = vec!["*.myshopify.com".to_string(), "*/collections/*".to_string()];
                    d.extend(config.shopify_domains.iter().cloned());
                    ("catalog feed", d)
                }
                "fakestore" => {
                    let mut d = vec!["fakestoreapi.com".to_string()];
                    d.extend(config.fakestore_domains.iter().cloned());
                    ("catalog feed", d)
                }
                "generic" => ("scroll crawler", vec!["*".to_string()]),
                other => (
                    "scroll crawler",
                    profiles
                        .iter()
                        .find(|p| p.name == other)
                        .map(|p| p.domains.clone())
                        .unwrap_or_default(),
                ),
            };
            SiteInfo {
                strategy: name.to_string(),
                kind,
                domains,
            }
        })
        .collect()
}

/// Run the sites command.
pub async fn run(config: &RuntimeConfig) -> Result<()> {
    let sites = describe(config);
    if is_json() {
        print_json(&sites);
        return Ok(());
    }
    println!("Strategies, in dispatch order:");
    for s in &sites {
        println!("  {:<10} {:<15} {}", s.strategy, s.kind, s.domains.join(", "));
    }
    Ok(())
}
