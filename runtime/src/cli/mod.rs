//! CLI subcommand implementations for the `shoplens` binary.

pub mod config_cmd;
pub mod crawl_cmd;
pub mod doctor;
pub mod output;
pub mod search_cmd;
pub mod sites_cmd;

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::orchestrator::Orchestrator;
use crate::renderer::chromium::LazyChromiumRenderer;

/// Orchestrator with every built-in strategy and a browser that starts on
/// first use.
pub fn default_orchestrator(config: &RuntimeConfig) -> Orchestrator {
    let renderer = Arc::new(LazyChromiumRenderer::new(
        config.chromium_path.clone(),
        config.headless,
    ));
    Orchestrator::with_defaults(config, renderer)
}
