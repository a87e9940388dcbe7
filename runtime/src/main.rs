// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use shoplens_runtime::cli;
use shoplens_runtime::search::DEFAULT_TOP_X;
use shoplens_runtime::RuntimeConfig;

#[derive(Parser)]
#[command(
    name = "shoplens",
    about = "Shoplens: find catalog products that look like your image",
    version,
    after_help = "Run 'shoplens <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Chromium executable (overrides SHOPLENS_CHROMIUM_PATH)
    #[arg(long, global = true)]
    chromium_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    /// CLIP visual ONNX model (overrides SHOPLENS_CLIP_MODEL)
    #[arg(long, global = true)]
    clip_model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank a storefront's products by similarity to an image
    Search {
        /// Query image (JPEG, PNG, WebP...)
        image: PathBuf,
        /// Storefront domain or URL, e.g. "store.myshopify.com/collections/shirts"
        target: String,
        /// Number of results
        #[arg(long, default_value_t = DEFAULT_TOP_X)]
        top_x: usize,
        /// Penalize results whose names overlap with ones already picked
        #[arg(long)]
        diversity: bool,
        /// Blend in product-name text similarity (needs the CLIP text model)
        #[arg(long)]
        hybrid: bool,
        /// Cap on products fetched from catalog feeds
        #[arg(long)]
        max_products: Option<usize>,
    },
    /// Crawl a storefront and print its listings
    Crawl {
        /// Storefront domain or URL
        target: String,
        /// Maximum number of products
        #[arg(long)]
        max_products: Option<usize>,
        /// Exit with an error when the crawl fails instead of printing nothing
        #[arg(long)]
        strict: bool,
    },
    /// List crawl strategies in dispatch order
    Sites,
    /// Check environment and diagnose issues
    Doctor,
    /// Print the resolved configuration
    Config,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn resolve_config(cli: &Cli) -> RuntimeConfig {
    let mut config = RuntimeConfig::from_env();
    if let Some(p) = &cli.chromium_path {
        config.chromium_path = Some(p.clone());
    }
    if let Some(p) = &cli.clip_model {
        config.clip_visual_model = Some(p.clone());
    }
    if cli.headful {
        config.headless = false;
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("SHOPLENS_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("SHOPLENS_QUIET", "1");
    }
    init_logging(&cli);
    let config = resolve_config(&cli);

    let result = match cli.command {
        Commands::Search {
            image,
            target,
            top_x,
            diversity,
            hybrid,
            max_products,
        } => {
            let args = cli::search_cmd::SearchArgs {
                image: &image,
                target: &target,
                top_x,
                diversity,
                hybrid,
                max_products,
            };
            cli::search_cmd::run(args, &config).await
        }
        Commands::Crawl {
            target,
            max_products,
            strict,
        } => cli::crawl_cmd::run(&target, max_products, strict, &config).await,
        Commands::Sites => cli::sites_cmd::run(&config).await,
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Config => cli::config_cmd::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "shoplens", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else if !cli::output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
