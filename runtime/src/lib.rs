// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shoplens runtime library: catalog crawling and visual product search.
//!
//! The library exposes every module so the binary and the integration tests
//! share one code path.

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extraction;
pub mod listing;
pub mod orchestrator;
pub mod progress;
pub mod renderer;
pub mod retry;
pub mod search;
pub mod target;

pub use config::RuntimeConfig;
pub use error::{CrawlError, FetchError, SearchError};
pub use listing::{CrawlResult, DedupPolicy, ProductListing};
pub use orchestrator::{CrawlStrategy, Orchestrator};
pub use progress::{ProgressSink, ProgressSnapshot, ProgressTracker};
pub use search::{MatchResult, SearchEngine, SearchRequest, SearchResponse};
