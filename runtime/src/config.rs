// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Resolution order: CLI flags (applied by the caller), then `SHOPLENS_*`
//! environment variables, then defaults under `~/.shoplens/`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shoplens_vision::similarity::{MAX_TEXT_WEIGHT, MIN_TEXT_WEIGHT};
use shoplens_vision::{ClipPaths, DEFAULT_DIVERSITY_WEIGHT, DEFAULT_QUERY_DESCRIPTION, DEFAULT_TEXT_WEIGHT};

use crate::acquisition::DEFAULT_MAX_PRODUCTS;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub clip_visual_model: Option<PathBuf>,
    pub clip_text_model: Option<PathBuf>,
    pub clip_tokenizer: Option<PathBuf>,
    /// Overrides Chromium discovery.
    pub chromium_path: Option<PathBuf>,
    pub headless: bool,
    pub navigation_timeout_ms: u64,
    pub catalog_timeout_ms: u64,
    pub image_timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Hybrid text weight, kept within `0.30..=0.40`.
    pub text_weight: f32,
    pub diversity_weight: f32,
    pub progress_interval_ms: u64,
    /// Item cap for catalog feeds.
    pub max_products: usize,
    /// Generic description embedded for the query in hybrid mode.
    pub query_description: String,
    /// Custom domains served by Shopify.
    pub shopify_domains: Vec<String>,
    /// Extra hosts serving the category feed API.
    pub fakestore_domains: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let clip = ClipPaths::default().with_defaults();
        Self {
            clip_visual_model: clip.visual,
            clip_text_model: clip.text,
            clip_tokenizer: clip.tokenizer,
            chromium_path: None,
            headless: true,
            navigation_timeout_ms: 60_000,
            catalog_timeout_ms: 15_000,
            image_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
            text_weight: DEFAULT_TEXT_WEIGHT,
            diversity_weight: DEFAULT_DIVERSITY_WEIGHT,
            progress_interval_ms: 1_000,
            max_products: DEFAULT_MAX_PRODUCTS,
            query_description: DEFAULT_QUERY_DESCRIPTION.to_string(),
            shopify_domains: Vec::new(),
            fakestore_domains: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `SHOPLENS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |name: &str| get(name).and_then(|v| v.parse::<u64>().ok());

        if let Some(v) = get("SHOPLENS_CLIP_MODEL") {
            cfg.clip_visual_model = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SHOPLENS_CLIP_TEXT_MODEL") {
            cfg.clip_text_model = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SHOPLENS_CLIP_TOKENIZER") {
            cfg.clip_tokenizer = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SHOPLENS_CHROMIUM_PATH") {
            cfg.chromium_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SHOPLENS_HEADLESS") {
            cfg.headless = !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        if let Some(v) = num("SHOPLENS_NAV_TIMEOUT_MS") {
            cfg.navigation_timeout_ms = v;
        }
        if let Some(v) = num("SHOPLENS_CATALOG_TIMEOUT_MS") {
            cfg.catalog_timeout_ms = v;
        }
        if let Some(v) = num("SHOPLENS_IMAGE_TIMEOUT_MS") {
            cfg.image_timeout_ms = v;
        }
        if let Some(v) = num("SHOPLENS_RETRY_ATTEMPTS") {
            cfg.retry.max_attempts = (v as u32).max(1);
        }
        if let Some(v) = num("SHOPLENS_RETRY_BACKOFF_MS") {
            cfg.retry.backoff_ms = v;
        }
        if let Some(v) = get("SHOPLENS_TEXT_WEIGHT").and_then(|v| v.parse::<f32>().ok()) {
            cfg.text_weight = v;
        }
        if let Some(v) = get("SHOPLENS_DIVERSITY_WEIGHT").and_then(|v| v.parse::<f32>().ok()) {
            cfg.diversity_weight = v;
        }
        if let Some(v) = num("SHOPLENS_PROGRESS_INTERVAL_MS") {
            cfg.progress_interval_ms = v.max(10);
        }
        if let Some(v) = num("SHOPLENS_MAX_PRODUCTS") {
            cfg.max_products = v as usize;
        }
        if let Some(v) = get("SHOPLENS_QUERY_DESCRIPTION") {
            cfg.query_description = v;
        }
        if let Some(v) = get("SHOPLENS_SHOPIFY_DOMAINS") {
            cfg.shopify_domains = domain_list(&v);
        }
        if let Some(v) = get("SHOPLENS_FAKESTORE_DOMAINS") {
            cfg.fakestore_domains = domain_list(&v);
        }
        cfg.normalized()
    }

    /// Clamp weights into their documented ranges.
    pub fn normalized(mut self) -> Self {
        self.text_weight = self.text_weight.clamp(MIN_TEXT_WEIGHT, MAX_TEXT_WEIGHT);
        self.diversity_weight = self.diversity_weight.max(0.0);
        self
    }

    pub fn clip_paths(&self) -> ClipPaths {
        ClipPaths {
            visual: self.clip_visual_model.clone(),
            text: self.clip_text_model.clone(),
            tokenizer: self.clip_tokenizer.clone(),
        }
    }
}

fn domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = RuntimeConfig::from_lookup(|_| None);
        assert!(cfg.headless);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.backoff_ms, 1_000);
        assert_eq!(cfg.max_products, 50);
        assert!((cfg.text_weight - 0.35).abs() < 1e-6);
        assert!(cfg
            .clip_visual_model
            .as_ref()
            .unwrap()
            .ends_with("clip-vit-base-patch32-visual.onnx"));
    }

    #[test]
    fn test_env_overrides() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[
            ("SHOPLENS_HEADLESS", "false"),
            ("SHOPLENS_RETRY_ATTEMPTS", "5"),
            ("SHOPLENS_IMAGE_TIMEOUT_MS", "2500"),
            ("SHOPLENS_SHOPIFY_DOMAINS", "bouldergear.com, allbirds.com ,"),
            ("SHOPLENS_CHROMIUM_PATH", "/opt/chrome/chrome"),
            ("SHOPLENS_FAKESTORE_DOMAINS", "api.mockstore.test"),
        ]));
        assert!(!cfg.headless);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.image_timeout_ms, 2_500);
        assert_eq!(cfg.shopify_domains, vec!["bouldergear.com", "allbirds.com"]);
        assert_eq!(cfg.fakestore_domains, vec!["api.mockstore.test"]);
        assert_eq!(cfg.chromium_path, Some(PathBuf::from("/opt/chrome/chrome")));
    }

    #[test]
    fn test_text_weight_clamped() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[("SHOPLENS_TEXT_WEIGHT", "0.9")]));
        assert!((cfg.text_weight - 0.40).abs() < 1e-6);
    }

    #[test]
    fn test_bad_numbers_ignored() {
        let cfg = RuntimeConfig::from_lookup(lookup(&[("SHOPLENS_MAX_PRODUCTS", "lots")]));
        assert_eq!(cfg.max_products, 50);
    }

    #[test]
    fn test_serializes_as_json() {
        let json = serde_json::to_value(RuntimeConfig::default()).unwrap();
        assert_eq!(json["retry"]["max_attempts"], 3);
        assert_eq!(json["headless"], true);
    }
}
