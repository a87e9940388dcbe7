// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Network-capture image recovery.
//!
//! Lazy-loading grids often leave a data-URI placeholder in the card while
//! the real image is fetched by script. The browser records every image
//! response it sees; a card with a placeholder is matched against that log
//! using SKU-like tokens from its product link.
//!
//! Scoring per captured URL: +10 when it contains the primary token, +5 per
//! secondary token, +2 when it looks like a main product shot. The best
//! candidate is accepted only at 10 or more, which means the primary token
//! must match. Among equal best scores the earliest capture wins.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

pub const PRIMARY_SCORE: u32 = 10;
pub const SECONDARY_SCORE: u32 = 5;
pub const MAIN_IMAGE_SCORE: u32 = 2;
pub const ACCEPT_THRESHOLD: u32 = 10;

const MIN_TOKEN_LEN: usize = 3;

fn main_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|[^a-z])(?:main|primary|hero)(?:[^a-z]|$)")
            .expect("main image regex is valid")
    })
}

/// Identifier tokens pulled from a product link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuTokens {
    /// Most specific identifier, usually the style number.
    pub primary: String,
    /// Colour codes and other shorter identifiers.
    pub secondary: Vec<String>,
}

/// Extract SKU-like tokens from the path of `link`.
///
/// Candidates are alphanumeric runs of at least three characters holding a
/// digit. The longest is primary (first wins on equal length).
pub fn sku_tokens(link: &str) -> Option<SkuTokens> {
    let path = Url::parse(link)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| link.to_string());

    let mut seen = HashSet::new();
    let candidates: Vec<String> = path
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN && t.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_ascii_lowercase)
        .filter(|t| seen.insert(t.clone()))
        .collect();

    let primary_idx = candidates
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, usize)>, (i, t)| match best {
            Some((_, len)) if len >= t.len() => best,
            _ => Some((i, t.len())),
        })
        .map(|(i, _)| i)?;

    let mut secondary = candidates;
    let primary = secondary.remove(primary_idx);
    secondary.retain(|t| !primary.contains(t.as_str()));
    Some(SkuTokens { primary, secondary })
}

/// Score one captured URL against a product's tokens.
pub fn score_capture(url: &str, tokens: &SkuTokens) -> u32 {
    let lower = url.to_ascii_lowercase();
    let mut score = 0;
    if lower.contains(&tokens.primary) {
        score += PRIMARY_SCORE;
    }
    score += tokens
        .secondary
        .iter()
        .filter(|t| lower.contains(t.as_str()))
        .count() as u32
        * SECONDARY_SCORE;
    if main_image_re().is_match(&lower) {
        score += MAIN_IMAGE_SCORE;
    }
    score
}

/// Best captured image for a product link, if one clears the threshold.
pub fn recover_image<'a>(link: &str, captures: &'a [String]) -> Option<&'a str> {
    let tokens = sku_tokens(link)?;
    let (url, score) = captures
        .iter()
        .map(|c| (c.as_str(), score_capture(c, &tokens)))
        .fold(None, |best: Option<(&str, u32)>, (url, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((url, score)),
        })?;

    if score >= ACCEPT_THRESHOLD {
        tracing::debug!(link, url, score, "recovered image from network capture");
        Some(url)
    } else {
        None
    }
}

/// Keep captures matching the site's CDN pattern, first occurrence only.
pub fn filter_captures(urls: Vec<String>, pattern: Option<&Regex>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| !u.starts_with("data:"))
        .filter(|u| pattern.map(|p| p.is_match(u)).unwrap_or(true))
        .filter(|u| seen.insert(u.clone()))
        .collect()
}
