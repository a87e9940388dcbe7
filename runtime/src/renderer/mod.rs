// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-driven crawling.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). The DOM
//! helpers on `RenderContext` have script-based defaults built on
//! `execute_js`; simulated contexts in tests override them directly.

pub mod chromium;
pub mod stealth;

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Where to scroll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scroll {
    ToBottom,
    ToTop,
    /// Fraction of the document height, `0.0..=1.0`.
    ToFraction(f64),
}

/// Viewport state after a scroll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    /// Whether the viewport touches the document bottom. `None` when the
    /// context cannot tell.
    pub at_bottom: Option<bool>,
    pub document_height: Option<f64>,
}

/// A DOM element located by selector and match index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub selector: String,
    pub index: usize,
}

/// Something to click: a CSS selector, optionally narrowed to elements
/// whose text contains `text` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickTarget {
    pub css: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ClickTarget {
    pub fn css(css: &str) -> Self {
        Self {
            css: css.to_string(),
            text: None,
        }
    }

    pub fn with_text(css: &str, text: &str) -> Self {
        Self {
            css: css.to_string(),
            text: Some(text.to_string()),
        }
    }
}

/// What to read from each product card in one pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardQuery {
    /// Card container selector.
    pub selector: String,
    /// Preferred link inside the card. Falls back to the card itself when
    /// it is an anchor, then to its first `a[href]`.
    #[serde(default)]
    pub link_selector: Option<String>,
    /// Attributes to read from the card image, in resolution order.
    pub image_attributes: Vec<String>,
    /// Data attributes to read from the card container itself.
    #[serde(default)]
    pub card_attributes: Vec<String>,
}

/// Raw, unresolved fields of one product card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCard {
    /// The link `href` attribute as written in the markup.
    #[serde(default)]
    pub href: Option<String>,
    /// Image and container attributes that were present, by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Title-like attribute of the link or card.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the current URL.
    async fn get_url(&self) -> Result<String>;
    /// Image response URLs observed since the context was created, in
    /// arrival order.
    fn captured_images(&self) -> Vec<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;

    /// All elements matching `selector`.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementRef>> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_string(selector)?
        );
        let count = self.execute_js(&script).await?.as_u64().unwrap_or(0) as usize;
        Ok((0..count)
            .map(|index| ElementRef {
                selector: selector.to_string(),
                index,
            })
            .collect())
    }

    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> Result<usize> {
        Ok(self.query_all(selector).await?.len())
    }

    async fn scroll(&self, to: Scroll) -> Result<ScrollPosition> {
        let target = match to {
            Scroll::ToBottom => "document.body.scrollHeight".to_string(),
            Scroll::ToTop => "0".to_string(),
            Scroll::ToFraction(f) => {
                format!("document.body.scrollHeight * {}", f.clamp(0.0, 1.0))
            }
        };
        let script = format!(
            "(() => {{ window.scrollTo(0, {target}); \
             return {{ y: window.scrollY, viewport: window.innerHeight, \
             height: document.body.scrollHeight }}; }})()"
        );
        let value = self.execute_js(&script).await?;
        let y = value["y"].as_f64().unwrap_or(0.0);
        let viewport = value["viewport"].as_f64().unwrap_or(0.0);
        let height = value["height"].as_f64();
        Ok(ScrollPosition {
            at_bottom: height.map(|h| y + viewport >= h - 2.0),
            document_height: height,
        })
    }

    /// Click the first visible element matching any target, in order.
    /// Returns the index of the target clicked.
    async fn click_first(&self, targets: &[ClickTarget]) -> Result<Option<usize>> {
        if targets.is_empty() {
            return Ok(None);
        }
        let script = format!(
            r#"((targets) => {{
                for (let i = 0; i < targets.length; i++) {{
                    const t = targets[i];
                    let els;
                    try {{ els = Array.from(document.querySelectorAll(t.css)); }} catch (e) {{ continue; }}
                    const el = els.find(e => e.offsetParent !== null &&
                        (!t.text || (e.textContent || '').toLowerCase().includes(t.text.toLowerCase())));
                    if (el) {{ el.click(); return i; }}
                }}
                return null;
            }})({})"#,
            serde_json::to_string(targets).context("serializing click targets")?
        );
        Ok(self
            .execute_js(&script)
            .await?
            .as_u64()
            .map(|i| i as usize))
    }

    /// Read every card matching `query.selector` in one pass.
    async fn snapshot_cards(&self, query: &CardQuery) -> Result<Vec<RawCard>> {
        let script = format!(
            r#"((q) => {{
                const pick = (el, names) => {{
                    const out = {{}};
                    if (!el) return out;
                    for (const n of names) {{
                        const v = el.getAttribute(n);
                        if (v !== null && v.trim() !== '') out[n] = v;
                    }}
                    return out;
                }};
                return Array.from(document.querySelectorAll(q.selector)).map(card => {{
                    let link = null;
                    if (q.link_selector) link = card.querySelector(q.link_selector);
                    if (!link && card.matches('a[href]')) link = card;
                    if (!link) link = card.querySelector('a[href]');
                    const img = card.querySelector('img');
                    const attrs = Object.assign({{}}, pick(card, q.card_attributes), pick(img, q.image_attributes));
                    const text = (card.innerText || '').split('\n').map(s => s.trim()).find(s => s.length > 0);
                    return {{
                        href: link ? link.getAttribute('href') : null,
                        attributes: attrs,
                        title: (link && (link.getAttribute('title') || link.getAttribute('aria-label'))) || card.getAttribute('title') || null,
                        alt: img ? (img.getAttribute('alt') || null) : null,
                        text: text || null,
                    }};
                }});
            }})({})"#,
            serde_json::to_string(query).context("serializing card query")?
        );
        let value = self.execute_js(&script).await?;
        serde_json::from_value(value).context("malformed card snapshot")
    }
}

/// Quote a string as a JavaScript literal.
fn js_string(s: &str) -> Result<String> {
    serde_json::to_string(s).context("quoting script argument")
}

/// A no-op renderer used when Chromium is unavailable.
///
/// Catalog feeds work without a browser; scroll crawls fail fast with a
/// reported error.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available, catalog feeds only"))
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_contexts(&self) -> usize {
        0
    }
}
