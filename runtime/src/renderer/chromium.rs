// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::stealth::{self, LAUNCH_ARGS, WINDOW_HEIGHT, WINDOW_WIDTH};
use super::{NavigationResult, RenderContext, Renderer};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EventResponseReceived, ResourceType};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Find the Chromium binary path.
///
/// Order: `SHOPLENS_CHROMIUM_PATH`, `~/.shoplens/chromium/`, then the
/// system `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("SHOPLENS_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let root = home.join(".shoplens/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                root.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                root.join("chrome"),
            ]
        } else {
            vec![root.join("chrome-linux64/chrome"), root.join("chrome")]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch Chromium. `chromium_path` overrides discovery.
    pub async fn launch(chromium_path: Option<&Path>, headless: bool) -> Result<Self> {
        let chrome_path = match chromium_path {
            Some(p) => p.to_path_buf(),
            None => find_chromium()
                .context("Chromium not found. Set SHOPLENS_CHROMIUM_PATH or install Chrome.")?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .viewport(None::<Viewport>)
            .args(LAUNCH_ARGS.iter().copied());
        builder = if headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("browser handler: {e}");
                }
            }
        });

        tracing::info!(headless, "Chromium launched");
        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        stealth::prepare_page(&page).await?;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("failed to subscribe to network responses")?;
        let sink = Arc::clone(&captured);
        tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let is_image = event.r#type == ResourceType::Image
                    || event.response.mime_type.starts_with("image/");
                if is_image {
                    if let Ok(mut urls) = sink.lock() {
                        urls.push(event.response.url.clone());
                    }
                }
            }
        });

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            captured,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // Browser is dropped when ChromiumRenderer is dropped
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Launches Chromium on the first context request, so searches served by a
/// catalog feed never start a browser.
pub struct LazyChromiumRenderer {
    chromium_path: Option<PathBuf>,
    headless: bool,
    inner: tokio::sync::OnceCell<ChromiumRenderer>,
}

impl LazyChromiumRenderer {
    pub fn new(chromium_path: Option<PathBuf>, headless: bool) -> Self {
        Self {
            chromium_path,
            headless,
            inner: tokio::sync::OnceCell::new(),
        }
    }

    async fn renderer(&self) -> Result<&ChromiumRenderer> {
        self.inner
            .get_or_try_init(|| ChromiumRenderer::launch(self.chromium_path.as_deref(), self.headless))
            .await
    }
}

#[async_trait]
impl Renderer for LazyChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.renderer().await?.new_context().await
    }

    async fn shutdown(&self) -> Result<()> {
        match self.inner.get() {
            Some(r) => r.shutdown().await,
            None => Ok(()),
        }
    }

    fn active_contexts(&self) -> usize {
        self.inner.get().map(|r| r.active_contexts()).unwrap_or(0)
    }
}

/// A single Chromium page with its network capture log.
pub struct ChromiumContext {
    page: Page,
    captured: Arc<Mutex<Vec<String>>>,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(timeout_ms),
            self.page.goto(url),
        )
        .await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(_)) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("JS execution failed")?;

        // Scripts returning undefined yield no value.
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn get_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .context("failed to get URL")?
            .unwrap_or_default();
        Ok(url)
    }

    fn captured_images(&self) -> Vec<String> {
        self.captured
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}
