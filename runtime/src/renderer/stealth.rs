// Copyright 2026 Shoplens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session setup that keeps retail bot filters from flagging the browser.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;

use crate::acquisition::http_client::USER_AGENT;

pub const WINDOW_WIDTH: u32 = 1920;
pub const WINDOW_HEIGHT: u32 = 1080;

/// Launch flags added to every Chromium instance.
pub const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-extensions",
    "--lang=en-US",
];

/// Hides `navigator.webdriver` before any page script runs.
pub const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Apply the user agent and init script to a fresh page.
pub async fn prepare_page(page: &Page) -> Result<()> {
    page.set_user_agent(SetUserAgentOverrideParams::new(USER_AGENT))
        .await
        .context("failed to set user agent")?;
    page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(HIDE_WEBDRIVER))
        .await
        .context("failed to install init script")?;
    Ok(())
}
