//! Environment readiness check.

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use serde::Serialize;

use super::output::{is_json, print_json};
use crate::config::RuntimeConfig;
use crate::renderer::chromium::find_chromium;

#[derive(Debug, Serialize)]
struct Report {
    os: &'static str,
    arch: &'static str,
    chromium: Option<String>,
    clip_visual_model: Option<String>,
    clip_text_model: Option<String>,
    clip_tokenizer: Option<String>,
    available_memory_mb: Option<u64>,
    /// Scroll crawling needs Chromium; catalog feeds do not.
    browser_ready: bool,
    /// CLIP is installed; otherwise the colour-histogram fallback is used.
    semantic_ready: bool,
}

fn existing(path: Option<&Path>) -> Option<String> {
    path.filter(|p| p.exists()).map(|p| p.display().to_string())
}

fn check(config: &RuntimeConfig) -> Report {
    let chromium = config
        .chromium_path
        .clone()
        .filter(|p| p.exists())
        .or_else(find_chromium)
        .map(|p| p.display().to_string());
    let clip_visual_model = existing(config.clip_visual_model.as_deref());
    Report {
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        browser_ready: chromium.is_some(),
        semantic_ready: clip_visual_model.is_some(),
        chromium,
        clip_visual_model,
        clip_text_model: existing(config.clip_text_model.as_deref()),
        clip_tokenizer: existing(config.clip_tokenizer.as_deref()),
        available_memory_mb: get_available_memory_mb(),
    }
}

fn line(ok: bool, what: &str, detail: &str) {
    println!("{} {what}: {detail}", if ok { "[OK]" } else { "[!!]" });
}

/// Check Chromium, the CLIP model files and available memory.
pub async fn run(config: &RuntimeConfig) -> Result<()> {
    let report = check(config);
    if is_json() {
        print_json(&report);
        return Ok(());
    }

    println!("Shoplens Doctor");
    println!("===============");
    println!();
    println!("OS:   {}", report.os);
    println!("Arch: {}", report.arch);
    println!();

    match &report.chromium {
        Some(p) => line(true, "Chromium", p),
        None => line(
            false,
            "Chromium",
            "not found. Set SHOPLENS_CHROMIUM_PATH; catalog feeds still work",
        ),
    }
    match &report.clip_visual_model {
        Some(p) => line(true, "CLIP visual model", p),
        None => line(
            false,
            "CLIP visual model",
            "not found, the colour-histogram fallback will be used",
        ),
    }
    match &report.clip_text_model {
        Some(p) => line(true, "CLIP text model", p),
        None => line(false, "CLIP text model", "not found, --hybrid falls back to image-only"),
    }
    match report.available_memory_mb {
        Some(mb) if mb >= 512 => line(true, "Available memory", &format!("{mb}MB")),
        Some(mb) => line(false, "Available memory", &format!("{mb}MB (< 512MB, may be insufficient)")),
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    let status = match (report.browser_ready, report.semantic_ready) {
        (true, true) => "READY",
        (false, false) => "DEGRADED (catalog feeds only, histogram matching)",
        (false, true) => "DEGRADED (catalog feeds only)",
        (true, false) => "DEGRADED (histogram matching)",
    };
    println!("Status: {status}");
    Ok(())
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        s.lines()
            .find(|line| line.starts_with("Mem:"))
            .and_then(|line| line.split_whitespace().nth(6))
            .and_then(|v| v.parse().ok())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
