//! Output helpers shared by the subcommands.
//!
//! Global flags are passed through the environment so any module can check
//! them without threading arguments.

use std::time::Duration;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::progress::ProgressTracker;

pub fn is_json() -> bool {
    std::env::var_os("SHOPLENS_JSON").is_some()
}

pub fn is_quiet() -> bool {
    std::env::var_os("SHOPLENS_QUIET").is_some()
}

/// Pretty-print `value` as JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}

/// Print a line unless `--quiet` or `--json` is set.
pub fn status(msg: &str) {
    if !is_quiet() && !is_json() {
        println!("{msg}");
    }
}

/// Spinner on stderr, hidden in quiet and JSON modes.
pub fn spinner(initial: &str) -> ProgressBar {
    if is_quiet() || is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(initial.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Mirror a tracker's progress feed onto `bar` until it reports done.
pub fn follow(tracker: &ProgressTracker, bar: &ProgressBar, interval: Duration) -> JoinHandle<()> {
    let feed = tracker.feed(interval);
    let bar = bar.clone();
    tokio::spawn(async move {
        let mut feed = Box::pin(feed);
        while let Some(snapshot) = feed.next().await {
            if snapshot.count > 0 {
                bar.set_message(format!("{} [{}]", snapshot.message, snapshot.count));
            } else {
                bar.set_message(snapshot.message);
            }
        }
    })
}

/// Shorten `s` to `max` characters for table output.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
