//! `shoplens config`: print the resolved configuration.

use anyhow::Result;

use super::output::print_json;
use crate::config::RuntimeConfig;

/// Always JSON; the configuration has no useful table form.
pub async fn run(config: &RuntimeConfig) -> Result<()> {
    print_json(config);
    Ok(())
}
