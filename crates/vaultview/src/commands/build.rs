//! One-shot build command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use vaultview_preview::PreviewPipeline;

use crate::config::ConfigFile;

/// Run the build command.
pub async fn run(config: &ConfigFile, root: PathBuf, output: Option<String>) -> Result<()> {
    tracing::info!("Building preview of {}...", root.display());

    let build = config.build_config(root, output);
    let pipeline = PreviewPipeline::new(&build).context("Failed to prepare the preview")?;
    let destination = pipeline.destination().to_path_buf();

    let report = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .context("Build task failed")?
        .context("Build failed")?;

    if report.degradations > 0 {
        tracing::warn!(
            "{} post-processing problems were worked around",
            report.degradations
        );
    }

    tracing::info!("Output: {}", destination.display());

    Ok(())
}
