//! Build plus emit, as one step.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use vaultview_markdown::{MarkdownRenderer, Renderer};

use crate::artifact::{ArtifactEmitter, EmitError};
use crate::builder::{BuildConfig, BuildReport, PreviewBuilder};
use crate::scanner::{ExclusionRules, ScanError};
use crate::state::StateStore;

/// Errors from a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// Owns the state store and turns the source root into the artifact.
pub struct PreviewPipeline<R: Renderer = MarkdownRenderer> {
    builder: PreviewBuilder<R>,
    emitter: ArtifactEmitter,
    destination: PathBuf,
}

impl PreviewPipeline<MarkdownRenderer> {
    /// Create a pipeline from build configuration.
    pub fn new(config: &BuildConfig) -> Result<Self, EmitError> {
        Self::with_renderer(config, MarkdownRenderer::new(config.render.clone()))
    }
}

impl<R: Renderer> PreviewPipeline<R> {
    /// Create a pipeline with a custom renderer.
    pub fn with_renderer(config: &BuildConfig, renderer: R) -> Result<Self, EmitError> {
        let store = Arc::new(StateStore::new());
        let builder = PreviewBuilder::new(config.root.clone(), config.rules(), renderer, store);

        Ok(Self {
            builder,
            emitter: ArtifactEmitter::new(config.title.clone(), config.minify)?,
            destination: config.destination(),
        })
    }

    /// Build, publish, then write the published snapshot to the artifact.
    pub fn run(&self) -> Result<BuildReport, PipelineError> {
        let report = self.builder.build()?;

        let snapshot = self.builder.store().snapshot();
        self.emitter.emit(&snapshot, &self.destination)?;

        if report.failed > 0 {
            tracing::warn!(
                "Built {} documents ({} failed) in {}ms",
                report.documents,
                report.failed,
                report.duration_ms
            );
        } else {
            tracing::info!(
                "Built {} documents in {}ms",
                report.documents,
                report.duration_ms
            );
        }

        Ok(report)
    }

    /// The store builds are published to.
    pub fn store(&self) -> &Arc<StateStore> {
        self.builder.store()
    }

    /// Where the artifact is written.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Source root.
    pub fn root(&self) -> &Path {
        self.builder.root()
    }

    /// Exclusion rules used for scanning.
    pub fn rules(&self) -> &ExclusionRules {
        self.builder.rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::temp_path;
    use std::fs;
    use tempfile::tempdir;

    fn config(root: &Path) -> BuildConfig {
        BuildConfig {
            root: root.to_path_buf(),
            minify: false,
            ..Default::default()
        }
    }

    #[test]
    fn run_writes_artifact() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("hello.md"), "# Hello").unwrap();

        let pipeline = PreviewPipeline::new(&config(temp.path())).unwrap();
        let report = pipeline.run().unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(pipeline.destination(), temp.path().join("index.html"));

        let artifact = fs::read_to_string(pipeline.destination()).unwrap();
        assert!(artifact.contains(r#""path":"hello.md""#));
        assert!(artifact.contains("Hello"));
        assert!(!temp_path(pipeline.destination()).exists());
    }

    #[test]
    fn artifact_is_not_scanned_as_a_note() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();

        let pipeline = PreviewPipeline::new(&config(temp.path())).unwrap();
        pipeline.run().unwrap();
        let report = pipeline.run().unwrap();

        assert_eq!(report.generation, 2);
        assert_eq!(report.documents, 1);
    }

    #[test]
    fn custom_output_name() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();

        let pipeline = PreviewPipeline::new(&BuildConfig {
            output: "preview.html".to_string(),
            ..config(temp.path())
        })
        .unwrap();
        pipeline.run().unwrap();

        assert!(temp.path().join("preview.html").exists());
        assert!(!temp.path().join("index.html").exists());
    }

    #[test]
    fn missing_root_is_scan_error() {
        let temp = tempdir().unwrap();

        let pipeline = PreviewPipeline::new(&config(&temp.path().join("missing"))).unwrap();

        assert!(matches!(pipeline.run(), Err(PipelineError::Scan(_))));
    }
}
