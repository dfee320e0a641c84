//! Preview builder: scan, render and publish.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use vaultview_markdown::{post_process, MarkdownRenderer, RenderError, RenderOptions, Renderer};

use crate::scanner::{scan, ExclusionRules, ScanError};
use crate::state::{RenderedDocument, StateStore};

/// Configuration for building a preview.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root directory of the notes
    pub root: PathBuf,

    /// Artifact file name, written inside `root`
    pub output: String,

    /// Page title of the artifact
    pub title: String,

    /// Minify the artifact's stylesheet
    pub minify: bool,

    /// Extra directory names to leave out, on top of `.git` and `node_modules`
    pub exclude: Vec<String>,

    /// Markdown rendering options
    pub render: RenderOptions,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output: "index.html".to_string(),
            title: "Notes".to_string(),
            minify: true,
            exclude: Vec::new(),
            render: RenderOptions::default(),
        }
    }
}

impl BuildConfig {
    /// Exclusion rules for this configuration.
    pub fn rules(&self) -> ExclusionRules {
        ExclusionRules::new(self.exclude.iter().cloned())
    }

    /// Full path of the artifact.
    pub fn destination(&self) -> PathBuf {
        self.root.join(&self.output)
    }
}

/// Result of a build operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Generation of the published state
    pub generation: u64,

    /// Number of documents published
    pub documents: usize,

    /// Documents published as error messages
    pub failed: usize,

    /// Post-processing problems worked around
    pub degradations: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,
}

/// Errors for a single document. Never fatal to a build.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Builds the preview state from a source root.
pub struct PreviewBuilder<R: Renderer = MarkdownRenderer> {
    root: PathBuf,
    rules: ExclusionRules,
    renderer: R,
    store: Arc<StateStore>,
}

impl PreviewBuilder<MarkdownRenderer> {
    /// Create a builder using the markdown renderer from `config`.
    pub fn from_config(config: &BuildConfig, store: Arc<StateStore>) -> Self {
        Self::new(
            config.root.clone(),
            config.rules(),
            MarkdownRenderer::new(config.render.clone()),
            store,
        )
    }
}

impl<R: Renderer> PreviewBuilder<R> {
    /// Create a new builder.
    pub fn new(root: PathBuf, rules: ExclusionRules, renderer: R, store: Arc<StateStore>) -> Self {
        Self {
            root,
            rules,
            renderer,
            store,
        }
    }

    /// Source root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exclusion rules used when scanning.
    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }

    /// The store builds are published to.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Run a full build and publish the result.
    ///
    /// Fails only if the root cannot be scanned; a document that cannot be
    /// read or rendered is published as an inline error message.
    pub fn build(&self) -> Result<BuildReport, ScanError> {
        let start = Instant::now();

        let scanned = scan(&self.root, &self.rules)?;
        let total = scanned.files.len();
        let processed = AtomicUsize::new(0);
        let degradations = AtomicUsize::new(0);

        // Render documents in parallel
        let documents: BTreeMap<String, RenderedDocument> = scanned
            .files
            .par_iter()
            .map(|path| {
                let document = match self.render_document(path) {
                    Ok(processed) => {
                        for degradation in &processed.degradations {
                            tracing::warn!("{}: {}", path, degradation);
                        }
                        degradations.fetch_add(processed.degradations.len(), Ordering::Relaxed);
                        RenderedDocument {
                            path: path.clone(),
                            html: processed.html,
                            failed: false,
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to render {}: {}", path, e);
                        RenderedDocument {
                            path: path.clone(),
                            html: error_fragment(&e),
                            failed: true,
                        }
                    }
                };

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if done == 1 || done % 10 == 0 {
                    tracing::info!("Processed {}/{}: {}", done, total, path);
                }

                (path.clone(), document)
            })
            .collect();

        let state = self.store.publish(scanned.tree, documents);

        let report = BuildReport {
            generation: state.generation,
            documents: state.documents.len(),
            failed: state.failed_count(),
            degradations: degradations.into_inner(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        tracing::debug!(?report, "Published preview state");

        Ok(report)
    }

    fn render_document(&self, path: &str) -> Result<vaultview_markdown::Processed, DocumentError> {
        let source = fs::read(self.root.join(path)).map_err(|source| DocumentError::Read {
            path: path.to_string(),
            source,
        })?;

        let html = self.renderer.render_bytes(&source)?;

        Ok(post_process(&html, path))
    }
}

/// One-line HTML message shown in place of a document that failed.
fn error_fragment(error: &DocumentError) -> String {
    format!(
        "<p class=\"render-error\">Render error: {}</p>",
        escape_html(&error.to_string())
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
