//! Post-processing of rendered note HTML for the preview artifact.

use crate::diagrams::extract_diagrams;
use crate::images::rewrite_images;

/// A recoverable problem met while post-processing a document.
///
/// The document is still produced; the affected part is left as rendered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Degradation {
    #[error("unterminated image tag at byte {offset}; the rest of the document was left as rendered")]
    MalformedTag { offset: usize },

    #[error("more than {limit} images; image references were left as rendered")]
    IterationLimit { limit: usize },

    #[error("unclosed diagram block at byte {offset}; later diagrams were left as code")]
    UnclosedDiagram { offset: usize },
}

/// Result of post-processing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    /// Final HTML fragment
    pub html: String,

    /// Problems that were worked around, in the order they occurred
    pub degradations: Vec<Degradation>,
}

/// Finalize the rendered HTML of the note at `source_path` (root-relative).
///
/// Rewrites image references so they resolve from the vault root and turns
/// mermaid code blocks into diagram containers. Pure: no I/O and no logging;
/// callers decide what to do with [`Processed::degradations`].
pub fn post_process(html: &str, source_path: &str) -> Processed {
    let mut degradations = Vec::new();

    let (html, degradation) = rewrite_images(html, source_path);
    degradations.extend(degradation);

    let (html, degradation) = extract_diagrams(&html);
    degradations.extend(degradation);

    Processed { html, degradations }
}
