//! Preview builder for markdown note trees.
//!
//! Scans a notes directory, renders every markdown file, and writes a single
//! self-contained HTML artifact that browses them.

pub mod artifact;
pub mod assets;
pub mod builder;
pub mod pipeline;
pub mod scanner;
pub mod state;

pub use artifact::{ArtifactEmitter, EmitError};
pub use builder::{BuildConfig, BuildReport, DocumentError, PreviewBuilder};
pub use pipeline::{PipelineError, PreviewPipeline};
pub use scanner::{scan, walk, ExclusionRules, ScanError, ScanResult, TreeNode};
pub use state::{PublishedState, RenderedDocument, StateStore};
