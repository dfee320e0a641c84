//! Markdown rendering and post-processing for vaultview previews.
//!
//! This crate renders a note's markdown to HTML and then finalizes that HTML
//! for the single-file preview artifact: image references become
//! root-relative and mermaid fences become diagram containers.

pub mod diagrams;
pub mod frontmatter;
pub mod images;
pub mod postprocess;
pub mod render;

pub use frontmatter::{extract_frontmatter, FrontmatterError};
pub use images::{resolve_image_path, MAX_IMAGE_REWRITES};
pub use postprocess::{post_process, Degradation, Processed};
pub use render::{MarkdownRenderer, RenderError, RenderOptions, Renderer};
