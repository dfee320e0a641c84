//! The single-file HTML artifact.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use minijinja::{context, Environment};

use crate::assets::{self, AssetError};
use crate::state::PublishedState;

/// Client-side diagram renderer loaded by the artifact.
pub const MERMAID_CDN: &str = "https://cdnjs.cloudflare.com/ajax/libs/mermaid/11.12.0/mermaid.min.js";

const SHELL_NAME: &str = "index.html";

/// Errors that can occur when emitting the artifact.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("Failed to serialize preview data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Renders published state into the artifact and writes it to disk.
pub struct ArtifactEmitter {
    env: Environment<'static>,
    title: String,
    stylesheet: String,
}

impl ArtifactEmitter {
    /// Create an emitter; the stylesheet is prepared once here.
    pub fn new(title: impl Into<String>, minify: bool) -> Result<Self, EmitError> {
        let mut env = Environment::new();
        env.add_template(SHELL_NAME, SHELL_TEMPLATE)?;

        Ok(Self {
            env,
            title: title.into(),
            stylesheet: assets::stylesheet(minify)?,
        })
    }

    /// Render the artifact for `state`.
    pub fn render(&self, state: &PublishedState) -> Result<String, EmitError> {
        let tree = script_json(&state.tree.children)?;
        let files: BTreeMap<&str, &str> = state
            .documents
            .iter()
            .map(|(path, doc)| (path.as_str(), doc.html.as_str()))
            .collect();
        let files = script_json(&files)?;

        let tmpl = self.env.get_template(SHELL_NAME)?;

        Ok(tmpl.render(context! {
            title => &self.title,
            stylesheet => &self.stylesheet,
            mermaid_src => MERMAID_CDN,
            tree_json => tree,
            files_json => files,
            viewer => assets::viewer_script(),
        })?)
    }

    /// Render the artifact for `state` and replace `destination` with it.
    ///
    /// The content goes to a hidden sibling first and is renamed into
    /// place, so the previous artifact survives any failure.
    pub fn emit(&self, state: &PublishedState, destination: &Path) -> Result<(), EmitError> {
        let html = self.render(state)?;
        let tmp = temp_path(destination);

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| EmitError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        if let Err(source) = fs::write(&tmp, html) {
            let _ = fs::remove_file(&tmp);
            return Err(EmitError::Write { path: tmp, source });
        }

        if let Err(source) = fs::rename(&tmp, destination) {
            let _ = fs::remove_file(&tmp);
            return Err(EmitError::Write {
                path: destination.to_path_buf(),
                source,
            });
        }

        tracing::debug!(
            "Wrote {} (generation {})",
            destination.display(),
            state.generation
        );

        Ok(())
    }
}

/// Hidden sibling that `destination` is written through.
pub fn temp_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| SHELL_NAME.to_string());
    destination.with_file_name(format!(".{}.tmp", name))
}

/// Serialize `value` so it can sit inside a `<script>` element.
fn script_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}

const SHELL_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{{ title }}</title>
  <style>{{ stylesheet | safe }}</style>
  <script src="{{ mermaid_src | safe }}"></script>
</head>
<body>
  <div class="sidebar">
    <div class="sidebar-header">
      <h1>{{ title }}</h1>
      <input type="text" class="search-box" id="searchBox" placeholder="Search files...">
    </div>
    <div class="file-tree" id="fileTree"></div>
  </div>
  <div class="content-area">
    <div class="content-header">
      <h2 id="currentFile">Select a file</h2>
    </div>
    <div class="content-body">
      <div class="empty-state" id="emptyState">
        <h3>Pick a note from the sidebar</h3>
        <p>Choose a markdown file to preview it here.</p>
      </div>
      <div class="markdown-body hidden" id="markdownContent"></div>
    </div>
  </div>
  <div class="image-modal" id="imageModal" onclick="closeImageModal()">
    <span class="image-modal-close" onclick="closeImageModal()">&times;</span>
    <img id="modalImage" src="" alt="Image preview">
  </div>
  <script type="application/json" id="tree-data">{{ tree_json | safe }}</script>
  <script type="application/json" id="files-data">{{ files_json | safe }}</script>
  <script>{{ viewer | safe }}</script>
</body>
</html>
"##;
