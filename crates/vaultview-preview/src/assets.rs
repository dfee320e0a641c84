//! Stylesheet and viewer script embedded in the preview artifact.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

/// Errors from processing the embedded assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("CSS parse error: {0}")]
    Parse(String),

    #[error("CSS minify error: {0}")]
    Minify(String),
}

/// The artifact's stylesheet, minified on request.
pub fn stylesheet(minify: bool) -> Result<String, AssetError> {
    if minify {
        minify_css(SHELL_CSS)
    } else {
        Ok(SHELL_CSS.to_string())
    }
}

/// The artifact's viewer script.
pub fn viewer_script() -> &'static str {
    VIEWER_JS
}

/// Minify CSS using lightningcss.
pub fn minify_css(css: &str) -> Result<String, AssetError> {
    let stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| AssetError::Parse(e.to_string()))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| AssetError::Minify(e.to_string()))?;

    Ok(minified.code)
}

const SHELL_CSS: &str = r#"* {
  margin: 0;
  padding: 0;
  box-sizing: border-box;
}

body {
  font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, "Helvetica Neue", Arial, sans-serif;
  background: #1e1e1e;
  color: #d4d4d4;
  display: flex;
  height: 100vh;
  overflow: hidden;
}

/* Sidebar */
.sidebar {
  width: 300px;
  min-width: 300px;
  background: #252526;
  border-right: 1px solid #3e3e42;
  display: flex;
  flex-direction: column;
}

.sidebar-header {
  padding: 16px;
  border-bottom: 1px solid #3e3e42;
}

.sidebar-header h1 {
  font-size: 16px;
  font-weight: 600;
  margin-bottom: 12px;
}

.search-box {
  width: 100%;
  padding: 6px 10px;
  background: #3c3c3c;
  border: 1px solid #3e3e42;
  border-radius: 4px;
  color: #d4d4d4;
  font-size: 13px;
  outline: none;
}

.search-box:focus {
  border-color: #007acc;
}

.file-tree {
  flex: 1;
  overflow-y: auto;
  padding: 8px 0;
}

.tree-item {
  display: flex;
  align-items: center;
  gap: 6px;
  padding: 4px 8px;
  font-size: 13px;
  cursor: pointer;
  user-select: none;
  white-space: nowrap;
}

.tree-item:hover {
  background: #2a2d2e;
}

.tree-item.active {
  background: #094771;
  color: #ffffff;
}

.tree-item.folder {
  font-weight: 500;
}

.tree-item-icon {
  display: inline-block;
  width: 16px;
  text-align: center;
  font-size: 10px;
  transition: transform 0.2s;
}

.tree-item-icon.expanded {
  transform: rotate(90deg);
}

.tree-children.collapsed {
  display: none;
}

/* Content */
.content-area {
  flex: 1;
  display: flex;
  flex-direction: column;
  overflow: hidden;
}

.content-header {
  padding: 12px 24px;
  border-bottom: 1px solid #3e3e42;
  background: #252526;
}

.content-header h2 {
  font-size: 14px;
  font-weight: 400;
  color: #9d9d9d;
}

.content-body {
  flex: 1;
  overflow-y: auto;
  padding: 24px 48px;
}

.markdown-body {
  max-width: 900px;
  line-height: 1.7;
  font-size: 15px;
}

.markdown-body h1,
.markdown-body h2,
.markdown-body h3,
.markdown-body h4,
.markdown-body h5,
.markdown-body h6 {
  margin: 24px 0 12px;
  color: #ffffff;
  line-height: 1.3;
}

.markdown-body h1 {
  font-size: 2em;
  border-bottom: 1px solid #3e3e42;
  padding-bottom: 8px;
}

.markdown-body h2 {
  font-size: 1.5em;
  border-bottom: 1px solid #3e3e42;
  padding-bottom: 6px;
}

.markdown-body p,
.markdown-body ul,
.markdown-body ol,
.markdown-body blockquote,
.markdown-body table {
  margin-bottom: 16px;
}

.markdown-body ul,
.markdown-body ol {
  padding-left: 2em;
}

.markdown-body code {
  background: #2d2d30;
  padding: 2px 6px;
  border-radius: 3px;
  font-family: "Fira Code", Consolas, Monaco, monospace;
  font-size: 0.9em;
  color: #ce9178;
}

.markdown-body pre {
  background: #1e1e1e;
  border: 1px solid #3e3e42;
  border-radius: 6px;
  padding: 16px;
  overflow-x: auto;
  margin-bottom: 16px;
}

.markdown-body pre code {
  background: none;
  padding: 0;
  color: #d4d4d4;
}

.code-block-wrapper {
  position: relative;
  margin-bottom: 16px;
}

.code-block-header {
  display: flex;
  justify-content: space-between;
  align-items: center;
  padding: 6px 12px;
  background: #2d2d30;
  border: 1px solid #3e3e42;
  border-bottom: none;
  border-radius: 6px 6px 0 0;
  font-size: 12px;
  color: #9d9d9d;
}

.code-block-wrapper pre {
  margin-bottom: 0;
  border-radius: 0 0 6px 6px;
}

.copy-button {
  background: #3c3c3c;
  border: 1px solid #3e3e42;
  border-radius: 3px;
  color: #d4d4d4;
  padding: 2px 10px;
  font-size: 12px;
  cursor: pointer;
}

.copy-button:hover {
  background: #505050;
}

.copy-button.copied {
  background: #16825d;
  border-color: #16825d;
}

.markdown-body blockquote {
  border-left: 4px solid #007acc;
  padding: 4px 16px;
  color: #9d9d9d;
  background: #252526;
}

.markdown-body table {
  border-collapse: collapse;
  width: 100%;
}

.markdown-body th,
.markdown-body td {
  border: 1px solid #3e3e42;
  padding: 6px 12px;
}

.markdown-body th {
  background: #2d2d30;
}

.markdown-body tr:nth-child(even) {
  background: #252526;
}

.markdown-body a {
  color: #4ec9b0;
  text-decoration: none;
}

.markdown-body a:hover {
  text-decoration: underline;
}

.markdown-body img {
  max-width: 100%;
  border-radius: 4px;
}

.preview-image {
  cursor: zoom-in;
}

.render-error {
  color: #f48771;
}

/* Lightbox */
.image-modal {
  display: none;
  position: fixed;
  inset: 0;
  z-index: 1000;
  background: rgba(0, 0, 0, 0.9);
  align-items: center;
  justify-content: center;
  cursor: zoom-out;
}

.image-modal.active {
  display: flex;
}

.image-modal img {
  max-width: 95%;
  max-height: 95%;
  object-fit: contain;
}

.image-modal-close {
  position: absolute;
  top: 16px;
  right: 32px;
  font-size: 40px;
  color: #ffffff;
  cursor: pointer;
}

.empty-state {
  margin-top: 20vh;
  text-align: center;
  color: #6e6e6e;
}

.empty-state h3 {
  font-size: 20px;
  margin-bottom: 8px;
}

.hidden {
  display: none !important;
}

.mermaid {
  background: #252526;
  border-radius: 6px;
  padding: 16px;
  margin-bottom: 16px;
  text-align: center;
}
"#;

const VIEWER_JS: &str = r#"(function() {
  const tree = JSON.parse(document.getElementById('tree-data').textContent);
  const files = JSON.parse(document.getElementById('files-data').textContent);

  const treeContainer = document.getElementById('fileTree');
  const content = document.getElementById('markdownContent');
  const emptyState = document.getElementById('emptyState');
  const currentFile = document.getElementById('currentFile');

  if (typeof mermaid !== 'undefined') {
    mermaid.initialize({ startOnLoad: false, theme: 'dark' });
  }

  function setExpanded(icon, children, expanded) {
    icon.classList.toggle('expanded', expanded);
    children.classList.toggle('collapsed', !expanded);
  }

  function renderTree(nodes, container, level) {
    nodes.forEach(node => {
      const item = document.createElement('div');
      item.className = 'tree-item ' + (node.isDir ? 'folder' : 'file');
      item.style.paddingLeft = (level * 16 + 8) + 'px';

      const icon = document.createElement('span');
      icon.className = 'tree-item-icon';
      icon.textContent = node.isDir ? '▶' : '•';

      const name = document.createElement('span');
      name.textContent = node.name;

      item.appendChild(icon);
      item.appendChild(name);
      container.appendChild(item);

      if (node.isDir) {
        const children = document.createElement('div');
        children.className = 'tree-children collapsed';
        container.appendChild(children);
        renderTree(node.children || [], children, level + 1);

        item.addEventListener('click', () => {
          setExpanded(icon, children, children.classList.contains('collapsed'));
        });
      } else {
        item.addEventListener('click', () => {
          document.querySelectorAll('.tree-item.active').forEach(el => el.classList.remove('active'));
          item.classList.add('active');
          showFile(node.path);
        });
      }
    });
  }

  function showFile(path) {
    const html = files[path];

    if (html === undefined) {
      content.classList.add('hidden');
      emptyState.classList.remove('hidden');
      currentFile.textContent = 'File not found';
      return;
    }

    content.innerHTML = html;
    addCopyButtons(content);
    content.classList.remove('hidden');
    emptyState.classList.add('hidden');
    currentFile.textContent = path;

    if (typeof mermaid !== 'undefined') {
      mermaid.run({ nodes: content.querySelectorAll('.mermaid') });
    }
  }

  function addCopyButtons(container) {
    container.querySelectorAll('pre > code').forEach(code => {
      const pre = code.parentElement;

      let language = 'text';
      for (const cls of code.classList) {
        if (cls.startsWith('language-')) {
          language = cls.slice('language-'.length);
          break;
        }
      }

      const wrapper = document.createElement('div');
      wrapper.className = 'code-block-wrapper';

      const header = document.createElement('div');
      header.className = 'code-block-header';

      const label = document.createElement('span');
      label.className = 'language';
      label.textContent = language;

      const button = document.createElement('button');
      button.className = 'copy-button';
      button.textContent = 'Copy';
      button.addEventListener('click', async () => {
        try {
          await navigator.clipboard.writeText(code.textContent);
          button.textContent = 'Copied!';
          button.classList.add('copied');
        } catch (err) {
          button.textContent = 'Error';
        }
        setTimeout(() => {
          button.textContent = 'Copy';
          button.classList.remove('copied');
        }, 2000);
      });

      header.appendChild(label);
      header.appendChild(button);
      pre.parentNode.insertBefore(wrapper, pre);
      wrapper.appendChild(header);
      wrapper.appendChild(pre);
    });
  }

  window.openImageModal = function(src) {
    document.getElementById('modalImage').src = src;
    document.getElementById('imageModal').classList.add('active');
  };

  window.closeImageModal = function() {
    document.getElementById('imageModal').classList.remove('active');
  };

  document.addEventListener('keydown', e => {
    if (e.key === 'Escape') {
      window.closeImageModal();
    }
  });

  document.getElementById('searchBox').addEventListener('input', e => {
    const term = e.target.value.toLowerCase();

    document.querySelectorAll('.tree-item').forEach(item => {
      const matches = item.textContent.toLowerCase().includes(term);
      item.classList.toggle('hidden', !matches);

      // Reveal the folders holding a match.
      if (matches && term) {
        let parent = item.parentElement;
        while (parent && parent.classList.contains('tree-children')) {
          parent.classList.remove('collapsed');
          const folder = parent.previousElementSibling;
          if (folder) {
            folder.classList.remove('hidden');
            const icon = folder.querySelector('.tree-item-icon');
            if (icon) icon.classList.add('expanded');
          }
          parent = parent.parentElement;
        }
      }
    });
  });

  renderTree(tree, treeContainer, 0);
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stylesheet_covers_viewer_classes() {
        let css = stylesheet(false).unwrap();

        for class in [".preview-image", ".image-modal", ".mermaid", ".render-error", ".copy-button"] {
            assert!(css.contains(class), "missing {}", class);
        }
    }

    #[test]
    fn viewer_script_defines_lightbox() {
        let js = viewer_script();

        assert!(js.contains("window.openImageModal"));
        assert!(js.contains("window.closeImageModal"));
        assert!(js.contains("clipboard"));
        assert!(js.contains("'tree-data'"));
        assert!(js.contains("'files-data'"));
    }

    #[test]
    fn viewer_script_cannot_close_its_element() {
        assert!(!viewer_script().contains("</script"));
    }

    #[test]
    fn minifies_stylesheet() {
        let minified = stylesheet(true).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".preview-image"));
        assert!(minified.len() < SHELL_CSS.len());
    }

    #[test]
    fn minifies_css() {
        let css = r#"
.tree-item {
    background-color: blue;
    padding: 10px;
}
        "#;

        let minified = minify_css(css).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".tree-item"));
    }
}
