//! Source tree scanning.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

/// Extension (case-insensitive) of files included in the preview.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Directory names that are never scanned or watched.
pub const DEFAULT_RESERVED_DIRS: &[&str] = &[".git", "node_modules"];

/// One entry of the preview tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    /// Display label (the file or directory name)
    pub name: String,

    /// Root-relative, `/`-separated path; also the document key
    pub path: String,

    /// Whether this is a directory
    #[serde(rename = "isDir")]
    pub is_dir: bool,

    /// Ordered children; always empty for files
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// The root node; its path is `.` and its children carry no prefix.
    pub fn root() -> Self {
        Self::directory(".", ".")
    }

    fn directory(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            is_dir: true,
            children: Vec::new(),
        }
    }

    fn file(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            is_dir: false,
            children: Vec::new(),
        }
    }

    /// Find a node by its root-relative path.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(path))
    }
}

/// Which entries are left out of scanning and watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRules {
    reserved: BTreeSet<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ExclusionRules {
    /// Default rules plus extra reserved directory names.
    pub fn new<I, S>(extra_reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reserved: BTreeSet<String> =
            DEFAULT_RESERVED_DIRS.iter().map(|s| s.to_string()).collect();
        reserved.extend(extra_reserved.into_iter().map(Into::into));
        Self { reserved }
    }

    /// Hidden entries start with `.`; `.` itself is the root marker.
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('.') && name != "."
    }

    /// Whether a directory entry is skipped.
    pub fn excludes(&self, name: &str, is_dir: bool) -> bool {
        Self::is_hidden(name) || (is_dir && self.reserved.contains(name))
    }

    /// Whether a root-relative path lies in (or is) an excluded entry.
    ///
    /// Every component is checked, so anything beneath a hidden or reserved
    /// directory is excluded too.
    pub fn excludes_path(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(name) => name
                .to_str()
                .is_some_and(|name| Self::is_hidden(name) || self.reserved.contains(name)),
            _ => false,
        })
    }
}

/// Whether a file name has the markdown extension.
pub fn is_markdown(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
}

/// Result of scanning a source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Root node of the pruned, ordered tree
    pub tree: TreeNode,

    /// Every markdown path in traversal order
    pub files: Vec<String>,
}

/// Errors that can occur when scanning.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to read root directory {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Walk `root` in tree order without entering excluded entries.
///
/// Directories come before files at each level, then names in byte order.
/// Symlinks are listed but never followed, which rules out cycles. Entries
/// with non UTF-8 names are skipped.
pub fn walk<'a>(
    root: &Path,
    rules: &'a ExclusionRules,
) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by(|a, b| {
            b.file_type()
                .is_dir()
                .cmp(&a.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(move |entry| {
            entry.depth() == 0
                || entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| !rules.excludes(name, entry.file_type().is_dir()))
        })
}

/// Scan `root` into a tree of markdown files.
///
/// Only an unreadable root is an error. Unreadable subdirectories are
/// pruned like empty ones.
pub fn scan(root: &Path, rules: &ExclusionRules) -> Result<ScanResult, ScanError> {
    fs::read_dir(root).map_err(|source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    // Open directories from the root down; index == walk depth.
    let mut open = vec![TreeNode::root()];

    for entry in walk(root, rules) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        while open.len() > entry.depth() {
            close_directory(&mut open);
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let parent = &open[open.len() - 1];
        let path = if parent.path == "." {
            name.to_string()
        } else {
            format!("{}/{}", parent.path, name)
        };

        if entry.file_type().is_dir() {
            open.push(TreeNode::directory(name, &path));
        } else if is_markdown(name) {
            files.push(path.clone());
            let last = open.len() - 1;
            open[last].children.push(TreeNode::file(name, &path));
        }
    }

    while open.len() > 1 {
        close_directory(&mut open);
    }
    let tree = open.pop().unwrap_or_else(TreeNode::root);

    Ok(ScanResult { tree, files })
}

/// Pop the innermost open directory, keeping it only if it holds markdown.
fn close_directory(open: &mut Vec<TreeNode>) {
    let Some(node) = open.pop() else {
        return;
    };
    if node.children.is_empty() {
        return;
    }
    if let Some(parent) = open.last_mut() {
        parent.children.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# note").unwrap();
    }

    fn names(node: &TreeNode) -> Vec<&str> {
        node.children.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn builds_ordered_tree() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "zeta.md");
        touch(temp.path(), "Alpha.md");
        touch(temp.path(), "beta/one.md");
        touch(temp.path(), "Gamma/two.md");

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        // Directories first, then files; byte order puts uppercase first.
        assert_eq!(names(&result.tree), vec!["Gamma", "beta", "Alpha.md", "zeta.md"]);
        assert_eq!(
            result.files,
            vec!["Gamma/two.md", "beta/one.md", "Alpha.md", "zeta.md"]
        );
    }

    #[test]
    fn builds_root_relative_paths() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "notes/sub/page.md");

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        assert_eq!(result.tree.path, ".");
        let notes = &result.tree.children[0];
        assert_eq!(notes.path, "notes");
        assert_eq!(notes.children[0].path, "notes/sub");
        assert_eq!(notes.children[0].children[0].path, "notes/sub/page.md");
        assert!(result.tree.find("notes/sub/page.md").is_some());
    }

    #[test]
    fn prunes_directories_without_markdown() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "keep/note.md");
        fs::create_dir_all(temp.path().join("empty/nested/deeper")).unwrap();
        fs::create_dir_all(temp.path().join("assets")).unwrap();
        fs::write(temp.path().join("assets/img.png"), b"png").unwrap();

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        assert_eq!(names(&result.tree), vec!["keep"]);
        assert!(result.tree.find("empty").is_none());
        assert!(result.tree.find("assets").is_none());
    }

    #[test]
    fn skips_hidden_and_reserved_entries() {
        let temp = tempdir().unwrap();
        touch(temp.path(), ".obsidian/workspace.md");
        touch(temp.path(), ".git/notes.md");
        touch(temp.path(), "node_modules/pkg/README.md");
        touch(temp.path(), ".hidden.md");
        touch(temp.path(), "visible.md");

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        assert_eq!(names(&result.tree), vec!["visible.md"]);
        assert_eq!(result.files, vec!["visible.md"]);
    }

    #[test]
    fn honours_extra_reserved_names() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "target/doc.md");
        touch(temp.path(), "notes/doc.md");

        let rules = ExclusionRules::new(["target"]);
        let result = scan(temp.path(), &rules).unwrap();

        assert_eq!(result.files, vec!["notes/doc.md"]);
    }

    #[test]
    fn matches_extension_case_insensitively() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "UPPER.MD");
        touch(temp.path(), "mixed.Md");
        touch(temp.path(), "notes.txt");
        touch(temp.path(), "markdown.mdx");

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        assert_eq!(result.files, vec!["UPPER.MD", "mixed.Md"]);
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("missing");

        let result = scan(&missing, &ExclusionRules::default());

        assert!(matches!(result, Err(ScanError::RootUnreadable { .. })));
    }

    #[test]
    fn empty_root_yields_empty_tree() {
        let temp = tempdir().unwrap();

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        assert!(result.tree.children.is_empty());
        assert!(result.files.is_empty());
    }

    #[test]
    fn excludes_paths_beneath_hidden_directories() {
        let rules = ExclusionRules::default();

        assert!(rules.excludes_path(Path::new(".git/objects/ab")));
        assert!(rules.excludes_path(Path::new("notes/node_modules/x.md")));
        assert!(rules.excludes_path(Path::new("notes/.draft.md")));
        assert!(!rules.excludes_path(Path::new("notes/draft.md")));
        assert!(!rules.excludes_path(Path::new("./notes/draft.md")));
    }

    #[test]
    fn serializes_like_the_viewer_expects() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "dir/a.md");

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();
        let json = serde_json::to_string(&result.tree.children).unwrap();

        assert_eq!(
            json,
            r#"[{"name":"dir","path":"dir","isDir":true,"children":[{"name":"a.md","path":"dir/a.md","isDir":false}]}]"#
        );
    }

    #[test]
    fn walk_never_enters_excluded_directories() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "b/note.md");
        touch(temp.path(), ".git/objects/x.md");
        touch(temp.path(), "a.md");

        let rules = ExclusionRules::default();
        let seen: Vec<PathBuf> = walk(temp.path(), &rules)
            .filter_map(Result::ok)
            .filter(|entry| entry.depth() > 0)
            .map(|entry| entry.path().strip_prefix(temp.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            seen,
            vec![
                PathBuf::from("b"),
                PathBuf::from("b/note.md"),
                PathBuf::from("a.md"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn does_not_follow_directory_symlinks() {
        let temp = tempdir().unwrap();
        touch(temp.path(), "notes/a.md");
        std::os::unix::fs::symlink(temp.path(), temp.path().join("notes/loop")).unwrap();

        let result = scan(temp.path(), &ExclusionRules::default()).unwrap();

        assert_eq!(result.files, vec!["notes/a.md"]);
    }
}
