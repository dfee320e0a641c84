//! Published preview state.
//!
//! A build assembles its tree and documents privately and then swaps the
//! finished snapshot in. Readers clone an `Arc` and never observe a build in
//! progress.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::scanner::TreeNode;

/// Final HTML for one markdown file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
    /// Root-relative path, same key as the tree node
    pub path: String,

    /// Post-processed fragment, or an inline error message
    pub html: String,

    /// Whether `html` is an error message
    pub failed: bool,
}

/// An immutable snapshot of tree plus documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedState {
    /// 0 before the first build, then incremented on every publish
    pub generation: u64,

    /// Root of the scanned tree
    pub tree: TreeNode,

    /// Rendered documents by path
    pub documents: BTreeMap<String, RenderedDocument>,
}

impl PublishedState {
    /// The state visible before any build has completed.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            tree: TreeNode::root(),
            documents: BTreeMap::new(),
        }
    }

    /// Look up a document by path.
    pub fn document(&self, path: &str) -> Option<&RenderedDocument> {
        self.documents.get(path)
    }

    /// Number of documents that failed to render.
    pub fn failed_count(&self) -> usize {
        self.documents.values().filter(|doc| doc.failed).count()
    }
}

/// Holder of the current [`PublishedState`].
#[derive(Debug)]
pub struct StateStore {
    current: RwLock<Arc<PublishedState>>,
    generation: AtomicU64,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create a store holding the empty state.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(PublishedState::empty())),
            generation: AtomicU64::new(0),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<PublishedState> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot with a new one built from `tree` and
    /// `documents`, returning it.
    pub fn publish(
        &self,
        tree: TreeNode,
        documents: BTreeMap<String, RenderedDocument>,
    ) -> Arc<PublishedState> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::new(PublishedState {
            generation,
            tree,
            documents,
        });

        *self.current.write() = Arc::clone(&state);

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, html: &str) -> (String, RenderedDocument) {
        (
            path.to_string(),
            RenderedDocument {
                path: path.to_string(),
                html: html.to_string(),
                failed: false,
            },
        )
    }

    #[test]
    fn starts_with_empty_state() {
        let store = StateStore::new();

        let snapshot = store.snapshot();

        assert_eq!(snapshot.generation, 0);
        assert!(snapshot.documents.is_empty());
        assert!(snapshot.tree.children.is_empty());
    }

    #[test]
    fn publish_replaces_snapshot() {
        let store = StateStore::new();

        let first = store.publish(TreeNode::root(), BTreeMap::from([doc("a.md", "<p>a</p>")]));
        let second = store.publish(TreeNode::root(), BTreeMap::from([doc("b.md", "<p>b</p>")]));

        assert_eq!(first.generation, 1);
        assert_eq!(second.generation, 2);

        let current = store.snapshot();
        assert_eq!(current.generation, 2);
        assert!(current.document("a.md").is_none());
        assert!(current.document("b.md").is_some());
    }

    #[test]
    fn old_snapshots_stay_intact() {
        let store = StateStore::new();
        store.publish(TreeNode::root(), BTreeMap::from([doc("a.md", "<p>a</p>")]));

        let held = store.snapshot();
        store.publish(TreeNode::root(), BTreeMap::new());

        assert_eq!(held.document("a.md").unwrap().html, "<p>a</p>");
        assert!(store.snapshot().documents.is_empty());
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(StateStore::new());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let snapshot = store.snapshot();
                        // Every published snapshot holds exactly `generation` documents.
                        assert_eq!(snapshot.documents.len() as u64, snapshot.generation);
                    }
                })
            })
            .collect();

        for n in 1..=50u64 {
            let documents = (0..n)
                .map(|i| doc(&format!("{}.md", i), "<p></p>"))
                .collect();
            store.publish(TreeNode::root(), documents);
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
