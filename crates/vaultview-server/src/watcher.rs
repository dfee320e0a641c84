//! Debounced file watching that keeps the preview current.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use vaultview_preview::scanner::{is_markdown, walk, ExclusionRules};

/// Quiet period after the last qualifying event before rebuilding.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Something the watch loop runs once a burst of changes settles.
///
/// Runs on the blocking pool; failures are the implementor's to log.
pub trait Rebuild: Send + Sync + 'static {
    fn rebuild(&self);
}

/// Errors that can occur when setting up watching.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to create file watcher: {0}")]
    Setup(#[source] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Decides which filesystem events warrant a rebuild.
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    rules: ExclusionRules,
    ignored: Vec<PathBuf>,
}

impl EventFilter {
    /// Events under `root`, minus excluded entries and the `ignored` files.
    pub fn new(root: PathBuf, rules: ExclusionRules, ignored: Vec<PathBuf>) -> Self {
        Self {
            root,
            rules,
            ignored,
        }
    }

    /// Whether `event` should schedule a rebuild.
    ///
    /// Creation, removal and renames of any eligible entry qualify, since
    /// they can change the tree. Other changes qualify only for markdown
    /// files. Access and metadata events never do; building reads every file.
    /// A rescan request means events were lost, so it always qualifies.
    pub fn qualifies(&self, event: &notify::Event) -> bool {
        if event.need_rescan() {
            return true;
        }

        let relevant: Vec<&Path> = event
            .paths
            .iter()
            .map(PathBuf::as_path)
            .filter(|path| self.is_relevant(path))
            .collect();

        if relevant.is_empty() {
            return false;
        }

        match event.kind {
            EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_)) => {
                true
            }
            EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_)) => false,
            _ => relevant.iter().any(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(is_markdown)
            }),
        }
    }

    fn is_relevant(&self, path: &Path) -> bool {
        if self.ignored.iter().any(|ignored| ignored == path) {
            return false;
        }

        match path.strip_prefix(&self.root) {
            Ok(relative) => !self.rules.excludes_path(relative),
            Err(_) => false,
        }
    }
}

/// Every directory under `root` that should be watched.
///
/// Uses the scanner's walk, so excluded directories are skipped along with
/// everything beneath them.
pub fn watched_directories(root: &Path, rules: &ExclusionRules) -> BTreeSet<PathBuf> {
    walk(root, rules)
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!("Skipping during watch walk: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect()
}

/// The artifact at `artifact` and its temporary sibling, under `canonical`.
///
/// Event paths are reported beneath the canonical root, so the artifact's
/// path relative to `root` is carried over whole.
fn artifact_paths(root: &Path, canonical: &Path, artifact: &Path) -> Vec<PathBuf> {
    let artifact = match artifact
        .strip_prefix(root)
        .or_else(|_| artifact.strip_prefix(canonical))
    {
        Ok(relative) => canonical.join(relative),
        Err(_) if artifact.is_relative() => canonical.join(artifact),
        Err(_) => artifact.to_path_buf(),
    };

    vec![vaultview_preview::artifact::temp_path(&artifact), artifact]
}

/// Non-recursive watches on every eligible directory.
pub struct Subscriptions {
    watcher: RecommendedWatcher,
    root: PathBuf,
    rules: ExclusionRules,
    watched: BTreeSet<PathBuf>,
}

impl Subscriptions {
    fn new(watcher: RecommendedWatcher, root: PathBuf, rules: ExclusionRules) -> Self {
        Self {
            watcher,
            root,
            rules,
            watched: BTreeSet::new(),
        }
    }

    /// Currently watched directories.
    pub fn watched(&self) -> &BTreeSet<PathBuf> {
        &self.watched
    }

    /// Watch new directories and drop ones that disappeared.
    ///
    /// A directory that cannot be watched is logged and retried next sync.
    pub fn sync(&mut self) {
        let desired = watched_directories(&self.root, &self.rules);

        let stale: Vec<PathBuf> = self.watched.difference(&desired).cloned().collect();
        for path in stale {
            // The watch usually went away with the directory.
            let _ = self.watcher.unwatch(&path);
            self.watched.remove(&path);
        }

        for path in desired {
            if self.watched.contains(&path) {
                continue;
            }
            match self.watcher.watch(&path, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    self.watched.insert(path);
                }
                Err(source) => {
                    let error = WatchError::Subscribe { path, source };
                    tracing::warn!("{}", error);
                }
            }
        }

        tracing::debug!("Watching {} directories", self.watched.len());
    }
}

/// Where the loop is between events and rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    PendingRebuild { deadline: Instant },
    Rebuilding,
}

/// Single consumer of watch events and errors that debounces rebuilds.
pub struct WatchLoop<T: Rebuild> {
    target: Arc<T>,
    filter: EventFilter,
    debounce: Duration,
    events: mpsc::UnboundedReceiver<notify::Event>,
    errors: mpsc::UnboundedReceiver<notify::Error>,
    subscriptions: Option<Subscriptions>,
    state: WatchState,
}

impl<T: Rebuild> WatchLoop<T> {
    /// Create a loop over existing event and error channels.
    pub fn new(
        target: Arc<T>,
        filter: EventFilter,
        debounce: Duration,
        events: mpsc::UnboundedReceiver<notify::Event>,
        errors: mpsc::UnboundedReceiver<notify::Error>,
    ) -> Self {
        Self {
            target,
            filter,
            debounce,
            events,
            errors,
            subscriptions: None,
            state: WatchState::Idle,
        }
    }

    /// Watch `root` and rebuild `target` on changes.
    ///
    /// `artifact` is the file the target writes; changes to it (and to its
    /// temporary sibling) are ignored.
    pub fn watch(
        root: &Path,
        rules: ExclusionRules,
        artifact: &Path,
        target: Arc<T>,
        debounce: Duration,
    ) -> Result<Self, WatchError> {
        let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let ignored = artifact_paths(root, &canonical, artifact);
        let root = canonical;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Closed channels mean the loop is gone; nothing to forward to.
            match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => {
                    let _ = error_tx.send(e);
                }
            }
        })
        .map_err(WatchError::Setup)?;

        let mut subscriptions = Subscriptions::new(watcher, root.clone(), rules.clone());
        subscriptions.sync();

        let filter = EventFilter::new(root, rules, ignored);
        let mut watch_loop = Self::new(target, filter, debounce, event_rx, error_rx);
        watch_loop.subscriptions = Some(subscriptions);

        Ok(watch_loop)
    }

    /// Current state.
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Subscriptions, when watching a real directory.
    pub fn subscriptions(&self) -> Option<&Subscriptions> {
        self.subscriptions.as_ref()
    }

    /// Run until both channels close and no rebuild is pending.
    pub async fn run(mut self) {
        let mut events_open = true;
        let mut errors_open = true;

        loop {
            let deadline = match self.state {
                WatchState::PendingRebuild { deadline } => Some(deadline),
                _ => None,
            };

            if !events_open && !errors_open && deadline.is_none() {
                break;
            }

            tokio::select! {
                event = self.events.recv(), if events_open => match event {
                    Some(event) => self.on_event(&event),
                    None => events_open = false,
                },
                error = self.errors.recv(), if errors_open => match error {
                    Some(e) => tracing::warn!("File watch error: {}", e),
                    None => errors_open = false,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.rebuild().await;
                }
            }
        }

        tracing::debug!("Watch loop stopped");
    }

    fn on_event(&mut self, event: &notify::Event) {
        if !self.filter.qualifies(event) {
            return;
        }

        tracing::debug!("Change detected: {:?} {:?}", event.kind, event.paths);

        self.state = WatchState::PendingRebuild {
            deadline: Instant::now() + self.debounce,
        };
    }

    async fn rebuild(&mut self) {
        self.state = WatchState::Rebuilding;
        tracing::info!("Changes detected, rebuilding");

        let target = Arc::clone(&self.target);
        let mut subscriptions = self.subscriptions.take();

        let result = tokio::task::spawn_blocking(move || {
            target.rebuild();
            if let Some(subscriptions) = subscriptions.as_mut() {
                subscriptions.sync();
            }
            subscriptions
        })
        .await;

        match result {
            Ok(subscriptions) => self.subscriptions = subscriptions,
            Err(e) => tracing::error!("Rebuild task failed, file watching stopped: {}", e),
        }

        self.state = WatchState::Idle;
    }
}
