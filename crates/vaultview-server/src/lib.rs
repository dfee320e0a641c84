//! Preview server for vaultview.
//!
//! Builds the preview artifact, rebuilds it when notes change, and serves the
//! notes root over HTTP.

pub mod server;
pub mod watcher;

pub use server::{BoundServer, PreviewServer, ServerConfig, ServerError};
pub use watcher::{EventFilter, Rebuild, WatchError, WatchLoop, WatchState, DEFAULT_DEBOUNCE};
