//! Watching preview server command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use vaultview_server::PreviewServer;

use crate::config::ConfigFile;

/// Command-line overrides for the server.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub open: bool,
    pub no_watch: bool,
}

/// Run the serve command.
pub async fn run(
    config: &ConfigFile,
    root: PathBuf,
    output: Option<String>,
    args: ServeArgs,
) -> Result<()> {
    let build = config.build_config(root, output);

    let mut server_config = config.server_config();
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if let Some(host) = args.host {
        server_config.host = host;
    }
    server_config.open |= args.open;
    server_config.watch &= !args.no_watch;

    let server = PreviewServer::new(&build, server_config).context("Failed to prepare the preview")?;

    server.start().await.context("Preview server failed")?;

    Ok(())
}
