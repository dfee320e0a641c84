//! vaultview CLI - browsable single-file preview of a markdown notes folder.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "vaultview")]
#[command(about = "Browsable single-file preview of a markdown notes folder")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Notes directory to preview
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Path to config file (defaults to vaultview.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Artifact file name inside the notes directory
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the preview, rebuild on changes, and serve it (default)
    Serve {
        /// Port to listen on (defaults to config or 9099)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to config or 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Open the preview in a browser
        #[arg(long)]
        open: bool,

        /// Do not rebuild when files change
        #[arg(long)]
        no_watch: bool,
    },

    /// Build the preview once and exit
    Build,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file_config = config::load_config(cli.config.as_deref())?;

    // Execute command
    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        host: None,
        open: false,
        no_watch: false,
    }) {
        Commands::Serve {
            port,
            host,
            open,
            no_watch,
        } => {
            let args = commands::serve::ServeArgs {
                port,
                host,
                open,
                no_watch,
            };
            commands::serve::run(&file_config, cli.root, cli.output, args).await?;
        }
        Commands::Build => {
            commands::build::run(&file_config, cli.root, cli.output).await?;
        }
    }

    Ok(())
}
