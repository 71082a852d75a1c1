//! Command line argument parsing

use clap::Parser;
use std::path::PathBuf;

use super::Commands;

/// Interactive installer and configurator for a self-hosted Gitea service
#[derive(Parser, Debug)]
#[command(name = "gitea-deploy")]
#[command(version)]
#[command(about = "Interactive installer and configurator for a self-hosted Gitea service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Deployment tool settings file (defaults apply when the file is absent)
    #[arg(short, long, global = true, default_value = "deploy.toml")]
    pub config: PathBuf,

    /// Enable debug mode
    #[arg(long, global = true)]
    pub debug: bool,
}
