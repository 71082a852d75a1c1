//! CLI command definitions

use clap::{Subcommand, ValueEnum};
use std::path::PathBuf;

/// How Gitea is run on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstallTarget {
    /// Download the Gitea binary and run it under the service manager
    Binary,
    /// Run Gitea and PostgreSQL with Docker Compose
    Docker,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install Gitea with PostgreSQL
    Install {
        /// Installation target
        #[arg(long, value_enum, default_value_t = InstallTarget::Binary)]
        target: InstallTarget,
    },
    /// Choose a deployment mode and re-render the Gitea configuration
    Configure,
    /// Generate or obtain the TLS certificate for the current domain
    Cert,
    /// Back up the database, configuration and data directory
    Backup,
    /// Restore a backup archive
    Restore {
        /// Backup archive produced by the backup command
        archive: PathBuf,
    },
    /// Check system dependencies
    Deps,
    /// Test a settings file
    Test {
        /// Settings file path (defaults to --config)
        #[arg(index = 1)]
        config_file: Option<PathBuf>,
    },
    /// Run interactive post-install menu
    Menu,
}
