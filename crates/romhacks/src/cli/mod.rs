//! Command-line interface for romhacks.
//!
//! This module provides the CLI structure for the `romhacks` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ArchiveCommand, ConfigCommand, ImportCommand, KindArg, MigrateCommand, ServeCommand,
    StatusArg, StatusCommand, SubmissionsCommand,
};

/// romhacks - Catalog of ROM hacks and game ports
///
/// Serves the catalog site and its admin API, and manages the database
/// behind it.
#[derive(Debug, Parser)]
#[command(name = "romhacks")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the web server
    Serve(ServeCommand),

    /// Create or upgrade the database
    Migrate(MigrateCommand),

    /// Import catalog entries from a JSON file
    Import(ImportCommand),

    /// Archive a month's most downloaded entries
    Archive(ArchiveCommand),

    /// Show catalog and database statistics
    Status(StatusCommand),

    /// List submitted entries
    Submissions(SubmissionsCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
        assert_eq!(Cli::command().get_name(), "romhacks");
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(3, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["romhacks", "serve", "--bind", "0.0.0.0:8080"]).unwrap();
        match cli.command {
            Command::Serve(cmd) => assert_eq!(cmd.bind.as_deref(), Some("0.0.0.0:8080")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_migrate_flags() {
        let cli = Cli::try_parse_from(["romhacks", "migrate", "--backup", "--no-populate"]).unwrap();
        match cli.command {
            Command::Migrate(cmd) => {
                assert!(cmd.backup);
                assert!(!cmd.verify);
                assert!(cmd.no_populate);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_import_kind() {
        let cli = Cli::try_parse_from(["romhacks", "import", "ports.json", "--kind", "port"]).unwrap();
        match cli.command {
            Command::Import(cmd) => {
                assert_eq!(cmd.file, PathBuf::from("ports.json"));
                assert_eq!(cmd.kind, KindArg::Port);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_archive_month() {
        let cli = Cli::try_parse_from(["romhacks", "archive", "--month", "2024-11", "--top", "5"])
            .unwrap();
        match cli.command {
            Command::Archive(cmd) => {
                assert_eq!(cmd.month.map(|m| m.to_string()).as_deref(), Some("2024-11"));
                assert_eq!(cmd.top, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["romhacks", "archive", "--month", "2024-13"]).is_err());
    }

    #[test]
    fn test_parse_submissions_status() {
        let cli =
            Cli::try_parse_from(["romhacks", "submissions", "--status", "rejected", "--json"])
                .unwrap();
        match cli.command {
            Command::Submissions(cmd) => {
                assert_eq!(cmd.status, Some(StatusArg::Rejected));
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_with_config_and_verbose() {
        let cli = Cli::try_parse_from(["romhacks", "-c", "/etc/romhacks.toml", "-v", "status"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/romhacks.toml")));
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::try_parse_from(["romhacks", "config", "path"]).unwrap();
        assert!(matches!(cli.command, Command::Config(ConfigCommand::Path)));
    }
}
