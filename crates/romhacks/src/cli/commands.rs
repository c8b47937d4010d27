//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::catalog::EntryKind;
use crate::moderation::SubmissionStatus;
use crate::month::YearMonth;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on, overriding `server.bind`
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Migrate command arguments.
#[derive(Debug, Args)]
pub struct MigrateCommand {
    /// Copy the database file aside before migrating
    #[arg(long)]
    pub backup: bool,

    /// Check the schema and integrity afterwards
    #[arg(long)]
    pub verify: bool,

    /// Skip filling in missing series
    #[arg(long)]
    pub no_populate: bool,
}

/// Import command arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file holding one entry or a list of entries
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Kind of records that do not say
    #[arg(short, long, value_enum, default_value = "romhack")]
    pub kind: KindArg,
}

/// Archive command arguments.
#[derive(Debug, Args)]
pub struct ArchiveCommand {
    /// Month to archive as YYYY-MM (defaults to the previous month)
    #[arg(short, long, value_parser = parse_month)]
    pub month: Option<YearMonth>,

    /// Entries to rank per kind (defaults to `archive.top_n`)
    #[arg(short, long)]
    pub top: Option<usize>,
}

fn parse_month(raw: &str) -> Result<YearMonth, String> {
    raw.parse().map_err(|e: crate::error::Error| e.to_string())
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Submissions command arguments.
#[derive(Debug, Args)]
pub struct SubmissionsCommand {
    /// Only show submissions with this status
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Entry kind argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// ROM hacks
    Romhack,
    /// Ports
    Port,
}

impl From<KindArg> for EntryKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Romhack => Self::Romhack,
            KindArg::Port => Self::Port,
        }
    }
}

/// Submission status argument for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Waiting for review
    New,
    /// Accepted
    Approved,
    /// Turned down
    Rejected,
}

impl From<StatusArg> for SubmissionStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::New => Self::New,
            StatusArg::Approved => Self::Approved,
            StatusArg::Rejected => Self::Rejected,
        }
    }
}
