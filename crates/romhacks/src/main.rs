//! `romhacks` - CLI for the romhacks catalog
//!
//! This binary runs the web server and the maintenance commands that manage
//! its database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use romhacks::archive::ArchiveTask;
use romhacks::cli::{
    ArchiveCommand, Cli, Command, ConfigCommand, ImportCommand, MigrateCommand, ServeCommand,
    SubmissionsCommand,
};
use romhacks::http::{self, AppState};
use romhacks::{import, init_logging, Config, Storage, YearMonth};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config validate` reports problems itself instead of failing here
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        validate_config(file.clone().or_else(|| cli.config.clone()));
        return Ok(());
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Serve(cmd) => handle_serve(config, cmd).await,
        Command::Migrate(cmd) => handle_migrate(&config, &cmd),
        Command::Import(cmd) => handle_import(&config, &cmd),
        Command::Archive(cmd) => handle_archive(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Submissions(cmd) => handle_submissions(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Storage> {
    let path = config.database_path();
    Storage::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(bind) = cmd.bind {
        config.server.bind = bind;
    }
    let addr = config.bind_addr()?;

    let storage = open_storage(&config)?.into_shared();

    let archiver = config.archive.enabled.then(|| {
        ArchiveTask::spawn(
            storage.clone(),
            config.archive_interval(),
            config.archive.top_n,
        )
    });

    if !config.admin_enabled() {
        info!("Admin credentials not configured, admin API disabled");
    }

    let result = http::serve(AppState::new(storage, config), addr).await;

    if let Some(archiver) = archiver {
        archiver.shutdown().await;
    }
    result.context("server failed")
}

fn handle_migrate(config: &Config, cmd: &MigrateCommand) -> anyhow::Result<()> {
    let path = config.database_path();

    if cmd.backup && path.exists() {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
        let mut backup = path.clone().into_os_string();
        backup.push(format!(".bak-{stamp}"));
        std::fs::copy(&path, &backup)
            .with_context(|| format!("failed to back up {}", path.display()))?;
        println!("Backed up database to {}", backup.to_string_lossy());
    }

    // Opening the database applies any pending migrations
    let storage = open_storage(config)?;
    println!("Database ready at {}", storage.path().display());

    if !cmd.no_populate {
        let updated = storage.populate_series()?;
        println!("Filled in the series of {updated} entries");
    }

    if cmd.verify {
        let issues = storage.verify_schema()?;
        if !issues.is_empty() {
            for issue in &issues {
                println!("  - {issue}");
            }
            bail!("database verification found {} problems", issues.len());
        }
        println!("Database verified");
    }
    Ok(())
}

fn handle_import(config: &Config, cmd: &ImportCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let report = import::import_file(&storage, &cmd.file, cmd.kind.into())?;

    println!(
        "Imported {} entries from {} ({} new, {} updated)",
        report.total(),
        cmd.file.display(),
        report.created.len(),
        report.updated.len()
    );
    Ok(())
}

fn handle_archive(config: &Config, cmd: &ArchiveCommand) -> anyhow::Result<()> {
    let month = cmd.month.unwrap_or_else(|| YearMonth::current().previous());
    let top_n = cmd.top.unwrap_or(config.archive.top_n);
    if top_n == 0 {
        bail!("--top must be at least 1");
    }

    let storage = open_storage(config)?;
    let summary = storage.archive_month(month, top_n)?;
    println!(
        "Archived {month}: {} ROM hacks, {} ports",
        summary.games_archived, summary.ports_archived
    );
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage.stats()?;

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "admin_enabled": config.admin_enabled(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("romhacks status");
        println!("---------------");
        println!("Database:        {}", storage.path().display());
        println!("Schema version:  {}", stats.schema_version);
        println!("Size:            {} bytes", stats.db_size_bytes);
        println!("ROM hacks:       {}", stats.romhacks);
        println!("Ports:           {}", stats.ports);
        println!(
            "Submissions:     {} new, {} approved, {} rejected",
            stats.submissions.new, stats.submissions.approved, stats.submissions.rejected
        );
        println!("Feedback:        {}", stats.feedback);
        println!("Downloads:       {}", stats.total_downloads);
        println!("Archived months: {}", stats.archived_months);
        println!(
            "Admin API:       {}",
            if config.admin_enabled() { "enabled" } else { "disabled" }
        );
    }
    Ok(())
}

fn handle_submissions(config: &Config, cmd: &SubmissionsCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let submissions = storage.list_submissions(cmd.status.map(Into::into))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&submissions)?);
        return Ok(());
    }

    if submissions.is_empty() {
        println!("No submissions");
        return Ok(());
    }
    for submission in &submissions {
        let submitted = submission
            .submitted_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>5}  {:<8}  {:<7}  {:<16}  {}",
            submission.id,
            submission.status.as_str(),
            submission.data.kind.as_str(),
            submitted,
            submission.data.title
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = redacted(config);
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!(
                    "  Static dir:         {}",
                    config
                        .server
                        .static_dir
                        .as_ref()
                        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
                );
                println!(
                    "  Trust X-Forwarded:  {}",
                    config.server.trust_forwarded_for
                );
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Admin]");
                println!("  Enabled:            {}", config.admin_enabled());
                println!("  Session (hours):    {}", config.admin.session_ttl_hours);
                println!("  Secure cookie:      {}", config.admin.secure_cookie);
                println!();
                println!("[Rate limit]");
                println!("  Enabled:            {}", config.rate_limit.enabled);
                println!("  Capacity:           {}", config.rate_limit.capacity);
                println!("  Refill per minute:  {}", config.rate_limit.refill_per_minute);
                println!();
                println!("[Archive]");
                println!("  Enabled:            {}", config.archive.enabled);
                println!("  Top N:              {}", config.archive.top_n);
                println!(
                    "  Check every (h):    {}",
                    config.archive.check_interval_hours
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => validate_config(file),
    }
    Ok(())
}

fn validate_config(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}

/// A copy of the configuration with secrets masked.
fn redacted(config: &Config) -> Config {
    const MASK: &str = "********";
    let mut config = config.clone();
    if config.admin.password.is_some() {
        config.admin.password = Some(MASK.to_string());
    }
    if config.admin.session_secret.is_some() {
        config.admin.session_secret = Some(MASK.to_string());
    }
    if !config.privacy.hash_salt.is_empty() {
        config.privacy.hash_salt = MASK.to_string();
    }
    config
}
