use super::prompt::confirm;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use roster_trim::{Criterion, OverflowPolicy, Roster, RosterConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster-trim")]
#[command(about = "Keep Path of Titans accounts under the character limit, with restore")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Save-data root containing Account/ and Character/
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report what would change without modifying any file
    #[arg(long, visible_alias = "simulate", global = true)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Back up the save data, then trim every account to the limit
    Trim {
        /// Ranking attribute: marks, actualGrowth or lastPlayedDate
        #[arg(long)]
        sort_by: Option<String>,
        /// Maximum characters kept per account
        #[arg(long)]
        limit: Option<usize>,
        /// Pending overflow on a repeated trim: merge, reject or replace
        #[arg(long)]
        overflow_policy: Option<String>,
        /// Do not create a backup archive first
        #[arg(long)]
        no_backup: bool,
    },
    /// Put trimmed characters back on their accounts
    Restore,
    /// Only create a backup archive
    Backup,
}

pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RosterConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => RosterConfig::default(),
    };
    if let Some(root) = &cli.root {
        config = config.root(root);
    }
    if cli.dry_run {
        config = config.dry_run(true);
    }

    match cli.command {
        Command::Trim {
            sort_by,
            limit,
            overflow_policy,
            no_backup,
        } => {
            if let Some(sort_by) = sort_by {
                config = config.criterion(sort_by.parse::<Criterion>()?);
            }
            if let Some(limit) = limit {
                config = config.limit(limit);
            }
            if let Some(policy) = overflow_policy {
                config = config.overflow_policy(policy.parse::<OverflowPolicy>()?);
            }
            trim(config, no_backup, cli.yes)
        }
        Command::Restore => restore(config, cli.yes),
        Command::Backup => backup(config, cli.yes),
    }
}

fn trim(config: RosterConfig, no_backup: bool, yes: bool) -> Result<()> {
    let mut roster = Roster::open(config)?;
    let dry_run = roster.config().dry_run;

    if !dry_run && !yes && !confirm("create a backup and trim characters")? {
        println!("Aborted.");
        return Ok(());
    }

    if !no_backup {
        if let Some(path) = roster.backup().context("Backup failed, nothing was trimmed")? {
            println!("Backup created: {}", path.display());
        }
    }

    let report = roster.run_trim()?;
    println!("{}", report);

    match report.failed_accounts() {
        0 => Ok(()),
        failed => Err(anyhow!("{} account(s) could not be trimmed", failed)),
    }
}

fn restore(config: RosterConfig, yes: bool) -> Result<()> {
    let mut roster = Roster::open(config)?;
    let dry_run = roster.config().dry_run;

    if !dry_run && !yes && !confirm("restore trimmed characters")? {
        println!("Aborted.");
        return Ok(());
    }

    let report = roster.run_restore()?;
    println!("{}", report);

    match report.failed_accounts() {
        0 => Ok(()),
        failed => Err(anyhow!("{} account(s) could not be restored", failed)),
    }
}

fn backup(config: RosterConfig, yes: bool) -> Result<()> {
    let roster = Roster::open(config)?;

    if !roster.config().dry_run && !yes && !confirm("create a backup")? {
        println!("Aborted.");
        return Ok(());
    }

    match roster.backup()? {
        Some(path) => println!("Backup created: {}", path.display()),
        None => println!("[dry run] no backup written."),
    }
    Ok(())
}
