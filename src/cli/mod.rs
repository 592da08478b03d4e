use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use time::{Date, OffsetDateTime};
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::ConfigLoader;
use crate::storage;

pub mod commands;

use self::commands::{
    AddArgs, CalendarArgs, CommandContext, DeleteArgs, DueArgs, EditArgs, ToggleArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "snippet-recall",
    version,
    about = "Spaced-repetition snippet tracker with a rolling review calendar"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over SNIPPET_RECALL_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over SNIPPET_RECALL_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Print the sheet writes a command would make without applying them
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive review calendar (default)
    Tui,
    /// Log a new snippet and schedule its reviews
    Add(AddArgs),
    /// Mark a snippet's review on a date as done (or not done)
    Toggle(ToggleArgs),
    /// Change a snippet's type, creation date or content
    Edit(EditArgs),
    /// Remove a snippet and all of its reviews
    Delete(DeleteArgs),
    /// List snippets with their review progress
    List,
    /// Print the rolling review calendar
    Calendar(CalendarArgs),
    /// Show reviews due on a date plus anything overdue
    Due(DueArgs),
    /// Report rows the tracker cannot fully interpret
    Check,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let loader = ConfigLoader::with_overrides(cli.config.clone(), cli.data_dir.clone())?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let sheet = storage::init(&paths, &config.storage)?;

    let command = cli.command.unwrap_or(Commands::Tui);
    let ctx = CommandContext {
        config: &config,
        sheet: &sheet,
        today: today(),
        dry_run: cli.dry_run,
    };
    let output = match command {
        Commands::Tui => {
            let mut app = App::new(Arc::new(config.clone()), sheet.clone(), paths, ctx.today)?;
            return commands::run_tui(&mut app);
        }
        Commands::Add(args) => commands::add_snippet(&ctx, commands::with_stdin_content(args)?),
        Commands::Toggle(args) => commands::toggle_review(&ctx, args),
        Commands::Edit(args) => commands::edit_snippet(&ctx, args),
        Commands::Delete(args) => commands::delete_snippet(&ctx, args),
        Commands::List => commands::list_snippets(&ctx),
        Commands::Calendar(args) => commands::show_calendar(&ctx, args),
        Commands::Due(args) => commands::show_due(&ctx, args),
        Commands::Check => commands::check_sheet(&ctx),
    }?;
    print!("{output}");
    Ok(())
}

/// Local calendar date, falling back to UTC when the offset is unknown.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
