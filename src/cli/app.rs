//! Main CLI application structure

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Verbosity};
use crate::engine::LocalEngine;
use crate::orchestrator::{DevourBuilder, Listing, RunStatus};
use crate::output::{Output, OutputFormat};

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "DEVOUR_LOG";

#[derive(Parser, Debug)]
#[command(name = "devour")]
#[command(author, version, about = "Convention-driven build orchestration with watch mode")]
pub struct Cli {
    /// Tasks to run once (runs every watched task and keeps watching when omitted)
    pub tasks: Vec<String>,

    /// Configuration file (defaults to devour.toml in the base path)
    #[arg(long, short = 'c', env = "DEVOUR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project root relative paths are resolved against
    #[arg(long)]
    pub base_path: Option<PathBuf>,

    /// Directory holding task and pipe definitions
    #[arg(long)]
    pub gulp_files: Option<PathBuf>,

    /// Destination root for written files
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Debounce window for watch triggers, in milliseconds
    #[arg(long)]
    pub debounce: Option<u64>,

    /// Run everything once instead of watching
    #[arg(long)]
    pub no_watch: bool,

    /// Increase verbosity (-v summaries, -vv debug logging)
    #[arg(long, short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, short = 'f', default_value = "text")]
    pub format: OutputFormat,

    /// List definitions and declared tasks, then exit
    #[arg(long)]
    pub list: bool,
}

impl Cli {
    /// Applies command-line overrides to a loaded configuration
    fn apply(&self, config: &mut Config) {
        if let Some(gulp_files) = &self.gulp_files {
            config.gulp_files = gulp_files.clone();
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(debounce) = self.debounce {
            config.debounce = debounce;
        }
        if self.verbose > 0 {
            config.verbose = Some(Verbosity::Level(self.verbose));
        }
    }
}

/// Run the CLI application
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.base_path.as_deref(), cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    tracing::debug!(base_path = %config.base_path.display(), "configuration loaded");

    let engine = LocalEngine::new(config.base_path.clone());
    let output = Output::new(cli.format, 1);
    let selection = if cli.list { Vec::new() } else { cli.tasks.clone() };

    let mut devour = DevourBuilder::new(config)
        .selection(selection)
        .output(output)
        .watch(!cli.no_watch)
        .build(engine)
        .context("Failed to initialize")?;

    devour
        .declare_from_config()
        .context("Failed to declare configured tasks")?;

    if cli.list {
        print_listing(&devour.listing(), output);
        return Ok(ExitCode::SUCCESS);
    }

    match devour.start()? {
        RunStatus::NothingToRun => Ok(ExitCode::from(1)),
        RunStatus::Completed | RunStatus::Watched => Ok(ExitCode::SUCCESS),
    }
}

fn init_tracing(verbosity: u8) {
    let fallback = if verbosity >= 2 { "devour=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_listing(listing: &Listing, output: Output) {
    if output.is_json() {
        output.data(listing);
        return;
    }

    for (kind, names) in &listing.definitions {
        println!("{}", format!("{}s:", kind).bold());
        for name in names {
            println!("  {}", name);
        }
    }

    if listing.scheduled.is_empty() {
        return;
    }

    println!("{}", "declared:".bold());
    for spec in &listing.scheduled {
        let watch = if spec.watch.is_empty() {
            "(not watching)".dimmed().to_string()
        } else {
            format!("watch {}", spec.watch.join(", "))
        };
        println!(
            "  {} {} {}",
            spec.name.cyan(),
            if spec.build.is_empty() { "-".to_string() } else { spec.build.join(", ") },
            watch
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tasks_and_flags() {
        let cli = Cli::parse_from(["devour", "css", "build:prod", "--no-watch", "-vv", "--debounce", "250"]);

        assert_eq!(cli.tasks, vec!["css", "build:prod"]);
        assert!(cli.no_watch);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.debounce, Some(250));
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn overrides_replace_file_values() {
        let cli = Cli::parse_from(["devour", "--output", "public", "--gulp-files", "build", "-v"]);
        let mut config = Config::default();

        cli.apply(&mut config);

        assert_eq!(config.output, PathBuf::from("public"));
        assert_eq!(config.gulp_files, PathBuf::from("build"));
        assert_eq!(config.verbose, Some(Verbosity::Level(1)));
        assert_eq!(config.debounce, 100);
    }
}
