//! Command-line front end for the realms runtime.
//!
//! `path` renders and compares paths the way the runtime does in its
//! diagnostics; `config` writes and shows the runtime config; `demo` mounts
//! the built-in counter app and prints a JSON report of every commit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use realms::core::path::{Fragment, Path, compare, render};
use realms::demo::run_demo;
use realms::exit_codes;
use realms::io::config::{RuntimeConfig, init_config, load_config};
use realms::logging;

#[derive(Parser)]
#[command(
    name = "realms",
    version,
    about = "Hierarchical reactive state container runtime"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect paths.
    Path {
        #[command(subcommand)]
        command: PathCommand,
    },
    /// Write or show the runtime config file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Mount the counter app and dispatch `increment` repeatedly.
    Demo {
        /// Number of `increment` actions to dispatch.
        #[arg(long, default_value_t = 3)]
        steps: usize,
        /// TOML config file (defaults apply when missing).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a default config file.
    Init {
        #[arg(long, default_value = "realms.toml")]
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the effective config (defaults when the file is missing).
    Show {
        #[arg(long, default_value = "realms.toml")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum PathCommand {
    /// Print the canonical form of a path.
    Render {
        /// Fragments; integers and `true`/`false` are typed, the rest are strings.
        #[arg(required = true)]
        fragments: Vec<String>,
        /// Render without the leading `/`.
        #[arg(long)]
        relative: bool,
    },
    /// Print how `--left` relates to `--right`.
    Compare {
        /// Comma-separated fragments.
        #[arg(long, value_delimiter = ',')]
        left: Vec<String>,
        /// Comma-separated fragments.
        #[arg(long, value_delimiter = ',')]
        right: Vec<String>,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Path { command } => {
            logging::init(&RuntimeConfig::default().log_filter);
            cmd_path(command)
        }
        Command::Config { command } => {
            logging::init(&RuntimeConfig::default().log_filter);
            cmd_config(command)
        }
        Command::Demo { steps, config } => cmd_demo(steps, config),
    }
}

fn cmd_config(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Init { path, force } => {
            init_config(&path, force)?;
            println!("{}", path.display());
        }
        ConfigCommand::Show { path } => {
            let cfg = load_config(&path)?;
            let rendered = toml::to_string_pretty(&cfg).context("render runtime config")?;
            print!("{rendered}");
        }
    }
    Ok(())
}

fn cmd_path(command: PathCommand) -> Result<()> {
    match command {
        PathCommand::Render {
            fragments,
            relative,
        } => {
            println!("{}", render(&parse_path(&fragments), !relative));
        }
        PathCommand::Compare { left, right } => {
            let relation = compare(&parse_path(&left), &parse_path(&right));
            println!("{relation}");
        }
    }
    Ok(())
}

fn cmd_demo(steps: usize, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => load_config(&path)?,
        None => RuntimeConfig::default(),
    };
    logging::init(&config.log_filter);
    debug!(steps, "running demo");

    let report = run_demo(steps, config)?;
    let payload = serde_json::to_string_pretty(&report).context("serialize demo report")?;
    println!("{payload}");
    Ok(())
}

fn parse_path(raw: &[String]) -> Path {
    raw.iter().map(|fragment| parse_fragment(fragment)).collect()
}

/// Integers and booleans are typed; everything else is a string fragment.
fn parse_fragment(raw: &str) -> Fragment {
    if let Ok(n) = raw.parse::<i64>() {
        return Fragment::Int(n);
    }
    if let Ok(n) = raw.parse::<i128>() {
        return Fragment::BigInt(n);
    }
    match raw {
        "true" => Fragment::Bool(true),
        "false" => Fragment::Bool(false),
        _ => Fragment::from(raw),
    }
}
