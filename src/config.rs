use chrono::Utc;
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::{Result, RosterError};
use crate::store::SeasonWeights;

#[derive(Parser)]
#[command(author, version, about = "Alliance roster, rotation and leaderboard tool", long_about = None)]
pub struct Cli {
    /// Path to a Settings.toml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error; default: info)
    #[arg(short, long)]
    pub level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Web {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Import a ranking CSV for a date (YYYY-MM-DD) or special event key
    Import {
        #[arg(short, long)]
        day: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the weekly tables for the week containing a date
    Weekly {
        #[arg(short, long)]
        week: String,
        /// Fold special event rankings into the tables
        #[arg(long)]
        events: bool,
        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate and store a season leaderboard
    Season {
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Show the conductor for a date and who is next in line
    Conductor {
        #[arg(short, long)]
        date: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub level: Option<String>,
    pub data_file: PathBuf,
    pub admin_password: String,
    pub port: u16,
    /// Start with an empty in-memory roster when the data file cannot be read
    pub offline_fallback: bool,
    pub weights: SeasonWeights,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            level: None,
            data_file: PathBuf::from("./data/roster.json"),
            admin_password: String::from("admin123"),
            port: 8080,
            offline_fallback: false,
            weights: SeasonWeights::default(),
        }
    }
}

pub fn get_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| RosterError::Validation(format!("invalid config {}: {e}", path.display())))?
        }
        None => Settings::default(),
    };

    if let Ok(password) = env::var("ADMIN_PASSWORD") {
        settings.admin_password = password;
    }
    if let Some(level) = &cli.level {
        settings.level = Some(level.clone());
    }
    Ok(settings)
}

pub fn setup_logger(level: Option<String>) -> std::result::Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}: {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(get_log_level(level))
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

/// Level from the explicit setting, else `RUST_LOG`, else info.
pub fn get_log_level(level: Option<String>) -> LevelFilter {
    let level = level.unwrap_or_else(|| env::var("RUST_LOG").unwrap_or_default());
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
