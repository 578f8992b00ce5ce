mod alias;
mod config;
mod date_key;
mod display;
mod error;
mod parser;
mod roster;
mod rotation;
mod stats;
mod store;
mod web;

use chrono::Utc;
use clap::Parser;
use log::info;

use config::{get_settings, setup_logger, Cli, Command};
use date_key::{DateKey, DayRef};
use display::{print_rotation, print_season, print_weekly_report, write_weekly_report_to_file};
use parser::load_rankings;
use roster::Roster;
use stats::SeasonQuery;
use store::JsonFileBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = get_settings(&cli)?;
    setup_logger(settings.level.clone())?;

    let backend = Box::new(JsonFileBackend::new(&settings.data_file));
    let mut roster = Roster::open_or_offline(backend, settings.offline_fallback)?;

    match cli.command {
        Command::Web { port } => {
            let port = port.unwrap_or(settings.port);
            println!("Access the site at http://localhost:{port}");
            let state = web::AppState::new(roster, settings.admin_password.clone(), settings.weights);
            web::start_server(port, state).await?;
        }
        Command::Import { day, csv } => {
            let day = DayRef::try_from(day)?;
            let records = load_rankings(&csv, &day)?;
            let count = roster.import_rankings(day.clone(), records)?;
            println!("Imported {count} rows for {day} from {}", csv.display());
        }
        Command::Weekly { week, events, output } => {
            let report = roster.weekly_report(DateKey::parse(&week)?, events);
            print_weekly_report(&report)?;
            if let Some(path) = output {
                write_weekly_report_to_file(&report, &path)?;
                info!("weekly report saved to {}", path.display());
            }
        }
        Command::Season { name, start, end } => {
            let query = SeasonQuery {
                season_name: name,
                start_date: DateKey::parse(&start)?,
                end_date: DateKey::parse(&end)?,
                weights: settings.weights,
            };
            let snapshot = roster.generate_season(query)?;
            print_season(&snapshot);
        }
        Command::Conductor { date } => {
            let date = match date {
                Some(date) => DateKey::parse(&date)?,
                None => DateKey::new(Utc::now().date_naive()),
            };
            print_rotation(date, roster.current_conductor(date), &roster.rotation());
            if let Some(next) = roster.next_leader_due() {
                println!("\nNext due: {}", next.player_name);
            }
        }
    }

    Ok(())
}
