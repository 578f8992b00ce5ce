use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::date_key::DateKey;
use crate::store::{RotationEntry, SeasonSnapshot};
use crate::stats::WeeklyReport;

/// Writes the weekly tables as plain text
pub fn write_weekly_report<W: Write>(out: &mut W, report: &WeeklyReport) -> io::Result<()> {
    let first = report.week.first().map(ToString::to_string).unwrap_or_default();
    let last = report.week.last().map(ToString::to_string).unwrap_or_default();
    writeln!(out, "** Week {first} .. {last} **")?;
    if report.include_special_events {
        writeln!(out, "(special events included)")?;
    }

    writeln!(out, "\nTop 10 on 2+ days:")?;
    write_occurrences(out, &report.top10_sorted())?;

    writeln!(out, "\nRanks 11-30 on 2+ days:")?;
    write_occurrences(out, &report.bottom20_sorted())?;

    writeln!(out, "\nWeekly points (top 5):")?;
    for (i, (name, total)) in report.cumulative_sorted().into_iter().enumerate() {
        writeln!(out, "  {}. {name:<21} {total}", i + 1)?;
    }
    Ok(())
}

fn write_occurrences<W: Write>(out: &mut W, rows: &[(String, u32)]) -> io::Result<()> {
    if rows.is_empty() {
        writeln!(out, "  [NONE]")?;
    }
    for (name, count) in rows {
        writeln!(out, "  {name:<24} {count} days")?;
    }
    Ok(())
}

pub fn print_weekly_report(report: &WeeklyReport) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout)?;
    write_weekly_report(&mut stdout, report)
}

/// Writes the weekly report to a text file
pub fn write_weekly_report_to_file<P: AsRef<Path>>(report: &WeeklyReport, filename: P) -> io::Result<()> {
    let mut file = File::create(filename)?;
    write_weekly_report(&mut file, report)
}

pub fn print_season(snapshot: &SeasonSnapshot) {
    println!(
        "\n=== Season '{}' ({} .. {}) ===",
        snapshot.key.season_name, snapshot.key.start_date, snapshot.key.end_date
    );
    println!(
        "Weights: kudos {}%, VS {}%, events {}% (+ alliance contribution)",
        snapshot.weights.kudos, snapshot.weights.vs_performance, snapshot.weights.special_events
    );
    println!(
        "{:>4}  {:<24} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "#", "Player", "Kudos", "VS", "Events", "Alliance", "Total"
    );
    for row in &snapshot.rows {
        println!(
            "{:>4}  {:<24} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            row.final_rank,
            row.player_name,
            row.kudos_score,
            row.vs_performance_score,
            row.special_events_score,
            row.alliance_contribution_score,
            row.total_weighted_score
        );
    }
}

pub fn print_rotation(date: DateKey, conductor: Option<&RotationEntry>, rotation: &[&RotationEntry]) {
    match conductor {
        Some(entry) => println!("Conductor for {date}: {}", entry.player_name),
        None => println!("Conductor for {date}: [NO ACTIVE LEADERS]"),
    }
    println!("\nRotation:");
    for entry in rotation {
        println!("  {}. {}", entry.rotation_order, entry.player_name);
    }
}
