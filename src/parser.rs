use csv::ReaderBuilder;
use log::warn;
use std::io::Read;
use std::path::Path;

use crate::date_key::DayRef;
use crate::error::Result;
use crate::store::rankings::dedupe_by_rank;
use crate::store::types::{parse_points, RankingRecord};

/// Parses a rank like "3", "#3" or "3." into a positive number
fn parse_rank(value: &str) -> Option<u32> {
    let clean = value.trim().trim_start_matches('#').trim_end_matches('.');
    clean.parse().ok().filter(|rank| *rank > 0)
}

/// Reads a ranking list for one day from CSV.
///
/// Columns are found by header name (`rank`, `commander`/`name`/`player`,
/// `points`/`score`/`power`), falling back to the first three columns in
/// that order. Rows without a usable rank or name are skipped; unreadable
/// points count as 0. Duplicate ranks keep the row with more points.
pub fn read_rankings<R: Read>(reader: R, day: &DayRef) -> Result<Vec<RankingRecord>> {
    let mut reader = ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_lowercase()).collect();

    let rank_col = headers.iter().position(|h| h.contains("rank")).unwrap_or(0);
    let name_col = headers
        .iter()
        .position(|h| h.contains("commander") || h.contains("name") || h.contains("player"))
        .unwrap_or(1);
    let points_col = headers
        .iter()
        .position(|h| h.contains("points") || h.contains("score") || h.contains("power"))
        .unwrap_or(2);

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;

        let Some(rank) = record.get(rank_col).and_then(parse_rank) else {
            warn!("skipping ranking row {} for {day}: no usable rank", line + 2);
            continue;
        };
        let name = record.get(name_col).unwrap_or("").trim();
        if name.is_empty() {
            warn!("skipping ranking row {} for {day}: empty name", line + 2);
            continue;
        }
        let points = parse_points(record.get(points_col).unwrap_or(""));

        records.push(RankingRecord::new(day.clone(), rank, name, points));
    }

    Ok(dedupe_by_rank(records))
}

/// Loads a ranking CSV file for one day
pub fn load_rankings<P: AsRef<Path>>(csv_path: P, day: &DayRef) -> Result<Vec<RankingRecord>> {
    let file = std::fs::File::open(csv_path)?;
    read_rankings(file, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> DayRef {
        DayRef::try_from("2025-01-06".to_string()).unwrap()
    }

    #[test]
    fn reads_by_header_name_in_any_order() {
        let csv = "Points,Commander,Rank\n\"1,200\",Alice,2\n900,Bob,1\n";
        let rows = read_rankings(csv.as_bytes(), &day()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].commander, "Bob");
        assert_eq!(rows[1].points, 1200);
    }

    #[test]
    fn skips_bad_rows_and_zeroes_bad_points() {
        let csv = "rank,name,score\n1,Alice,abc\nx,Bob,10\n3,,10\n#4,Dana,\n";
        let rows = read_rankings(csv.as_bytes(), &day()).unwrap();
        let summary: Vec<(u32, &str, u64)> = rows.iter().map(|r| (r.rank, r.commander.as_str(), r.points)).collect();
        assert_eq!(summary, vec![(1, "Alice", 0), (4, "Dana", 0)]);
    }

    #[test]
    fn duplicate_ranks_keep_higher_points() {
        let csv = "rank,commander,points\n1,Alice,100\n1,Bob,300\n";
        let rows = read_rankings(csv.as_bytes(), &day()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].commander, "Bob");
    }

    #[test]
    fn positional_fallback_without_known_headers() {
        let csv = "a,b,c\n1,Alice,50\n";
        let rows = read_rankings(csv.as_bytes(), &day()).unwrap();
        assert_eq!(rows[0].commander, "Alice");
        assert_eq!(rows[0].points, 50);
    }
}
