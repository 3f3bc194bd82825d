//! Raw per-game history CSV
//!
//! One row per game per player, as produced by the synthetic generator or
//! exported from a box-score source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::{GameRecord, HoopsError, Result};

/// A raw game row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub player_name: String,
    pub game_date: NaiveDate,
    pub opponent: String,
    /// 1 = home, 0 = away, empty when unknown
    pub home_game: Option<u8>,
    pub minutes: f32,
    pub points: u32,
    pub rebounds: u32,
    pub assists: u32,
    pub fg_pct: f32,
    #[serde(rename = "FGA")]
    pub fga: u32,
    #[serde(rename = "FGM")]
    pub fgm: u32,
}

impl HistoryRow {
    /// Validate the row into a game record
    pub fn to_game_record(&self) -> Result<GameRecord> {
        let game = GameRecord::new(self.minutes, self.points, self.fga, self.fgm)?
            .with_date(self.game_date);
        match self.home_game {
            None => Ok(game),
            Some(flag) => Ok(game.with_home_game(parse_home_flag(flag)?)),
        }
    }
}

fn parse_home_flag(flag: u8) -> Result<bool> {
    match flag {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(HoopsError::DomainConstraint(format!(
            "home_game must be 0 or 1, got {}",
            other
        ))),
    }
}

/// All games of one player, oldest first
#[derive(Debug, Clone)]
pub struct PlayerHistory {
    pub name: String,
    pub games: Vec<GameRecord>,
}

impl PlayerHistory {
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// The most recent `n` games, oldest first
    pub fn last_games(&self, n: usize) -> Result<&[GameRecord]> {
        if self.games.len() < n {
            return Err(HoopsError::InsufficientHistory {
                games: self.games.len(),
                required: n,
            });
        }
        Ok(&self.games[self.games.len() - n..])
    }
}

/// Group rows by player and order each player's games by date
pub fn group_by_player(rows: &[HistoryRow]) -> Result<Vec<PlayerHistory>> {
    let mut grouped: BTreeMap<&str, Vec<&HistoryRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.player_name.as_str()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(name, mut player_rows)| {
            player_rows.sort_by_key(|r| r.game_date);
            let games = player_rows
                .iter()
                .map(|r| {
                    r.to_game_record().map_err(|e| {
                        HoopsError::DomainConstraint(format!("{} on {}: {}", name, r.game_date, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(PlayerHistory {
                name: name.to_string(),
                games,
            })
        })
        .collect()
}

/// Find a player by name (case-insensitive)
pub fn find_player<'a>(histories: &'a [PlayerHistory], name: &str) -> Result<&'a PlayerHistory> {
    histories
        .iter()
        .find(|h| h.matches_name(name))
        .ok_or_else(|| HoopsError::UnknownPlayer(name.to_string()))
}

/// Read the raw history CSV
pub fn read_history<P: AsRef<Path>>(path: P) -> Result<Vec<HistoryRow>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        HoopsError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    read_history_from_reader(file)
}

pub fn read_history_from_reader<R: Read>(rdr: R) -> Result<Vec<HistoryRow>> {
    let mut reader = csv::Reader::from_reader(rdr);
    reader
        .deserialize::<HistoryRow>()
        .map(|result| result.map_err(schema_error))
        .collect()
}

/// Write the raw history CSV, creating parent directories
pub fn write_history<P: AsRef<Path>>(path: P, rows: &[HistoryRow]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_history_to_writer(File::create(path)?, rows)
}

pub fn write_history_to_writer<W: Write>(wtr: W, rows: &[HistoryRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(wtr);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// A game row entered outside the history file (e.g. `predict --games`)
#[derive(Debug, Clone, Deserialize)]
struct SessionGameRow {
    minutes: f32,
    points: u32,
    #[serde(rename = "FGA")]
    fga: u32,
    #[serde(rename = "FGM")]
    fgm: u32,
    #[serde(default)]
    home_game: Option<u8>,
}

/// Read games (oldest first) from a CSV with columns
/// `minutes,points,FGA,FGM[,home_game]`
pub fn read_session_games<R: Read>(rdr: R) -> Result<Vec<GameRecord>> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut games = Vec::new();
    for result in reader.deserialize::<SessionGameRow>() {
        let row = result.map_err(schema_error)?;
        let game = GameRecord::new(row.minutes, row.points, row.fga, row.fgm)?;
        games.push(match row.home_game {
            Some(flag) => game.with_home_game(parse_home_flag(flag)?),
            None => game,
        });
    }
    Ok(games)
}

fn schema_error(e: csv::Error) -> HoopsError {
    match e.kind() {
        csv::ErrorKind::Deserialize { .. } | csv::ErrorKind::UnequalLengths { .. } => {
            HoopsError::Schema(e.to_string())
        }
        _ => HoopsError::Csv(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
player_name,game_date,opponent,home_game,minutes,points,rebounds,assists,fg_pct,FGA,FGM
Player_B,2024-10-03,BOS,0,33.1,20,5,4,0.45,20,9
Player_A,2024-10-02,LAL,1,35.2,24,6,5,0.52,21,11
Player_A,2024-10-01,GSW,,31.0,23,7,3,0.47,19,9
";

    #[test]
    fn test_read_and_group() {
        let rows = read_history_from_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].home_game, None);
        assert_eq!(rows[0].fga, 20);

        let histories = group_by_player(&rows).unwrap();
        assert_eq!(histories.len(), 2);
        assert_eq!(histories[0].name, "Player_A");

        // Sorted by date regardless of file order
        let a = &histories[0].games;
        assert_eq!(a[0].points(), 23);
        assert_eq!(a[0].home_game(), None);
        assert_eq!(a[1].points(), 24);
        assert_eq!(a[1].home_game(), Some(true));
        assert_eq!(a[1].game_date(), NaiveDate::from_ymd_opt(2024, 10, 2));
    }

    #[test]
    fn test_non_numeric_column_is_schema_error() {
        let bad = "\
player_name,game_date,opponent,home_game,minutes,points,rebounds,assists,fg_pct,FGA,FGM
Player_A,2024-10-01,GSW,1,thirty,23,7,3,0.47,19,9
";
        let err = read_history_from_reader(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, HoopsError::Schema(_)));
    }

    #[test]
    fn test_invalid_row_is_domain_error() {
        let bad = "\
player_name,game_date,opponent,home_game,minutes,points,rebounds,assists,fg_pct,FGA,FGM
Player_A,2024-10-01,GSW,1,30.0,23,7,3,0.47,9,12
";
        let rows = read_history_from_reader(bad.as_bytes()).unwrap();
        let err = group_by_player(&rows).unwrap_err();
        assert!(matches!(err, HoopsError::DomainConstraint(_)));
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw").join("games.csv");
        let rows = read_history_from_reader(SAMPLE.as_bytes()).unwrap();

        write_history(&path, &rows).unwrap();
        let back = read_history(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_find_player_and_last_games() {
        let rows = read_history_from_reader(SAMPLE.as_bytes()).unwrap();
        let histories = group_by_player(&rows).unwrap();

        let player = find_player(&histories, "player_a").unwrap();
        assert_eq!(player.last_games(1).unwrap()[0].points(), 24);
        assert!(matches!(
            player.last_games(5),
            Err(HoopsError::InsufficientHistory {
                games: 2,
                required: 5
            })
        ));
        assert!(matches!(
            find_player(&histories, "Nobody"),
            Err(HoopsError::UnknownPlayer(_))
        ));
    }

    #[test]
    fn test_read_session_games() {
        let input = "minutes,points,FGA,FGM,home_game\n35.2,24,21,11,1\n31.0,23,19,9,0\n";
        let games = read_session_games(input.as_bytes()).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_game(), Some(true));
        assert_eq!(games[1].home_game(), Some(false));

        let no_home = "minutes,points,FGA,FGM\n35.2,24,21,11\n";
        let games = read_session_games(no_home.as_bytes()).unwrap();
        assert_eq!(games[0].home_game(), None);

        let bad = "minutes,points,FGA,FGM\n35.2,24,5,11\n";
        assert!(matches!(
            read_session_games(bad.as_bytes()),
            Err(HoopsError::DomainConstraint(_))
        ));
    }
}
