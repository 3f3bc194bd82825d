//! Line-oriented interactive session
//!
//! Games are entered one per line with `add`, oldest first. Once five games
//! are held, `predict` runs the model; the games stay in the session until
//! `clear`. Command errors are reported and the loop continues.

use burn::tensor::backend::Backend;
use std::io::{BufRead, Write};
use std::str::FromStr;

use super::inference::{format_prediction, PredictionReport, Predictor};
use super::OutputFormat;
use crate::data::database::{Database, PredictionEntry};
use crate::data::session::{GameSession, SESSION_CAPACITY};
use crate::{GameRecord, HoopsError, Result};

pub const HELP: &str = "\
Commands:
  add <minutes> <points> <fga> <fgm> [home|away]   Add a game (oldest first)
  list                                              Show entered games
  clear                                             Remove all games
  predict                                           Predict the next game
  help                                              Show this message
  quit                                              Leave the session";

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Add(GameRecord),
    List,
    Clear,
    Predict,
    Help,
    Quit,
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| HoopsError::Parse(format!("{} must be a number, got '{}'", field, value)))
}

/// Parse the location token of an `add` line
pub fn parse_home_flag(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "home" | "h" | "1" | "yes" => Ok(true),
        "away" | "a" | "0" | "no" => Ok(false),
        other => Err(HoopsError::Parse(format!(
            "location must be home or away, got '{}'",
            other
        ))),
    }
}

impl FromStr for SessionCommand {
    type Err = HoopsError;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let command = parts
            .next()
            .ok_or_else(|| HoopsError::Parse("empty command".to_string()))?
            .to_lowercase();
        let args: Vec<&str> = parts.collect();

        match command.as_str() {
            "add" => {
                if args.len() < 4 || args.len() > 5 {
                    return Err(HoopsError::Parse(
                        "usage: add <minutes> <points> <fga> <fgm> [home|away]".to_string(),
                    ));
                }
                let mut game = GameRecord::new(
                    parse_number("minutes", args[0])?,
                    parse_number("points", args[1])?,
                    parse_number("fga", args[2])?,
                    parse_number("fgm", args[3])?,
                )?;
                if let Some(location) = args.get(4) {
                    game = game.with_home_game(parse_home_flag(location)?);
                }
                Ok(SessionCommand::Add(game))
            }
            "list" | "ls" => Ok(SessionCommand::List),
            "clear" => Ok(SessionCommand::Clear),
            "predict" => Ok(SessionCommand::Predict),
            "help" | "?" => Ok(SessionCommand::Help),
            "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
            other => Err(HoopsError::Parse(format!(
                "unknown command '{}', type help for a list",
                other
            ))),
        }
    }
}

/// Render a report in the requested format
pub fn render_report(
    report: &PredictionReport,
    label: Option<&str>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_prediction(report, label)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
    }
}

/// Record a prediction in the log
pub fn log_prediction(
    db: &Database,
    report: &PredictionReport,
    player: Option<&str>,
) -> Result<i64> {
    let id = db.insert_prediction(&PredictionEntry {
        player: player.map(str::to_string),
        schema: report.features.schema().tag().to_string(),
        history: report.history.to_string(),
        predicted_points: report.predicted_points,
        features: report.features.as_slice().to_vec(),
    })?;
    log::debug!("Logged prediction {}", id);
    Ok(id)
}

/// Interactive session state: the predictor, the games entered so far and
/// an optional prediction log
pub struct Console<'a, B: Backend> {
    predictor: &'a Predictor<B>,
    session: GameSession,
    format: OutputFormat,
    db: Option<&'a Database>,
    predictions: usize,
}

impl<'a, B: Backend> Console<'a, B> {
    pub fn new(predictor: &'a Predictor<B>, format: OutputFormat) -> Self {
        Console {
            predictor,
            session: GameSession::new(),
            format,
            db: None,
            predictions: 0,
        }
    }

    /// Log every prediction to `db`
    pub fn with_log(mut self, db: &'a Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn predictions(&self) -> usize {
        self.predictions
    }

    /// Apply one command; returns false when the session should end
    pub fn execute<W: Write>(&mut self, command: SessionCommand, out: &mut W) -> Result<bool> {
        match command {
            SessionCommand::Add(game) => {
                self.session.add(game)?;
                if self.session.is_full() {
                    writeln!(
                        out,
                        "Game added. All {} games entered, type predict.",
                        SESSION_CAPACITY
                    )?;
                } else {
                    writeln!(
                        out,
                        "Game added ({}/{}). {} more needed.",
                        self.session.count(),
                        SESSION_CAPACITY,
                        self.session.remaining()
                    )?;
                }
            }
            SessionCommand::List => self.write_games(out)?,
            SessionCommand::Clear => {
                self.session.clear();
                writeln!(out, "All games cleared.")?;
            }
            SessionCommand::Predict => {
                let report = self.predictor.predict_session(&self.session)?;
                if let Some(db) = self.db {
                    log_prediction(db, &report, None)?;
                }
                self.predictions += 1;
                writeln!(out, "{}", render_report(&report, None, self.format)?)?;
            }
            SessionCommand::Help => writeln!(out, "{}", HELP)?,
            SessionCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn write_games<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.session.count() == 0 {
            writeln!(out, "No games entered yet.")?;
            return Ok(());
        }

        for (i, game) in self.session.games().iter().enumerate() {
            writeln!(out, "  {}. {}", i + 1, game)?;
        }
        Ok(())
    }

    /// Read commands until `quit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        writeln!(
            out,
            "Enter the player's last {} games, oldest first. Type help for commands.",
            SESSION_CAPACITY
        )?;

        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let outcome = line
                .parse::<SessionCommand>()
                .and_then(|command| self.execute(command, out));
            match outcome {
                Ok(true) => {}
                Ok(false) => break,
                Err(HoopsError::Io(e)) => return Err(HoopsError::Io(e)),
                Err(e) => writeln!(out, "Error: {}", e)?,
            }
        }
        Ok(())
    }
}
