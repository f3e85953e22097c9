//! Streaming CSV export of games and moves.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use csv::Writer;
use log::{info, warn};
use pgn_reader::{Nag, Outcome, RawComment, RawHeader, SanPlus, Skip, Visitor};
use serde::Serialize;

use crate::error::CrawlError;
use crate::game::{GameRecord, MoveRecord, Scoresheet};
use crate::tags::Eval;

#[derive(Debug, Serialize)]
struct GameRow<'a> {
    game: usize,
    event: &'a str,
    event_kind: &'a str,
    event_url: &'a str,
    white: &'a str,
    white_elo: Option<u16>,
    white_title: Option<&'static str>,
    black: &'a str,
    black_elo: Option<u16>,
    black_title: Option<&'static str>,
    result: &'static str,
    termination: &'static str,
    eco: String,
    opening: &'a str,
    base_seconds: Option<u16>,
    increment_seconds: Option<u8>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    has_clocks: bool,
    has_evals: bool,
    ply_count: usize,
    final_fen: &'a str,
}

impl<'a> GameRow<'a> {
    fn new(game: usize, record: &'a GameRecord, ply_count: usize) -> Self {
        let (base_seconds, increment_seconds) = match record.time_control.0 {
            Some((base, increment)) => (Some(base), Some(increment)),
            None => (None, None),
        };
        GameRow {
            game,
            event: &record.event.name,
            event_kind: record.event.kind.as_str(),
            event_url: &record.event.url,
            white: &record.white,
            white_elo: record.white_elo.0,
            white_title: record.white_title.map(|title| title.as_str()),
            black: &record.black,
            black_elo: record.black_elo.0,
            black_title: record.black_title.map(|title| title.as_str()),
            result: record.result.as_str(),
            termination: record.termination.as_str(),
            eco: record.eco.to_string(),
            opening: &record.opening,
            base_seconds,
            increment_seconds,
            date: record.date,
            time: record.time,
            has_clocks: record.has_clocks,
            has_evals: record.has_evals,
            ply_count,
            final_fen: &record.final_fen,
        }
    }
}

#[derive(Debug, Serialize)]
struct MoveRow<'a> {
    game: usize,
    ply: u16,
    san: &'a str,
    nag: Option<u8>,
    clock: Option<NaiveTime>,
    eval_pawns: Option<f32>,
    eval_mate: Option<i8>,
    capture: bool,
    promotion: bool,
}

impl<'a> MoveRow<'a> {
    fn new(game: usize, record: &'a MoveRecord) -> Self {
        let (eval_pawns, eval_mate) = match record.eval {
            Some(Eval::Pawns(pawns)) => (Some(pawns), None),
            Some(Eval::Mate(moves)) => (None, Some(moves)),
            None => (None, None),
        };
        MoveRow {
            game,
            ply: record.ply,
            san: &record.san,
            nag: record.nag,
            clock: record.clock,
            eval_pawns,
            eval_mate,
            capture: record.capture,
            promotion: record.promotion,
        }
    }
}

/// Visitor writing one row per game and one per move.
pub struct CsvExporter<W: Write> {
    sheet: Scoresheet,
    games: Writer<W>,
    moves: Writer<W>,
    write_errors: bool,
}

impl CsvExporter<File> {
    pub fn create(games_path: &Path, moves_path: &Path) -> Result<Self, CrawlError> {
        info!("exporting games to {:?}, moves to {:?}", games_path, moves_path);
        Ok(Self::new(
            Writer::from_path(games_path)?,
            Writer::from_path(moves_path)?,
        ))
    }
}

impl<W: Write> CsvExporter<W> {
    pub fn new(games: Writer<W>, moves: Writer<W>) -> Self {
        Self {
            sheet: Scoresheet::default(),
            games,
            moves,
            write_errors: false,
        }
    }

    /// Flushes both writers; reports whether every game parsed and serialized
    /// cleanly.
    pub fn finish(mut self) -> Result<bool, CrawlError> {
        self.games.flush()?;
        self.moves.flush()?;
        if self.sheet.has_errors {
            warn!("export finished with parsing errors");
        }
        Ok(!self.sheet.has_errors && !self.write_errors)
    }

    fn write_game(&mut self) {
        let game = self.sheet.games;
        if let Err(err) = self
            .games
            .serialize(GameRow::new(game, &self.sheet.game, self.sheet.moves.len()))
        {
            warn!("game {}: csv write failed: {}", game, err);
            self.write_errors = true;
        }
        for record in &self.sheet.moves {
            if let Err(err) = self.moves.serialize(MoveRow::new(game, record)) {
                warn!("game {}: csv write failed: {}", game, err);
                self.write_errors = true;
                break;
            }
        }
    }
}

impl<W: Write> Visitor for CsvExporter<W> {
    type Result = ();

    fn begin_game(&mut self) {
        self.sheet.start_game();
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        self.sheet.record_header(key, value.0);
    }

    fn san(&mut self, san: SanPlus) {
        self.sheet.record_san(san);
    }

    fn nag(&mut self, nag: Nag) {
        self.sheet.record_nag(nag);
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        self.sheet.record_comment(comment.0);
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true)
    }

    fn outcome(&mut self, outcome: Option<Outcome>) {
        self.sheet.record_outcome(outcome);
    }

    fn end_game(&mut self) {
        self.sheet.finish_game();
        self.write_game();
        if self.sheet.games % 100_000 == 0 {
            info!("exported {} games", self.sheet.games);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgn_reader::BufferedReader;

    #[test]
    fn test_export_rows() {
        let pgn = b"[Event \"Rated Blitz game\"]\n[Site \"https://lichess.org/abcdefgh\"]\n[White \"alice\"]\n[Black \"bob\"]\n[Result \"0-1\"]\n[UTCDate \"2013.01.05\"]\n[UTCTime \"21:14:23\"]\n[WhiteElo \"1654\"]\n[BlackElo \"1919\"]\n[ECO \"A00\"]\n[Opening \"Barnes Opening\"]\n[TimeControl \"180+0\"]\n[Termination \"Normal\"]\n\n1. f3 e5 2. g4 { [%eval -9.4] } Qh4# 0-1\n";
        let mut exporter = CsvExporter::new(
            Writer::from_writer(Vec::new()),
            Writer::from_writer(Vec::new()),
        );
        BufferedReader::new_cursor(&pgn[..])
            .read_all(&mut exporter)
            .unwrap();

        let games = String::from_utf8(exporter.games.into_inner().unwrap()).unwrap();
        let moves = String::from_utf8(exporter.moves.into_inner().unwrap()).unwrap();
        assert!(!exporter.sheet.has_errors);

        let mut game_lines = games.lines();
        let header = game_lines.next().unwrap();
        assert!(header.starts_with("game,event,event_kind"));
        let row = game_lines.next().unwrap();
        assert!(row.starts_with("1,Rated Blitz,game,,alice,1654,,bob,1919,,0-1,Normal,A00"));
        assert_eq!(game_lines.next(), None);

        assert_eq!(moves.lines().count(), 5);
        let last = moves.lines().last().unwrap();
        assert!(last.starts_with("1,4,Qh4#"));
    }
}
