//! Accumulation of one game's worth of parsed data.
//!
//! `Scoresheet` is fed by the reader callbacks and keeps a live position so
//! every SAN is resolved against the actual board. Per-game state is reset in
//! place between games rather than reallocated.

use chrono::{NaiveDate, NaiveTime};
use log::error;
use pgn_reader::{Nag, SanPlus};
use shakmaty::fen::Fen;
use shakmaty::{Chess, EnPassantMode, Outcome, Position};

use crate::comments::{CommentTags, CLK, EVAL};
use crate::tags::{
    self, Eco, Elo, Eval, Event, GameResult, TagError, TagKind, Termination, TimeControl, Title,
};

// Header keys Lichess writes in its database exports.
pub const EVENT: &[u8] = b"Event";
pub const SITE: &[u8] = b"Site";
pub const DATE: &[u8] = b"Date";
pub const ROUND: &[u8] = b"Round";
pub const WHITE: &[u8] = b"White";
pub const BLACK: &[u8] = b"Black";
pub const RESULT: &[u8] = b"Result";
pub const UTC_DATE: &[u8] = b"UTCDate";
pub const UTC_TIME: &[u8] = b"UTCTime";
pub const WHITE_ELO: &[u8] = b"WhiteElo";
pub const BLACK_ELO: &[u8] = b"BlackElo";
pub const WHITE_RATING_DIFF: &[u8] = b"WhiteRatingDiff";
pub const BLACK_RATING_DIFF: &[u8] = b"BlackRatingDiff";
pub const WHITE_TITLE: &[u8] = b"WhiteTitle";
pub const BLACK_TITLE: &[u8] = b"BlackTitle";
pub const ECO: &[u8] = b"ECO";
pub const OPENING: &[u8] = b"Opening";
pub const TIME_CONTROL: &[u8] = b"TimeControl";
pub const TERMINATION: &[u8] = b"Termination";
pub const LICHESS_ID: &[u8] = b"LichessId";

/// Everything one game's tags and movetext amount to.
#[derive(Debug, Default, Clone)]
pub struct GameRecord {
    pub event: Event,
    pub opening: String,
    pub eco: Eco,
    pub white: String,
    pub white_elo: Elo,
    pub white_title: Option<Title>,
    pub black: String,
    pub black_elo: Elo,
    pub black_title: Option<Title>,
    pub result: GameResult,
    pub termination: Termination,
    pub time_control: TimeControl,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub has_clocks: bool,
    pub has_evals: bool,
    pub final_fen: String,
}

impl GameRecord {
    pub fn reset(&mut self) {
        self.event.reset();
        self.opening.clear();
        self.eco = Eco::default();
        self.white.clear();
        self.white_elo = Elo::default();
        self.white_title = None;
        self.black.clear();
        self.black_elo = Elo::default();
        self.black_title = None;
        self.result = GameResult::default();
        self.termination = Termination::default();
        self.time_control = TimeControl::default();
        self.date = None;
        self.time = None;
        self.has_clocks = false;
        self.has_evals = false;
        self.final_fen.clear();
    }
}

/// One mainline move.
#[derive(Debug, Default, Clone)]
pub struct MoveRecord {
    /// 1-based ply number.
    pub ply: u16,
    pub san: String,
    pub nag: Option<u8>,
    pub clock: Option<NaiveTime>,
    pub eval: Option<Eval>,
    pub capture: bool,
    pub promotion: bool,
}

impl MoveRecord {
    fn reset(&mut self) {
        self.san.clear();
        self.nag = None;
        self.clock = None;
        self.eval = None;
        self.capture = false;
        self.promotion = false;
    }
}

/// Streaming accumulator for the game currently being read.
#[derive(Debug)]
pub struct Scoresheet {
    /// Games finished so far.
    pub games: usize,
    pub game: GameRecord,
    pub moves: Vec<MoveRecord>,
    /// Whether any game so far failed to parse cleanly.
    pub has_errors: bool,
    current: MoveRecord,
    position: Chess,
}

impl Default for Scoresheet {
    fn default() -> Self {
        Self {
            games: 0,
            game: GameRecord::default(),
            moves: Vec::new(),
            has_errors: false,
            current: MoveRecord::default(),
            position: Chess::default(),
        }
    }
}

impl Scoresheet {
    pub fn start_game(&mut self) {
        self.game.reset();
        self.current.reset();
        self.current.ply = 0;
        self.moves.clear();
        self.position = Chess::default();
    }

    pub fn record_header(&mut self, key: &[u8], value: &[u8]) {
        let parsed = match key {
            SITE | ROUND | DATE | LICHESS_ID | WHITE_RATING_DIFF | BLACK_RATING_DIFF => Ok(()),
            EVENT => Event::from_bytes(value).map(|event| self.game.event = event),
            OPENING => copy_utf8(&mut self.game.opening, TagKind::Opening, value),
            ECO => Eco::from_bytes(value).map(|eco| self.game.eco = eco),
            WHITE => copy_utf8(&mut self.game.white, TagKind::Player, value),
            BLACK => copy_utf8(&mut self.game.black, TagKind::Player, value),
            WHITE_ELO => Elo::from_bytes(value).map(|elo| self.game.white_elo = elo),
            BLACK_ELO => Elo::from_bytes(value).map(|elo| self.game.black_elo = elo),
            WHITE_TITLE => Title::from_bytes(value).map(|title| self.game.white_title = Some(title)),
            BLACK_TITLE => Title::from_bytes(value).map(|title| self.game.black_title = Some(title)),
            RESULT => GameResult::from_bytes(value).map(|result| self.game.result = result),
            TERMINATION => {
                Termination::from_bytes(value).map(|termination| self.game.termination = termination)
            }
            TIME_CONTROL => {
                TimeControl::from_bytes(value).map(|control| self.game.time_control = control)
            }
            UTC_DATE => tags::parse_date(value).map(|date| self.game.date = date),
            UTC_TIME => tags::parse_time(value).map(|time| self.game.time = time),
            unknown => {
                error!(
                    "game {}: unknown header {:?}",
                    self.games + 1,
                    String::from_utf8_lossy(unknown)
                );
                self.has_errors = true;
                return;
            }
        };
        if let Err(err) = parsed {
            error!("game {}: {}", self.games + 1, err);
            self.has_errors = true;
        }
    }

    pub fn record_san(&mut self, san: SanPlus) {
        if self.current.ply != 0 {
            self.moves.push(self.current.clone());
            self.current.reset();
        }
        self.current.ply += 1;
        self.current.san = san.to_string();
        match san.san.to_move(&self.position) {
            Ok(m) => {
                self.current.capture = m.is_capture();
                self.current.promotion = m.is_promotion();
                self.position.play_unchecked(&m);
            }
            Err(_) => {
                error!(
                    "game {}: illegal SAN {} at ply {}",
                    self.games + 1,
                    self.current.san,
                    self.current.ply
                );
                self.has_errors = true;
            }
        }
    }

    pub fn record_nag(&mut self, nag: Nag) {
        self.current.nag = Some(nag.0);
    }

    pub fn record_comment(&mut self, comment: &[u8]) {
        for (key, value) in CommentTags::new(comment) {
            let parsed = match key {
                CLK => tags::parse_clock(value).map(|clock| {
                    self.current.clock = Some(clock);
                    self.game.has_clocks = true;
                }),
                EVAL => Eval::from_bytes(value).map(|eval| {
                    self.current.eval = Some(eval);
                    self.game.has_evals = true;
                }),
                unknown => {
                    error!(
                        "game {}: unknown comment key {:?}",
                        self.games + 1,
                        String::from_utf8_lossy(unknown)
                    );
                    self.has_errors = true;
                    continue;
                }
            };
            if let Err(err) = parsed {
                error!("game {}: {}", self.games + 1, err);
                self.has_errors = true;
            }
        }
    }

    pub fn record_outcome(&mut self, outcome: Option<Outcome>) {
        if self.game.result != GameResult::from(outcome) {
            error!(
                "game {}: movetext outcome disagrees with the Result header",
                self.games + 1
            );
            self.has_errors = true;
        }
    }

    pub fn finish_game(&mut self) {
        if self.current.ply != 0 {
            self.moves.push(self.current.clone());
            self.current.reset();
        }
        self.game.final_fen =
            Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string();
        self.games += 1;
    }
}

fn copy_utf8(into: &mut String, kind: TagKind, value: &[u8]) -> Result<(), TagError> {
    match std::str::from_utf8(value) {
        Ok(text) => {
            into.clear();
            into.push_str(text);
            Ok(())
        }
        Err(_) => Err(TagError::new(kind, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_headers(sheet: &mut Scoresheet) {
        sheet.record_header(EVENT, b"Rated Blitz game");
        sheet.record_header(SITE, b"https://lichess.org/abcdefgh");
        sheet.record_header(WHITE, b"alice");
        sheet.record_header(BLACK, b"bob");
        sheet.record_header(WHITE_ELO, b"1654");
        sheet.record_header(BLACK_ELO, b"?");
        sheet.record_header(RESULT, b"1-0");
        sheet.record_header(TERMINATION, b"Normal");
        sheet.record_header(TIME_CONTROL, b"300+3");
        sheet.record_header(UTC_DATE, b"2013.01.05");
        sheet.record_header(UTC_TIME, b"21:14:23");
        sheet.record_header(ECO, b"C20");
        sheet.record_header(OPENING, b"King's Pawn Game");
    }

    fn feed_san(sheet: &mut Scoresheet, san: &str) {
        sheet.record_san(san.parse().unwrap());
    }

    #[test]
    fn test_scoresheet_full_game() {
        let mut sheet = Scoresheet::default();
        sheet.start_game();
        feed_headers(&mut sheet);
        feed_san(&mut sheet, "e4");
        sheet.record_comment(b" [%clk 0:05:00] ");
        feed_san(&mut sheet, "e5");
        sheet.record_comment(b" [%clk 0:04:58] [%eval 0.2] ");
        feed_san(&mut sheet, "Qh5");
        sheet.record_nag(Nag(2));
        feed_san(&mut sheet, "Nc6");
        feed_san(&mut sheet, "Bc4");
        feed_san(&mut sheet, "Nf6");
        feed_san(&mut sheet, "Qxf7#");
        sheet.record_outcome(Some(Outcome::Decisive {
            winner: shakmaty::Color::White,
        }));
        sheet.finish_game();

        assert!(!sheet.has_errors);
        assert_eq!(sheet.games, 1);
        assert_eq!(sheet.moves.len(), 7);
        assert_eq!(sheet.game.white, "alice");
        assert_eq!(sheet.game.white_elo, Elo(Some(1654)));
        assert_eq!(sheet.game.black_elo, Elo(None));
        assert_eq!(sheet.game.result, GameResult::WhiteWins);
        assert!(sheet.game.has_clocks);
        assert!(sheet.game.has_evals);
        assert_eq!(sheet.moves[0].ply, 1);
        assert_eq!(sheet.moves[0].san, "e4");
        assert_eq!(
            sheet.moves[0].clock,
            NaiveTime::from_hms_opt(0, 5, 0)
        );
        assert_eq!(sheet.moves[1].eval, Some(Eval::Pawns(0.2)));
        assert_eq!(sheet.moves[2].nag, Some(2));
        let last = sheet.moves.last().unwrap();
        assert!(last.capture);
        assert_eq!(last.san, "Qxf7#");
        // Scholar's mate leaves the white queen on f7.
        assert!(sheet.game.final_fen.contains("Q"));
        assert!(sheet.game.final_fen.ends_with("b KQkq - 0 4"));
    }

    #[test]
    fn test_illegal_san_flags_game() {
        let mut sheet = Scoresheet::default();
        sheet.start_game();
        feed_san(&mut sheet, "e4");
        feed_san(&mut sheet, "Ke2");
        assert!(sheet.has_errors);
    }

    #[test]
    fn test_unknown_header_flags_game() {
        let mut sheet = Scoresheet::default();
        sheet.start_game();
        sheet.record_header(b"Annotator", b"somebody");
        assert!(sheet.has_errors);
    }

    #[test]
    fn test_outcome_mismatch() {
        let mut sheet = Scoresheet::default();
        sheet.start_game();
        sheet.record_header(RESULT, b"1-0");
        sheet.record_outcome(Some(Outcome::Draw));
        assert!(sheet.has_errors);
    }

    #[test]
    fn test_reset_between_games() {
        let mut sheet = Scoresheet::default();
        sheet.start_game();
        feed_headers(&mut sheet);
        feed_san(&mut sheet, "e4");
        sheet.finish_game();

        sheet.start_game();
        assert_eq!(sheet.game.white, "");
        assert!(sheet.moves.is_empty());
        // The position must be back at the start, so e4 is legal again.
        feed_san(&mut sheet, "e4");
        sheet.finish_game();
        assert!(!sheet.has_errors);
        assert_eq!(sheet.games, 2);
    }
}
