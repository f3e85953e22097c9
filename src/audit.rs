//! Consistency checking of archives against the tag set Lichess actually
//! writes, and collection of the distinct keys seen.

use std::collections::BTreeSet;
use std::io::{self, Write};

use log::warn;
use pgn_reader::{Nag, Outcome, RawComment, RawHeader, SanPlus, Visitor};

use crate::comments::{CommentTags, CLK, EVAL};
use crate::game::{
    BLACK, BLACK_ELO, BLACK_RATING_DIFF, BLACK_TITLE, DATE, ECO, EVENT, LICHESS_ID, OPENING,
    RESULT, ROUND, SITE, TERMINATION, TIME_CONTROL, UTC_DATE, UTC_TIME, WHITE, WHITE_ELO,
    WHITE_RATING_DIFF, WHITE_TITLE,
};
use crate::tags::{
    self, Eco, Elo, Eval, Event, GameResult, TagResult, Termination, TimeControl, Title,
};

/// Which of the always-present headers showed up in the current game.
#[derive(Debug, Default)]
struct Seen {
    site: bool,
    event: bool,
    white: bool,
    black: bool,
    white_elo: bool,
    black_elo: bool,
    date: bool,
    time: bool,
    opening: bool,
    eco: bool,
    time_control: bool,
    result: bool,
    termination: bool,
}

/// Visitor validating every game against the formats of a Lichess export.
#[derive(Debug, Default)]
pub struct Checker {
    /// Games checked so far.
    pub games: usize,
    pub has_errors: bool,
    seen: Seen,
    date: Vec<u8>,
    utc_date: Vec<u8>,
    result: GameResult,
    termination: Termination,
}

impl Checker {
    fn report<T>(&mut self, parsed: TagResult<T>) -> Option<T> {
        match parsed {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("game {}: {}", self.games + 1, err);
                self.has_errors = true;
                None
            }
        }
    }

    fn validate<T>(&mut self, parsed: TagResult<T>) {
        let _ = self.report(parsed);
    }

    fn flag(&mut self, complaint: &str) {
        warn!("game {}: {}", self.games + 1, complaint);
        self.has_errors = true;
    }

    fn check_header(&mut self, key: &[u8], value: &[u8]) {
        match key {
            SITE => self.seen.site = true,
            ROUND | LICHESS_ID | WHITE_RATING_DIFF | BLACK_RATING_DIFF => (),
            EVENT => {
                self.seen.event = true;
                self.validate(Event::from_bytes(value));
            }
            WHITE => self.seen.white = true,
            BLACK => self.seen.black = true,
            WHITE_ELO => {
                self.seen.white_elo = true;
                self.validate(Elo::from_bytes(value));
            }
            BLACK_ELO => {
                self.seen.black_elo = true;
                self.validate(Elo::from_bytes(value));
            }
            WHITE_TITLE | BLACK_TITLE => {
                self.validate(Title::from_bytes(value));
            }
            OPENING => self.seen.opening = true,
            ECO => {
                self.seen.eco = true;
                self.validate(Eco::from_bytes(value));
            }
            TIME_CONTROL => {
                self.seen.time_control = true;
                self.validate(TimeControl::from_bytes(value));
            }
            RESULT => {
                self.seen.result = true;
                if let Some(result) = self.report(GameResult::from_bytes(value)) {
                    self.result = result;
                }
            }
            TERMINATION => {
                self.seen.termination = true;
                if let Some(termination) = self.report(Termination::from_bytes(value)) {
                    self.termination = termination;
                }
            }
            DATE => {
                self.date.clear();
                self.date.extend_from_slice(value);
            }
            UTC_DATE => {
                self.seen.date = true;
                self.utc_date.clear();
                self.utc_date.extend_from_slice(value);
                self.validate(tags::parse_date(value));
            }
            UTC_TIME => {
                self.seen.time = true;
                self.validate(tags::parse_time(value));
            }
            unknown => {
                let complaint = format!("unknown header {:?}", String::from_utf8_lossy(unknown));
                self.flag(&complaint);
            }
        }
    }

    fn check_comment(&mut self, comment: &[u8]) {
        for (key, value) in CommentTags::new(comment) {
            match key {
                CLK => {
                    self.validate(tags::parse_clock(value));
                }
                EVAL => {
                    self.validate(Eval::from_bytes(value));
                }
                unknown => {
                    let complaint =
                        format!("unknown comment key {:?}", String::from_utf8_lossy(unknown));
                    self.flag(&complaint);
                }
            }
        }
    }

    fn check_game(&mut self) {
        if !self.seen.site {
            self.flag("Site is missing");
        }
        if !self.seen.event {
            self.flag("Event is missing");
        }
        if !self.seen.white {
            self.flag("White is missing");
        }
        if !self.seen.black {
            self.flag("Black is missing");
        }
        if !self.seen.white_elo {
            self.flag("WhiteElo is missing");
        }
        if !self.seen.black_elo {
            self.flag("BlackElo is missing");
        }
        if !self.seen.date {
            self.flag("UTCDate is missing");
        }
        if !self.seen.time {
            self.flag("UTCTime is missing");
        }
        if !self.seen.time_control {
            self.flag("TimeControl is missing");
        }
        if !self.seen.result {
            self.flag("Result is missing");
        }
        if !self.seen.termination {
            self.flag("Termination is missing");
        }
        if self.seen.opening != self.seen.eco {
            self.flag("Opening and ECO do not appear together");
        }
        if !self.date.is_empty() && self.date != self.utc_date {
            self.flag("Date disagrees with UTCDate");
        }
        if self.termination == Termination::Unterminated && self.result != GameResult::Unknown {
            self.flag("Unterminated game carries a result");
        }
        self.seen = Seen::default();
        self.date.clear();
        self.utc_date.clear();
        self.result = GameResult::default();
        self.termination = Termination::default();
        self.games += 1;
    }
}

impl Visitor for Checker {
    type Result = ();

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        self.check_header(key, value.0);
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        self.check_comment(comment.0);
    }

    fn end_game(&mut self) {
        self.check_game();
    }
}

/// Visitor collecting the distinct header and comment keys of an archive.
#[derive(Debug, Default)]
pub struct Collector {
    pub headers: BTreeSet<Vec<u8>>,
    pub comments: BTreeSet<Vec<u8>>,
}

impl Collector {
    fn collect_header(&mut self, key: &[u8]) {
        if !self.headers.contains(key) {
            self.headers.insert(key.to_owned());
        }
    }

    fn collect_comment(&mut self, comment: &[u8]) {
        for (key, _) in CommentTags::new(comment) {
            if !self.comments.contains(key) {
                self.comments.insert(key.to_owned());
            }
        }
    }

    pub fn write_collection<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "headers:")?;
        for key in &self.headers {
            writeln!(out, "  {}", String::from_utf8_lossy(key))?;
        }
        writeln!(out, "comment keys:")?;
        for key in &self.comments {
            writeln!(out, "  {}", String::from_utf8_lossy(key))?;
        }
        Ok(())
    }
}

impl Visitor for Collector {
    type Result = ();

    fn header(&mut self, key: &[u8], _value: RawHeader<'_>) {
        self.collect_header(key);
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        self.collect_comment(comment.0);
    }

    fn end_game(&mut self) {}
}

/// Checks and collects in a single pass over the archive.
#[derive(Debug, Default)]
pub struct Audit {
    pub checker: Checker,
    pub collector: Collector,
}

impl Visitor for Audit {
    type Result = ();

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        self.checker.check_header(key, value.0);
        self.collector.collect_header(key);
    }

    fn comment(&mut self, comment: RawComment<'_>) {
        self.checker.check_comment(comment.0);
        self.collector.collect_comment(comment.0);
    }

    fn san(&mut self, _san: SanPlus) {}

    fn nag(&mut self, _nag: Nag) {}

    fn outcome(&mut self, _outcome: Option<Outcome>) {}

    fn end_game(&mut self) {
        self.checker.check_game();
    }
}
