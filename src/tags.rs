//! Typed values for the PGN tags and comment annotations Lichess emits.
//!
//! Every parser here takes the raw header bytes, since the reader hands tag
//! values out unescaped and undecoded. Unknown placeholders ("?", "-",
//! "????.??.??") decode to absent values rather than errors.

use std::fmt::{self, Display};
use std::str::from_utf8;

use chrono::{NaiveDate, NaiveTime};
use shakmaty::{Color, Outcome};
use thiserror::Error;

/// Forwards `Display` to `as_str`.
macro_rules! fmt_as_str {
    () => {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.as_str().fmt(f)
        }
    };
}

/// Which tag a value failed to parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Result,
    Termination,
    TimeControl,
    Elo,
    Title,
    Eco,
    Eval,
    Event,
    Opening,
    Player,
    Date,
    Time,
    Clock,
}

impl TagKind {
    fn expected(&self) -> &'static str {
        match self {
            TagKind::Result => "1-0, 0-1, 1/2-1/2 or *",
            TagKind::Termination => {
                "Normal, Time forfeit, Rules infraction, Abandoned or Unterminated"
            }
            TagKind::TimeControl => "base+increment seconds, or -",
            TagKind::Elo => "an unsigned rating, or ?",
            TagKind::Title => "a Lichess player title",
            TagKind::Eco => "a letter A-E and two digits, or ?",
            TagKind::Eval => "pawns as a float, or #moves-to-mate",
            TagKind::Event => "a name ending in \"game\", or a tournament/swiss URL",
            TagKind::Opening => "an UTF-8 opening name",
            TagKind::Player => "an UTF-8 username",
            TagKind::Date => "YYYY.MM.DD",
            TagKind::Time => "HH:MM:SS",
            TagKind::Clock => "H:MM:SS",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Result => "Result",
            TagKind::Termination => "Termination",
            TagKind::TimeControl => "TimeControl",
            TagKind::Elo => "Elo",
            TagKind::Title => "Title",
            TagKind::Eco => "ECO",
            TagKind::Eval => "%eval",
            TagKind::Event => "Event",
            TagKind::Opening => "Opening",
            TagKind::Player => "player name",
            TagKind::Date => "date",
            TagKind::Time => "time",
            TagKind::Clock => "%clk",
        }
        .fmt(f)
    }
}

/// A tag value that did not match the format Lichess writes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {kind} value {value:?}, expected {}", .kind.expected())]
pub struct TagError {
    pub kind: TagKind,
    pub value: String,
}

impl TagError {
    pub fn new(kind: TagKind, value: &[u8]) -> Self {
        Self {
            kind,
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

pub type TagResult<T> = Result<T, TagError>;

/// Result tag of a game.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    #[default]
    Unknown,
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Unknown => "*",
        }
    }

    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        match value {
            b"1-0" => Ok(GameResult::WhiteWins),
            b"0-1" => Ok(GameResult::BlackWins),
            b"1/2-1/2" => Ok(GameResult::Draw),
            b"*" => Ok(GameResult::Unknown),
            other => Err(TagError::new(TagKind::Result, other)),
        }
    }

    /// Whether one side won.
    pub const fn is_decisive(&self) -> bool {
        matches!(self, GameResult::WhiteWins | GameResult::BlackWins)
    }
}

impl From<Option<Outcome>> for GameResult {
    fn from(outcome: Option<Outcome>) -> Self {
        match outcome {
            Some(Outcome::Decisive {
                winner: Color::White,
            }) => GameResult::WhiteWins,
            Some(Outcome::Decisive {
                winner: Color::Black,
            }) => GameResult::BlackWins,
            Some(Outcome::Draw) => GameResult::Draw,
            None => GameResult::Unknown,
        }
    }
}

impl fmt::Display for GameResult {
    fmt_as_str!();
}

/// Termination tag of a game.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    #[default]
    Unterminated,
    Normal,
    TimeForfeit,
    RulesInfraction,
    Abandoned,
}

impl Termination {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Termination::Normal => "Normal",
            Termination::TimeForfeit => "Time forfeit",
            Termination::RulesInfraction => "Rules infraction",
            Termination::Abandoned => "Abandoned",
            Termination::Unterminated => "Unterminated",
        }
    }

    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        match value {
            b"Normal" => Ok(Termination::Normal),
            b"Time forfeit" => Ok(Termination::TimeForfeit),
            b"Rules infraction" => Ok(Termination::RulesInfraction),
            b"Abandoned" => Ok(Termination::Abandoned),
            b"Unterminated" => Ok(Termination::Unterminated),
            other => Err(TagError::new(TagKind::Termination, other)),
        }
    }
}

impl fmt::Display for Termination {
    fmt_as_str!();
}

/// TimeControl tag: starting clock and per-move increment in seconds.
/// `None` is correspondence ("-").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl(pub Option<(u16, u8)>);

impl TimeControl {
    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        if value == b"-" {
            return Ok(TimeControl(None));
        }
        let err = || TagError::new(TagKind::TimeControl, value);
        let text = from_utf8(value).map_err(|_| err())?;
        let (base, increment) = text.split_once('+').ok_or_else(err)?;
        let base = base.parse().map_err(|_| err())?;
        let increment = increment.parse().map_err(|_| err())?;
        Ok(TimeControl(Some((base, increment))))
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some((base, increment)) => write!(f, "{}+{}", base, increment),
            None => "-".fmt(f),
        }
    }
}

/// Elo rating, absent when the site reported "?".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Elo(pub Option<u16>);

impl Elo {
    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        if value == b"?" {
            return Ok(Elo(None));
        }
        from_utf8(value)
            .ok()
            .and_then(|text| text.parse().ok())
            .map(|rating| Elo(Some(rating)))
            .ok_or_else(|| TagError::new(TagKind::Elo, value))
    }
}

impl fmt::Display for Elo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rating) => rating.fmt(f),
            None => "?".fmt(f),
        }
    }
}

/// Lichess player title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Title {
    Gm,
    Wgm,
    Im,
    Wim,
    Fm,
    Wfm,
    Nm,
    Wnm,
    Cm,
    Wcm,
    Lm,
    Bot,
}

impl Title {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Title::Gm => "GM",
            Title::Wgm => "WGM",
            Title::Im => "IM",
            Title::Wim => "WIM",
            Title::Fm => "FM",
            Title::Wfm => "WFM",
            Title::Nm => "NM",
            Title::Wnm => "WNM",
            Title::Cm => "CM",
            Title::Wcm => "WCM",
            Title::Lm => "LM",
            Title::Bot => "BOT",
        }
    }

    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        match value {
            b"GM" => Ok(Title::Gm),
            b"WGM" => Ok(Title::Wgm),
            b"IM" => Ok(Title::Im),
            b"WIM" => Ok(Title::Wim),
            b"FM" => Ok(Title::Fm),
            b"WFM" => Ok(Title::Wfm),
            b"NM" => Ok(Title::Nm),
            b"WNM" => Ok(Title::Wnm),
            b"CM" => Ok(Title::Cm),
            b"WCM" => Ok(Title::Wcm),
            b"LM" => Ok(Title::Lm),
            b"BOT" => Ok(Title::Bot),
            other => Err(TagError::new(TagKind::Title, other)),
        }
    }
}

impl fmt::Display for Title {
    fmt_as_str!();
}

/// ECO opening classification: a letter A-E and two digits, absent when "?".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Eco(pub Option<(char, u8)>);

impl Eco {
    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        match value {
            b"?" => Ok(Eco(None)),
            [letter @ b'A'..=b'E', tens @ b'0'..=b'9', units @ b'0'..=b'9'] => Ok(Eco(Some((
                char::from(*letter),
                (tens - b'0') * 10 + (units - b'0'),
            )))),
            other => Err(TagError::new(TagKind::Eco, other)),
        }
    }
}

impl fmt::Display for Eco {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some((letter, number)) => write!(f, "{}{:02}", letter, number),
            None => "?".fmt(f),
        }
    }
}

/// Engine evaluation from a `[%eval ...]` comment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eval {
    /// Advantage in pawns, from White's point of view.
    Pawns(f32),
    /// Signed distance to forced mate.
    Mate(i8),
}

impl Eval {
    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        let err = || TagError::new(TagKind::Eval, value);
        match value.split_first() {
            Some((b'#', mate)) => from_utf8(mate)
                .ok()
                .and_then(|text| text.parse().ok())
                .map(Eval::Mate)
                .ok_or_else(err),
            Some(_) => from_utf8(value)
                .ok()
                .and_then(|text| text.parse().ok())
                .map(Eval::Pawns)
                .ok_or_else(err),
            None => Err(err()),
        }
    }
}

impl fmt::Display for Eval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eval::Pawns(pawns) => write!(f, "{:.2}", pawns),
            Eval::Mate(moves) => write!(f, "#{}", moves),
        }
    }
}

/// What kind of play an event was.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An ordinary game outside any tournament.
    #[default]
    Game,
    /// An arena tournament.
    Arena,
    /// A swiss tournament.
    Swiss,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::Game => "game",
            EventKind::Arena => "arena",
            EventKind::Swiss => "swiss",
        }
    }

    pub const fn as_i16(&self) -> i16 {
        *self as i16
    }
}

/// Event tag, split into the event name, its kind and the tournament URL id.
///
/// Lichess writes either `"<name> game"` or `"<name> tournament <url>"` /
/// `"<name> swiss <url>"`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub kind: EventKind,
    pub url: String,
}

impl Event {
    pub fn from_bytes(value: &[u8]) -> TagResult<Self> {
        let err = || TagError::new(TagKind::Event, value);
        let text = from_utf8(value).map_err(|_| err())?;
        let mut tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.pop() {
            Some("game") => Ok(Event {
                name: tokens.join(" "),
                kind: EventKind::Game,
                url: String::new(),
            }),
            Some(link) if link.starts_with("https") => {
                let kind = match tokens.pop() {
                    Some("tournament") => EventKind::Arena,
                    Some("swiss") => EventKind::Swiss,
                    _ => return Err(err()),
                };
                let url = link.rsplit('/').next().unwrap_or_default().to_owned();
                Ok(Event {
                    name: tokens.join(" "),
                    kind,
                    url,
                })
            }
            _ => Err(err()),
        }
    }

    pub fn reset(&mut self) {
        self.name.clear();
        self.kind = EventKind::Game;
        self.url.clear();
    }
}

/// Parses a `YYYY.MM.DD` date tag; `????.??.??` means unknown.
pub fn parse_date(value: &[u8]) -> TagResult<Option<NaiveDate>> {
    if value == b"????.??.??" {
        return Ok(None);
    }
    from_utf8(value)
        .ok()
        .and_then(|text| NaiveDate::parse_from_str(text, "%Y.%m.%d").ok())
        .map(Some)
        .ok_or_else(|| TagError::new(TagKind::Date, value))
}

/// Parses a `HH:MM:SS` time tag; `??:??:??` means unknown.
pub fn parse_time(value: &[u8]) -> TagResult<Option<NaiveTime>> {
    if value == b"??:??:??" {
        return Ok(None);
    }
    from_utf8(value)
        .ok()
        .and_then(|text| NaiveTime::parse_from_str(text, "%H:%M:%S").ok())
        .map(Some)
        .ok_or_else(|| TagError::new(TagKind::Time, value))
}

/// Parses the remaining clock time from a `[%clk ...]` comment.
pub fn parse_clock(value: &[u8]) -> TagResult<NaiveTime> {
    from_utf8(value)
        .ok()
        .and_then(|text| NaiveTime::parse_from_str(text, "%H:%M:%S").ok())
        .ok_or_else(|| TagError::new(TagKind::Clock, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_result() {
        assert_eq!(GameResult::from_bytes(b"1-0"), Ok(GameResult::WhiteWins));
        assert_eq!(GameResult::from_bytes(b"0-1"), Ok(GameResult::BlackWins));
        assert_eq!(GameResult::from_bytes(b"1/2-1/2"), Ok(GameResult::Draw));
        assert_eq!(GameResult::from_bytes(b"*"), Ok(GameResult::Unknown));
        assert!(GameResult::from_bytes(b"2-0").is_err());
        assert_eq!(GameResult::Draw.to_string(), "1/2-1/2");

        let outcome = Some(Outcome::Decisive {
            winner: Color::Black,
        });
        assert_eq!(GameResult::from(outcome), GameResult::BlackWins);
        assert_eq!(GameResult::from(None), GameResult::Unknown);
    }

    #[test]
    fn test_termination() {
        assert_eq!(
            Termination::from_bytes(b"Time forfeit"),
            Ok(Termination::TimeForfeit)
        );
        assert_eq!(
            Termination::from_bytes(b"Unterminated"),
            Ok(Termination::Unterminated)
        );
        assert!(Termination::from_bytes(b"Adjourned").is_err());
    }

    #[test]
    fn test_time_control() {
        assert_eq!(
            TimeControl::from_bytes(b"300+3"),
            Ok(TimeControl(Some((300, 3))))
        );
        assert_eq!(TimeControl::from_bytes(b"-"), Ok(TimeControl(None)));
        assert!(TimeControl::from_bytes(b"300").is_err());
        assert!(TimeControl::from_bytes(b"300+").is_err());
        assert_eq!(TimeControl(Some((60, 0))).to_string(), "60+0");
    }

    #[test]
    fn test_elo() {
        assert_eq!(Elo::from_bytes(b"1654"), Ok(Elo(Some(1654))));
        assert_eq!(Elo::from_bytes(b"?"), Ok(Elo(None)));
        assert!(Elo::from_bytes(b"-12").is_err());
    }

    #[test]
    fn test_title() {
        assert_eq!(Title::from_bytes(b"GM"), Ok(Title::Gm));
        assert_eq!(Title::from_bytes(b"BOT"), Ok(Title::Bot));
        assert!(Title::from_bytes(b"KING").is_err());
    }

    #[test]
    fn test_eco() {
        assert_eq!(Eco::from_bytes(b"C57"), Ok(Eco(Some(('C', 57)))));
        assert_eq!(Eco::from_bytes(b"A00"), Ok(Eco(Some(('A', 0)))));
        assert_eq!(Eco::from_bytes(b"?"), Ok(Eco(None)));
        assert!(Eco::from_bytes(b"F12").is_err());
        assert!(Eco::from_bytes(b"C5").is_err());
        assert_eq!(Eco(Some(('B', 1))).to_string(), "B01");
    }

    #[test]
    fn test_eval() {
        assert_eq!(Eval::from_bytes(b"0.17"), Ok(Eval::Pawns(0.17)));
        assert_eq!(Eval::from_bytes(b"-1.5"), Ok(Eval::Pawns(-1.5)));
        assert_eq!(Eval::from_bytes(b"#-3"), Ok(Eval::Mate(-3)));
        assert_eq!(Eval::from_bytes(b"#5"), Ok(Eval::Mate(5)));
        assert!(Eval::from_bytes(b"").is_err());
        assert!(Eval::from_bytes(b"mate").is_err());
        assert_eq!(Eval::Mate(2).to_string(), "#2");
    }

    #[test]
    fn test_event() {
        let plain = Event::from_bytes(b"Rated Blitz game").unwrap();
        assert_eq!(plain.name, "Rated Blitz");
        assert_eq!(plain.kind, EventKind::Game);
        assert_eq!(plain.url, "");

        let arena =
            Event::from_bytes(b"Rated Bullet tournament https://lichess.org/tournament/abc123")
                .unwrap();
        assert_eq!(arena.name, "Rated Bullet");
        assert_eq!(arena.kind, EventKind::Arena);
        assert_eq!(arena.url, "abc123");

        let swiss =
            Event::from_bytes(b"Weekly Swiss swiss https://lichess.org/swiss/xyz789").unwrap();
        assert_eq!(swiss.kind, EventKind::Swiss);
        assert_eq!(swiss.url, "xyz789");

        assert!(Event::from_bytes(b"Rated Blitz match").is_err());
        assert!(Event::from_bytes(b"Odd https://lichess.org/t/abc").is_err());
    }

    #[test]
    fn test_dates_and_clocks() {
        assert_eq!(
            parse_date(b"2013.01.05"),
            Ok(NaiveDate::from_ymd_opt(2013, 1, 5))
        );
        assert_eq!(parse_date(b"????.??.??"), Ok(None));
        assert!(parse_date(b"2013.13.05").is_err());

        assert_eq!(
            parse_time(b"21:14:23"),
            Ok(NaiveTime::from_hms_opt(21, 14, 23))
        );
        assert_eq!(parse_time(b"??:??:??"), Ok(None));

        assert_eq!(
            parse_clock(b"0:03:00"),
            Ok(NaiveTime::from_hms_opt(0, 3, 0).unwrap())
        );
        assert!(parse_clock(b"3 minutes").is_err());
    }

    #[test]
    fn test_tag_error_display() {
        let err = TimeControl::from_bytes(b"blitz").unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed TimeControl value \"blitz\", expected base+increment seconds, or -"
        );
    }
}
