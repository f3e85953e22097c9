//! Whole-archive element totals.

use std::fmt;

use log::info;
use pgn_reader::{Nag, Outcome, RawComment, RawHeader, SanPlus, Visitor};

/// Visitor counting every element the parser reports.
#[derive(Debug, Default)]
pub struct Stats {
    pub games: usize,
    pub headers: usize,
    pub sans: usize,
    pub nags: usize,
    pub comments: usize,
    pub variations: usize,
    pub outcomes: usize,
}

impl Visitor for Stats {
    type Result = ();

    fn header(&mut self, _key: &[u8], _value: RawHeader<'_>) {
        self.headers += 1;
    }

    fn san(&mut self, _san: SanPlus) {
        self.sans += 1;
    }

    fn nag(&mut self, _nag: Nag) {
        self.nags += 1;
    }

    fn comment(&mut self, _comment: RawComment<'_>) {
        self.comments += 1;
    }

    fn end_variation(&mut self) {
        self.variations += 1;
    }

    fn outcome(&mut self, _outcome: Option<Outcome>) {
        self.outcomes += 1;
    }

    fn end_game(&mut self) {
        self.games += 1;
        if self.games % 1_000_000 == 0 {
            info!("parsed {} games", self.games);
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "games: {}", self.games)?;
        writeln!(f, "headers: {}", self.headers)?;
        writeln!(f, "moves: {}", self.sans)?;
        writeln!(f, "nags: {}", self.nags)?;
        writeln!(f, "comments: {}", self.comments)?;
        writeln!(f, "variations: {}", self.variations)?;
        writeln!(f, "outcomes: {}", self.outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgn_reader::BufferedReader;

    #[test]
    fn test_stats_totals() {
        let pgn = b"[Event \"Rated Blitz game\"]\n[Result \"0-1\"]\n\n1. f3 { [%clk 0:03:00] } e5 { [%clk 0:03:00] } 2. g4?? { [%clk 0:02:57] } Qh4# { [%clk 0:02:59] } 0-1\n";
        let mut stats = Stats::default();
        BufferedReader::new_cursor(&pgn[..])
            .read_all(&mut stats)
            .unwrap();
        assert_eq!(stats.games, 1);
        assert_eq!(stats.headers, 2);
        assert_eq!(stats.sans, 4);
        assert_eq!(stats.comments, 4);
        assert_eq!(stats.nags, 1);
        assert_eq!(stats.outcomes, 1);
        assert_eq!(stats.variations, 0);
    }
}
