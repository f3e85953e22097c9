//! Insertable rows, built from a finished [`GameRecord`].

use chrono::{NaiveDateTime, NaiveTime};
use diesel::prelude::*;

use super::schema::{events, games, moves, openings, players};
use crate::game::{GameRecord, MoveRecord};
use crate::tags::{Event, Eval};

#[derive(Debug, Insertable)]
#[diesel(table_name = players)]
pub struct NewPlayer<'a> {
    pub name: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = openings)]
pub struct NewOpening<'a> {
    pub eco: String,
    pub name: &'a str,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = events)]
pub struct NewEvent<'a> {
    pub name: &'a str,
    pub kind: i16,
    pub url: &'a str,
}

impl<'a> From<&'a Event> for NewEvent<'a> {
    fn from(event: &'a Event) -> Self {
        NewEvent {
            name: &event.name,
            kind: event.kind.as_i16(),
            url: &event.url,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = games)]
pub struct NewGame<'a> {
    pub event_id: i32,
    pub opening_id: Option<i32>,
    pub white_id: Option<i32>,
    pub black_id: Option<i32>,
    pub white_elo: Option<i16>,
    pub black_elo: Option<i16>,
    pub white_title: Option<&'static str>,
    pub black_title: Option<&'static str>,
    pub result: &'static str,
    pub termination: &'static str,
    pub base_seconds: Option<i32>,
    pub increment_seconds: Option<i16>,
    pub played_at: Option<NaiveDateTime>,
    pub has_clocks: bool,
    pub has_evals: bool,
    pub final_fen: &'a str,
    pub ply_count: i32,
}

impl<'a> NewGame<'a> {
    pub fn new(
        record: &'a GameRecord,
        ply_count: usize,
        event_id: i32,
        opening_id: Option<i32>,
        white_id: Option<i32>,
        black_id: Option<i32>,
    ) -> Self {
        let (base_seconds, increment_seconds) = match record.time_control.0 {
            Some((base, increment)) => (Some(i32::from(base)), Some(i16::from(increment))),
            None => (None, None),
        };
        NewGame {
            event_id,
            opening_id,
            white_id,
            black_id,
            white_elo: record.white_elo.0.map(|rating| rating as i16),
            black_elo: record.black_elo.0.map(|rating| rating as i16),
            white_title: record.white_title.map(|title| title.as_str()),
            black_title: record.black_title.map(|title| title.as_str()),
            result: record.result.as_str(),
            termination: record.termination.as_str(),
            base_seconds,
            increment_seconds,
            played_at: record
                .date
                .zip(record.time)
                .map(|(date, time)| date.and_time(time)),
            has_clocks: record.has_clocks,
            has_evals: record.has_evals,
            final_fen: &record.final_fen,
            ply_count: ply_count as i32,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = moves)]
pub struct NewMove<'a> {
    pub game_id: i64,
    pub ply: i32,
    pub san: &'a str,
    pub nag: Option<i16>,
    pub clock: Option<NaiveTime>,
    pub eval_pawns: Option<f32>,
    pub eval_mate: Option<i16>,
    pub capture: bool,
    pub promotion: bool,
}

impl<'a> NewMove<'a> {
    pub fn new(game_id: i64, record: &'a MoveRecord) -> Self {
        let (eval_pawns, eval_mate) = match record.eval {
            Some(Eval::Pawns(pawns)) => (Some(pawns), None),
            Some(Eval::Mate(m)) => (None, Some(i16::from(m))),
            None => (None, None),
        };
        NewMove {
            game_id,
            ply: i32::from(record.ply),
            san: &record.san,
            nag: record.nag.map(i16::from),
            clock: record.clock,
            eval_pawns,
            eval_mate,
            capture: record.capture,
            promotion: record.promotion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{Elo, GameResult, Termination, TimeControl, Title};
    use chrono::NaiveDate;

    #[test]
    fn test_new_game_from_record() {
        let mut record = GameRecord::default();
        record.white = "alice".into();
        record.white_elo = Elo(Some(2410));
        record.white_title = Some(Title::Im);
        record.result = GameResult::Draw;
        record.termination = Termination::Normal;
        record.time_control = TimeControl(Some((300, 3)));
        record.date = NaiveDate::from_ymd_opt(2013, 1, 5);
        record.time = chrono::NaiveTime::from_hms_opt(21, 14, 23);
        record.final_fen = "8/8/8/8/8/8/8/8 w - - 0 1".into();

        let row = NewGame::new(&record, 61, 7, None, Some(1), Some(2));
        assert_eq!(row.event_id, 7);
        assert_eq!(row.white_id, Some(1));
        assert_eq!(row.white_elo, Some(2410));
        assert_eq!(row.white_title, Some("IM"));
        assert_eq!(row.result, "1/2-1/2");
        assert_eq!(row.base_seconds, Some(300));
        assert_eq!(row.increment_seconds, Some(3));
        assert_eq!(
            row.played_at,
            Some(
                NaiveDate::from_ymd_opt(2013, 1, 5)
                    .unwrap()
                    .and_hms_opt(21, 14, 23)
                    .unwrap()
            )
        );
        assert_eq!(row.ply_count, 61);
    }

    #[test]
    fn test_new_move_eval_split() {
        let record = MoveRecord {
            ply: 3,
            san: "Qh5".into(),
            eval: Some(Eval::Mate(-2)),
            ..MoveRecord::default()
        };
        let row = NewMove::new(42, &record);
        assert_eq!(row.game_id, 42);
        assert_eq!(row.ply, 3);
        assert_eq!(row.eval_pawns, None);
        assert_eq!(row.eval_mate, Some(-2));
    }
}
