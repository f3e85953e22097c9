//! Relational persistence of crawled games.
//!
//! Inserts run on a bounded pool of worker threads so parsing is never
//! blocked on the database; the dedup tables (players, openings, events)
//! tolerate concurrent workers through conflict-ignoring inserts.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use log::{error, info, warn};
use pgn_reader::{Nag, Outcome, RawComment, RawHeader, SanPlus, Skip, Visitor};

use crate::error::CrawlError;
use crate::game::{GameRecord, MoveRecord, Scoresheet};
use crate::tags::Event;
use self::model::{NewEvent, NewGame, NewMove, NewOpening, NewPlayer};
use self::schema::{events, games, moves, openings, players};

pub mod model;
pub mod schema;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_db_pool(db_url: &str, max_size: u32) -> Result<DbPool, CrawlError> {
    Ok(Pool::builder()
        .max_size(max_size)
        .build(ConnectionManager::new(db_url))?)
}

/// Creates the tables if needed; with `rebuild`, drops them first.
pub fn bootstrap(pool: &DbPool, rebuild: bool) -> Result<(), CrawlError> {
    let mut conn = pool.get()?;
    if rebuild {
        info!("dropping existing tables");
        conn.batch_execute(include_str!("sql/drop_tables.sql"))?;
    }
    conn.batch_execute(include_str!("sql/create_tables.sql"))?;
    Ok(())
}

fn player_id(conn: &mut PgConnection, name: &str) -> QueryResult<Option<i32>> {
    if name.is_empty() || name == "?" {
        return Ok(None);
    }
    let inserted = diesel::insert_into(players::table)
        .values(NewPlayer { name })
        .on_conflict(players::name)
        .do_nothing()
        .returning(players::id)
        .get_result(conn)
        .optional()?;
    match inserted {
        Some(id) => Ok(Some(id)),
        None => players::table
            .filter(players::name.eq(name))
            .select(players::id)
            .first(conn)
            .map(Some),
    }
}

fn opening_id(conn: &mut PgConnection, eco: String, name: &str) -> QueryResult<Option<i32>> {
    if name.is_empty() {
        return Ok(None);
    }
    let inserted = diesel::insert_into(openings::table)
        .values(NewOpening {
            eco: eco.clone(),
            name,
        })
        .on_conflict((openings::eco, openings::name))
        .do_nothing()
        .returning(openings::id)
        .get_result(conn)
        .optional()?;
    match inserted {
        Some(id) => Ok(Some(id)),
        None => openings::table
            .filter(openings::eco.eq(eco).and(openings::name.eq(name)))
            .select(openings::id)
            .first(conn)
            .map(Some),
    }
}

fn event_id(conn: &mut PgConnection, event: &Event) -> QueryResult<i32> {
    let row = NewEvent::from(event);
    let inserted = diesel::insert_into(events::table)
        .values(&row)
        .on_conflict((events::name, events::kind, events::url))
        .do_nothing()
        .returning(events::id)
        .get_result(conn)
        .optional()?;
    match inserted {
        Some(id) => Ok(id),
        None => events::table
            .filter(
                events::name
                    .eq(row.name)
                    .and(events::kind.eq(row.kind))
                    .and(events::url.eq(row.url)),
            )
            .select(events::id)
            .first(conn),
    }
}

/// Inserts one game and its moves, deduplicating the referenced rows.
pub fn insert_game(
    conn: &mut PgConnection,
    record: &GameRecord,
    game_moves: &[MoveRecord],
) -> QueryResult<i64> {
    conn.transaction(|conn| {
        let event_id = event_id(conn, &record.event)?;
        let opening_id = opening_id(conn, record.eco.to_string(), &record.opening)?;
        let white_id = player_id(conn, &record.white)?;
        let black_id = player_id(conn, &record.black)?;
        let game_id = diesel::insert_into(games::table)
            .values(NewGame::new(
                record,
                game_moves.len(),
                event_id,
                opening_id,
                white_id,
                black_id,
            ))
            .returning(games::id)
            .get_result::<i64>(conn)?;
        let rows: Vec<NewMove> = game_moves
            .iter()
            .map(|record| NewMove::new(game_id, record))
            .collect();
        if !rows.is_empty() {
            diesel::insert_into(moves::table)
                .values(&rows)
                .execute(conn)?;
        }
        Ok(game_id)
    })
}

/// How a load run went.
#[derive(Debug, Clone, Copy)]
pub struct LoadOutcome {
    pub games: usize,
    pub parse_errors: bool,
    pub insert_errors: bool,
}

/// Visitor inserting every game through a bounded pool of worker threads.
pub struct Loader {
    pool: DbPool,
    sheet: Scoresheet,
    workers: VecDeque<JoinHandle<bool>>,
    max_workers: usize,
    insert_errors: bool,
}

impl Loader {
    pub fn new(db_url: &str, rebuild: bool, jobs: usize) -> Result<Self, CrawlError> {
        let jobs = jobs.max(1);
        let pool = create_db_pool(db_url, jobs as u32 + 1)?;
        bootstrap(&pool, rebuild)?;
        Ok(Self {
            pool,
            sheet: Scoresheet::default(),
            workers: VecDeque::with_capacity(jobs),
            max_workers: jobs,
            insert_errors: false,
        })
    }

    fn reap(&mut self, handle: JoinHandle<bool>) {
        if !handle.join().unwrap_or(false) {
            self.insert_errors = true;
        }
    }

    /// Hands the finished game to a worker, joining the oldest one first when
    /// the pool is full.
    fn dispatch(&mut self) {
        let index = self.sheet.games;
        let record = self.sheet.game.clone();
        let game_moves = std::mem::take(&mut self.sheet.moves);
        if self.workers.len() == self.max_workers {
            if let Some(handle) = self.workers.pop_front() {
                self.reap(handle);
            }
        }
        let pool = self.pool.clone();
        self.workers.push_back(thread::spawn(move || {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(err) => {
                    error!("game {}: no database connection: {}", index, err);
                    return false;
                }
            };
            match insert_game(&mut conn, &record, &game_moves) {
                Ok(_) => true,
                Err(err) => {
                    error!("game {}: insertion failed: {}", index, err);
                    false
                }
            }
        }));
    }

    /// Joins the remaining workers and reports how the run went.
    pub fn finish(mut self) -> LoadOutcome {
        while let Some(handle) = self.workers.pop_front() {
            if !handle.join().unwrap_or(false) {
                self.insert_errors = true;
            }
        }
        if self.sheet.has_errors {
            warn!("load finished with parsing errors");
        }
        if self.insert_errors {
            warn!("load finished with insertion errors");
        }
        LoadOutcome {
            games: self.sheet.games,
            parse_errors: self.sheet.has_errors,
            insert_errors: self.insert_errors,
        }
    }
}

impl Visitor for Loader {
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
        self.dispatch();
        if self.sheet.games % 1000 == 0 {
            info!("inserted {} games", self.sheet.games);
        }
    }
}
