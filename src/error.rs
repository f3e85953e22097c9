use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::tags::TagError;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("only .pgn and .pgn.zst archives are supported, got {0:?}")]
    UnsupportedArchive(PathBuf),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("error executing DB query: {0}")]
    Db(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("dotenv error: {0}")]
    Env(#[from] dotenv::Error),
    #[error("DATABASE_URL must be set, either in the environment or a dotenv file")]
    MissingDatabaseUrl,
    #[error("the consistency check found errors")]
    CheckFailed,
}
