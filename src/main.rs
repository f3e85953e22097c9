use std::env;
use std::fs::File;
use std::io::{stdout, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info, warn};
use pgn_reader::BufferedReader;

use patzer::audit::{Audit, Checker};
use patzer::db::Loader;
use patzer::error::CrawlError;
use patzer::export::CsvExporter;
use patzer::reader::{count_games, ArchiveReader, GameSampler};
use patzer::stats::Stats;

#[derive(Parser, Debug)]
#[command(version, about = "Crawl Lichess PGN database archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count the games in an archive without parsing it.
    Count { archive: PathBuf },
    /// Parse the whole archive and report element totals.
    Stats { archive: PathBuf },
    /// Validate tags and annotations against the formats Lichess writes.
    Check {
        archive: PathBuf,
        /// Print the distinct header and comment keys found.
        #[arg(long)]
        print_collect: bool,
        /// Write the distinct header and comment keys to a file.
        #[arg(long, value_name = "FILE")]
        write_collect: Option<PathBuf>,
    },
    /// Export games and moves to CSV.
    Export {
        archive: PathBuf,
        /// Games CSV path.
        #[arg(long, default_value = "games.csv")]
        games: PathBuf,
        /// Moves CSV path.
        #[arg(long, default_value = "moves.csv")]
        moves: PathBuf,
    },
    /// Load the archive into the database at DATABASE_URL.
    Load(LoadArgs),
}

#[derive(Args, Debug)]
struct LoadArgs {
    archive: PathBuf,
    /// Load only a uniform random sample of this many games.
    #[arg(long)]
    sample: Option<usize>,
    /// Number of games in the archive, when already known; skips the
    /// counting pass before sampling.
    #[arg(long, requires = "sample")]
    game_count: Option<usize>,
    /// Check each game before inserting it.
    #[arg(long)]
    check: bool,
    /// Keep loading even when the check finds errors.
    #[arg(long, requires = "check")]
    force: bool,
    /// Drop and recreate the tables first.
    #[arg(long)]
    rebuild: bool,
    /// Number of insertion worker threads.
    #[arg(long, default_value_t = 4)]
    jobs: usize,
    /// Read DATABASE_URL from this dotenv file instead of `.env`.
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CrawlError> {
    match cli.command {
        Command::Count { archive } => {
            let games = count_games(&archive)?;
            info!("{:?} contains {} games", archive, games);
            println!("{}", games);
            Ok(())
        }
        Command::Stats { archive } => {
            let mut stats = Stats::default();
            ArchiveReader::open(&archive)?.read_all(&mut stats)?;
            print!("{}", stats);
            Ok(())
        }
        Command::Check {
            archive,
            print_collect,
            write_collect,
        } => {
            let mut reader = ArchiveReader::open(&archive)?;
            let checker = if print_collect || write_collect.is_some() {
                let mut audit = Audit::default();
                reader.read_all(&mut audit)?;
                if print_collect {
                    audit.collector.write_collection(&mut stdout())?;
                }
                if let Some(path) = write_collect {
                    info!("writing collection to {:?}", path);
                    audit
                        .collector
                        .write_collection(&mut BufWriter::new(File::create(path)?))?;
                }
                audit.checker
            } else {
                let mut checker = Checker::default();
                reader.read_all(&mut checker)?;
                checker
            };
            if checker.has_errors {
                Err(CrawlError::CheckFailed)
            } else {
                info!("checked {} games, no inconsistencies", checker.games);
                Ok(())
            }
        }
        Command::Export {
            archive,
            games,
            moves,
        } => {
            let mut exporter = CsvExporter::create(&games, &moves)?;
            ArchiveReader::open(&archive)?.read_all(&mut exporter)?;
            exporter.finish()?;
            Ok(())
        }
        Command::Load(args) => load(args),
    }
}

fn database_url(args: &LoadArgs) -> Result<String, CrawlError> {
    match &args.env_file {
        Some(path) => {
            dotenv::from_filename(path)?;
        }
        None => {
            dotenv().ok();
        }
    }
    env::var("DATABASE_URL").map_err(|_| CrawlError::MissingDatabaseUrl)
}

fn load(args: LoadArgs) -> Result<(), CrawlError> {
    let db_url = database_url(&args)?;
    match args.sample {
        Some(sample) => load_sample(&args, &db_url, sample),
        None => load_full(&args, &db_url),
    }
}

fn load_full(args: &LoadArgs, db_url: &str) -> Result<(), CrawlError> {
    if args.check {
        info!("checking {:?} before loading", args.archive);
        let mut checker = Checker::default();
        ArchiveReader::open(&args.archive)?.read_all(&mut checker)?;
        if checker.has_errors {
            if args.force {
                warn!("check found inconsistencies, loading anyway");
            } else {
                info!("rerun with --force to load despite check errors");
                return Err(CrawlError::CheckFailed);
            }
        }
    }
    info!("loading {:?}", args.archive);
    let mut loader = Loader::new(db_url, args.rebuild, args.jobs)?;
    ArchiveReader::open(&args.archive)?.read_all(&mut loader)?;
    let outcome = loader.finish();
    info!("loaded {} games", outcome.games);
    Ok(())
}

fn load_sample(args: &LoadArgs, db_url: &str, sample: usize) -> Result<(), CrawlError> {
    let total = match args.game_count {
        Some(total) => total,
        None => count_games(&args.archive)?,
    };
    info!(
        "{:?} contains {} games, loading a sample of {}",
        args.archive, total, sample
    );
    let mut sampler = GameSampler::open(&args.archive, sample, total)?;
    let mut loader = Loader::new(db_url, args.rebuild, args.jobs)?;
    let mut checker = Checker::default();
    while sampler.next_game()? {
        if args.check {
            BufferedReader::new_cursor(&sampler.current).read_game(&mut checker)?;
            if checker.has_errors && !args.force {
                info!("rerun with --force to load despite check errors");
                return Err(CrawlError::CheckFailed);
            }
        }
        BufferedReader::new_cursor(&sampler.current).read_game(&mut loader)?;
    }
    let outcome = loader.finish();
    info!("loaded {} games", outcome.games);
    Ok(())
}
