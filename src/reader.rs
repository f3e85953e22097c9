//! Archive access: opening by extension, counting games without parsing, and
//! random sampling.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use log::info;
use memchr::memchr_iter;
use pgn_reader::{BufferedReader, Visitor};
use rand::seq::index;
use zstd::Decoder;

use crate::error::CrawlError;

const SCAN_BUF: usize = 1 << 15;

/// A PGN archive, plain or zstd-compressed.
pub enum ArchiveReader {
    Plain(BufferedReader<File>),
    Zstd(BufferedReader<Decoder<'static, BufReader<File>>>),
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self, CrawlError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pgn") => Ok(ArchiveReader::Plain(BufferedReader::new(File::open(path)?))),
            Some("zst") => Ok(ArchiveReader::Zstd(BufferedReader::new(Decoder::new(
                File::open(path)?,
            )?))),
            _ => Err(CrawlError::UnsupportedArchive(path.to_owned())),
        }
    }

    pub fn read_game<V: Visitor>(&mut self, visitor: &mut V) -> io::Result<Option<V::Result>> {
        match self {
            ArchiveReader::Plain(reader) => reader.read_game(visitor),
            ArchiveReader::Zstd(reader) => reader.read_game(visitor),
        }
    }

    pub fn read_all<V: Visitor>(&mut self, visitor: &mut V) -> io::Result<()> {
        match self {
            ArchiveReader::Plain(reader) => reader.read_all(visitor),
            ArchiveReader::Zstd(reader) => reader.read_all(visitor),
        }
    }
}

fn open_raw(path: &Path) -> Result<Box<dyn Read>, CrawlError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("pgn") => Ok(Box::new(File::open(path)?)),
        Some("zst") => Ok(Box::new(Decoder::new(File::open(path)?)?)),
        _ => Err(CrawlError::UnsupportedArchive(path.to_owned())),
    }
}

/// Counts the games in an archive without parsing it.
pub fn count_games(path: &Path) -> Result<usize, CrawlError> {
    info!("counting games in {:?}", path);
    count_games_in(open_raw(path)?)
}

/// Counts games by counting the blank lines that separate tag and movetext
/// sections: every game contributes two, except possibly the last when the
/// archive is truncated after its movetext.
pub fn count_games_in<R: Read>(reader: R) -> Result<usize, CrawlError> {
    let mut reader = BufReader::with_capacity(SCAN_BUF, reader);
    let mut pairs = 0usize;
    let mut ends_with_newline = false;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok((pairs + 1) >> 1);
        }
        let mut prev = None;
        for at in memchr_iter(b'\n', buf) {
            let adjacent = match prev {
                Some(p) => p + 1 == at,
                None => at == 0 && ends_with_newline,
            };
            if adjacent {
                pairs += 1;
                if pairs & 0x3F_FFFF == 0 {
                    info!("scanned {} games", pairs >> 1);
                }
            }
            prev = Some(at);
        }
        let len = buf.len();
        ends_with_newline = buf[len - 1] == b'\n';
        reader.consume(len);
    }
}

/// Streams an archive once, yielding the raw bytes of a uniform random subset
/// of its games.
pub struct GameSampler<R: Read> {
    reader: BufReader<R>,
    /// Ascending indices of the games still to be yielded.
    targets: Vec<usize>,
    next_target: usize,
    index: usize,
    /// Bytes of the game most recently yielded by [`GameSampler::next_game`].
    pub current: Vec<u8>,
}

impl GameSampler<Box<dyn Read>> {
    pub fn open(path: &Path, sample: usize, total: usize) -> Result<Self, CrawlError> {
        Ok(Self::new(open_raw(path)?, sample, total))
    }
}

impl<R: Read> GameSampler<R> {
    pub fn new(reader: R, sample: usize, total: usize) -> Self {
        let mut targets =
            index::sample(&mut rand::thread_rng(), total, sample.min(total)).into_vec();
        targets.sort_unstable();
        Self {
            reader: BufReader::with_capacity(SCAN_BUF, reader),
            targets,
            next_target: 0,
            index: 0,
            current: Vec::new(),
        }
    }

    /// Advances to the next sampled game, filling `current` with its bytes.
    /// Returns `false` once the sample (or the archive) is exhausted.
    pub fn next_game(&mut self) -> Result<bool, CrawlError> {
        let mut line = Vec::new();
        while self.next_target < self.targets.len() {
            let wanted = self.targets[self.next_target] == self.index;
            self.current.clear();
            let mut sections = 0;
            let mut in_section = false;
            while sections < 2 {
                line.clear();
                if self.reader.read_until(b'\n', &mut line)? == 0 {
                    if in_section {
                        sections += 1;
                        in_section = false;
                    }
                    break;
                }
                if line == b"\n" || line == b"\r\n" {
                    if in_section {
                        sections += 1;
                        in_section = false;
                    }
                } else {
                    in_section = true;
                }
                if wanted {
                    self.current.extend_from_slice(&line);
                }
            }
            if sections == 0 {
                // Nothing but trailing whitespace left in the archive.
                return Ok(false);
            }
            self.index += 1;
            if wanted {
                self.next_target += 1;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Stats;

    const TWO_GAMES: &[u8] = b"[Event \"Rated Blitz game\"]\n[White \"alice\"]\n[Black \"bob\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0\n\n[Event \"Rated Blitz game\"]\n[White \"carol\"]\n[Black \"dave\"]\n[Result \"0-1\"]\n\n1. f3 e5 2. g4 Qh4# 0-1\n";

    #[test]
    fn test_count_games() {
        assert_eq!(count_games_in(&b""[..]).unwrap(), 0);
        assert_eq!(count_games_in(TWO_GAMES).unwrap(), 2);
        // A missing trailing blank line must not drop the last game.
        let trimmed = &TWO_GAMES[..TWO_GAMES.len() - 1];
        assert_eq!(count_games_in(trimmed).unwrap(), 2);
    }

    #[test]
    fn test_count_games_tiny_buffer() {
        // Separators split across buffer refills must still be seen.
        struct OneByte<'a>(&'a [u8]);
        impl<'a> Read for OneByte<'a> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.0.split_first() {
                    Some((byte, rest)) => {
                        buf[0] = *byte;
                        self.0 = rest;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
        }
        assert_eq!(count_games_in(OneByte(TWO_GAMES)).unwrap(), 2);
    }

    #[test]
    fn test_count_matches_full_parse() {
        let mut stats = Stats::default();
        BufferedReader::new_cursor(TWO_GAMES)
            .read_all(&mut stats)
            .unwrap();
        assert_eq!(stats.games, count_games_in(TWO_GAMES).unwrap());
    }

    #[test]
    fn test_sampler_yields_all_when_sample_covers_archive() {
        let mut sampler = GameSampler::new(TWO_GAMES, 2, 2);
        let mut seen = Vec::new();
        while sampler.next_game().unwrap() {
            seen.push(sampler.current.clone());
        }
        assert_eq!(seen.len(), 2);
        assert!(seen[0].starts_with(b"[Event"));
        assert!(String::from_utf8_lossy(&seen[1]).contains("Qh4#"));
    }

    #[test]
    fn test_sampler_single_game_parses() {
        let mut sampler = GameSampler::new(TWO_GAMES, 1, 2);
        assert!(sampler.next_game().unwrap());
        let mut stats = Stats::default();
        BufferedReader::new_cursor(&sampler.current)
            .read_game(&mut stats)
            .unwrap();
        assert_eq!(stats.games, 1);
        assert!(!sampler.next_game().unwrap());
    }

    #[test]
    fn test_sampler_oversized_sample_is_clamped() {
        let mut sampler = GameSampler::new(TWO_GAMES, 10, 2);
        let mut yielded = 0;
        while sampler.next_game().unwrap() {
            yielded += 1;
        }
        assert_eq!(yielded, 2);
    }

    #[test]
    fn test_sample_archive() {
        let path = Path::new("./test_data/sample.pgn");
        assert_eq!(count_games(path).unwrap(), 3);

        let mut checker = crate::audit::Checker::default();
        ArchiveReader::open(path)
            .unwrap()
            .read_all(&mut checker)
            .unwrap();
        assert_eq!(checker.games, 3);
        assert!(!checker.has_errors);
    }

    #[test]
    fn test_open_rejects_unknown_extension() {
        assert!(matches!(
            ArchiveReader::open(Path::new("archive.tar")),
            Err(CrawlError::UnsupportedArchive(_))
        ));
    }
}
