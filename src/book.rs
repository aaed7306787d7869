//! Opening selector.
//!
//! The database is a tab separated file with a `uci` column holding a line of
//! play in long algebraic notation and an optional `count` column with how
//! often it was seen. Every line is replayed from the starting position once,
//! and each visited position records `(hash, move)` with the line's count.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use rand::Rng;
use tracing::{debug, error};

use crate::board::Board;
use crate::error::{ChessError, Result};
use crate::movegen::{generate_moves, parse_move};
use crate::types::Move;

/// The book is only consulted while the full move number is below this
pub const OPENING_WINDOW: u32 = 5;

const EMBEDDED_OPENINGS: &str = include_str!("data/openings.tsv");

static EMBEDDED_BOOK: Lazy<OpeningBook> = Lazy::new(|| {
    OpeningBook::from_tsv_str(EMBEDDED_OPENINGS).unwrap_or_else(|e| {
        error!("embedded opening book is unusable: {e}");
        OpeningBook::default()
    })
});

/// One book move for one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningEntry {
    pub hash: u64,
    pub count: u32,
    pub mv: Move,
}

#[derive(Debug, Clone, Default)]
pub struct OpeningBook {
    by_hash: HashMap<u64, Vec<OpeningEntry>>,
}

impl OpeningBook {
    /// The book compiled into the binary, built on first use
    pub fn embedded() -> &'static OpeningBook {
        &EMBEDDED_BOOK
    }

    pub fn from_tsv_path(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_tsv_str(&data)
    }

    pub fn from_tsv_str(tsv: &str) -> Result<Self> {
        let mut lines = tsv
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_line, header) = lines.next().ok_or(ChessError::Book {
            line: 1,
            reason: "opening TSV is empty".to_string(),
        })?;
        let columns: Vec<String> = header
            .split('\t')
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let uci_idx = columns
            .iter()
            .position(|c| c == "uci")
            .ok_or(ChessError::Book {
                line: header_line,
                reason: "header needs a `uci` column".to_string(),
            })?;
        let count_idx = columns.iter().position(|c| c == "count");

        let mut book = OpeningBook::default();
        for (line_no, line) in lines {
            let book_error = |reason: String| ChessError::Book {
                line: line_no,
                reason,
            };
            let fields: Vec<&str> = line.split('\t').collect();
            let sequence = fields
                .get(uci_idx)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| book_error("missing move sequence".to_string()))?;
            let count = match count_idx.and_then(|idx| fields.get(idx)) {
                Some(field) => field
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| book_error(format!("bad count `{}`", field.trim())))?,
                None => 1,
            };

            let mut board = Board::new();
            for token in sequence.split_whitespace() {
                let mv = parse_move(&board, token).map_err(|e| book_error(e.to_string()))?;
                book.add(board.hash(), mv, count);
                board.make_move(&mv);
            }
        }

        debug!(
            positions = book.by_hash.len(),
            entries = book.len(),
            "opening book loaded"
        );
        Ok(book)
    }

    /// Record `count` more games playing `mv` from the position with `hash`
    pub fn add(&mut self, hash: u64, mv: Move, count: u32) {
        let entries = self.by_hash.entry(hash).or_default();
        match entries.iter_mut().find(|e| e.mv == mv) {
            Some(entry) => entry.count = entry.count.saturating_add(count),
            None => entries.push(OpeningEntry { hash, count, mv }),
        }
    }

    /// Number of (position, move) entries
    pub fn len(&self) -> usize {
        self.by_hash.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Entries stored under the board's hash whose move is legal here.
    ///
    /// Different positions can share a hash, so a stored move is only
    /// trusted once it shows up in the legal move list.
    pub fn candidates(&self, board: &Board) -> Vec<OpeningEntry> {
        let Some(entries) = self.by_hash.get(&board.hash()) else {
            return Vec::new();
        };
        let legal = generate_moves(board);
        entries
            .iter()
            .filter(|e| e.count > 0 && legal.contains(&e.mv))
            .copied()
            .collect()
    }

    /// Pick a book move with probability proportional to its count, or
    /// `None` outside the opening window or when the position is unknown
    pub fn select<R: Rng + ?Sized>(&self, board: &Board, rng: &mut R) -> Option<Move> {
        if board.fullmove_number() >= OPENING_WINDOW {
            return None;
        }
        let candidates = self.candidates(board);
        let total: u64 = candidates.iter().map(|e| u64::from(e.count)).sum();
        if total == 0 {
            return None;
        }

        let pick = rng.gen_range(0..total);
        let mut cumulative = 0;
        for entry in &candidates {
            cumulative += u64::from(entry.count);
            if pick < cumulative {
                return Some(entry.mv);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn embedded_book_covers_the_start_position() {
        let book = OpeningBook::embedded();
        assert!(!book.is_empty());
        let start = Board::new();
        let candidates = book.candidates(&start);
        let mut first_moves: Vec<String> = candidates.iter().map(|e| e.mv.to_uci()).collect();
        first_moves.sort();
        assert_eq!(first_moves, vec!["c2c4", "d2d4", "e2e4", "g1f3"]);
    }

    #[test]
    fn counts_are_merged_per_position() {
        let tsv = "uci\tcount\ne2e4 e7e5\t4\ne2e4 c7c5\t2\nd2d4\t1\n";
        let book = OpeningBook::from_tsv_str(tsv).unwrap();
        let start = Board::new();
        let mut candidates = book.candidates(&start);
        candidates.sort_by_key(|e| e.count);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].mv.to_uci(), "d2d4");
        assert_eq!(candidates[1].mv.to_uci(), "e2e4");
        assert_eq!(candidates[1].count, 6);
        assert_eq!(book.len(), 4);
    }

    #[test]
    fn count_column_is_optional() {
        let book = OpeningBook::from_tsv_str("name\tuci\nKing pawn\te2e4\n").unwrap();
        let candidates = book.candidates(&Board::new());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].count, 1);
    }

    #[test]
    fn selection_is_weighted_by_count() {
        let book = OpeningBook::from_tsv_str("uci\tcount\ne2e4\t3\nd2d4\t1\n").unwrap();
        let start = Board::new();
        let mut rng = StdRng::seed_from_u64(7);
        let draws = 4000;
        let e4 = (0..draws)
            .filter(|_| book.select(&start, &mut rng).unwrap().to_uci() == "e2e4")
            .count();
        let ratio = e4 as f64 / draws as f64;
        assert!((0.7..0.8).contains(&ratio), "e2e4 ratio {ratio}");
    }

    #[test]
    fn selection_only_inside_the_window() {
        let book = OpeningBook::embedded();
        let mut rng = StdRng::seed_from_u64(1);
        let mut board = Board::new();
        // walk the book until it runs out
        while let Some(mv) = book.select(&board, &mut rng) {
            assert!(board.fullmove_number() < OPENING_WINDOW);
            assert!(generate_moves(&board).contains(&mv));
            board.make_move(&mv);
        }
        assert!(board.fullmove_number() <= OPENING_WINDOW);

        let late = Board::from_fen(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 5",
        )
        .unwrap();
        assert_eq!(book.select(&late, &mut rng), None);
    }

    #[test]
    fn stale_entries_are_ignored() {
        let mut book = OpeningBook::default();
        let start = Board::new();
        // a move that is not legal in the start position
        let bogus = Move::new(12, 36, crate::types::MoveKind::Quiet);
        book.add(start.hash(), bogus, 10);
        assert!(book.candidates(&start).is_empty());
        assert_eq!(book.select(&start, &mut StdRng::seed_from_u64(0)), None);
    }

    #[test]
    fn loads_from_a_file() {
        let path = std::env::temp_dir().join(format!("magic_chess_book_{}.tsv", std::process::id()));
        fs::write(&path, "uci\tcount\nd2d4 d7d5\t5\n").unwrap();
        let book = OpeningBook::from_tsv_path(&path);
        fs::remove_file(&path).ok();
        let book = book.unwrap();
        assert_eq!(book.len(), 2);
        assert!(matches!(
            OpeningBook::from_tsv_path("/nonexistent/openings.tsv"),
            Err(ChessError::Io(_))
        ));
    }

    #[test]
    fn bad_lines_report_their_line_number() {
        let err = OpeningBook::from_tsv_str("uci\tcount\ne2e4\t1\ne2e5\t1\n").unwrap_err();
        assert!(matches!(err, ChessError::Book { line: 3, .. }), "{err}");

        let err = OpeningBook::from_tsv_str("uci\tcount\ne2e4\tmany\n").unwrap_err();
        assert!(matches!(err, ChessError::Book { line: 2, .. }), "{err}");

        let err = OpeningBook::from_tsv_str("moves\n").unwrap_err();
        assert!(matches!(err, ChessError::Book { line: 1, .. }), "{err}");

        assert!(OpeningBook::from_tsv_str("").is_err());
    }
}
