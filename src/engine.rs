//! Engine front end
//!
//! `Engine` owns everything that outlives a single search: the settings, the
//! transposition table, the opening book and the random source used for book
//! moves. The CLI and the self-play driver both go through it.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::board::Board;
use crate::book::OpeningBook;
use crate::config::EngineConfig;
use crate::search::{format_score, SearchControl, SearchResult, Searcher};
use crate::tt::TranspositionTable;
use crate::types::Move;

/// Result from engine search/book lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    pub best_move: Move,
    pub score: i32,
    pub from_book: bool,
    pub depth_reached: u8,
    pub nodes_searched: u64,
    pub time_ms: u64,
}

impl EngineResult {
    fn from_search(result: SearchResult, time_ms: u64) -> Option<Self> {
        result.best_move.map(|best_move| EngineResult {
            best_move,
            score: result.best_score,
            from_book: false,
            depth_reached: result.depth,
            nodes_searched: result.nodes_searched + result.quiescent_nodes_searched,
            time_ms,
        })
    }

    /// One line summary, `info depth 6 score cp 35 nodes 81234 time 412 pv e2e4`
    pub fn info_line(&self) -> String {
        if self.from_book {
            return format!("info book pv {}", self.best_move.to_uci());
        }
        format!(
            "info depth {} score {} nodes {} time {} pv {}",
            self.depth_reached,
            format_score(self.score),
            self.nodes_searched,
            self.time_ms,
            self.best_move.to_uci()
        )
    }
}

pub struct Engine {
    config: EngineConfig,
    tt: TranspositionTable,
    book: &'static OpeningBook,
    rng: StdRng,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_book(config, OpeningBook::embedded())
    }

    pub fn with_book(config: EngineConfig, book: &'static OpeningBook) -> Self {
        let mut tt = TranspositionTable::with_capacity_log2(config.tt_bits);
        tt.set_enabled(config.use_tt);
        let rng = match config.book_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            tt,
            book,
            rng,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reset state carried between moves
    pub fn new_game(&mut self) {
        self.tt.clear();
        if let Some(seed) = self.config.book_seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
    }

    /// Try to get a move from the opening book
    pub fn book_move(&mut self, board: &Board) -> Option<Move> {
        if !self.config.use_book {
            return None;
        }
        self.book.select(board, &mut self.rng)
    }

    /// Pick the best move for the current position
    ///
    /// Tries opening book first, then falls back to a search limited by the
    /// configured time budget. `None` when there is no legal move.
    pub fn pick_move(&mut self, board: &Board) -> Option<EngineResult> {
        self.pick_move_within(board, self.config.time_budget())
    }

    pub fn pick_move_within(&mut self, board: &Board, budget: Duration) -> Option<EngineResult> {
        if let Some(book_move) = self.book_move(board) {
            debug!(mv = %book_move, "book move");
            return Some(EngineResult {
                best_move: book_move,
                score: 0,
                from_book: true,
                depth_reached: 0,
                nodes_searched: 0,
                time_ms: 0,
            });
        }
        let control = SearchControl::with_time_limit(budget);
        self.search(board, self.config.max_depth, &control)
    }

    /// Search to `depth` with no time limit (bypasses opening book)
    pub fn search_depth(&mut self, board: &Board, depth: u8) -> Option<EngineResult> {
        let control = SearchControl::infinite();
        self.search(board, depth, &control)
    }

    /// Search until `control` says stop or `max_depth` is done. The table is
    /// cleared first, so every search starts from the same state.
    pub fn search(
        &mut self,
        board: &Board,
        max_depth: u8,
        control: &SearchControl,
    ) -> Option<EngineResult> {
        let start = Instant::now();
        self.tt.clear();

        let mut board = *board;
        let result = Searcher::new(&mut self.tt, control)
            .with_null_move(self.config.null_move)
            .iterative_deepening(&mut board, max_depth);

        let elapsed = start.elapsed().as_millis() as u64;
        debug!("{}", self.tt.info());
        let result = EngineResult::from_search(result, elapsed);
        if let Some(r) = &result {
            info!(
                depth = r.depth_reached,
                score = %format_score(r.score),
                nodes = r.nodes_searched,
                time_ms = r.time_ms,
                best = %r.best_move,
                "search done"
            );
        }
        result
    }

    /// Book or search move within `budget`
    pub fn select_move(&mut self, board: &Board, budget: Duration) -> Option<Move> {
        self.pick_move_within(board, budget).map(|r| r.best_move)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
