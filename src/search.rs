//! Iterative deepening negamax search.
//!
//! Fail-soft alpha-beta with null move pruning, a capture-only quiescence
//! search at the leaves and a transposition table. The search polls a shared
//! stop flag and unwinds with [`SearchAborted`] once it is raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::board::Board;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::evaluate::{evaluate, order_moves, MATE_SCORE, MATE_THRESHOLD};
use crate::movegen::{generate_captures, generate_moves, is_in_check};
use crate::tt::{Bound, TranspositionTable};
use crate::types::Move;

/// Bigger than any score the search can produce
pub const INFINITY: i32 = MATE_SCORE + 1;
pub const NULL_MOVE_REDUCTION: u8 = 2;
/// Captures are followed at most this many plies past the horizon
pub const MAX_QUIESCENCE_DEPTH: u8 = 8;
/// Half moves without a capture or pawn move that make the game a draw
const FIFTY_MOVE_LIMIT: u32 = 100;

/// Search abort error - returned when the stop flag is raised mid-search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("search aborted")]
pub struct SearchAborted;

/// Stop signalling for one search.
///
/// With a time limit a timer thread raises the stop flag once the budget has
/// elapsed. Dropping the control retires the timer.
#[derive(Debug)]
pub struct SearchControl {
    start_time: Instant,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

impl SearchControl {
    /// Control that only stops when told to
    pub fn infinite() -> Self {
        Self {
            start_time: Instant::now(),
            stop: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Control whose stop flag is raised by a timer after `budget`
    pub fn with_time_limit(budget: Duration) -> Self {
        let control = Self::infinite();
        let deadline = control.start_time + budget;
        let stop = Arc::clone(&control.stop);
        let finished = Arc::clone(&control.finished);

        thread::spawn(move || loop {
            if finished.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                stop.store(true, Ordering::Relaxed);
                return;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(10)));
        });
        control
    }

    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Signal the search to stop
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Shared handle to the stop flag, for stopping from another thread
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for SearchControl {
    fn default() -> Self {
        Self::infinite()
    }
}

impl Drop for SearchControl {
    fn drop(&mut self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// `None` only when the side to move has no legal move
    pub best_move: Option<Move>,
    pub best_score: i32,
    /// Deepest fully completed iteration
    pub depth: u8,
    pub nodes_searched: u64,
    pub quiescent_nodes_searched: u64,
}

/// `cp N` for ordinary scores, `mate N` / `mate -N` in moves for mates
pub fn format_score(score: i32) -> String {
    if score > MATE_THRESHOLD {
        let plies = MATE_SCORE - score;
        format!("mate {}", (plies + 1) / 2)
    } else if score < -MATE_THRESHOLD {
        let plies = MATE_SCORE + score;
        format!("mate -{}", (plies + 1) / 2)
    } else {
        format!("cp {}", score)
    }
}

/// Mate scores are stored relative to the node, not the root
#[inline]
fn score_to_tt(score: i32, ply: u8) -> i32 {
    if score > MATE_THRESHOLD {
        score + ply as i32
    } else if score < -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

#[inline]
fn score_from_tt(score: i32, ply: u8) -> i32 {
    if score > MATE_THRESHOLD {
        score - ply as i32
    } else if score < -MATE_THRESHOLD {
        score + ply as i32
    } else {
        score
    }
}

/// State of one search: the table, the stop signal and node counters
pub struct Searcher<'a> {
    tt: &'a mut TranspositionTable,
    control: &'a SearchControl,
    null_move: bool,
    nodes: u64,
    qnodes: u64,
    /// Root move tried first, from the previous iteration
    root_hint: Option<Move>,
    /// Best root move of the iteration in progress
    root_best: Option<(Move, i32)>,
}

impl<'a> Searcher<'a> {
    pub fn new(tt: &'a mut TranspositionTable, control: &'a SearchControl) -> Self {
        Self {
            tt,
            control,
            null_move: true,
            nodes: 0,
            qnodes: 0,
            root_hint: None,
            root_best: None,
        }
    }

    pub fn with_null_move(mut self, enabled: bool) -> Self {
        self.null_move = enabled;
        self
    }

    /// Search depth 1, 2, ... `max_depth` until the stop flag is raised.
    ///
    /// Returns the result of the deepest completed iteration. If even the
    /// first iteration was cut short, the best root move seen so far is used.
    pub fn iterative_deepening(&mut self, board: &mut Board, max_depth: u8) -> SearchResult {
        let mut result = SearchResult::default();
        if generate_moves(board).is_empty() {
            result.best_score = if is_in_check(board, board.side_to_move()) {
                -MATE_SCORE
            } else {
                0
            };
            return result;
        }

        for depth in 1..=max_depth.max(1) {
            self.root_hint = result.best_move;
            self.root_best = None;

            match self.negamax(board, depth, 0, -INFINITY, INFINITY, false) {
                Ok((score, mv)) => {
                    result.best_move = mv;
                    result.best_score = score;
                    result.depth = depth;
                    debug!(
                        depth,
                        score = %format_score(score),
                        best = %mv.map(|m| m.to_uci()).unwrap_or_default(),
                        nodes = self.nodes,
                        qnodes = self.qnodes,
                        elapsed_ms = self.control.elapsed().as_millis() as u64,
                        "iteration complete"
                    );
                    // a forced mate for us will not get any shorter
                    if score > MATE_THRESHOLD {
                        break;
                    }
                }
                Err(SearchAborted) => {
                    if result.depth == 0 {
                        warn!("search stopped before completing depth 1");
                        if let Some((mv, score)) = self.root_best {
                            result.best_move = Some(mv);
                            result.best_score = score;
                        } else {
                            result.best_move = generate_moves(board).first().copied();
                        }
                    }
                    break;
                }
            }
        }

        result.nodes_searched = self.nodes;
        result.quiescent_nodes_searched = self.qnodes;
        result
    }

    /// Fail-soft negamax. Returns the score for the side to move and the best
    /// move found at this node. The board is restored before returning, also
    /// when the search is aborted.
    pub fn negamax(
        &mut self,
        board: &mut Board,
        depth: u8,
        ply: u8,
        alpha: i32,
        beta: i32,
        allow_null: bool,
    ) -> Result<(i32, Option<Move>), SearchAborted> {
        if self.control.should_stop() {
            return Err(SearchAborted);
        }
        self.nodes += 1;

        if ply > 0 && board.halfmove_clock() >= FIFTY_MOVE_LIMIT {
            return Ok((0, None));
        }
        if depth == 0 {
            return Ok((self.quiescence(board, ply, 0, alpha, beta)?, None));
        }

        let key = board.hash();
        if ply > 0 {
            let tt_alpha = score_to_tt(alpha, ply);
            let tt_beta = score_to_tt(beta, ply);
            if let Some(score) = self.tt.probe(key, depth, tt_alpha, tt_beta) {
                return Ok((score_from_tt(score, ply), None));
            }
        }

        let us = board.side_to_move();
        let in_check = is_in_check(board, us);

        if self.null_move
            && allow_null
            && depth >= 3
            && !in_check
            && board.has_non_pawn_material(us)
        {
            let saved = *board;
            board.make_null_move();
            let result = self.negamax(
                board,
                depth - 1 - NULL_MOVE_REDUCTION,
                ply + 1,
                -beta,
                -beta + 1,
                false,
            );
            *board = saved;
            let score = -result?.0;
            if score >= beta {
                // a mate found after passing is not a real mate
                return Ok((if score > MATE_THRESHOLD { beta } else { score }, None));
            }
        }

        let mut moves = generate_moves(board);
        if moves.is_empty() {
            let score = if in_check {
                -MATE_SCORE + ply as i32
            } else {
                0
            };
            return Ok((score, None));
        }

        order_moves(board, &mut moves);
        let first = if ply == 0 {
            self.tt.best_move(key).or(self.root_hint)
        } else {
            self.tt.best_move(key)
        };
        if let Some(first) = first {
            if let Some(pos) = moves.iter().position(|m| *m == first) {
                moves[..=pos].rotate_right(1);
            }
        }

        let original_alpha = alpha;
        let mut alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = None;

        for mv in moves {
            let saved = *board;
            board.make_move(&mv);
            let result = self.negamax(board, depth - 1, ply + 1, -beta, -alpha, true);
            *board = saved;
            let score = -result?.0;

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
                if ply == 0 {
                    self.root_best = Some((mv, score));
                }
            }
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }

        let bound = if best_score <= original_alpha {
            Bound::Upper
        } else if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt
            .store(key, depth, score_to_tt(best_score, ply), bound, best_move);

        Ok((best_score, best_move))
    }

    /// Capture-only search past the horizon.
    ///
    /// The static evaluation is a lower bound on the score since the side to
    /// move may decline every capture. In check there is no such option, so
    /// every evasion is searched and having none is mate.
    pub fn quiescence(
        &mut self,
        board: &mut Board,
        ply: u8,
        qdepth: u8,
        alpha: i32,
        beta: i32,
    ) -> Result<i32, SearchAborted> {
        if self.control.should_stop() {
            return Err(SearchAborted);
        }
        self.qnodes += 1;

        let in_check = is_in_check(board, board.side_to_move());
        let (mut best_score, mut moves) = if in_check {
            let evasions = generate_moves(board);
            if evasions.is_empty() {
                return Ok(-MATE_SCORE + ply as i32);
            }
            if qdepth >= MAX_QUIESCENCE_DEPTH {
                return Ok(evaluate(board));
            }
            (-INFINITY, evasions)
        } else {
            let stand_pat = evaluate(board);
            if stand_pat >= beta || qdepth >= MAX_QUIESCENCE_DEPTH {
                return Ok(stand_pat);
            }
            (stand_pat, generate_captures(board))
        };

        let mut alpha = alpha.max(best_score);
        order_moves(board, &mut moves);

        for mv in moves {
            let saved = *board;
            board.make_move(&mv);
            let result = self.quiescence(board, ply + 1, qdepth + 1, -beta, -alpha);
            *board = saved;
            let score = -result?;

            best_score = best_score.max(score);
            alpha = alpha.max(score);
            if alpha >= beta {
                break;
            }
        }
        Ok(best_score)
    }
}

/// Search `board` to exactly `depth` plies with a fresh table and no time limit
pub fn search_depth(board: &Board, depth: u8, use_tt: bool) -> SearchResult {
    let mut tt = TranspositionTable::with_capacity_log2(16);
    tt.set_enabled(use_tt);
    let control = SearchControl::infinite();
    let mut board = *board;
    Searcher::new(&mut tt, &control).iterative_deepening(&mut board, depth)
}

/// Pick a move for the side to move within `budget`, using the opening book
/// first. `None` when there is no legal move.
///
/// Every call builds a small throwaway [`Engine`]. Callers choosing moves
/// repeatedly should keep an `Engine` of their own.
pub fn select_move(board: &Board, budget: Duration) -> Option<Move> {
    Engine::new(EngineConfig::one_shot()).select_move(board, budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::parse_move;
    use pretty_assertions::assert_eq;

    const MATE_IN_TWO: &str = "2r3k1/5ppp/8/8/8/8/4RPPP/4R1K1 w - - 0 1";

    fn best_uci(fen: &str, depth: u8) -> String {
        let board = Board::from_fen(fen).unwrap();
        search_depth(&board, depth, true)
            .best_move
            .map(|m| m.to_uci())
            .unwrap_or_default()
    }

    #[test]
    fn test_finds_mate_in_one() {
        // back rank mate
        assert_eq!(best_uci("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", 1), "a1a8");
        let board = Board::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let result = search_depth(&board, 3, true);
        assert_eq!(result.best_score, MATE_SCORE - 1);
        assert_eq!(format_score(result.best_score), "mate 1");
    }

    #[test]
    fn test_finds_mate_in_two() {
        // 1. Re8+ Rxe8 2. Rxe8#
        let board = Board::from_fen(MATE_IN_TWO).unwrap();
        let result = search_depth(&board, 3, true);
        assert_eq!(result.best_move.map(|m| m.to_uci()).as_deref(), Some("e2e8"));
        assert_eq!(result.best_score, MATE_SCORE - 3);
    }

    #[test]
    fn test_mated_side_sees_the_mate() {
        // Kb8 is forced and Rh8 mates
        let board = Board::from_fen("k7/8/1K6/8/8/8/8/7R b - - 0 1").unwrap();
        let result = search_depth(&board, 2, true);
        assert!(result.best_move.is_some());
        assert_eq!(result.best_score, -(MATE_SCORE - 2));
    }

    #[test]
    fn test_no_move_when_checkmated_or_stalemated() {
        let mate = Board::from_fen("8/8/8/8/8/2K5/1Q6/1k6 b - - 0 1").unwrap();
        let result = search_depth(&mate, 4, true);
        assert_eq!(result.best_move, None);
        assert_eq!(result.best_score, -MATE_SCORE);

        let stalemate = Board::from_fen("k7/8/1Q6/8/8/8/8/4K3 b - - 0 1").unwrap();
        let result = search_depth(&stalemate, 4, true);
        assert_eq!(result.best_move, None);
        assert_eq!(result.best_score, 0);
    }

    #[test]
    fn test_avoids_stalemating_when_winning() {
        // Qb6 stalemates, anything sensible keeps the win
        let board = Board::from_fen("k7/8/8/2Q5/8/8/8/4K3 w - - 0 1").unwrap();
        let result = search_depth(&board, 3, true);
        let mv = result.best_move.unwrap();
        assert_ne!(mv.to_uci(), "c5b6");
        assert!(result.best_score > 500);
    }

    #[test]
    fn test_takes_hanging_queen() {
        assert_eq!(best_uci("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1", 2), "d2d5");
    }

    #[test]
    fn test_quiescence_sees_recapture() {
        // Rxe5 loses the rook to fxe5, quiescence must see it at depth 1
        let board = Board::from_fen("8/5k2/5p2/4p3/4R3/8/8/3K4 w - - 0 1").unwrap();
        let result = search_depth(&board, 1, true);
        assert_ne!(result.best_move.map(|m| m.to_uci()).as_deref(), Some("e4e5"));
    }

    #[test]
    fn test_quiescence_stand_pat_bounds() {
        let mut board = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let mut tt = TranspositionTable::with_capacity_log2(8);
        let control = SearchControl::infinite();
        let mut searcher = Searcher::new(&mut tt, &control);
        let stand_pat = evaluate(&board);
        // no captures: quiescence is just the static evaluation
        assert_eq!(
            searcher.quiescence(&mut board, 0, 0, -INFINITY, INFINITY),
            Ok(stand_pat)
        );
        // fail high straight away
        assert_eq!(searcher.quiescence(&mut board, 0, 0, -INFINITY, 0), Ok(stand_pat));
    }

    #[test]
    fn test_transposition_table_does_not_change_the_move() {
        for (fen, depth) in [
            (MATE_IN_TWO, 3),
            ("4k3/8/8/3q4/8/8/3R4/4K3 w - - 0 1", 4),
            ("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", 2),
        ] {
            let board = Board::from_fen(fen).unwrap();
            let with_tt = search_depth(&board, depth, true);
            let without_tt = search_depth(&board, depth, false);
            assert_eq!(with_tt.best_move, without_tt.best_move, "{fen}");
        }
    }

    #[test]
    fn test_search_leaves_board_untouched() {
        let original = Board::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let mut board = original;
        let mut tt = TranspositionTable::with_capacity_log2(12);
        let control = SearchControl::infinite();
        Searcher::new(&mut tt, &control).iterative_deepening(&mut board, 3);
        assert_eq!(board, original);
    }

    #[test]
    fn test_stop_flag_aborts_and_still_returns_a_move() {
        let mut board = Board::new();
        let mut tt = TranspositionTable::with_capacity_log2(12);
        let control = SearchControl::infinite();
        control.signal_stop();
        let result = Searcher::new(&mut tt, &control).iterative_deepening(&mut board, 10);
        assert_eq!(result.depth, 0);
        assert!(result.best_move.is_some());
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_stop_from_another_thread() {
        let mut board = Board::new();
        let mut tt = TranspositionTable::with_capacity_log2(16);
        let control = SearchControl::infinite();
        let stop = control.stop_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::Relaxed);
        });
        let result = Searcher::new(&mut tt, &control).iterative_deepening(&mut board, 64);
        stopper.join().unwrap();
        assert!(control.should_stop());
        assert!(result.best_move.is_some());
        assert!(result.depth < 64);
    }

    #[test]
    fn test_time_limit_is_respected() {
        let mut board = Board::new();
        let mut tt = TranspositionTable::with_capacity_log2(16);
        let control = SearchControl::with_time_limit(Duration::from_millis(100));
        let result = Searcher::new(&mut tt, &control).iterative_deepening(&mut board, 64);
        assert!(control.elapsed() < Duration::from_secs(2));
        assert!(result.depth >= 1);
        assert!(result.best_move.is_some());
    }

    #[test]
    fn test_fifty_move_rule_scores_draw() {
        // a queen up, but every line hits the fifty move limit
        let board = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 99 80").unwrap();
        let result = search_depth(&board, 2, true);
        assert_eq!(result.best_score, 0);
    }

    #[test]
    fn test_null_move_keeps_the_result() {
        let board = Board::from_fen(MATE_IN_TWO).unwrap();
        let mut tt = TranspositionTable::with_capacity_log2(14);
        let control = SearchControl::infinite();
        let mut b = board;
        let without = Searcher::new(&mut tt, &control)
            .with_null_move(false)
            .iterative_deepening(&mut b, 3);
        let with = search_depth(&board, 3, true);
        assert_eq!(with.best_move, without.best_move);
        assert_eq!(with.best_move, parse_move(&board, "e2e8").ok());
    }

    #[test]
    fn test_tt_mate_scores_are_ply_relative() {
        assert_eq!(score_from_tt(score_to_tt(MATE_SCORE - 5, 3), 3), MATE_SCORE - 5);
        assert_eq!(score_to_tt(MATE_SCORE - 5, 3), MATE_SCORE - 2);
        assert_eq!(score_to_tt(-MATE_SCORE + 5, 3), -MATE_SCORE + 2);
        assert_eq!(score_to_tt(150, 7), 150);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(35), "cp 35");
        assert_eq!(format_score(MATE_SCORE - 1), "mate 1");
        assert_eq!(format_score(MATE_SCORE - 3), "mate 2");
        assert_eq!(format_score(-MATE_SCORE + 2), "mate -1");
    }
}
