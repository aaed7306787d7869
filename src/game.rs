use std::fmt;
use std::time::Instant;

use chrono::prelude::*;
use itertools::Itertools;
use tracing::info;

use crate::board::{Board, STARTING_POSITION_FEN};
use crate::engine::Engine;
use crate::error::{ChessError, Result};
use crate::movegen::{generate_moves, is_in_check};
use crate::types::{Color, Move};

/// Where the game stands after the last move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Ongoing,
    /// The winner
    Checkmate(Color),
    Stalemate,
    FiftyMoveRule,
}

impl GameStatus {
    pub fn of(board: &Board) -> GameStatus {
        let side = board.side_to_move();
        if generate_moves(board).is_empty() {
            if is_in_check(board, side) {
                GameStatus::Checkmate(side.other_color())
            } else {
                GameStatus::Stalemate
            }
        } else if board.halfmove_clock() >= 100 {
            GameStatus::FiftyMoveRule
        } else {
            GameStatus::Ongoing
        }
    }

    pub fn is_over(&self) -> bool {
        *self != GameStatus::Ongoing
    }

    /// PGN result token
    pub fn result(&self) -> &'static str {
        match self {
            GameStatus::Ongoing => "*",
            GameStatus::Checkmate(Color::White) => "1-0",
            GameStatus::Checkmate(Color::Black) => "0-1",
            GameStatus::Stalemate | GameStatus::FiftyMoveRule => "1/2-1/2",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Ongoing => write!(f, "ongoing"),
            GameStatus::Checkmate(winner) => write!(f, "checkmate, {} wins", winner.to_human()),
            GameStatus::Stalemate => write!(f, "stalemate"),
            GameStatus::FiftyMoveRule => write!(f, "draw by the fifty move rule"),
        }
    }
}

pub struct Game {
    board: Board,
    moves: Vec<Move>,
    start_fen: String,
    game_start_time: DateTime<Local>,
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    pub fn new() -> Self {
        Self {
            board: Board::new(),
            moves: Vec::new(),
            start_fen: STARTING_POSITION_FEN.to_string(),
            game_start_time: Local::now(),
        }
    }

    pub fn from_fen(start_fen: &str) -> Result<Self> {
        let board = Board::from_fen(start_fen)?;
        Ok(Self {
            board,
            moves: Vec::new(),
            start_fen: board.to_fen(),
            game_start_time: Local::now(),
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn status(&self) -> GameStatus {
        GameStatus::of(&self.board)
    }

    /// Play `mv` if it is legal in the current position
    pub fn push(&mut self, mv: Move) -> Result<()> {
        if !generate_moves(&self.board).contains(&mv) {
            return Err(ChessError::IllegalMove {
                mv: mv.to_uci(),
                fen: self.board.to_fen(),
            });
        }
        self.board.make_move(&mv);
        self.moves.push(mv);
        Ok(())
    }

    /// Let `engine` play both sides for up to `max_moves` full moves, or
    /// until the game is decided
    pub fn play(&mut self, engine: &mut Engine, max_moves: u32) -> GameStatus {
        for _ in 0..2 * max_moves {
            let status = self.status();
            if status.is_over() {
                return status;
            }
            let now = Instant::now();
            let Some(result) = engine.pick_move(&self.board) else {
                break;
            };
            info!(
                ply = self.moves.len() + 1,
                mv = %result.best_move,
                book = result.from_book,
                elapsed_ms = now.elapsed().as_millis() as u64,
                "{}",
                result.info_line()
            );
            self.board.make_move(&result.best_move);
            self.moves.push(result.best_move);
        }
        self.status()
    }

    pub fn to_pgn(&self) -> String {
        let status = self.status();
        let mut pgn = String::new();
        pgn.push_str("[Event \"magic_chess self-play\"]\n");
        pgn.push_str("[Site \"?\"]\n");
        pgn.push_str(&format!(
            "[Date \"{}\"]\n",
            self.game_start_time.format("%Y.%m.%d")
        ));
        pgn.push_str("[Round \"1\"]\n");
        pgn.push_str("[White \"magic_chess\"]\n");
        pgn.push_str("[Black \"magic_chess\"]\n");
        pgn.push_str(&format!("[Result \"{}\"]\n", status.result()));
        if self.start_fen != STARTING_POSITION_FEN {
            pgn.push_str("[SetUp \"1\"]\n");
            pgn.push_str(&format!("[FEN \"{}\"]\n", self.start_fen));
        }
        pgn.push('\n');

        let start = Board::from_fen(&self.start_fen).unwrap_or_default();
        let first_number = start.fullmove_number();
        let black_first = start.side_to_move() == Color::Black;

        let mut tokens = Vec::with_capacity(self.moves.len() * 3 / 2 + 1);
        for (i, m) in self.moves.iter().enumerate() {
            let ply = i + usize::from(black_first);
            let number = first_number as usize + ply / 2;
            if ply % 2 == 0 {
                tokens.push(format!("{number}."));
            } else if i == 0 {
                tokens.push(format!("{number}..."));
            }
            tokens.push(m.to_uci());
        }
        tokens.push(status.result().to_string());
        pgn.push_str(&tokens.iter().join(" "));
        pgn.push('\n');
        pgn
    }
}
