//! Bitboard chess engine: legal move generation over magic bitboards, an
//! alpha-beta search with a transposition table, and a small opening book.

pub mod bitboard;
pub mod board;
pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod game;
pub mod movegen;
pub mod perft;
pub mod search;
pub mod tt;
pub mod types;

pub use board::Board;
pub use error::{ChessError, Result};
pub use types::{Move, MoveKind};
