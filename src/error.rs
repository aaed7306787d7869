//! Error types for the engine.
//!
//! Only boundary code returns errors: FEN and move-notation parsing, opening
//! database loading and configuration files. Search and move generation
//! cannot fail once a `Board` exists.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChessError {
    /// Malformed position string
    #[error("Invalid FEN `{fen}`: {reason}")]
    Fen { fen: String, reason: String },

    /// Text that is not long algebraic notation at all
    #[error("Invalid move syntax `{0}` (expected e.g. `e2e4` or `e7e8q`)")]
    MoveSyntax(String),

    /// Well formed move that is not legal in the position
    #[error("Illegal move `{mv}` in position {fen}")]
    IllegalMove { mv: String, fen: String },

    /// Bad line in an opening database
    #[error("Opening book line {line}: {reason}")]
    Book { line: usize, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChessError {
    pub(crate) fn fen(fen: &str, reason: impl Into<String>) -> Self {
        ChessError::Fen {
            fen: fen.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ChessError>;
