//! Board state: piece bitboards, a square array kept in sync with them, and the
//! move appliers.
//!
//! `Board` is `Copy`. Undoing a move means restoring a saved copy:
//!
//! ```
//! # use magic_chess::board::Board;
//! # use magic_chess::movegen::generate_moves;
//! let mut board = Board::new();
//! let saved = board;
//! let m = generate_moves(&board)[0];
//! board.make_move(&m);
//! board = saved;
//! assert_eq!(board, Board::new());
//! ```

use std::fmt;
use std::hash::Hasher;

use crate::bitboard::sq_to_bb;
use crate::error::{ChessError, Result};
use crate::types::*;

pub const STARTING_POSITION_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const BACK_RANK: [PieceType; 8] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

/// Castling rights lost when a piece leaves or lands on each square
const fn castle_rights_touched(sq: Square) -> u8 {
    match sq {
        0 => CastlingRights::WHITE_QUEENSIDE,
        4 => CastlingRights::WHITE_KINGSIDE | CastlingRights::WHITE_QUEENSIDE,
        7 => CastlingRights::WHITE_KINGSIDE,
        56 => CastlingRights::BLACK_QUEENSIDE,
        60 => CastlingRights::BLACK_KINGSIDE | CastlingRights::BLACK_QUEENSIDE,
        63 => CastlingRights::BLACK_KINGSIDE,
        _ => 0,
    }
}

/// Streaming multiply/xor hash used for position fingerprints.
///
/// Each byte is folded in with `h ^= b; h *= M; h ^= h >> 47`.
pub struct StructuralHasher(u64);

impl StructuralHasher {
    const SEED: u64 = 525_201_411_107_845_655;
    const MULTIPLIER: u64 = 0x5bd1_e995_5bd1_e995;

    pub fn new() -> Self {
        Self(Self::SEED)
    }
}

impl Default for StructuralHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for StructuralHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::MULTIPLIER);
            self.0 ^= self.0 >> 47;
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    /// One bitboard per piece type, both colors together
    piece_bbs: [u64; 6],
    /// One bitboard per color
    color_bbs: [u64; 2],
    squares: [Option<Piece>; 64],
    side_to_move: Color,
    /// Square passed over by the last double pawn push
    en_passant: Option<Square>,
    castling: CastlingRights,
    // number of half moves since last capture or pawn advance
    halfmove_clock: u32,
    // number of full moves. Starts at 1, and gets incremented after every black move
    fullmove_number: u32,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Board without any pieces, white to move
    pub fn empty() -> Self {
        Board {
            piece_bbs: [0; 6],
            color_bbs: [0; 2],
            squares: [None; 64],
            side_to_move: Color::White,
            en_passant: None,
            castling: CastlingRights::NONE,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// The standard starting position
    pub fn new() -> Self {
        let mut board = Board::empty();
        for (file, piece_type) in BACK_RANK.iter().enumerate() {
            let file = file as Square;
            board.place_piece(Piece::new(Color::White, *piece_type), file);
            board.place_piece(Piece::new(Color::White, PieceType::Pawn), 8 + file);
            board.place_piece(Piece::new(Color::Black, PieceType::Pawn), 48 + file);
            board.place_piece(Piece::new(Color::Black, *piece_type), 56 + file);
        }
        board.castling = CastlingRights::ALL;
        board
    }

    // ------------------------------------------------------------------
    // Primitive mutators
    // ------------------------------------------------------------------

    /// Put a piece on an empty square
    #[inline]
    pub fn place_piece(&mut self, piece: Piece, sq: Square) {
        debug_assert!(self.squares[sq as usize].is_none(), "square {sq} is occupied");
        let bb = sq_to_bb(sq);
        self.piece_bbs[piece.piece_type.index()] |= bb;
        self.color_bbs[piece.color.index()] |= bb;
        self.squares[sq as usize] = Some(piece);
    }

    /// Take whatever stands on `sq` off the board
    #[inline]
    pub fn remove_piece(&mut self, sq: Square) -> Option<Piece> {
        let piece = self.squares[sq as usize].take()?;
        let bb = !sq_to_bb(sq);
        self.piece_bbs[piece.piece_type.index()] &= bb;
        self.color_bbs[piece.color.index()] &= bb;
        Some(piece)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[inline(always)]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq as usize]
    }

    #[inline(always)]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline(always)]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline(always)]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline(always)]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline(always)]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Bitboard of all pieces of one type and color
    #[inline(always)]
    pub fn pieces(&self, piece_type: PieceType, color: Color) -> u64 {
        self.piece_bbs[piece_type.index()] & self.color_bbs[color.index()]
    }

    #[inline(always)]
    pub fn piece_type_bb(&self, piece_type: PieceType) -> u64 {
        self.piece_bbs[piece_type.index()]
    }

    #[inline(always)]
    pub fn color_bb(&self, color: Color) -> u64 {
        self.color_bbs[color.index()]
    }

    #[inline(always)]
    pub fn occupied(&self) -> u64 {
        self.color_bbs[0] | self.color_bbs[1]
    }

    #[inline(always)]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(PieceType::King, color).trailing_zeros() as Square
    }

    /// True when `color` has anything besides pawns and the king
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let pawns_and_king =
            self.piece_type_bb(PieceType::Pawn) | self.piece_type_bb(PieceType::King);
        self.color_bb(color) & !pawns_and_king != 0
    }

    /// Check the redundant representations agree with each other
    pub fn is_consistent(&self) -> bool {
        if self.color_bbs[0] & self.color_bbs[1] != 0 {
            return false;
        }
        let all_types = self.piece_bbs.iter().fold(0, |acc, bb| acc | bb);
        if all_types != self.occupied() {
            return false;
        }
        for sq in 0..64u8 {
            let bb = sq_to_bb(sq);
            let from_bitboards = PieceType::ALL.iter().find_map(|pt| {
                [Color::White, Color::Black]
                    .into_iter()
                    .find(|c| self.pieces(*pt, *c) & bb != 0)
                    .map(|c| Piece::new(c, *pt))
            });
            if from_bitboards != self.squares[sq as usize] {
                return false;
            }
        }
        self.pieces(PieceType::King, Color::White).count_ones() == 1
            && self.pieces(PieceType::King, Color::Black).count_ones() == 1
    }

    /// Position fingerprint for the transposition table and the opening book.
    ///
    /// Covers piece placement, side to move, castling rights and the en passant
    /// target. The move counters are left out, so positions that differ only in
    /// them share a key.
    pub fn hash(&self) -> u64 {
        let mut hasher = StructuralHasher::new();
        for square in self.squares.iter() {
            let code = match square {
                None => 0u8,
                Some(p) => 1 + p.color.index() as u8 * 6 + p.piece_type.index() as u8,
            };
            hasher.write_u8(code);
        }
        hasher.write_u8(self.side_to_move.index() as u8);
        hasher.write_u8(self.castling.0);
        hasher.write_u8(self.en_passant.unwrap_or(64));
        hasher.finish()
    }

    // ------------------------------------------------------------------
    // Move application
    // ------------------------------------------------------------------

    /// Play a move, updating every piece of state.
    ///
    /// The move must come from the move generator for this position.
    pub fn make_move(&mut self, mv: &Move) {
        let Some(moving) = self.squares[mv.from as usize] else {
            debug_assert!(false, "no piece on {} for move {mv}", square_to_algebraic(mv.from));
            return;
        };
        let us = self.side_to_move;
        debug_assert_eq!(moving.color, us);

        if moving.piece_type == PieceType::Pawn || mv.is_capture() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if us == Color::Black {
            self.fullmove_number += 1;
        }

        if moving.piece_type == PieceType::King {
            self.castling.remove_color(us);
        }
        // A rook leaving its corner, or anything landing on one, ends that side's right
        self.castling
            .remove(castle_rights_touched(mv.from) | castle_rights_touched(mv.to));

        self.make_move_cheap(mv);

        self.en_passant = match mv.kind {
            MoveKind::DoublePawnPush => Some((mv.from + mv.to) / 2),
            _ => None,
        };
        self.side_to_move = us.other_color();
    }

    /// Move pieces only: captures, the moving piece (promoted if needed) and
    /// the castling rook. Counters, rights, en passant and side to move are left
    /// alone, so this is only good for probing king safety before restoring.
    #[inline]
    pub fn make_move_cheap(&mut self, mv: &Move) {
        let Some(moving) = self.remove_piece(mv.from) else {
            debug_assert!(false, "no piece on {} for move {mv}", square_to_algebraic(mv.from));
            return;
        };

        match mv.kind {
            MoveKind::Capture | MoveKind::PromotionCapture(_) => {
                self.remove_piece(mv.to);
            }
            MoveKind::EnPassantCapture => {
                let captured_sq = match moving.color {
                    Color::White => mv.to - 8,
                    Color::Black => mv.to + 8,
                };
                self.remove_piece(captured_sq);
            }
            _ => {}
        }

        let placed = match mv.promotion() {
            Some(piece_type) => Piece::new(moving.color, piece_type),
            None => moving,
        };
        self.place_piece(placed, mv.to);

        let rook_move = match mv.kind {
            MoveKind::CastleKingside => Some((mv.to + 1, mv.to - 1)),
            MoveKind::CastleQueenside => Some((mv.to - 2, mv.to + 1)),
            _ => None,
        };
        if let Some((rook_from, rook_to)) = rook_move {
            let rook = self.remove_piece(rook_from);
            debug_assert_eq!(
                rook,
                Some(Piece::new(moving.color, PieceType::Rook)),
                "castling without a rook on {}",
                square_to_algebraic(rook_from)
            );
            if let Some(rook) = rook {
                self.place_piece(rook, rook_to);
            }
        }
    }

    /// Pass the turn without moving, for null move pruning
    pub fn make_null_move(&mut self) {
        self.en_passant = None;
        self.side_to_move = self.side_to_move.other_color();
    }

    // ------------------------------------------------------------------
    // FEN
    // ------------------------------------------------------------------

    /// Parse a FEN string. The two move counters may be omitted.
    pub fn from_fen(fen: &str) -> Result<Board> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 4 && fields.len() != 6 {
            return Err(ChessError::fen(
                fen,
                format!("expected 4 or 6 fields, found {}", fields.len()),
            ));
        }

        let mut board = Board::empty();

        let ranks: Vec<&str> = fields[0].split('/').collect();
        if ranks.len() != 8 {
            return Err(ChessError::fen(
                fen,
                format!("expected 8 ranks, found {}", ranks.len()),
            ));
        }
        for (i, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - i as u8;
            let mut file = 0u8;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if !(1..=8).contains(&skip) {
                        return Err(ChessError::fen(fen, format!("bad empty count `{c}`")));
                    }
                    file += skip as u8;
                } else {
                    let piece = Piece::from_fen_char(c)
                        .ok_or_else(|| ChessError::fen(fen, format!("unexpected char `{c}`")))?;
                    if file >= 8 {
                        return Err(ChessError::fen(
                            fen,
                            format!("rank {} has more than 8 files", rank + 1),
                        ));
                    }
                    if piece.piece_type == PieceType::Pawn && (rank == 0 || rank == 7) {
                        return Err(ChessError::fen(
                            fen,
                            format!("pawn on rank {}", rank + 1),
                        ));
                    }
                    board.place_piece(piece, rank * 8 + file);
                    file += 1;
                }
                if file > 8 {
                    return Err(ChessError::fen(
                        fen,
                        format!("rank {} has more than 8 files", rank + 1),
                    ));
                }
            }
            if file != 8 {
                return Err(ChessError::fen(
                    fen,
                    format!("rank {} has {} files", rank + 1, file),
                ));
            }
        }

        for color in [Color::White, Color::Black] {
            let kings = board.pieces(PieceType::King, color).count_ones();
            if kings != 1 {
                return Err(ChessError::fen(
                    fen,
                    format!("{} has {} kings", color.to_human(), kings),
                ));
            }
        }

        let mut side_chars = fields[1].chars();
        board.side_to_move = match (side_chars.next().and_then(Color::from_char), side_chars.next()) {
            (Some(color), None) => color,
            _ => {
                return Err(ChessError::fen(
                    fen,
                    format!("bad side to move `{}`", fields[1]),
                ))
            }
        };

        board.castling = CastlingRights::from_fen(fields[2])
            .ok_or_else(|| ChessError::fen(fen, format!("bad castling rights `{}`", fields[2])))?;

        board.en_passant = if fields[3] == "-" {
            None
        } else {
            let sq = square_from_algebraic(fields[3]).ok_or_else(|| {
                ChessError::fen(fen, format!("bad en passant square `{}`", fields[3]))
            })?;
            let expected_rank = match board.side_to_move {
                Color::White => 5,
                Color::Black => 2,
            };
            if sq >> 3 != expected_rank {
                return Err(ChessError::fen(
                    fen,
                    format!("en passant square `{}` on the wrong rank", fields[3]),
                ));
            }
            // the double push must have come from the square beyond, over `sq`
            let them = board.side_to_move.other_color();
            let (pushed_to, pushed_from) = match them {
                Color::White => (sq + 8, sq - 8),
                Color::Black => (sq - 8, sq + 8),
            };
            let double_push_fits = board.squares[sq as usize].is_none()
                && board.squares[pushed_from as usize].is_none()
                && board.squares[pushed_to as usize] == Some(Piece::new(them, PieceType::Pawn));
            if !double_push_fits {
                return Err(ChessError::fen(
                    fen,
                    format!("en passant square `{}` does not follow a double push", fields[3]),
                ));
            }
            Some(sq)
        };

        if fields.len() == 6 {
            board.halfmove_clock = fields[4]
                .parse()
                .map_err(|_| ChessError::fen(fen, format!("bad halfmove clock `{}`", fields[4])))?;
            board.fullmove_number = fields[5]
                .parse()
                .map_err(|_| ChessError::fen(fen, format!("bad fullmove number `{}`", fields[5])))?;
            if board.fullmove_number == 0 {
                return Err(ChessError::fen(fen, "fullmove number starts at 1"));
            }
        }

        Ok(board)
    }

    pub fn to_fen(&self) -> String {
        let mut placement = String::new();
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => {
                        if empty > 0 {
                            placement.push_str(&empty.to_string());
                            empty = 0;
                        }
                        placement.push(piece.to_fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                placement.push_str(&empty.to_string());
            }
            if rank > 0 {
                placement.push('/');
            }
        }

        format!(
            "{} {} {} {} {} {}",
            placement,
            self.side_to_move.to_char(),
            self.castling.to_fen(),
            self.en_passant
                .map(square_to_algebraic)
                .unwrap_or_else(|| "-".to_string()),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn draw_board(&self) -> String {
        let mut string = String::new();
        for rank in (0..8u8).rev() {
            for file in 0..8u8 {
                string.push(' ');
                match self.squares[(rank * 8 + file) as usize] {
                    Some(p) => string.push_str(p.to_symbol()),
                    None => string.push('.'),
                }
            }
            string.push('\n');
        }
        string
    }

    pub fn draw_to_terminal(&self) {
        println!("{}", self.draw_board());
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.draw_board())?;
        write!(f, "{}", self.to_fen())
    }
}
