//! Static evaluation and the move ordering heuristic.
//!
//! Scores are centipawns from the point of view of the side to move.

use crate::bitboard::{file_mask, file_of, rank_of, BitboardIter};
use crate::board::Board;
use crate::types::{Color, Move, MoveKind, PieceType};

/// Mate score before ply adjustment; any score beyond `MATE_THRESHOLD` is a mate
pub const MATE_SCORE: i32 = 131_072;
pub const MATE_THRESHOLD: i32 = MATE_SCORE - 1024;

pub const STACKED_PAWN_PENALTY: i32 = 10;
pub const ISOLATED_PAWN_PENALTY: i32 = 10;

/// Weight of the promoted piece's value in move ordering
pub const PROMOTION_BONUS: i32 = 32_768;
/// Weight of victim minus attacker in move ordering
pub const CAPTURE_BONUS: i32 = 8;

/// Material value of a piece. The king has none.
pub const fn piece_value(piece_type: PieceType) -> i32 {
    match piece_type {
        PieceType::Pawn => 100,
        PieceType::Knight => 350,
        PieceType::Bishop => 350,
        PieceType::Rook => 525,
        PieceType::Queen => 1000,
        PieceType::King => 0,
    }
}

/// Value used when ordering captures, where the king does attack
const fn ordering_value(piece_type: PieceType) -> i32 {
    match piece_type {
        PieceType::King => 220,
        other => piece_value(other),
    }
}

/// The endgame tables apply once both queens are gone
#[inline]
pub fn is_endgame(board: &Board) -> bool {
    board.piece_type_bb(PieceType::Queen) == 0
}

/// Static evaluation of `board` for the side to move
pub fn evaluate(board: &Board) -> i32 {
    let endgame = is_endgame(board);
    let white = side_score(board, Color::White, endgame);
    let black = side_score(board, Color::Black, endgame);
    match board.side_to_move() {
        Color::White => white - black,
        Color::Black => black - white,
    }
}

fn side_score(board: &Board, color: Color, endgame: bool) -> i32 {
    let mut score = 0;
    for piece_type in PieceType::ALL {
        for sq in BitboardIter(board.pieces(piece_type, color)) {
            score += piece_value(piece_type) + pst_value(piece_type, color, sq, endgame);
        }
    }
    score - pawn_structure_penalty(board.pieces(PieceType::Pawn, color))
}

/// Stacked and isolated pawn penalties for one side's pawns
pub fn pawn_structure_penalty(pawns: u64) -> i32 {
    let mut penalty = 0;
    for file in 0..8u8 {
        let count = (pawns & file_mask(file)).count_ones();
        if count == 0 {
            continue;
        }
        if count > 1 {
            penalty += STACKED_PAWN_PENALTY;
        }
        let mut neighbours = 0u64;
        if file > 0 {
            neighbours |= file_mask(file - 1);
        }
        if file < 7 {
            neighbours |= file_mask(file + 1);
        }
        if pawns & neighbours == 0 {
            penalty += ISOLATED_PAWN_PENALTY;
        }
    }
    penalty
}

/// Ordering score of a move: promotions first, then good captures, then
/// moves that improve the piece's square
pub fn score_move(board: &Board, mv: &Move) -> i32 {
    let Some(mover) = board.piece_at(mv.from) else {
        return 0;
    };
    let endgame = is_endgame(board);
    let mut score = pst_value(mover.piece_type, mover.color, mv.to, endgame)
        - pst_value(mover.piece_type, mover.color, mv.from, endgame);

    if let Some(promoted) = mv.promotion() {
        score += PROMOTION_BONUS * piece_value(promoted);
    }

    if mv.is_capture() {
        let victim = match mv.kind {
            MoveKind::EnPassantCapture => PieceType::Pawn,
            _ => board
                .piece_at(mv.to)
                .map(|p| p.piece_type)
                .unwrap_or(PieceType::Pawn),
        };
        score += CAPTURE_BONUS * (ordering_value(victim) - ordering_value(mover.piece_type));
    }
    score
}

/// Sort moves best first by [`score_move`]
pub fn order_moves(board: &Board, moves: &mut [Move]) {
    moves.sort_by_cached_key(|m| -score_move(board, m));
}

/// Piece-square value of a piece of `color` on `sq`
pub fn pst_value(piece_type: PieceType, color: Color, sq: u8, endgame: bool) -> i32 {
    // tables are laid out rank 8 first, as white sees the board
    let rank = rank_of(sq) as usize;
    let file = file_of(sq) as usize;
    let index = match color {
        Color::White => (7 - rank) * 8 + file,
        Color::Black => rank * 8 + file,
    };
    raw_pst_table(piece_type, endgame)[index]
}

fn raw_pst_table(piece_type: PieceType, endgame: bool) -> &'static [i32; 64] {
    match piece_type {
        PieceType::Pawn if endgame => &PAWNS_END,
        PieceType::Pawn => &PAWNS,
        PieceType::Knight => &KNIGHTS,
        PieceType::Bishop => &BISHOPS,
        PieceType::Rook => &ROOKS,
        PieceType::Queen => &QUEENS,
        PieceType::King if endgame => &KING_END,
        PieceType::King => &KING_START,
    }
}

#[rustfmt::skip]
const PAWNS: [i32; 64] = [
     0,  0,   0,   0,   0,   0,  0,  0,
    50, 50,  50,  50,  50,  50, 50, 50,
    10, 10,  20,  30,  30,  20, 10, 10,
     5,  5,  10,  25,  25,  10,  5,  5,
     0,  0,   0,  20,  20,   0,  0,  0,
     5, -5, -10,   0,   0, -10, -5,  5,
     5, 10,  10, -20, -20,  10, 10,  5,
     0,  0,   0,   0,   0,   0,  0,  0,
];

#[rustfmt::skip]
const PAWNS_END: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    80, 80, 80, 80, 80, 80, 80, 80,
    50, 50, 50, 50, 50, 50, 50, 50,
    30, 30, 30, 30, 30, 30, 30, 30,
    20, 20, 20, 20, 20, 20, 20, 20,
    10, 10, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const KNIGHTS: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOPS: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOKS: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEENS: [i32; 64] = [
    -20, -10, -10, -5, -5, -10, -10, -20,
    -10,   0,   0,  0,  0,   0,   0, -10,
    -10,   0,   5,  5,  5,   5,   0, -10,
     -5,   0,   5,  5,  5,   5,   0,  -5,
      0,   0,   5,  5,  5,   5,   0,  -5,
    -10,   5,   5,  5,  5,   5,   0, -10,
    -10,   0,   5,  0,  0,   0,   0, -10,
    -20, -10, -10, -5, -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_START: [i32; 64] = [
    -80, -70, -70, -70, -70, -70, -70, -80,
    -60, -60, -60, -60, -60, -60, -60, -60,
    -40, -50, -50, -60, -60, -50, -50, -40,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20, -15, -15, -15,  -5,  20,  20,
     20,  30,  10, -10,   0,  10,  30,  20,
];

#[rustfmt::skip]
const KING_END: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
     -5,   0,   5,   5,   5,   5,   0,  -5,
    -10,  -5,  20,  30,  30,  20,  -5, -10,
    -15, -10,  35,  45,  45,  35, -10, -15,
    -20, -15,  30,  40,  40,  30, -15, -20,
    -25, -20,  20,  25,  25,  20, -20, -25,
    -30, -25,   0,   0,   0,   0, -25, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];
