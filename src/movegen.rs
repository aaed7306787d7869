//! Move generation.
//!
//! Pseudo-legal moves are produced per piece class from the attack tables, then
//! filtered by playing each one with [`Board::make_move_cheap`] on a scratch copy
//! and checking that the mover's king is not attacked afterwards.

use crate::bitboard::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, pos_to_sq, queen_attacks,
    rank_of, rook_attacks, sq_to_bb, BitboardIter, FILE_A, FILE_H,
};
use crate::board::Board;
use crate::error::{ChessError, Result};
use crate::types::*;

/// Every square attacked by `color`, ignoring whether its pieces are pinned
pub fn attacks_by(board: &Board, color: Color) -> u64 {
    let occupied = board.occupied();
    let mut attacks = 0u64;

    let pawns = board.pieces(PieceType::Pawn, color);
    attacks |= match color {
        Color::White => ((pawns & !FILE_A) << 7) | ((pawns & !FILE_H) << 9),
        Color::Black => ((pawns & !FILE_A) >> 9) | ((pawns & !FILE_H) >> 7),
    };
    for sq in BitboardIter(board.pieces(PieceType::Knight, color)) {
        attacks |= knight_attacks(sq);
    }
    for sq in BitboardIter(board.pieces(PieceType::Bishop, color)) {
        attacks |= bishop_attacks(sq, occupied);
    }
    for sq in BitboardIter(board.pieces(PieceType::Rook, color)) {
        attacks |= rook_attacks(sq, occupied);
    }
    for sq in BitboardIter(board.pieces(PieceType::Queen, color)) {
        attacks |= queen_attacks(sq, occupied);
    }
    for sq in BitboardIter(board.pieces(PieceType::King, color)) {
        attacks |= king_attacks(sq);
    }
    attacks
}

/// Is `sq` attacked by any piece of color `by`?
///
/// Looks outward from the square with each piece's attack pattern, which is
/// cheaper than building the full attack set when only one square matters.
#[inline]
pub fn is_square_attacked(board: &Board, sq: Square, by: Color) -> bool {
    let occupied = board.occupied();
    // a pawn of `by` attacks sq iff a pawn of the other color on sq would attack it
    if pawn_attacks(by.other_color(), sq) & board.pieces(PieceType::Pawn, by) != 0 {
        return true;
    }
    if knight_attacks(sq) & board.pieces(PieceType::Knight, by) != 0 {
        return true;
    }
    if king_attacks(sq) & board.pieces(PieceType::King, by) != 0 {
        return true;
    }
    let queens = board.pieces(PieceType::Queen, by);
    if bishop_attacks(sq, occupied) & (board.pieces(PieceType::Bishop, by) | queens) != 0 {
        return true;
    }
    rook_attacks(sq, occupied) & (board.pieces(PieceType::Rook, by) | queens) != 0
}

/// Is the king of `color` currently attacked?
#[inline]
pub fn is_in_check(board: &Board, color: Color) -> bool {
    is_square_attacked(board, board.king_square(color), color.other_color())
}

/// All legal moves for the side to move
pub fn generate_moves(board: &Board) -> Vec<Move> {
    let mut moves = Vec::with_capacity(64);
    MoveGenerator::new(board).generate(&mut moves, false);
    retain_legal(board, &mut moves);
    moves
}

/// Legal captures only (including en passant and capturing promotions)
pub fn generate_captures(board: &Board) -> Vec<Move> {
    let mut moves = Vec::with_capacity(16);
    MoveGenerator::new(board).generate(&mut moves, true);
    retain_legal(board, &mut moves);
    moves
}

/// Drop every move that leaves the mover's king attacked
fn retain_legal(board: &Board, moves: &mut Vec<Move>) {
    let us = board.side_to_move();
    let them = us.other_color();
    let mut scratch = *board;
    moves.retain(|mv| {
        scratch.make_move_cheap(mv);
        let legal = !is_square_attacked(&scratch, scratch.king_square(us), them);
        scratch = *board;
        legal
    });
}

/// Parse a move in long algebraic notation (`e2e4`, `e7e8q`) against the
/// legal moves of the position. Flags are taken from the matching legal move.
pub fn parse_move(board: &Board, text: &str) -> Result<Move> {
    let syntax_error = || ChessError::MoveSyntax(text.to_string());
    let text = text.trim();
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return Err(syntax_error());
    }
    let from = square_from_algebraic(&text[0..2]).ok_or_else(syntax_error)?;
    let to = square_from_algebraic(&text[2..4]).ok_or_else(syntax_error)?;
    let promotion = match text.chars().nth(4) {
        None => None,
        Some(c) => match PieceType::from_char(c) {
            Some(p) if PIECES_CAN_PROMOTE_TO.contains(&p) => Some(p),
            _ => return Err(syntax_error()),
        },
    };

    generate_moves(board)
        .into_iter()
        .find(|m| m.from == from && m.to == to && m.promotion() == promotion)
        .ok_or_else(|| ChessError::IllegalMove {
            mv: text.to_string(),
            fen: board.to_fen(),
        })
}

/// Pseudo-legal move generator for the side to move.
///
/// Castling is the exception: it is only produced when the king's path is
/// safe, so it is already legal when it leaves here.
pub struct MoveGenerator<'a> {
    board: &'a Board,
    color: Color,
    occupied: u64,
    friendly: u64,
    enemy: u64,
}

impl<'a> MoveGenerator<'a> {
    pub fn new(board: &'a Board) -> Self {
        let color = board.side_to_move();
        Self {
            board,
            color,
            occupied: board.occupied(),
            friendly: board.color_bb(color),
            enemy: board.color_bb(color.other_color()),
        }
    }

    /// Push pseudo-legal moves onto `list`, or only captures when `captures_only`
    pub fn generate(&self, list: &mut Vec<Move>, captures_only: bool) {
        let targets = if captures_only {
            self.enemy
        } else {
            !self.friendly
        };

        self.generate_pawn_moves(list, captures_only);
        self.generate_piece_moves(list, PieceType::Knight, targets);
        self.generate_piece_moves(list, PieceType::Bishop, targets);
        self.generate_piece_moves(list, PieceType::Rook, targets);
        self.generate_piece_moves(list, PieceType::Queen, targets);
        self.generate_piece_moves(list, PieceType::King, targets);
        if !captures_only {
            self.generate_castling(list);
        }
    }

    /// Knights, sliders and the king: table lookup, then split into quiet and capture
    fn generate_piece_moves(&self, list: &mut Vec<Move>, piece_type: PieceType, targets: u64) {
        for from in BitboardIter(self.board.pieces(piece_type, self.color)) {
            let attacks = match piece_type {
                PieceType::Knight => knight_attacks(from),
                PieceType::Bishop => bishop_attacks(from, self.occupied),
                PieceType::Rook => rook_attacks(from, self.occupied),
                PieceType::Queen => queen_attacks(from, self.occupied),
                PieceType::King => king_attacks(from),
                PieceType::Pawn => unreachable!("pawns have their own generator"),
            } & targets;

            for to in BitboardIter(attacks & self.enemy) {
                list.push(Move::new(from, to, MoveKind::Capture));
            }
            for to in BitboardIter(attacks & !self.occupied) {
                list.push(Move::new(from, to, MoveKind::Quiet));
            }
        }
    }

    fn generate_pawn_moves(&self, list: &mut Vec<Move>, captures_only: bool) {
        let (start_rank, promo_rank) = match self.color {
            Color::White => (1, 7),
            Color::Black => (6, 0),
        };
        let ep_bb = self.board.en_passant().map(sq_to_bb).unwrap_or(0);

        for from in BitboardIter(self.board.pieces(PieceType::Pawn, self.color)) {
            let attacks = pawn_attacks(self.color, from);

            for to in BitboardIter(attacks & self.enemy) {
                if rank_of(to) == promo_rank {
                    for p in PIECES_CAN_PROMOTE_TO {
                        list.push(Move::new(from, to, MoveKind::PromotionCapture(p)));
                    }
                } else {
                    list.push(Move::new(from, to, MoveKind::Capture));
                }
            }

            if attacks & ep_bb != 0 {
                list.push(Move::new(
                    from,
                    ep_bb.trailing_zeros() as Square,
                    MoveKind::EnPassantCapture,
                ));
            }

            if captures_only {
                continue;
            }

            let to = match self.color {
                Color::White => from + 8,
                Color::Black => from - 8,
            };
            if self.occupied & sq_to_bb(to) != 0 {
                continue;
            }
            if rank_of(to) == promo_rank {
                for p in PIECES_CAN_PROMOTE_TO {
                    list.push(Move::new(from, to, MoveKind::Promotion(p)));
                }
                continue;
            }
            list.push(Move::new(from, to, MoveKind::Quiet));

            if rank_of(from) == start_rank {
                let double = match self.color {
                    Color::White => to + 8,
                    Color::Black => to - 8,
                };
                if self.occupied & sq_to_bb(double) == 0 {
                    list.push(Move::new(from, double, MoveKind::DoublePawnPush));
                }
            }
        }
    }

    fn generate_castling(&self, list: &mut Vec<Move>) {
        let rights = self.board.castling();
        let kingside = rights.can_castle_kingside(self.color);
        let queenside = rights.can_castle_queenside(self.color);
        if !kingside && !queenside {
            return;
        }

        let home_rank = match self.color {
            Color::White => 1,
            Color::Black => 8,
        };
        let king_sq = pos_to_sq(home_rank, 5);
        if self.board.pieces(PieceType::King, self.color) & sq_to_bb(king_sq) == 0 {
            return;
        }

        let opponent_attacks = attacks_by(self.board, self.color.other_color());
        if opponent_attacks & sq_to_bb(king_sq) != 0 {
            return;
        }
        let rooks = self.board.pieces(PieceType::Rook, self.color);
        let sq = |file: u8| sq_to_bb(pos_to_sq(home_rank, file));

        if kingside {
            let between = sq(6) | sq(7);
            if rooks & sq(8) != 0
                && self.occupied & between == 0
                && opponent_attacks & between == 0
            {
                list.push(Move::new(
                    king_sq,
                    pos_to_sq(home_rank, 7),
                    MoveKind::CastleKingside,
                ));
            }
        }
        if queenside {
            let between = sq(2) | sq(3) | sq(4);
            // the king never crosses the b-file, so only c and d need to be safe
            let king_path = sq(3) | sq(4);
            if rooks & sq(1) != 0
                && self.occupied & between == 0
                && opponent_attacks & king_path == 0
            {
                list.push(Move::new(
                    king_sq,
                    pos_to_sq(home_rank, 3),
                    MoveKind::CastleQueenside,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sq(name: &str) -> Square {
        square_from_algebraic(name).unwrap()
    }

    fn has_move(board: &Board, from: &str, to: &str, kind: MoveKind) -> bool {
        generate_moves(board)
            .iter()
            .any(|m| *m == Move::new(sq(from), sq(to), kind))
    }

    fn uci_moves(board: &Board) -> Vec<String> {
        let mut moves: Vec<String> = generate_moves(board).iter().map(Move::to_uci).collect();
        moves.sort();
        moves
    }

    #[test]
    fn count_legal_moves_from_start() {
        let board = Board::new();
        assert_eq!(generate_moves(&board).len(), 20);
        assert!(generate_captures(&board).is_empty());
    }

    #[test]
    fn kiwipete_move_counts() {
        let board = Board::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(generate_moves(&board).len(), 48);
        assert_eq!(generate_captures(&board).len(), 8);
    }

    #[test]
    fn captures_are_a_subset_of_moves() {
        let board = Board::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let all = generate_moves(&board);
        for m in generate_captures(&board) {
            assert!(m.is_capture());
            assert!(all.contains(&m));
        }
        assert_eq!(
            all.iter().filter(|m| m.is_capture()).count(),
            generate_captures(&board).len()
        );
    }

    #[test]
    fn moves_never_leave_own_king_attacked() {
        for fen in [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        ] {
            let board = Board::from_fen(fen).unwrap();
            let us = board.side_to_move();
            for m in generate_moves(&board) {
                let mut after = board;
                after.make_move(&m);
                assert!(after.is_consistent(), "{fen} {m}");
                assert!(!is_in_check(&after, us), "{fen}: {m} leaves the king in check");
            }
        }
    }

    #[test]
    fn pinned_piece_cannot_move_off_the_line() {
        // Bishop on d2 is pinned by the rook on d8 against the king on d1
        let board = Board::from_fen("3rk3/8/8/8/8/8/3B4/3K4 w - - 0 1").unwrap();
        assert!(generate_moves(&board).iter().all(|m| m.from != sq("d2")));
    }

    #[test]
    fn en_passant_only_right_after_double_push() {
        let mut board = Board::from_fen("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1").unwrap();
        board.make_move(&parse_move(&board, "e2e4").unwrap());
        assert!(has_move(&board, "d4", "e3", MoveKind::EnPassantCapture));

        board.make_move(&parse_move(&board, "e8d8").unwrap());
        board.make_move(&parse_move(&board, "e1f1").unwrap());
        assert!(!has_move(&board, "d4", "e3", MoveKind::EnPassantCapture));
        assert_eq!(board.en_passant(), None);
    }

    #[test]
    fn en_passant_exposing_king_on_rank_is_illegal() {
        let board = Board::from_fen("8/8/8/KPp4r/8/8/8/4k3 w - c6 0 2").unwrap();
        assert!(!has_move(&board, "b5", "c6", MoveKind::EnPassantCapture));
        assert!(has_move(&board, "b5", "b6", MoveKind::Quiet));
    }

    #[test]
    fn promotions_expand_to_four_moves() {
        let board = Board::from_fen("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let moves = uci_moves(&board);
        for m in ["a7a8q", "a7a8r", "a7a8b", "a7a8n", "a7b8q", "a7b8r", "a7b8b", "a7b8n"] {
            assert!(moves.contains(&m.to_string()), "missing {m}");
        }
        assert_eq!(generate_captures(&board).len(), 4);
    }

    #[test]
    fn blocked_pawn_has_no_double_push() {
        let board = Board::from_fen("4k3/8/8/8/8/4n3/4P3/4K3 w - - 0 1").unwrap();
        assert!(generate_moves(&board).iter().all(|m| m.from != sq("e2")));
    }

    #[test]
    fn checkmate_and_stalemate_have_no_moves() {
        let mate = Board::from_fen("8/8/8/8/8/2K5/1Q6/1k6 b - - 0 1").unwrap();
        assert!(generate_moves(&mate).is_empty());
        assert!(is_in_check(&mate, Color::Black));

        let stalemate = Board::from_fen("k7/8/1Q6/8/8/8/8/4K3 b - - 0 1").unwrap();
        assert!(generate_moves(&stalemate).is_empty());
        assert!(!is_in_check(&stalemate, Color::Black));
    }

    #[test]
    fn attack_set_matches_square_probe() {
        let board = Board::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        for color in [Color::White, Color::Black] {
            let attacks = attacks_by(&board, color);
            for s in 0..64u8 {
                assert_eq!(
                    attacks & sq_to_bb(s) != 0,
                    is_square_attacked(&board, s, color),
                    "{} {}",
                    color.to_human(),
                    square_to_algebraic(s)
                );
            }
        }
    }

    #[test]
    fn parse_move_derives_flags() {
        let board = Board::new();
        assert_eq!(
            parse_move(&board, "e2e4").unwrap(),
            Move::new(sq("e2"), sq("e4"), MoveKind::DoublePawnPush)
        );
        assert_eq!(
            parse_move(&board, "g1f3").unwrap(),
            Move::new(sq("g1"), sq("f3"), MoveKind::Quiet)
        );
        assert!(matches!(
            parse_move(&board, "e2e5"),
            Err(ChessError::IllegalMove { .. })
        ));
        for bad in ["", "e2", "e2e9", "z2e4", "e7e8k", "e2e4qq"] {
            assert!(
                matches!(parse_move(&board, bad), Err(ChessError::MoveSyntax(_))),
                "{bad}"
            );
        }
    }

    // ---------------------------------------------------------------------
    // Castling
    // ---------------------------------------------------------------------

    #[test]
    fn white_cannot_castle_queenside_through_check_d1_attacked() {
        // Rd8 sees down the open d-file
        let board =
            Board::from_fen("2kr3r/1p2qp1p/p3bp2/2p1n2Q/4P3/1N2P3/PPP1B1PP/R3K2R w KQ - 5 17")
                .unwrap();
        assert!(!has_move(&board, "e1", "c1", MoveKind::CastleQueenside));
        assert!(has_move(&board, "e1", "g1", MoveKind::CastleKingside));
    }

    #[test]
    fn white_cannot_castle_kingside_through_check_f1_attacked() {
        let board =
            Board::from_fen("r3k2r/pppppppp/8/8/2b5/8/PPPP1PPP/R3K2R w KQkq - 0 1").unwrap();
        assert!(!has_move(&board, "e1", "g1", MoveKind::CastleKingside));
        assert!(has_move(&board, "e1", "c1", MoveKind::CastleQueenside));
    }

    #[test]
    fn black_cannot_castle_queenside_through_check_d8_attacked() {
        let board = Board::from_fen("r3k2r/ppp1pppp/8/8/8/8/PPP1PPPP/3RK2R b Kkq - 0 1").unwrap();
        assert!(!has_move(&board, "e8", "c8", MoveKind::CastleQueenside));
        assert!(has_move(&board, "e8", "g8", MoveKind::CastleKingside));
    }

    #[test]
    fn cannot_castle_while_in_check() {
        let board = Board::from_fen("4r2k/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert!(!has_move(&board, "e1", "g1", MoveKind::CastleKingside));
        assert!(!has_move(&board, "e1", "c1", MoveKind::CastleQueenside));

        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/4R1K1 b kq - 0 1").unwrap();
        assert!(!has_move(&board, "e8", "g8", MoveKind::CastleKingside));
        assert!(!has_move(&board, "e8", "c8", MoveKind::CastleQueenside));
    }

    #[test]
    fn cannot_castle_into_check() {
        let board = Board::from_fen("k5r1/8/8/8/8/8/PPPPPP1P/R3K2R w KQ - 0 1").unwrap();
        assert!(!has_move(&board, "e1", "g1", MoveKind::CastleKingside));
        let board = Board::from_fen("2r4k/8/8/8/8/8/PP1PPPPP/R3K2R w KQ - 0 1").unwrap();
        assert!(!has_move(&board, "e1", "c1", MoveKind::CastleQueenside));
    }

    #[test]
    fn can_castle_queenside_when_b1_attacked() {
        let board = Board::from_fen("1r2k3/8/8/8/8/8/P1PPPPPP/R3K2R w KQ - 0 1").unwrap();
        assert!(has_move(&board, "e1", "c1", MoveKind::CastleQueenside));
    }

    #[test]
    fn cannot_castle_through_pieces() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/RN2K1NR w KQkq - 0 1").unwrap();
        assert!(!has_move(&board, "e1", "g1", MoveKind::CastleKingside));
        assert!(!has_move(&board, "e1", "c1", MoveKind::CastleQueenside));
    }

    #[test]
    fn can_castle_both_sides_when_clear() {
        let board =
            Board::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        assert!(has_move(&board, "e1", "g1", MoveKind::CastleKingside));
        assert!(has_move(&board, "e1", "c1", MoveKind::CastleQueenside));

        let board =
            Board::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R b KQkq - 0 1").unwrap();
        assert!(has_move(&board, "e8", "g8", MoveKind::CastleKingside));
        assert!(has_move(&board, "e8", "c8", MoveKind::CastleQueenside));
    }

    #[test]
    fn no_castling_without_the_right() {
        let board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w Qkq - 0 1").unwrap();
        assert!(!has_move(&board, "e1", "g1", MoveKind::CastleKingside));
        assert!(has_move(&board, "e1", "c1", MoveKind::CastleQueenside));
    }
}
