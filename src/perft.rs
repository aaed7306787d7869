use rayon::prelude::*;

use crate::board::Board;
use crate::movegen::generate_moves;
use crate::types::Move;

/// Number of leaf nodes of the legal move tree `depth` plies deep
pub fn perft(board: &Board, depth: u8) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_moves(board);
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0;
    for m in moves {
        let mut b = *board;
        b.make_move(&m);
        nodes += perft(&b, depth - 1);
    }
    nodes
}

/// Leaf count below each root move, root moves searched in parallel.
/// Sorted by move text so the output is stable.
pub fn divide(board: &Board, depth: u8) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }
    let mut counts: Vec<(Move, u64)> = generate_moves(board)
        .into_par_iter()
        .map(|m| {
            let mut b = *board;
            b.make_move(&m);
            (m, perft(&b, depth - 1))
        })
        .collect();
    counts.sort_by_key(|(m, _)| m.to_uci());
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use pretty_assertions::assert_eq;

    /// Perft from starting position
    ///
    /// https://www.chessprogramming.org/Perft_Results
    ///
    /// | Depth | Nodes     | Captures | E.p. | Checks | Checkmates |
    /// | ----- | --------- | -------- | ---- | ------ | ---------- |
    /// | 1     | 20        | 0        | 0    | 0      | 0          |
    /// | 2     | 400       | 0        | 0    | 0      | 0          |
    /// | 3     | 8,902     | 34       | 0    | 12     | 0          |
    /// | 4     | 197,281   | 1576     | 0    | 469    | 8          |
    /// | 5     | 4,865,609 | 82,719   | 258  | 27,351 | 347        |
    #[test]
    fn perft_start() {
        let board = Board::new();
        let expected = [1, 20, 400, 8_902, 197_281];
        for (depth, &count) in expected.iter().enumerate() {
            assert_eq!(perft(&board, depth as u8), count, "depth {depth}");
        }
    }

    #[test]
    fn perft_kiwipete() {
        let board = Board::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        assert_eq!(perft(&board, 1), 48);
        assert_eq!(perft(&board, 2), 2_039);
        assert_eq!(perft(&board, 3), 97_862);
    }

    /// Run the perft test on the "position 5" from
    /// https://www.chessprogramming.org/Perft_Results
    ///
    /// Depth | Nodes
    /// ----- | -----
    /// 1     | 44
    /// 2     | 1,486
    /// 3     | 62,379
    /// 4     | 2,103,487
    #[test]
    fn perft_pos_5() {
        let board =
            Board::from_fen("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8").unwrap();
        let expected = [1, 44, 1_486, 62_379];
        for (depth, &count) in expected.iter().enumerate() {
            assert_eq!(perft(&board, depth as u8), count, "depth {depth}");
        }
    }

    /// Position 3: en passant and rook endgame checks
    #[test]
    fn perft_pos_3() {
        let board = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        let expected = [1, 14, 191, 2_812, 43_238];
        for (depth, &count) in expected.iter().enumerate() {
            assert_eq!(perft(&board, depth as u8), count, "depth {depth}");
        }
    }

    #[test]
    fn divide_adds_up_to_perft() {
        let board = Board::new();
        let split = divide(&board, 3);
        assert_eq!(split.len(), 20);
        assert_eq!(split.iter().map(|(_, n)| n).sum::<u64>(), 8_902);
        let e2e4 = split.iter().find(|(m, _)| m.to_uci() == "e2e4").unwrap();
        assert_eq!(e2e4.1, 600);
        assert!(divide(&board, 0).is_empty());
    }
}
