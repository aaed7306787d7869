//! Bitboard helpers and the precomputed attack tables used by move generation.
//!
//! A bitboard is a 64-bit integer where each bit represents a square on the chess board.
//! Square indexing: a1 = 0, b1 = 1, ..., h1 = 7, a2 = 8, ..., h8 = 63
//!
//! Knight, king and pawn attacks do not depend on other pieces and are built at compile
//! time. Rook and bishop attacks do, so they go through magic bitboards: the relevant
//! blockers of a square are multiplied by a magic number and the top bits of the product
//! index a dense per-square table. All tables are built once, on first use.

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::types::{Color, Square};

pub const FILE_A: u64 = 0x0101_0101_0101_0101;
pub const FILE_H: u64 = FILE_A << 7;

/// Convert a 1-indexed rank and file to a square index (0-63)
#[inline(always)]
pub const fn pos_to_sq(rank: u8, file: u8) -> Square {
    (rank - 1) * 8 + (file - 1)
}

/// Convert a square index to a bitboard with that single bit set
#[inline(always)]
pub const fn sq_to_bb(sq: Square) -> u64 {
    1u64 << sq
}

/// Rank of a square, 0 for the first rank
#[inline(always)]
pub const fn rank_of(sq: Square) -> u8 {
    sq >> 3
}

/// File of a square, 0 for the a-file
#[inline(always)]
pub const fn file_of(sq: Square) -> u8 {
    sq & 7
}

/// Mask of the whole file containing the square
#[inline(always)]
pub const fn file_mask(file: u8) -> u64 {
    FILE_A << file
}

/// Iterate over set bits in a bitboard, returning square indices
pub struct BitboardIter(pub u64);

impl Iterator for BitboardIter {
    type Item = Square;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            None
        } else {
            let sq = self.0.trailing_zeros() as Square;
            self.0 &= self.0 - 1;
            Some(sq)
        }
    }
}

// ============================================================================
// LEAPER TABLES
// ============================================================================

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (-2, -1), (-2, 1), (-1, -2), (-1, 2),
    (1, -2), (1, 2), (2, -1), (2, 1),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

const fn leaper_targets(sq: usize, deltas: &[(i8, i8)]) -> u64 {
    let rank = (sq >> 3) as i8;
    let file = (sq & 7) as i8;
    let mut targets = 0u64;
    let mut i = 0;
    while i < deltas.len() {
        let r = rank + deltas[i].0;
        let f = file + deltas[i].1;
        if r >= 0 && r < 8 && f >= 0 && f < 8 {
            targets |= 1u64 << (r * 8 + f);
        }
        i += 1;
    }
    targets
}

/// Attack sets of the pieces whose reach ignores blockers
pub struct LeaperTables {
    pub knight: [u64; 64],
    pub king: [u64; 64],
    /// Squares a pawn of the given color attacks: `pawn[color as usize][square]`
    pub pawn: [[u64; 64]; 2],
}

impl LeaperTables {
    pub const fn new() -> Self {
        let mut knight = [0u64; 64];
        let mut king = [0u64; 64];
        let mut pawn = [[0u64; 64]; 2];

        let mut sq = 0;
        while sq < 64 {
            knight[sq] = leaper_targets(sq, &KNIGHT_DELTAS);
            king[sq] = leaper_targets(sq, &KING_DELTAS);
            pawn[0][sq] = leaper_targets(sq, &[(1, -1), (1, 1)]);
            pawn[1][sq] = leaper_targets(sq, &[(-1, -1), (-1, 1)]);
            sq += 1;
        }

        LeaperTables { knight, king, pawn }
    }
}

pub static LEAPER_TABLES: LeaperTables = LeaperTables::new();

#[inline(always)]
pub fn knight_attacks(sq: Square) -> u64 {
    LEAPER_TABLES.knight[sq as usize]
}

#[inline(always)]
pub fn king_attacks(sq: Square) -> u64 {
    LEAPER_TABLES.king[sq as usize]
}

/// Squares attacked by a pawn of `color` standing on `sq`
#[inline(always)]
pub fn pawn_attacks(color: Color, sq: Square) -> u64 {
    LEAPER_TABLES.pawn[color.index()][sq as usize]
}

// ============================================================================
// MAGIC BITBOARDS
// ============================================================================

/// Known good bishop magics, verified before use
const BISHOP_MAGICS: [u64; 64] = [
    0x0002020202020200, 0x0002020202020000, 0x0004010202000000, 0x0004040080000000,
    0x0001104000000000, 0x0000821040000000, 0x0000410410400000, 0x0000104104104000,
    0x0000040404040400, 0x0000020202020200, 0x0000040102020000, 0x0000040400800000,
    0x0000011040000000, 0x0000008210400000, 0x0000004104104000, 0x0000002082082000,
    0x0004000808080800, 0x0002000404040400, 0x0001000202020200, 0x0000800802004000,
    0x0000800400A00000, 0x0000200100884000, 0x0000400082082000, 0x0000200041041000,
    0x0002080010101000, 0x0001040008080800, 0x0000208004010400, 0x0000404004010200,
    0x0000840000802000, 0x0000404002011000, 0x0000808001041000, 0x0000404000820800,
    0x0001041000202000, 0x0000820800101000, 0x0000104400080800, 0x0000020080080080,
    0x0000404040040100, 0x0000808100020100, 0x0001010100020800, 0x0000808080010400,
    0x0000820820004000, 0x0000410410002000, 0x0000082088001000, 0x0000002011000800,
    0x0000080100400400, 0x0001010101000200, 0x0002020202000400, 0x0001010101000200,
    0x0000410410400000, 0x0000208208200000, 0x0000002084100000, 0x0000000020880000,
    0x0000001002020000, 0x0000040408020000, 0x0004040404040000, 0x0002020202020000,
    0x0000104104104000, 0x0000002082082000, 0x0000000020841000, 0x0000000000208800,
    0x0000000010020200, 0x0000000404080200, 0x0000040404040400, 0x0002020202020200,
];

/// Known good rook magics, verified before use
const ROOK_MAGICS: [u64; 64] = [
    0x0080001020400080, 0x0040001000200040, 0x0080081000200080, 0x0080040800100080,
    0x0080020400080080, 0x0080010200040080, 0x0080008001000200, 0x0080002040800100,
    0x0000800020400080, 0x0000400020005000, 0x0000801000200080, 0x0000800800100080,
    0x0000800400080080, 0x0000800200040080, 0x0000800100020080, 0x0000800040800100,
    0x0000208000400080, 0x0000404000201000, 0x0000808010002000, 0x0000808008001000,
    0x0000808004000800, 0x0000808002000400, 0x0000010100020004, 0x0000020000408104,
    0x0000208080004000, 0x0000200040005000, 0x0000100080200080, 0x0000080080100080,
    0x0000040080080080, 0x0000020080040080, 0x0000010080800200, 0x0000800080004100,
    0x0000204000800080, 0x0000200040401000, 0x0000100080802000, 0x0000080080801000,
    0x0000040080800800, 0x0000020080800400, 0x0000020001010004, 0x0000800040800100,
    0x0000204000808000, 0x0000200040008080, 0x0000100020008080, 0x0000080010008080,
    0x0000040008008080, 0x0000020004008080, 0x0000010002008080, 0x0000004081020004,
    0x0000204000800080, 0x0000200040008080, 0x0000100020008080, 0x0000080010008080,
    0x0000040008008080, 0x0000020004008080, 0x0000800100020080, 0x0000800041000080,
    0x00FFFCDDFCED714A, 0x007FFCDDFCED714A, 0x003FFFCDFFD88096, 0x0000040810002101,
    0x0001000204080011, 0x0001000204000801, 0x0001000082000401, 0x0001FFFAABFAD1A2,
];

/// Seed for the fallback magic search, so tables are identical on every run
const MAGIC_SEARCH_SEED: u64 = 0x5EED_0F_C0FFEE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slider {
    Rook,
    Bishop,
}

impl Slider {
    fn directions(&self) -> [(i32, i32); 4] {
        match self {
            Slider::Rook => [(1, 0), (-1, 0), (0, 1), (0, -1)],
            Slider::Bishop => [(1, 1), (1, -1), (-1, 1), (-1, -1)],
        }
    }

    fn known_magic(&self, sq: Square) -> u64 {
        match self {
            Slider::Rook => ROOK_MAGICS[sq as usize],
            Slider::Bishop => BISHOP_MAGICS[sq as usize],
        }
    }

    /// Squares whose occupancy can change the attack set. A blocker on the last
    /// square of a ray never hides anything behind it, so edges are left out.
    pub fn relevant_mask(&self, sq: Square) -> u64 {
        let rank = rank_of(sq) as i32;
        let file = file_of(sq) as i32;
        let mut mask = 0u64;
        for (dr, df) in self.directions() {
            let mut r = rank + dr;
            let mut f = file + df;
            while (0..8).contains(&(r + dr)) && (0..8).contains(&(f + df)) {
                mask |= 1u64 << (r * 8 + f);
                r += dr;
                f += df;
            }
        }
        mask
    }

    /// Ray scan: each ray stops at (and includes) the first blocker
    pub fn slow_attacks(&self, sq: Square, occupied: u64) -> u64 {
        let rank = rank_of(sq) as i32;
        let file = file_of(sq) as i32;
        let mut attacks = 0u64;
        for (dr, df) in self.directions() {
            let mut r = rank + dr;
            let mut f = file + df;
            while (0..8).contains(&r) && (0..8).contains(&f) {
                let target = 1u64 << (r * 8 + f);
                attacks |= target;
                if occupied & target != 0 {
                    break;
                }
                r += dr;
                f += df;
            }
        }
        attacks
    }
}

/// Enumerate every subset of a mask (Carry-Rippler), starting with the empty set
fn all_subsets(mask: u64) -> impl Iterator<Item = u64> {
    let mut subset = 0u64;
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        let current = subset;
        subset = subset.wrapping_sub(mask) & mask;
        if subset == 0 {
            done = true;
        }
        Some(current)
    })
}

/// Per-square lookup parameters into the shared attack vector
#[derive(Debug, Clone, Copy, Default)]
pub struct Magic {
    pub mask: u64,
    pub magic: u64,
    pub shift: u32,
    pub offset: usize,
}

impl Magic {
    #[inline(always)]
    fn index(&self, occupied: u64) -> usize {
        self.offset + ((occupied & self.mask).wrapping_mul(self.magic) >> self.shift) as usize
    }
}

/// Try to lay out one square's table with the given magic. Fails on a
/// collision between two occupancies with different attack sets.
fn try_fill(magic: u64, bits: u32, occupancies: &[u64], attacks: &[u64]) -> Option<Vec<u64>> {
    let mut table = vec![0u64; 1 << bits];
    let mut used = vec![false; 1 << bits];
    for (occ, att) in occupancies.iter().zip(attacks) {
        let index = (occ.wrapping_mul(magic) >> (64 - bits)) as usize;
        if !used[index] {
            used[index] = true;
            table[index] = *att;
        } else if table[index] != *att {
            return None;
        }
    }
    Some(table)
}

fn find_magic(
    slider: Slider,
    sq: Square,
    mask: u64,
    rng: &mut StdRng,
) -> (u64, Vec<u64>) {
    let bits = mask.count_ones();
    let occupancies: Vec<u64> = all_subsets(mask).collect();
    let attacks: Vec<u64> = occupancies
        .iter()
        .map(|&occ| slider.slow_attacks(sq, occ))
        .collect();

    let known = slider.known_magic(sq);
    if let Some(table) = try_fill(known, bits, &occupancies, &attacks) {
        return (known, table);
    }

    let mut tries = 0u64;
    loop {
        tries += 1;
        // Sparse candidates are far more likely to work
        let magic = rng.gen::<u64>() & rng.gen::<u64>() & rng.gen::<u64>();
        if (mask.wrapping_mul(magic) & 0xFF00_0000_0000_0000).count_ones() < 6 {
            continue;
        }
        if let Some(table) = try_fill(magic, bits, &occupancies, &attacks) {
            debug!(?slider, sq, tries, "searched replacement magic");
            return (magic, table);
        }
    }
}

/// Magic bitboard attack lookup tables
pub struct MagicTables {
    pub rook: [Magic; 64],
    pub bishop: [Magic; 64],
    /// Every square's dense table, back to back
    pub attacks: Vec<u64>,
}

impl MagicTables {
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(MAGIC_SEARCH_SEED);
        let mut attacks = Vec::new();
        let mut rook = [Magic::default(); 64];
        let mut bishop = [Magic::default(); 64];

        for (slider, magics) in [(Slider::Rook, &mut rook), (Slider::Bishop, &mut bishop)] {
            for sq in 0..64u8 {
                let mask = slider.relevant_mask(sq);
                let (magic, table) = find_magic(slider, sq, mask, &mut rng);
                magics[sq as usize] = Magic {
                    mask,
                    magic,
                    shift: 64 - mask.count_ones(),
                    offset: attacks.len(),
                };
                attacks.extend(table);
            }
        }

        debug!(entries = attacks.len(), "magic tables built");
        MagicTables {
            rook,
            bishop,
            attacks,
        }
    }

    #[inline(always)]
    pub fn bishop_attacks(&self, sq: Square, occupied: u64) -> u64 {
        self.attacks[self.bishop[sq as usize].index(occupied)]
    }

    #[inline(always)]
    pub fn rook_attacks(&self, sq: Square, occupied: u64) -> u64 {
        self.attacks[self.rook[sq as usize].index(occupied)]
    }
}

impl Default for MagicTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Global magic bitboard tables (lazily initialized at runtime)
static MAGIC_TABLES: OnceLock<MagicTables> = OnceLock::new();

/// Get the global magic tables, initializing if needed
#[inline]
pub fn magic_tables() -> &'static MagicTables {
    MAGIC_TABLES.get_or_init(MagicTables::new)
}

/// Build the sliding piece tables now instead of on the first lookup
pub fn init() {
    magic_tables();
}

#[inline(always)]
pub fn bishop_attacks(sq: Square, occupied: u64) -> u64 {
    magic_tables().bishop_attacks(sq, occupied)
}

#[inline(always)]
pub fn rook_attacks(sq: Square, occupied: u64) -> u64 {
    magic_tables().rook_attacks(sq, occupied)
}

#[inline(always)]
pub fn queen_attacks(sq: Square, occupied: u64) -> u64 {
    let tables = magic_tables();
    tables.bishop_attacks(sq, occupied) | tables.rook_attacks(sq, occupied)
}
