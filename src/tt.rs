use crate::types::Move;

/// How a stored score relates to the true value of the position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Exact score (PV node)
    Exact,
    /// Score is a lower bound (cut node - failed high)
    Lower,
    /// Score is an upper bound (all node - failed low)
    Upper,
}

/// A single entry in the transposition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTEntry {
    /// Full position hash, checked on every read
    pub key: u64,
    /// Remaining depth of the search that produced the score
    pub depth: u8,
    pub score: i32,
    pub bound: Bound,
    /// Best move found (for move ordering)
    pub best_move: Option<Move>,
}

/// Direct-mapped table of search results keyed by position hash.
///
/// One entry per slot; the slot is `key & (len - 1)`. A shallower result never
/// evicts a deeper one.
pub struct TranspositionTable {
    entries: Vec<Option<TTEntry>>,
    /// Bitmask for indexing (size - 1)
    size_mask: usize,
    enabled: bool,
    pub hits: u64,
    pub stores: u64,
    /// Stores turned away because the slot held a deeper result
    pub rejected: u64,
}

impl Default for TranspositionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TranspositionTable {
    pub const DEFAULT_BITS: u32 = 20;

    pub fn new() -> Self {
        Self::with_capacity_log2(Self::DEFAULT_BITS)
    }

    /// Table with `2^bits` slots
    pub fn with_capacity_log2(bits: u32) -> Self {
        let len = 1usize << bits.min(30);
        TranspositionTable {
            entries: vec![None; len],
            size_mask: len - 1,
            enabled: true,
            hits: 0,
            stores: 0,
            rejected: 0,
        }
    }

    /// A disabled table misses every probe and drops every store
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn index(&self, key: u64) -> usize {
        (key as usize) & self.size_mask
    }

    /// Entry stored under exactly this key, at any depth
    #[inline]
    pub fn get(&self, key: u64) -> Option<&TTEntry> {
        if !self.enabled {
            return None;
        }
        self.entries[self.index(key)]
            .as_ref()
            .filter(|entry| entry.key == key)
    }

    /// Score usable for a node searched to `depth` with window `(alpha, beta)`
    pub fn probe(&mut self, key: u64, depth: u8, alpha: i32, beta: i32) -> Option<i32> {
        let entry = *self.get(key)?;

        // Only use if searched to at least this depth
        if entry.depth < depth {
            return None;
        }

        let usable = match entry.bound {
            Bound::Exact => true,
            Bound::Lower => entry.score >= beta,
            Bound::Upper => entry.score <= alpha,
        };
        if usable {
            self.hits += 1;
            Some(entry.score)
        } else {
            None
        }
    }

    /// Best move recorded for this position, for move ordering
    #[inline]
    pub fn best_move(&self, key: u64) -> Option<Move> {
        self.get(key).and_then(|entry| entry.best_move)
    }

    /// Store a search result. Returns false if a deeper entry kept the slot.
    pub fn store(
        &mut self,
        key: u64,
        depth: u8,
        score: i32,
        bound: Bound,
        best_move: Option<Move>,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let idx = self.index(key);
        if let Some(existing) = &self.entries[idx] {
            if depth < existing.depth {
                self.rejected += 1;
                return false;
            }
        }
        self.entries[idx] = Some(TTEntry {
            key,
            depth,
            score,
            bound,
            best_move,
        });
        self.stores += 1;
        true
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.fill(None);
        self.hits = 0;
        self.stores = 0;
        self.rejected = 0;
    }

    /// Percentage of occupied slots
    pub fn fill_rate(&self) -> f64 {
        let used = self.entries.iter().filter(|e| e.is_some()).count();
        (used as f64) / (self.entries.len() as f64) * 100.0
    }

    pub fn info(&self) -> String {
        format!(
            "TT: {} entries, {:.1}% filled, {} hits, {} stores, {} rejected",
            self.entries.len(),
            self.fill_rate(),
            self.hits,
            self.stores,
            self.rejected
        )
    }
}
