//! Greedy rank-ordered byte-pair merging.
//!
//! The merge loop works on a small arena of symbols linked by index. Each round
//! scans every adjacent pair left to right and picks the pair with the lowest
//! merge rank (first occurrence wins a tie). After merging it, the rest of the
//! sequence is swept once more for further occurrences of the *same* pair of
//! original ids, which are folded immediately, before the next global scan.
//!
//! The sweep matters: when a merged symbol can itself take part in a
//! lower-ranked merge, folding repeats first yields a different segmentation
//! than re-running the global scan after every single merge.

use rustc_hash::FxHashMap;

/// Result of merging one pair of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    /// Vocabulary id of the concatenated token.
    pub id: u32,
    /// Line order in the merges file; lower merges first.
    pub rank: u32,
    /// Textual length of the merged token, not counting `</w>`.
    pub length: usize,
}

/// `(left id, right id) -> rule`
pub type MergeTable = FxHashMap<(u32, u32), MergeRule>;

/// One BPE symbol: a vocabulary id and the number of source bytes it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub id: u32,
    pub len: usize,
}

impl Symbol {
    pub fn new(id: u32, len: usize) -> Self {
        Self { id, len }
    }
}

struct Arena {
    symbols: Vec<Symbol>,
    next: Vec<usize>,
    live: usize,
}

impl Arena {
    /// Sentinel index past the last symbol.
    fn end(&self) -> usize {
        self.symbols.len()
    }

    /// Fold the symbol after `i` into `i`.
    fn merge_at(&mut self, i: usize, id: u32) {
        let j = self.next[i];
        self.symbols[i] = Symbol::new(id, self.symbols[i].len + self.symbols[j].len);
        self.next[i] = self.next[j];
        self.live -= 1;
    }

    /// Lowest-ranked mergeable pair, as the index of its left symbol.
    fn best_pair(&self, merges: &MergeTable) -> Option<(usize, MergeRule)> {
        let mut best: Option<(usize, MergeRule)> = None;
        let mut i = 0;
        while self.next[i] != self.end() {
            let j = self.next[i];
            if let Some(rule) = merges.get(&(self.symbols[i].id, self.symbols[j].id)) {
                if best.map_or(true, |(_, b)| rule.rank < b.rank) {
                    best = Some((i, *rule));
                }
            }
            i = j;
        }
        best
    }

    fn into_symbols(self) -> Vec<Symbol> {
        let mut out = Vec::with_capacity(self.live);
        let mut i = 0;
        while i != self.end() {
            out.push(self.symbols[i]);
            i = self.next[i];
        }
        out
    }
}

/// Apply merges from `merges` to `symbols` in place until no pair is mergeable.
pub fn byte_pair_merge(symbols: &mut Vec<Symbol>, merges: &MergeTable) {
    if symbols.len() < 2 {
        return;
    }

    let n = symbols.len();
    let mut arena = Arena {
        symbols: std::mem::take(symbols),
        next: (1..=n).collect(),
        live: n,
    };

    while arena.live >= 2 {
        let Some((pos, rule)) = arena.best_pair(merges) else {
            break;
        };
        let left = arena.symbols[pos].id;
        let right = arena.symbols[arena.next[pos]].id;
        arena.merge_at(pos, rule.id);

        let mut i = arena.next[pos];
        while i != arena.end() {
            let j = arena.next[i];
            if j == arena.end() {
                break;
            }
            if arena.symbols[i].id == left && arena.symbols[j].id == right {
                arena.merge_at(i, rule.id);
                i = arena.next[i];
            } else {
                i = j;
            }
        }
    }

    *symbols = arena.into_symbols();
}
