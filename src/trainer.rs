//! Merge-rule learning over a doubly linked token stream.
//!
//! The stream is three parallel arrays (`val`, `next`, `prev`) indexed by
//! byte position; deleted positions are simply unlinked, never reused.
//! Pair statistics live in a non-resizing open-addressed map whose entries
//! carry an intrusive list of candidate positions, and a max-heap of
//! `(count, key)` picks the next merge. Heap entries go stale as counts
//! move; they are re-verified against the map at pop time and skipped on
//! mismatch, which keeps each merge step proportional to the positions it
//! actually rewrites.

use std::collections::BinaryHeap;

use tracing::debug;

use crate::pairmap::{IndexPool, PairMap, EMPTY_KEY};
use crate::segment::split_bytes;
use crate::tokenizer::MergeRule;
use crate::types::{pack, unpack, PairKey, TokenId};

/// The 256 single-byte vocabulary entries every model starts from.
pub(crate) fn byte_vocab() -> Vec<Vec<u8>> {
    (0u32..256).map(|b| vec![b as u8]).collect()
}

/// Learn merge rules from `text` until the vocabulary reaches
/// `target_vocab` or no pair with frequency `>= min_freq` remains.
///
/// Identical `(text, target_vocab, min_freq)` always produce identical
/// rule sequences: ties on count are broken toward the larger packed key,
/// the natural order of the heap.
pub(crate) fn learn(
    text: &[u8],
    target_vocab: u32,
    min_freq: u32,
) -> (Vec<Vec<u8>>, Vec<MergeRule>) {
    if target_vocab <= 256 {
        // Nothing above the byte literals was asked for.
        return (byte_vocab(), Vec::new());
    }
    Trainer::new(text, target_vocab, min_freq).run(target_vocab)
}

struct Trainer {
    // Token stream. Sized once from the input; never reallocated.
    val: Vec<TokenId>,
    next: Vec<i32>,
    prev: Vec<i32>,

    stats: PairMap,
    pool: IndexPool,

    // Max-heap of (count, packed pair); may hold stale entries.
    heap: BinaryHeap<(u32, PairKey)>,

    vocab: Vec<Vec<u8>>,
    merges: Vec<MergeRule>,
    min_freq: u32,
}

impl Trainer {
    fn new(text: &[u8], target_vocab: u32, min_freq: u32) -> Self {
        let (val, next) = split_bytes(text);
        let n = val.len();

        let mut prev = vec![-1i32; n];
        for (i, &nx) in next.iter().enumerate() {
            if nx != -1 && (nx as usize) < n {
                prev[nx as usize] = i as i32;
            }
        }

        // Oversized so the load factor stays low for the whole run.
        let stats = PairMap::with_min_slots((target_vocab as usize * 4).max(16));
        let pool = IndexPool::with_capacity(n / 2);

        let mut trainer = Trainer {
            val,
            next,
            prev,
            stats,
            pool,
            heap: BinaryHeap::new(),
            vocab: byte_vocab(),
            merges: Vec::new(),
            min_freq,
        };
        trainer.seed_stats();
        trainer
    }

    /// Count every within-segment pair and record its positions, then
    /// queue all pairs that already meet the frequency threshold.
    fn seed_stats(&mut self) {
        for i in 0..self.val.len() {
            if self.next[i] == -1 {
                continue;
            }
            let key = pack(self.val[i], self.val[self.next[i] as usize]);
            let entry = self.stats.entry_mut(key);
            if entry.key == EMPTY_KEY {
                entry.key = key;
                entry.count = 0;
                entry.head = -1;
            }
            entry.count += 1;
            self.pool.push(&mut entry.head, i as i32);
        }

        for entry in self.stats.slots() {
            if entry.key != EMPTY_KEY && entry.count >= self.min_freq {
                self.heap.push((entry.count, entry.key));
            }
        }
    }

    fn run(mut self, target_vocab: u32) -> (Vec<Vec<u8>>, Vec<MergeRule>) {
        let mut skipped = 0u64;

        while (self.vocab.len() as u32) < target_vocab {
            let Some((count, key)) = self.heap.pop() else {
                break;
            };

            let entry = self.stats.entry_mut(key);
            if entry.key == EMPTY_KEY || entry.count != count {
                // Stale heap entry; the live count moved on.
                skipped += 1;
                continue;
            }
            if entry.count < self.min_freq {
                // The heap is a max-heap, so nothing later can qualify.
                break;
            }

            // Snapshot the position list, then invalidate the slot. It is
            // not reclaimed for probing; later lookups re-find it empty.
            let saved_head = entry.head;
            entry.key = EMPTY_KEY;
            entry.count = 0;
            entry.head = -1;

            let (a, b) = unpack(key);
            let new_id = self.vocab.len() as TokenId;
            let mut merged =
                Vec::with_capacity(self.vocab[a as usize].len() + self.vocab[b as usize].len());
            merged.extend_from_slice(&self.vocab[a as usize]);
            merged.extend_from_slice(&self.vocab[b as usize]);
            self.vocab.push(merged);
            self.merges.push(MergeRule { a, b, new_id });

            debug!(a, b, new_id, count, "merging pair");

            for pos in self.pool.drain_positions(saved_head) {
                self.rewrite(pos, a, b, new_id);
            }
        }

        debug!(
            merges = self.merges.len(),
            stale_skipped = skipped,
            "training finished"
        );
        (self.vocab, self.merges)
    }

    /// Apply one merge at `pos` if the pair `(a, b)` still lives there.
    ///
    /// Candidate positions come from the index pool and may be stale in
    /// two ways: the values moved (an earlier rewrite consumed one side),
    /// or the links moved (the position was unlinked). Both are detected
    /// here and the position is silently dropped.
    fn rewrite(&mut self, pos: i32, a: TokenId, b: TokenId, new_id: TokenId) {
        let n = self.val.len() as i32;
        if pos < 0 || pos >= n {
            return;
        }
        let pos_u = pos as usize;
        if self.val[pos_u] != a {
            return;
        }

        let right = self.next[pos_u];
        if right < 0 || right >= n {
            return;
        }
        let right_u = right as usize;
        if self.val[right_u] != b {
            return;
        }

        let p = self.prev[pos_u];
        let nn = self.next[right_u];

        // Link-symmetry guards.
        if p != -1 && self.next[p as usize] != pos {
            return;
        }
        if nn != -1 && self.prev[nn as usize] != right {
            return;
        }

        // The pairs this occurrence formed with its neighbors are gone.
        if p >= 0 {
            self.decrement(pack(self.val[p as usize], a));
        }
        if nn >= 0 {
            self.decrement(pack(b, self.val[nn as usize]));
        }

        // Collapse the pair into `pos`; `right` becomes unreachable.
        self.val[pos_u] = new_id;
        self.next[pos_u] = nn;
        if nn >= 0 {
            self.prev[nn as usize] = pos;
        }

        // The merged token forms fresh pairs with both neighbors.
        if p >= 0 {
            self.increment(pack(self.val[p as usize], new_id), p);
        }
        if nn >= 0 {
            self.increment(pack(new_id, self.val[nn as usize]), pos);
        }
    }

    fn decrement(&mut self, key: PairKey) {
        let entry = self.stats.entry_mut(key);
        if entry.key != EMPTY_KEY && entry.count > 0 {
            entry.count -= 1;
        }
    }

    fn increment(&mut self, key: PairKey, pos: i32) {
        let entry = self.stats.entry_mut(key);
        if entry.key == EMPTY_KEY {
            entry.key = key;
            entry.count = 0;
            entry.head = -1;
        }
        entry.count += 1;
        self.pool.push(&mut entry.head, pos);
        let count = entry.count;
        if count >= self.min_freq {
            self.heap.push((count, key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_learns_nothing() {
        let (vocab, merges) = learn(b"", 1000, 1);
        assert_eq!(vocab.len(), 256);
        assert!(merges.is_empty());
    }

    #[test]
    fn target_at_byte_level_is_a_no_op() {
        let (vocab, merges) = learn(b"aaaa", 256, 1);
        assert_eq!(vocab.len(), 256);
        assert!(merges.is_empty());
    }

    #[test]
    fn most_frequent_pair_merges_first() {
        // "abab": (a,b) occurs twice, (b,a) once.
        let (vocab, merges) = learn(b"abab", 258, 1);
        assert_eq!(
            merges,
            vec![
                MergeRule { a: 97, b: 98, new_id: 256 },
                MergeRule { a: 256, b: 256, new_id: 257 },
            ]
        );
        assert_eq!(vocab[256], b"ab");
        assert_eq!(vocab[257], b"abab");
    }

    #[test]
    fn count_ties_break_toward_larger_packed_key() {
        // All three pairs of "abcb" occur once; (c,b) packs largest.
        let (vocab, merges) = learn(b"abcb", 257, 1);
        assert_eq!(merges, vec![MergeRule { a: 99, b: 98, new_id: 256 }]);
        assert_eq!(vocab[256], b"cb");
    }

    #[test]
    fn min_freq_filters_singleton_pairs() {
        let (vocab, merges) = learn(b"abcd", 300, 2);
        assert!(merges.is_empty());
        assert_eq!(vocab.len(), 256);
    }

    #[test]
    fn pairs_never_span_segments() {
        // The space keeps "ab" runs apart; after the one useful merge
        // nothing is left to pair with, whatever the target.
        let (vocab, merges) = learn(b"ab ab", 1000, 1);
        assert_eq!(merges, vec![MergeRule { a: 97, b: 98, new_id: 256 }]);
        assert_eq!(vocab[256], b"ab");
    }

    #[test]
    fn overlapping_occurrences_are_counted_once() {
        // "aaaa" has three overlapping (a,a) positions but only two can
        // be rewritten; the middle candidate fails the link check.
        let (vocab, merges) = learn(b"aaaa", 300, 1);
        assert_eq!(
            merges,
            vec![
                MergeRule { a: 97, b: 97, new_id: 256 },
                MergeRule { a: 256, b: 256, new_id: 257 },
            ]
        );
        assert_eq!(vocab[257], b"aaaa");
    }

    #[test]
    fn vocabulary_tracks_rules() {
        let (vocab, merges) = learn(b"the cat sat on the mat", 300, 1);
        assert_eq!(vocab.len(), 256 + merges.len());
        for (k, rule) in merges.iter().enumerate() {
            assert_eq!(rule.new_id as usize, 256 + k);
            let expected: Vec<u8> = [
                vocab[rule.a as usize].as_slice(),
                vocab[rule.b as usize].as_slice(),
            ]
            .concat();
            assert_eq!(vocab[rule.new_id as usize], expected);
        }
    }

    #[test]
    fn training_is_deterministic() {
        let text = b"To be, or not to be: that is the question.";
        let first = learn(text, 320, 1);
        let second = learn(text, 320, 1);
        assert_eq!(first, second);
    }
}
