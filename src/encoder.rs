//! Applying learned merges at inference time.
//!
//! The rule list is indexed into a hash table from `(a, b)` to the rule's
//! rank, then each segment is reduced by repeatedly applying the
//! lowest-rank merge present. The inner search is a linear scan: segments
//! are short, and scan order is what makes equal-rank ties resolve to the
//! left-most occurrence.

use crate::pairmap::{PairMap, EMPTY_KEY};
use crate::tokenizer::MergeRule;
use crate::types::{pack, TokenId};

/// Lookup table from token pair to merge rank.
///
/// Built with the same hashing and probing as the training map; the rank
/// is stored in the slot's `head` field. Rebuilt whenever a model is
/// loaded or assembled.
#[derive(Debug)]
pub(crate) struct RankTable {
    map: PairMap,
}

impl RankTable {
    pub(crate) fn build(merges: &[MergeRule]) -> Self {
        let mut map = PairMap::with_min_slots(merges.len() * 2);
        for (rank, rule) in merges.iter().enumerate() {
            let key = pack(rule.a, rule.b);
            let entry = map.entry_mut(key);
            entry.key = key;
            entry.head = rank as i32;
        }
        Self { map }
    }

    /// Rank of the rule merging `(a, b)`, if one was learned.
    #[inline]
    pub(crate) fn rank(&self, a: TokenId, b: TokenId) -> Option<i32> {
        let entry = self.map.entry(pack(a, b));
        if entry.key == EMPTY_KEY {
            None
        } else {
            Some(entry.head)
        }
    }

    /// Reduce one segment in place by greedy lowest-rank merging.
    ///
    /// Each round scans every adjacent pair, picks the smallest rank (the
    /// left-most occurrence on ties, because only strictly smaller ranks
    /// displace the running best) and applies that rule. Stops when no
    /// adjacent pair has a rule.
    pub(crate) fn encode_piece(&self, merges: &[MergeRule], work: &mut Vec<TokenId>) {
        while work.len() >= 2 {
            let mut best_rank = i32::MAX;
            let mut best_i = 0usize;

            for i in 0..work.len() - 1 {
                if let Some(rank) = self.rank(work[i], work[i + 1]) {
                    if rank < best_rank {
                        best_rank = rank;
                        best_i = i;
                    }
                }
            }

            if best_rank == i32::MAX {
                break;
            }

            work[best_i] = merges[best_rank as usize].new_id;
            work.remove(best_i + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(a: TokenId, b: TokenId, new_id: TokenId) -> MergeRule {
        MergeRule { a, b, new_id }
    }

    fn encode_with(merges: &[MergeRule], piece: &[TokenId]) -> Vec<TokenId> {
        let table = RankTable::build(merges);
        let mut work = piece.to_vec();
        table.encode_piece(merges, &mut work);
        work
    }

    #[test]
    fn empty_rule_list_changes_nothing() {
        assert_eq!(encode_with(&[], &[104, 105]), vec![104, 105]);
    }

    #[test]
    fn chained_rules_apply_in_rank_order() {
        let merges = vec![rule(97, 98, 256), rule(256, 99, 257)];
        assert_eq!(encode_with(&merges, &[97, 98, 99]), vec![257]);
    }

    #[test]
    fn lower_rank_wins_over_position() {
        // (b,c) was learned first, so it beats the earlier-positioned (a,b).
        let merges = vec![rule(98, 99, 256), rule(97, 98, 257)];
        assert_eq!(encode_with(&merges, &[97, 98, 99]), vec![97, 256]);
    }

    #[test]
    fn equal_ranks_take_the_leftmost_occurrence() {
        // One rule, two candidate sites: "aaa" must become [256, 97].
        let merges = vec![rule(97, 97, 256)];
        assert_eq!(encode_with(&merges, &[97, 97, 97]), vec![256, 97]);
    }

    #[test]
    fn single_token_piece_is_untouched() {
        let merges = vec![rule(97, 97, 256)];
        assert_eq!(encode_with(&merges, &[97]), vec![97]);
    }

    #[test]
    fn rank_lookup_misses_unlearned_pairs() {
        let table = RankTable::build(&[rule(10, 11, 256)]);
        assert_eq!(table.rank(10, 11), Some(0));
        assert_eq!(table.rank(11, 10), None);
    }
}
