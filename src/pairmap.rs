//! Pair statistics storage: an append-only position pool and an
//! open-addressed pair map.
//!
//! Both training and inference key on packed `(a, b)` pairs. The map never
//! resizes, so entry references stay valid for the duration of a merge
//! step; the pool never frees nodes, so position lists tolerate stale
//! members (they are re-validated when drained).

use crate::types::PairKey;

/// Key value marking an empty map slot.
pub(crate) const EMPTY_KEY: PairKey = u64::MAX;

const HASH_MULT: u64 = 0x9E37_79B9_7F4A_7C15;

/// One node of an intrusive position list.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PoolNode {
    pub pos: i32,
    pub next: i32,
}

/// Arena holding every pair's position list.
///
/// Nodes are appended and never removed or recycled; a pair's list is
/// threaded through the arena by node index, newest first.
#[derive(Debug)]
pub(crate) struct IndexPool {
    nodes: Vec<PoolNode>,
}

impl IndexPool {
    pub(crate) fn with_capacity(reserve: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(reserve),
        }
    }

    /// Prepend `pos` to the list headed by `*head`, updating the head.
    #[inline]
    pub(crate) fn push(&mut self, head: &mut i32, pos: i32) {
        self.nodes.push(PoolNode { pos, next: *head });
        *head = (self.nodes.len() - 1) as i32;
    }

    /// Collect the positions of the list headed by `head`, sorted
    /// ascending with duplicates removed.
    ///
    /// Duplicates arise because positions are pushed once per increment and
    /// never unlinked; callers still have to validate each position against
    /// the live token stream.
    pub(crate) fn drain_positions(&self, head: i32) -> Vec<i32> {
        let mut positions = Vec::new();
        let mut walk = head;
        while walk >= 0 && (walk as usize) < self.nodes.len() {
            let node = self.nodes[walk as usize];
            positions.push(node.pos);
            walk = node.next;
        }
        positions.sort_unstable();
        positions.dedup();
        positions
    }
}

/// A pair map slot.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub key: PairKey,
    pub count: u32,
    pub head: i32,
}

const VACANT: Entry = Entry {
    key: EMPTY_KEY,
    count: 0,
    head: -1,
};

/// Linear-probing hash table from packed pair key to `{count, head}`.
///
/// Capacity is fixed at construction (a power of two) and must be sized so
/// the load factor stays below ~0.5; the table is never grown. Invalidated
/// slots get their key reset to [`EMPTY_KEY`], which also re-opens them to
/// probing.
#[derive(Debug)]
pub(crate) struct PairMap {
    table: Vec<Entry>,
    mask: u32,
}

impl PairMap {
    /// Create a table with the smallest power-of-two slot count `>= min_slots`.
    pub(crate) fn with_min_slots(min_slots: usize) -> Self {
        let slots = min_slots.next_power_of_two().max(1);
        Self {
            table: vec![VACANT; slots],
            mask: (slots - 1) as u32,
        }
    }

    #[inline]
    fn slot_of(&self, key: PairKey) -> usize {
        let mut idx = (key.wrapping_mul(HASH_MULT) & u64::from(self.mask)) as usize;
        loop {
            let slot = &self.table[idx];
            if slot.key == key || slot.key == EMPTY_KEY {
                return idx;
            }
            idx = (idx + 1) & self.mask as usize;
        }
    }

    /// Find the entry for `key`, or the empty slot where it would go.
    #[inline]
    pub(crate) fn entry(&self, key: PairKey) -> &Entry {
        &self.table[self.slot_of(key)]
    }

    /// Mutable variant of [`Self::entry`]. The caller initializes the slot
    /// when it comes back empty.
    #[inline]
    pub(crate) fn entry_mut(&mut self, key: PairKey) -> &mut Entry {
        let idx = self.slot_of(key);
        &mut self.table[idx]
    }

    /// Iterate every slot, occupied or not.
    pub(crate) fn slots(&self) -> impl Iterator<Item = &Entry> {
        self.table.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::pack;

    #[test]
    fn missing_key_resolves_to_empty_slot() {
        let map = PairMap::with_min_slots(16);
        assert_eq!(map.entry(pack(1, 2)).key, EMPTY_KEY);
    }

    #[test]
    fn insert_then_find() {
        let mut map = PairMap::with_min_slots(16);
        let key = pack(97, 98);
        let e = map.entry_mut(key);
        e.key = key;
        e.count = 3;
        assert_eq!(map.entry(key).count, 3);
    }

    #[test]
    fn colliding_keys_keep_distinct_entries() {
        // With 16 slots only the low bits of the mixed hash matter, so
        // plenty of key pairs collide; linear probing must separate them.
        let mut map = PairMap::with_min_slots(16);
        let keys: Vec<u64> = (0..6).map(|i| pack(i, i + 1)).collect();
        for (n, &key) in keys.iter().enumerate() {
            let e = map.entry_mut(key);
            assert_eq!(e.key, EMPTY_KEY);
            e.key = key;
            e.count = n as u32;
        }
        for (n, &key) in keys.iter().enumerate() {
            assert_eq!(map.entry(key).count, n as u32);
        }
    }

    #[test]
    fn invalidated_slot_reads_as_empty() {
        let mut map = PairMap::with_min_slots(16);
        let key = pack(5, 6);
        let e = map.entry_mut(key);
        e.key = key;
        e.count = 9;
        let e = map.entry_mut(key);
        *e = Entry {
            key: EMPTY_KEY,
            count: 0,
            head: -1,
        };
        assert_eq!(map.entry(key).key, EMPTY_KEY);
    }

    #[test]
    fn pool_lists_are_newest_first_and_drain_sorted() {
        let mut pool = IndexPool::with_capacity(4);
        let mut head = -1;
        pool.push(&mut head, 7);
        pool.push(&mut head, 2);
        pool.push(&mut head, 7);
        assert_eq!(pool.drain_positions(head), vec![2, 7]);
    }

    #[test]
    fn two_heads_share_one_pool() {
        let mut pool = IndexPool::with_capacity(4);
        let (mut h1, mut h2) = (-1, -1);
        pool.push(&mut h1, 1);
        pool.push(&mut h2, 9);
        pool.push(&mut h1, 3);
        assert_eq!(pool.drain_positions(h1), vec![1, 3]);
        assert_eq!(pool.drain_positions(h2), vec![9]);
    }
}
