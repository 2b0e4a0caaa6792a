//! The tokenizer facade: learned state plus the full pipeline.
//!
//! A [`Tokenizer`] owns the vocabulary, the ordered merge rules, and the
//! derived rank table. Encoding is segmentation followed by greedy
//! lowest-rank merging per segment; decoding is vocabulary concatenation.
//! Batch variants fan the per-call pipeline out over Rayon workers; each
//! individual call stays single-threaded and owns all of its state.

use std::path::Path;

use rayon::prelude::*;

use crate::codec;
use crate::encoder::RankTable;
use crate::error::ModelError;
use crate::segment::split_bytes;
use crate::trainer;
use crate::types::TokenId;

/// One learned merge: the pair `(a, b)` becomes `new_id`.
///
/// The rule's index in the rule list is its rank; lower rank means the
/// rule was learned earlier and is applied with higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    pub a: TokenId,
    pub b: TokenId,
    pub new_id: TokenId,
}

/// A trained byte-level BPE tokenizer.
pub struct Tokenizer {
    vocab: Vec<Vec<u8>>,
    merges: Vec<MergeRule>,
    ranks: RankTable,
}

impl Tokenizer {
    /// Learn a tokenizer from a corpus.
    ///
    /// Merges are learned until the vocabulary reaches `target_vocab` or
    /// no remaining pair occurs at least `min_freq` times. Identical
    /// inputs always yield an identical tokenizer.
    pub fn train(text: &[u8], target_vocab: u32, min_freq: u32) -> Self {
        let (vocab, merges) = trainer::learn(text, target_vocab, min_freq);
        Self::from_parts(vocab, merges)
    }

    /// Assemble a tokenizer from already-learned state, building the rank
    /// table eagerly so the result can encode immediately.
    pub fn from_parts(vocab: Vec<Vec<u8>>, merges: Vec<MergeRule>) -> Self {
        let ranks = RankTable::build(&merges);
        Self {
            vocab,
            merges,
            ranks,
        }
    }

    /// Read a model file written by [`Self::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let (vocab, merges) = codec::load(path.as_ref())?;
        Ok(Self::from_parts(vocab, merges))
    }

    /// Write the model to disk in the fixed binary layout.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        codec::save(path.as_ref(), &self.vocab, &self.merges)
    }

    /// Encode bytes to token ids.
    ///
    /// The input is segmented exactly as during training, and each segment
    /// is reduced independently; concatenating the per-segment ids in
    /// input order gives the result. Empty input encodes to an empty list.
    pub fn encode(&self, text: &[u8]) -> Vec<TokenId> {
        let (ids, next) = split_bytes(text);

        let mut result = Vec::with_capacity(ids.len());
        let mut piece: Vec<TokenId> = Vec::with_capacity(32);

        for (i, &id) in ids.iter().enumerate() {
            piece.push(id);
            if next[i] == -1 {
                self.ranks.encode_piece(&self.merges, &mut piece);
                result.extend_from_slice(&piece);
                piece.clear();
            }
        }

        result
    }

    /// Encode many inputs in parallel, preserving input order.
    pub fn encode_batch(&self, texts: &[&[u8]]) -> Vec<Vec<TokenId>> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Decode token ids back to bytes.
    ///
    /// Ids outside the vocabulary are skipped; debug builds assert on them
    /// instead.
    pub fn decode(&self, ids: &[TokenId]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            debug_assert!(
                (id as usize) < self.vocab.len(),
                "token id {id} outside vocabulary"
            );
            if let Some(bytes) = self.vocab.get(id as usize) {
                out.extend_from_slice(bytes);
            }
        }
        out
    }

    /// Decode many id sequences in parallel, preserving input order.
    pub fn decode_batch(&self, id_seqs: &[&[TokenId]]) -> Vec<Vec<u8>> {
        id_seqs.par_iter().map(|ids| self.decode(ids)).collect()
    }

    /// Number of tokens in the vocabulary, byte literals included.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Number of learned merge rules.
    pub fn merge_count(&self) -> usize {
        self.merges.len()
    }

    /// The byte string for each token id.
    pub fn vocab(&self) -> &[Vec<u8>] {
        &self.vocab
    }

    /// The learned rules in rank order.
    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }
}
