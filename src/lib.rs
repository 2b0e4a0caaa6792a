//! Byte-level BPE tokenizer with deterministic training.
//!
//! Training learns an ordered list of pair-merge rules from a corpus by
//! repeatedly replacing the most frequent adjacent token pair inside
//! byte-class segments. Encoding applies the learned rules greedily by
//! rank; decoding concatenates vocabulary byte strings. Models round-trip
//! through a fixed little-endian binary format.
//!
//! ```no_run
//! use bytepair::Tokenizer;
//!
//! let tok = Tokenizer::train(b"low lower lowest", 300, 1);
//! let ids = tok.encode(b"lower");
//! assert_eq!(tok.decode(&ids), b"lower");
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(unused_must_use)]

mod codec;
mod encoder;
mod error;
mod pairmap;
mod segment;
mod tokenizer;
mod trainer;
mod types;

pub use crate::codec::{MODEL_MAGIC, MODEL_VERSION};
pub use crate::error::ModelError;
pub use crate::tokenizer::{MergeRule, Tokenizer};
pub use crate::types::TokenId;
