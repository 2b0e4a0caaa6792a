//! Binary model file reader and writer.
//!
//! Layout, little-endian, tightly packed, no trailer:
//!
//! ```text
//! [magic: u32][version: u32][vocab_size: u32][merge_count: u32]
//! [{a: u32, b: u32, new_id: u32} x merge_count]
//! [{len: u32, bytes: u8 x len} x vocab_size]
//! ```
//!
//! Loading verifies magic and version exactly, bounds-checks the declared
//! sizes before allocating, and treats any early end of file as corruption.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ModelError;
use crate::tokenizer::MergeRule;

pub const MODEL_MAGIC: u32 = 0x4250_4521;
pub const MODEL_VERSION: u32 = 1;

/// Hard upper bounds on declared sizes; anything above is rejected as
/// corrupted rather than allocated.
const MAX_VOCAB: u32 = 1_000_000;
const MAX_MERGES: u32 = 1_000_000;
const MAX_TOKEN_LEN: u32 = 1000;

/// Write a model snapshot to `path`.
pub(crate) fn save(path: &Path, vocab: &[Vec<u8>], merges: &[MergeRule]) -> Result<(), ModelError> {
    let mut out = BufWriter::new(File::create(path)?);

    out.write_all(&MODEL_MAGIC.to_le_bytes())?;
    out.write_all(&MODEL_VERSION.to_le_bytes())?;
    out.write_all(&(vocab.len() as u32).to_le_bytes())?;
    out.write_all(&(merges.len() as u32).to_le_bytes())?;

    for rule in merges {
        out.write_all(&rule.a.to_le_bytes())?;
        out.write_all(&rule.b.to_le_bytes())?;
        out.write_all(&rule.new_id.to_le_bytes())?;
    }

    for token in vocab {
        out.write_all(&(token.len() as u32).to_le_bytes())?;
        out.write_all(token)?;
    }

    out.flush()?;
    Ok(())
}

/// Read a model snapshot from `path`.
pub(crate) fn load(path: &Path) -> Result<(Vec<Vec<u8>>, Vec<MergeRule>), ModelError> {
    let data = fs::read(path)?;
    let mut reader = SliceReader { data: &data, off: 0 };

    let magic = reader.read_u32()?;
    if magic != MODEL_MAGIC {
        return Err(ModelError::BadMagic { found: magic });
    }
    let version = reader.read_u32()?;
    if version != MODEL_VERSION {
        return Err(ModelError::UnsupportedVersion { found: version });
    }

    let vocab_size = reader.read_u32()?;
    let merge_count = reader.read_u32()?;
    if vocab_size > MAX_VOCAB {
        return Err(ModelError::Corrupted {
            reason: "vocabulary size exceeds hard bound",
        });
    }
    if merge_count > MAX_MERGES {
        return Err(ModelError::Corrupted {
            reason: "merge count exceeds hard bound",
        });
    }

    let mut merges = Vec::with_capacity(merge_count as usize);
    for _ in 0..merge_count {
        let a = reader.read_u32()?;
        let b = reader.read_u32()?;
        let new_id = reader.read_u32()?;
        merges.push(MergeRule { a, b, new_id });
    }

    let mut vocab = Vec::with_capacity(vocab_size as usize);
    for _ in 0..vocab_size {
        let len = reader.read_u32()?;
        if len > MAX_TOKEN_LEN {
            return Err(ModelError::Corrupted {
                reason: "token length exceeds hard bound",
            });
        }
        vocab.push(reader.read_bytes(len as usize)?.to_vec());
    }

    Ok((vocab, merges))
}

/// Cursor over the in-memory file image; running out of bytes means the
/// file ended before its declared content.
struct SliceReader<'a> {
    data: &'a [u8],
    off: usize,
}

impl<'a> SliceReader<'a> {
    fn read_u32(&mut self) -> Result<u32, ModelError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ModelError> {
        let end = self.off.checked_add(len).filter(|&end| end <= self.data.len());
        let Some(end) = end else {
            return Err(ModelError::Corrupted {
                reason: "file ends before declared content",
            });
        };
        let slice = &self.data[self.off..end];
        self.off = end;
        Ok(slice)
    }
}
