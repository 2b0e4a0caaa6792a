use thiserror::Error;

use crate::codec::{MODEL_MAGIC, MODEL_VERSION};

/// Errors produced while reading or writing a model file.
///
/// Training itself has no user-visible error surface; allocation failure
/// aborts the process. Everything here comes from the codec path.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The file could not be opened, read, or written completely.
    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The leading magic bytes do not match the model format.
    #[error("bad magic {found:#010x}, expected {expected:#010x}", expected = MODEL_MAGIC)]
    BadMagic { found: u32 },

    /// The version field is not one this build understands.
    #[error("unsupported model version {found}, expected {expected}", expected = MODEL_VERSION)]
    UnsupportedVersion { found: u32 },

    /// A size field exceeds the hard bounds, or the file ends before the
    /// content it declares.
    #[error("corrupted model file: {reason}")]
    Corrupted { reason: &'static str },
}
