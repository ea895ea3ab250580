//! Array store.
//!
//! Persists assembled arrays in NumPy `.npy` format under names derived
//! from the input file and the output kind.

pub mod npy;
mod writer;

pub use npy::{Dtype, NpyHeader};
pub use writer::{ArrayWriter, WrittenFile};

use std::path::PathBuf;

/// Array store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An output file could not be written or renamed into place.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Final path of the output file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A `.npy` header could not be parsed.
    #[error("invalid .npy file: {0}")]
    Format(String),

    /// A `.npy` file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
