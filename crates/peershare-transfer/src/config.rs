//! Flow-control settings for the send loop.

use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Chunk size and buffered-byte thresholds for the send loop.
///
/// The loop keeps sending chunks while the channel holds fewer than
/// `high_water_mark` buffered bytes and resumes once it drains to
/// `low_water_mark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum payload bytes per `FileChunk` frame.
    pub chunk_size: usize,

    /// Buffered bytes at which the loop pauses.
    pub high_water_mark: usize,

    /// Buffered bytes at which the channel signals a drain.
    pub low_water_mark: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            high_water_mark: 512 * 1024,
            low_water_mark: 32 * 1024,
        }
    }
}

impl TransferConfig {
    /// Checks the settings and returns them unchanged if usable.
    ///
    /// # Errors
    /// [`TransferError::Config`] if the chunk size is zero or does not fit
    /// a `u32`, or if the low-water mark is not below the high-water mark.
    pub fn validated(self) -> Result<Self, TransferError> {
        if self.chunk_size == 0 {
            return Err(TransferError::Config("chunk_size must be positive".into()));
        }
        if u32::try_from(self.chunk_size).is_err() {
            return Err(TransferError::Config(format!(
                "chunk_size {} does not fit a frame",
                self.chunk_size
            )));
        }
        if self.low_water_mark >= self.high_water_mark {
            return Err(TransferError::Config(format!(
                "low_water_mark {} must be below high_water_mark {}",
                self.low_water_mark, self.high_water_mark
            )));
        }
        Ok(self)
    }
}
