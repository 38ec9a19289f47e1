//! Scratch region for commands that straddle a chunk boundary.
//!
//! When fewer words than [`SCRATCH_CAPACITY`] remain in a chunk and they do
//! not hold a whole command, the words are parked here. On the next chunk
//! the processor stages them in front of the new words so the command can be
//! framed and dispatched from one contiguous slice.

use serde::{Deserialize, Serialize};

use crate::error::{CdoError, Result};

/// Capacity of the scratch region in words.
///
/// Also the largest allowed stitch threshold: at least two words are needed
/// to read a long-form length word.
pub const SCRATCH_CAPACITY: usize = 8;

/// Fixed-capacity scratch region owned by the stream state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchBuffer {
    words: [u32; SCRATCH_CAPACITY],
    len: usize,
}

impl ScratchBuffer {
    /// Create an empty scratch region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `data` in the scratch region, replacing previous content.
    ///
    /// # Errors
    ///
    /// Returns `StitchCopy` if `data` does not fit.
    pub fn stitch(&mut self, data: &[u32]) -> Result<()> {
        if data.len() > SCRATCH_CAPACITY {
            return Err(CdoError::StitchCopy {
                needed: data.len(),
                capacity: SCRATCH_CAPACITY,
            });
        }
        self.words[..data.len()].copy_from_slice(data);
        self.len = data.len();
        Ok(())
    }

    /// Stage the parked words followed by the head of `next` into `out`.
    ///
    /// Clears the scratch region. Returns `(staged, taken)`: the number of
    /// valid words in `out` and how many of them came from `next`.
    pub fn stage(&mut self, next: &[u32], out: &mut [u32; SCRATCH_CAPACITY]) -> (usize, usize) {
        let parked = self.len;
        let taken = (SCRATCH_CAPACITY - parked).min(next.len());
        out[..parked].copy_from_slice(&self.words[..parked]);
        out[parked..parked + taken].copy_from_slice(&next[..taken]);
        self.len = 0;
        (parked + taken, taken)
    }

    /// Number of parked words (the stitched length).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if nothing is parked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The parked words.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    /// Drop parked words.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stitch_and_stage() {
        let mut scratch = ScratchBuffer::new();
        scratch.stitch(&[1, 2, 3]).unwrap();
        assert_eq!(scratch.len(), 3);
        assert_eq!(scratch.words(), &[1, 2, 3]);

        let mut out = [0u32; SCRATCH_CAPACITY];
        let (staged, taken) = scratch.stage(&[4, 5], &mut out);
        assert_eq!((staged, taken), (5, 2));
        assert_eq!(&out[..staged], &[1, 2, 3, 4, 5]);
        assert!(scratch.is_empty());
    }

    #[test]
    fn test_stage_takes_at_most_capacity() {
        let mut scratch = ScratchBuffer::new();
        scratch.stitch(&[9, 9]).unwrap();

        let next: Vec<u32> = (0..100).collect();
        let mut out = [0u32; SCRATCH_CAPACITY];
        let (staged, taken) = scratch.stage(&next, &mut out);
        assert_eq!(staged, SCRATCH_CAPACITY);
        assert_eq!(taken, SCRATCH_CAPACITY - 2);
        assert_eq!(&out[2..], &next[..SCRATCH_CAPACITY - 2]);
    }

    #[test]
    fn test_stitch_overflow_is_error() {
        let mut scratch = ScratchBuffer::new();
        let err = scratch.stitch(&[0u32; SCRATCH_CAPACITY + 1]).unwrap_err();
        assert!(matches!(
            err,
            CdoError::StitchCopy {
                needed: 9,
                capacity: 8
            }
        ));
        assert!(scratch.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut scratch = ScratchBuffer::new();
        scratch.stitch(&[1]).unwrap();
        scratch.clear();
        assert!(scratch.is_empty());
        assert!(scratch.words().is_empty());
    }
}
