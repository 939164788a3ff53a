use std::ops::Range;

use crate::asset::Asset;
use crate::buffer::SampleBuffer;
use crate::Time;

/// A window into an [`Asset`]. Holds a handle to the asset and never copies its samples.
#[derive(Debug, Clone)]
pub struct Clip {
    asset: Asset,
    start: Time,
    len: usize,
}

impl Clip {
    pub fn new(asset: Asset, start: Time, len: usize) -> Self {
        Self { asset, start, len }
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    pub fn start(&self) -> Time {
        self.start
    }

    /// The length this clip was created with, regardless of how much the asset holds.
    pub fn requested_len(&self) -> usize {
        self.len
    }

    // Resolved against the asset every time, since the asset may still be recording.
    pub fn len(&self) -> usize {
        self.len.min(self.asset.len().saturating_sub(self.start))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies clip frames beginning at `offset` (relative to the clip start) into `into[range]`.
    /// Returns the number of frames copied.
    pub fn read(&self, offset: Time, into: &mut SampleBuffer, range: Range<usize>) -> usize {
        let frames = range.len().min(self.len().saturating_sub(offset));
        self.asset.read(self.start + offset, into, range.start..range.start + frames)
    }
}
