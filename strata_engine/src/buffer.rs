use std::collections::TryReserveError;
use std::ops::Range;

/// A block of non-interleaved, multichannel f32 audio. Every channel holds the same number of
/// frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    data: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// An empty buffer with `channels` channels and no frames.
    pub fn new(channels: usize) -> Self {
        Self::with_capacity(channels, 0)
    }

    pub fn with_capacity(channels: usize, capacity: usize) -> Self {
        Self {
            data: (0..channels).map(|_| Vec::with_capacity(capacity)).collect(),
        }
    }

    pub fn silence(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![vec![0.0; frames]; channels],
        }
    }

    pub fn from_channels(data: Vec<Vec<f32>>) -> Self {
        debug_assert!(data.windows(2).all(|w| w[0].len() == w[1].len()), "ragged channels");
        Self { data }
    }

    pub fn channels(&self) -> usize {
        self.data.len()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.iter().map(Vec::capacity).min().unwrap_or(0)
    }

    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.data[channel]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.data[channel]
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(Vec::clear);
    }

    pub fn fill(&mut self, value: f32) {
        self.data.iter_mut().for_each(|c| c.fill(value));
    }

    pub fn reserve(&mut self, additional: usize) {
        self.data.iter_mut().for_each(|c| c.reserve(additional));
    }

    /// Reserves room for `additional` frames on every channel, or fails without changing the
    /// number of frames.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        for channel in &mut self.data {
            channel.try_reserve(additional)?;
        }

        Ok(())
    }

    /// Appends all frames of `other`.
    pub fn extend_from(&mut self, other: &SampleBuffer) {
        self.extend_from_range(other, 0..other.len());
    }

    pub fn extend_from_range(&mut self, other: &SampleBuffer, range: Range<usize>) {
        debug_assert_eq!(self.channels(), other.channels());
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            dst.extend_from_slice(&src[range.clone()]);
        }
    }

    /// Overwrites frames starting at `at` with `src[range]`. Both buffers must be long enough.
    pub fn copy_from(&mut self, at: usize, src: &SampleBuffer, range: Range<usize>) {
        debug_assert_eq!(self.channels(), src.channels());
        let frames = range.len();
        for (dst, src) in self.data.iter_mut().zip(&src.data) {
            dst[at..at + frames].copy_from_slice(&src[range.clone()]);
        }
    }

    /// Makes this buffer an exact copy of `other`, reusing existing allocations.
    pub fn assign(&mut self, other: &SampleBuffer) {
        self.data.resize_with(other.channels(), Vec::new);
        for (dst, src) in self.data.iter_mut().zip(&other.data) {
            dst.clear();
            dst.extend_from_slice(src);
        }
    }
}
