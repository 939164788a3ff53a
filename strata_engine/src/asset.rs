use std::collections::TryReserveError;
use std::ops::Range;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::buffer::SampleBuffer;
use crate::clip::Clip;
use crate::signal::SignalProperties;
use crate::stream::Sink;
use crate::Time;

/// An append-only recording. Cloning an Asset clones the handle, not the samples; every clone
/// and every [`Clip`] made from it share the same store.
#[derive(Debug, Clone, Default)]
pub struct Asset {
    inner: Arc<RwLock<AssetState>>,
}

#[derive(Debug, Default)]
struct AssetState {
    properties: Option<SignalProperties>,
    data: SampleBuffer,
}

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("channel count mismatch: asset has {expected}, got {actual}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("sample rate mismatch: asset has {expected}, got {actual}")]
    SampleRateMismatch {
        expected: u32,
        actual: u32,
    },

    #[error("failed to grow sample store: {source}")]
    StoreGrowth {
        #[from]
        source: TryReserveError,
    },
}

impl Asset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps already recorded samples.
    pub fn from_buffer(sample_rate: u32, data: SampleBuffer) -> Self {
        let properties = SignalProperties::new(sample_rate, data.channels());
        Self {
            inner: Arc::new(RwLock::new(AssetState {
                properties: Some(properties),
                data,
            })),
        }
    }

    /// Attaches a writer. The first call fixes the asset's shape; later calls must match it.
    pub fn sink(&self, properties: SignalProperties) -> Result<AssetSink, AssetError> {
        let mut state = self.inner.write();

        match state.properties {
            None => {
                debug!("asset configured: {} channels at {} Hz", properties.channels, properties.sample_rate);
                state.properties = Some(properties);
                state.data = SampleBuffer::new(properties.channels);
            }
            Some(current) if current.channels != properties.channels => {
                return Err(AssetError::ShapeMismatch {
                    expected: current.channels,
                    actual: properties.channels,
                });
            }
            Some(current) if current.sample_rate != properties.sample_rate => {
                return Err(AssetError::SampleRateMismatch {
                    expected: current.sample_rate,
                    actual: properties.sample_rate,
                });
            }
            Some(_) => {}
        }

        Ok(AssetSink {
            asset: self.clone(),
            channels: properties.channels,
        })
    }

    pub fn properties(&self) -> Option<SignalProperties> {
        self.inner.read().properties
    }

    /// 0 until the asset has been configured.
    pub fn channels(&self) -> usize {
        self.properties().map_or(0, |p| p.channels)
    }

    /// 0 until the asset has been configured.
    pub fn sample_rate(&self) -> u32 {
        self.properties().map_or(0, |p| p.sample_rate)
    }

    /// Number of frames recorded so far.
    pub fn len(&self) -> usize {
        self.inner.read().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clip(&self, start: Time, len: usize) -> Clip {
        Clip::new(self.clone(), start, len)
    }

    /// Copies recorded frames beginning at `start` into `into[range]`. Returns the number of
    /// frames copied, which is less than `range.len()` if the recording is shorter.
    pub fn read(&self, start: Time, into: &mut SampleBuffer, range: Range<usize>) -> usize {
        let state = self.inner.read();
        let available = state.data.len().saturating_sub(start);
        let frames = range.len().min(available);

        if frames > 0 {
            into.copy_from(range.start, &state.data, start..start + frames);
        }

        frames
    }

    /// Copies of every recorded sample.
    pub fn to_buffer(&self) -> SampleBuffer {
        self.inner.read().data.clone()
    }

    fn append(&self, chunk: &SampleBuffer) -> Result<(), AssetError> {
        let mut state = self.inner.write();
        state.data.try_reserve(chunk.len())?;
        state.data.extend_from(chunk);
        Ok(())
    }
}

/// Writes streamed chunks to the end of an [`Asset`].
#[derive(Debug)]
pub struct AssetSink {
    asset: Asset,
    channels: usize,
}

impl Sink for AssetSink {
    type Error = AssetError;

    fn sink(&mut self, chunk: &SampleBuffer) -> Result<(), AssetError> {
        if chunk.channels() != self.channels {
            return Err(AssetError::ShapeMismatch {
                expected: self.channels,
                actual: chunk.channels(),
            });
        }

        self.asset.append(chunk)
    }
}
