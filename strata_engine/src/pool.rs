use log::{trace, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on buffers handed out and not yet released. Unbounded if `None`.
    pub max_buffers: Option<usize>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    #[error("buffer pool exhausted: {limit} buffers already in use")]
    Exhausted {
        limit: usize,
    },
}

/// Recycles sample buffers between the stages of a pipeline.
#[derive(Debug, Default)]
pub struct BufferPool {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    free: Vec<SampleBuffer>,
    outstanding: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config,
            state: Mutex::default(),
        }
    }

    /// Hands out an empty buffer with `channels` channels and room for at least `capacity`
    /// frames, reusing a released buffer when one of the right width is available.
    pub fn acquire(&self, channels: usize, capacity: usize) -> Result<SampleBuffer, PoolError> {
        let mut state = self.state.lock();

        if let Some(limit) = self.config.max_buffers {
            if state.outstanding >= limit {
                warn!("buffer pool exhausted ({limit} outstanding)");
                return Err(PoolError::Exhausted { limit });
            }
        }

        let mut buffer = match state.free.iter().position(|b| b.channels() == channels) {
            Some(i) => state.free.swap_remove(i),
            None => {
                trace!("allocating pool buffer ({channels} x {capacity})");
                SampleBuffer::with_capacity(channels, capacity)
            }
        };

        buffer.clear();
        buffer.reserve(capacity);
        state.outstanding += 1;
        Ok(buffer)
    }

    pub fn release(&self, buffer: SampleBuffer) {
        let mut state = self.state.lock();
        debug_assert!(state.outstanding > 0, "released a buffer that was never acquired");
        state.outstanding = state.outstanding.saturating_sub(1);
        state.free.push(buffer);
    }

    /// Buffers currently acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Released buffers waiting to be reused.
    pub fn idle(&self) -> usize {
        self.state.lock().free.len()
    }
}
