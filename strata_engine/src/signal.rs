use serde::{Deserialize, Serialize};

/// Shape of a stream. Negotiated once when a sink or source is attached and fixed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalProperties {
    pub sample_rate: u32,
    pub channels: usize,
}

impl SignalProperties {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl Default for SignalProperties {
    fn default() -> Self {
        Self::new(44100, 2)
    }
}
