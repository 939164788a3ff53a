//! Timeline composition and fan-out for streamed audio.
//!
//! Recordings are accumulated into [`Asset`]s, referenced by [`Clip`]s, and arranged on a
//! [`Track`], which streams the mixdown in chunks. A [`Repeater`] copies one stream to many
//! independently paced readers.

mod asset;
mod buffer;
mod clip;
mod pool;
mod repeater;
mod signal;
mod stream;
mod track;

pub use asset::{Asset, AssetError, AssetSink};
pub use buffer::SampleBuffer;
pub use clip::Clip;
pub use pool::{BufferPool, PoolConfig, PoolError};
pub use repeater::{Repeater, RepeaterError, RepeaterOutput, RepeaterSink};
pub use signal::SignalProperties;
pub use stream::{Sink, Source};
pub use track::{ClipInstance, Track, TrackError, TrackStream};

pub type Time = usize;  // in frames
