use crate::buffer::SampleBuffer;

/// Consumes a stream one chunk at a time. Called by the upstream stage once per chunk.
pub trait Sink {
    type Error;

    fn sink(&mut self, chunk: &SampleBuffer) -> Result<(), Self::Error>;

    /// Called once after the last chunk.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Produces a stream on demand.
pub trait Source {
    type Error;

    /// Returns the next chunk of at most `frames` frames, or `None` once the stream has ended.
    fn pull(&mut self, frames: usize) -> Result<Option<SampleBuffer>, Self::Error>;

    /// Pulls chunks of `frames` frames until the stream ends and concatenates them.
    fn read_to_end(&mut self, channels: usize, frames: usize) -> Result<SampleBuffer, Self::Error> {
        let frames = frames.max(1);
        let mut out = SampleBuffer::new(channels);
        while let Some(chunk) = self.pull(frames)? {
            out.extend_from(&chunk);
        }

        Ok(out)
    }
}
