use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::buffer::SampleBuffer;
use crate::pool::{BufferPool, PoolError};
use crate::signal::SignalProperties;
use crate::stream::{Sink, Source};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RepeaterError {
    #[error("repeater input is already attached")]
    AlreadyAttached,

    #[error("channel count mismatch: repeater has {expected}, got {actual}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
    },

    #[error("chunk of {frames} frames exceeds the negotiated chunk size of {chunk_size}")]
    ChunkTooLarge {
        chunk_size: usize,
        frames: usize,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// A published chunk, shared by every output it was sent to.
struct Envelope {
    buffer: Mutex<Option<SampleBuffer>>,
    pending: AtomicUsize,
    pool: Arc<BufferPool>,
}

impl Envelope {
    fn copy_into(&self, out: &mut SampleBuffer) {
        if let Some(buffer) = self.buffer.lock().as_ref() {
            out.assign(buffer);
        }
    }

    /// Marks one reader as finished. The last one returns the buffer to the pool.
    fn done(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(buffer) = self.buffer.lock().take() {
                self.pool.release(buffer);
            }
        }
    }
}

impl Drop for Envelope {
    // Envelopes still queued to an output that went away never see their last `done`.
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.get_mut().take() {
            self.pool.release(buffer);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Attachment {
    properties: SignalProperties,
    chunk_size: usize,
}

#[derive(Default)]
struct Shared {
    attachment: Option<Attachment>,
    outputs: Vec<Sender<Arc<Envelope>>>,
    closed: bool,
}

/// Feeds one input stream to any number of outputs. Each output has room for a single chunk, so
/// publishing runs at the pace of the slowest output.
#[derive(Clone)]
pub struct Repeater {
    pool: Arc<BufferPool>,
    shared: Arc<Mutex<Shared>>,
}

impl Repeater {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self {
            pool,
            shared: Arc::default(),
        }
    }

    /// Attaches the input. Must be called once per repeater.
    pub fn sink(&self, properties: SignalProperties, chunk_size: usize) -> Result<RepeaterSink, RepeaterError> {
        let mut shared = self.shared.lock();
        if shared.attachment.is_some() {
            return Err(RepeaterError::AlreadyAttached);
        }

        debug!("repeater attached: {} channels at {} Hz, chunks of {chunk_size}",
               properties.channels, properties.sample_rate);
        let attachment = Attachment { properties, chunk_size };
        shared.attachment = Some(attachment);

        Ok(RepeaterSink {
            pool: self.pool.clone(),
            shared: self.shared.clone(),
            attachment,
        })
    }

    /// Registers a new output. It receives every chunk published from now on; nothing published
    /// earlier is replayed.
    pub fn add_output(&self) -> RepeaterOutput {
        let (tx, rx) = crossbeam_channel::bounded(1);

        let mut shared = self.shared.lock();
        if shared.closed {
            debug!("output added to a closed repeater");
        } else {
            shared.outputs.push(tx);
            debug!("repeater output added ({} total)", shared.outputs.len());
        }

        let channels = shared.attachment.map_or(0, |a| a.properties.channels);
        RepeaterOutput {
            rx,
            shared: self.shared.clone(),
            current: SampleBuffer::new(channels),
            offset: 0,
        }
    }

    pub fn outputs(&self) -> usize {
        self.shared.lock().outputs.len()
    }

    pub fn properties(&self) -> Option<SignalProperties> {
        self.shared.lock().attachment.map(|a| a.properties)
    }
}

/// Input side of a [`Repeater`]. Dropping it closes every output.
pub struct RepeaterSink {
    pool: Arc<BufferPool>,
    shared: Arc<Mutex<Shared>>,
    attachment: Attachment,
}

impl RepeaterSink {
    fn close(&self) {
        let mut shared = self.shared.lock();
        if !shared.closed {
            debug!("repeater closing {} outputs", shared.outputs.len());
            shared.closed = true;
            shared.outputs.clear();
        }
    }
}

impl Sink for RepeaterSink {
    type Error = RepeaterError;

    fn sink(&mut self, chunk: &SampleBuffer) -> Result<(), RepeaterError> {
        let Attachment { properties, chunk_size } = self.attachment;
        if chunk.channels() != properties.channels {
            return Err(RepeaterError::ShapeMismatch {
                expected: properties.channels,
                actual: chunk.channels(),
            });
        }
        if chunk.len() > chunk_size {
            return Err(RepeaterError::ChunkTooLarge {
                chunk_size,
                frames: chunk.len(),
            });
        }
        if chunk.is_empty() {
            return Ok(());
        }

        // Sending blocks, so work on a copy of the registry and leave it unlocked.
        let outputs = self.shared.lock().outputs.clone();
        if outputs.is_empty() {
            trace!("no outputs, chunk not published");
            return Ok(());
        }

        let mut buffer = self.pool.acquire(properties.channels, chunk_size)?;
        buffer.extend_from(chunk);
        let envelope = Arc::new(Envelope {
            buffer: Mutex::new(Some(buffer)),
            pending: AtomicUsize::new(outputs.len()),
            pool: self.pool.clone(),
        });

        let mut gone = Vec::new();
        for output in outputs {
            if output.send(envelope.clone()).is_err() {
                envelope.done();
                gone.push(output);
            }
        }

        if !gone.is_empty() {
            let mut shared = self.shared.lock();
            shared.outputs.retain(|o| !gone.iter().any(|g| g.same_channel(o)));
            debug!("dropped {} disconnected outputs", gone.len());
        }

        trace!("published chunk of {} frames", chunk.len());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RepeaterError> {
        self.close();
        Ok(())
    }
}

impl Drop for RepeaterSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// One output of a [`Repeater`].
pub struct RepeaterOutput {
    rx: Receiver<Arc<Envelope>>,
    shared: Arc<Mutex<Shared>>,
    current: SampleBuffer,
    offset: usize,
}

impl RepeaterOutput {
    /// Known once the repeater input has been attached.
    pub fn properties(&self) -> Option<SignalProperties> {
        self.shared.lock().attachment.map(|a| a.properties)
    }

    /// Waits for the next non-empty chunk. Returns false once the repeater has closed.
    fn receive(&mut self) -> bool {
        while self.offset >= self.current.len() {
            let Ok(envelope) = self.rx.recv() else {
                return false;
            };

            envelope.copy_into(&mut self.current);
            envelope.done();
            self.offset = 0;
        }

        true
    }
}

impl Source for RepeaterOutput {
    type Error = RepeaterError;

    fn pull(&mut self, frames: usize) -> Result<Option<SampleBuffer>, RepeaterError> {
        if frames == 0 {
            return Ok(Some(SampleBuffer::new(self.current.channels())));
        }
        if !self.receive() {
            trace!("repeater output reached end of stream");
            return Ok(None);
        }

        let frames = frames.min(self.current.len() - self.offset);
        let mut out = SampleBuffer::with_capacity(self.current.channels(), frames);
        out.extend_from_range(&self.current, self.offset..self.offset + frames);
        self.offset += frames;
        Ok(Some(out))
    }
}
