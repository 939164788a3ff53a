use log::trace;

use crate::buffer::SampleBuffer;
use crate::clip::Clip;
use crate::signal::SignalProperties;
use crate::stream::Source;
use crate::Time;

/// A clip placed on a track.
#[derive(Debug, Clone)]
pub struct ClipInstance {
    position: Time,
    clip: Clip,
    seq: usize,
}

impl ClipInstance {
    pub fn position(&self) -> Time {
        self.position
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    pub fn end(&self) -> Time {
        self.position + self.clip.len()
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TrackError {
    #[error("channel count mismatch: track has {expected}, clip asset has {actual}")]
    ShapeMismatch {
        expected: usize,
        actual: usize,
    },
}

/// A timeline of clips. Where clips overlap, the one added last is heard.
#[derive(Debug, Clone)]
pub struct Track {
    properties: SignalProperties,
    clips: Vec<ClipInstance>,
}

/// The part of a clip instance that falls inside the window being rendered.
struct Span<'a> {
    start: Time,
    end: Time,
    instance: &'a ClipInstance,
}

impl Track {
    pub fn new(sample_rate: u32, channels: usize) -> Track {
        Track {
            properties: SignalProperties::new(sample_rate, channels),
            clips: Vec::new(),
        }
    }

    pub fn properties(&self) -> SignalProperties {
        self.properties
    }

    pub fn add_clip(&mut self, position: Time, clip: Clip) -> Result<&ClipInstance, TrackError> {
        // Assets that haven't been recorded into yet have no shape and are accepted.
        let actual = clip.asset().channels();
        if actual != 0 && actual != self.properties.channels {
            return Err(TrackError::ShapeMismatch {
                expected: self.properties.channels,
                actual,
            });
        }

        let seq = self.clips.len();
        self.clips.push(ClipInstance { position, clip, seq });
        Ok(&self.clips[seq])
    }

    /// Clip instances in the order they were added.
    pub fn iter_clips(&self) -> impl Iterator<Item = &ClipInstance> + '_ {
        self.clips.iter()
    }

    /// End of the rightmost non-empty clip.
    pub fn len(&self) -> usize {
        self.clips.iter()
            .filter(|c| !c.clip.is_empty())
            .map(ClipInstance::end)
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stream(&self) -> TrackStream {
        TrackStream {
            track: self.clone(),
            cursor: 0,
        }
    }

    pub fn render_all(&self) -> Result<SampleBuffer, TrackError> {
        let mut buf = SampleBuffer::silence(self.properties.channels, self.len());
        self.render(0, &mut buf)?;
        Ok(buf)
    }

    /// Renders `into.len()` frames starting at `start_time`.
    pub fn render(&self, start_time: Time, into: &mut SampleBuffer) -> Result<(), TrackError> {
        debug_assert_eq!(into.channels(), self.properties.channels);
        into.fill(0.0);

        let end_time = start_time + into.len();
        let spans = self.spans(start_time, end_time)?;
        if spans.is_empty() {
            return Ok(());
        }

        let mut bounds: Vec<Time> = spans.iter().flat_map(|s| [s.start, s.end]).collect();
        bounds.sort_unstable();
        bounds.dedup();

        // No span starts or ends strictly inside a segment, so one clip wins the whole segment.
        for segment in bounds.windows(2) {
            let (from, to) = (segment[0], segment[1]);
            let winner = spans.iter()
                .filter(|s| s.start <= from && from < s.end)
                .max_by_key(|s| s.instance.seq);

            if let Some(span) = winner {
                let instance = span.instance;
                instance.clip.read(from - instance.position, into, from - start_time..to - start_time);
            }
        }

        Ok(())
    }

    fn spans(&self, start_time: Time, end_time: Time) -> Result<Vec<Span<'_>>, TrackError> {
        let mut spans = Vec::new();

        for instance in &self.clips {
            let len = instance.clip.len();
            if len == 0 || instance.position >= end_time || instance.position + len <= start_time {
                continue;
            }

            let actual = instance.clip.asset().channels();
            if actual != self.properties.channels {
                return Err(TrackError::ShapeMismatch {
                    expected: self.properties.channels,
                    actual,
                });
            }

            spans.push(Span {
                start: instance.position.max(start_time),
                end: (instance.position + len).min(end_time),
                instance,
            });
        }

        Ok(spans)
    }
}

/// Single-pass reader over a snapshot of a [`Track`] taken when the stream was started.
#[derive(Debug)]
pub struct TrackStream {
    track: Track,
    cursor: Time,
}

impl TrackStream {
    pub fn properties(&self) -> SignalProperties {
        self.track.properties
    }

    /// Frames delivered so far.
    pub fn position(&self) -> Time {
        self.cursor
    }
}

impl Source for TrackStream {
    type Error = TrackError;

    fn pull(&mut self, frames: usize) -> Result<Option<SampleBuffer>, TrackError> {
        let len = self.track.len();
        if self.cursor >= len {
            trace!("track stream ended at {}", self.cursor);
            return Ok(None);
        }

        let frames = frames.min(len - self.cursor);
        let mut buf = SampleBuffer::silence(self.track.properties.channels, frames);
        self.track.render(self.cursor, &mut buf)?;
        self.cursor += frames;
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::asset::Asset;

    fn mono(data: &[f32]) -> Asset {
        Asset::from_buffer(44100, SampleBuffer::from_channels(vec![data.to_vec()]))
    }

    fn ramp(from: usize) -> Asset {
        mono(&(from..from + 10).map(|v| v as f32).collect::<Vec<_>>())
    }

    fn stream_all(track: &Track, buffer_size: usize) -> Vec<f32> {
        let result = track.stream().read_to_end(track.properties().channels, buffer_size).unwrap();
        result.channel(0).to_vec()
    }

    #[test]
    fn test_add_clip() {
        let asset = ramp(10);
        let mut track = Track::new(44100, 1);
        let added = track.add_clip(4, asset.clip(2, 3)).unwrap();
        assert_eq!(added.position(), 4);
        assert_eq!(added.end(), 7);
        assert_eq!(track.iter_clips().count(), 1);
    }

    #[test]
    fn test_add_clip_shape_mismatch() {
        let stereo = Asset::from_buffer(44100, SampleBuffer::silence(2, 4));
        let mut track = Track::new(44100, 1);
        let err = track.add_clip(0, stereo.clip(0, 4)).unwrap_err();
        assert_eq!(err, TrackError::ShapeMismatch { expected: 1, actual: 2 });
        assert_eq!(track.iter_clips().count(), 0);
    }

    #[test]
    fn test_render_overlapping() {
        let mut track = Track::new(44100, 1);
        track.add_clip(0, mono(&[1.0; 5]).clip(0, 5)).unwrap();
        track.add_clip(2, mono(&[2.0; 5]).clip(0, 5)).unwrap();
        let mut buf = SampleBuffer::silence(1, 8);
        track.render(0, &mut buf).unwrap();
        assert_eq!(buf.channel(0), [1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_render_non_overlapping() {
        let mut track = Track::new(44100, 1);
        track.add_clip(1, mono(&[1.0; 2]).clip(0, 2)).unwrap();
        track.add_clip(4, mono(&[2.0; 2]).clip(0, 2)).unwrap();
        let mut buf = SampleBuffer::silence(1, 7);
        track.render(0, &mut buf).unwrap();
        assert_eq!(buf.channel(0), [0.0, 1.0, 1.0, 0.0, 2.0, 2.0, 0.0]);
    }

    #[test]
    fn test_render_overlapping_cut() {
        let mut track = Track::new(44100, 1);
        track.add_clip(0, mono(&[1.0; 5]).clip(0, 5)).unwrap();
        track.add_clip(2, mono(&[2.0; 1]).clip(0, 1)).unwrap();
        let mut buf = SampleBuffer::silence(1, 5);
        track.render(0, &mut buf).unwrap();
        // The earlier clip resumes once the later one ends.
        assert_eq!(buf.channel(0), [1.0, 1.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_render_offset_window() {
        let mut track = Track::new(44100, 1);
        track.add_clip(2, ramp(10).clip(0, 6)).unwrap();
        let mut buf = SampleBuffer::silence(1, 3);
        track.render(4, &mut buf).unwrap();
        assert_eq!(buf.channel(0), [12.0, 13.0, 14.0]);
    }

    #[test]
    fn test_arrangements() {
        let (a1, a2) = (ramp(10), ramp(20));
        let empty = Asset::new();

        let tests: Vec<(Vec<(Time, Clip)>, Vec<f32>, &str)> = vec![
            (vec![(3, a1.clip(3, 1)), (4, a2.clip(5, 3))],
             vec![0.0, 0.0, 0.0, 13.0, 25.0, 26.0, 27.0], "sequence"),
            (vec![(2, a1.clip(3, 1)), (3, a2.clip(5, 3))],
             vec![0.0, 0.0, 13.0, 25.0, 26.0, 27.0], "sequence shifted left"),
            (vec![(2, a1.clip(3, 1)), (4, a2.clip(5, 3))],
             vec![0.0, 0.0, 13.0, 0.0, 25.0, 26.0, 27.0], "sequence with interval"),
            (vec![(3, a1.clip(3, 3)), (2, a2.clip(5, 2))],
             vec![0.0, 0.0, 25.0, 26.0, 14.0, 15.0], "overlap previous"),
            (vec![(2, a1.clip(3, 3)), (4, a2.clip(5, 2))],
             vec![0.0, 0.0, 13.0, 14.0, 25.0, 26.0], "overlap next"),
            (vec![(2, a1.clip(3, 5)), (4, a2.clip(5, 2))],
             vec![0.0, 0.0, 13.0, 14.0, 25.0, 26.0, 17.0], "overlap single in the middle"),
            (vec![(2, a1.clip(3, 2)), (5, a1.clip(3, 2)), (4, a2.clip(5, 2))],
             vec![0.0, 0.0, 13.0, 14.0, 25.0, 26.0, 14.0], "overlap two in the middle"),
            (vec![(2, a1.clip(3, 2)), (5, a1.clip(5, 2)), (3, a2.clip(3, 2))],
             vec![0.0, 0.0, 13.0, 23.0, 24.0, 15.0, 16.0], "overlap two in the middle shifted"),
            (vec![(2, a2.clip(3, 2)), (2, a2.clip(3, 5))],
             vec![0.0, 0.0, 23.0, 24.0, 25.0, 26.0, 27.0], "overlap single completely"),
            (vec![(2, a1.clip(3, 2)), (5, a1.clip(5, 2)), (1, a2.clip(1, 8))],
             vec![0.0, 21.0, 22.0, 23.0, 24.0, 25.0, 26.0, 27.0, 28.0], "overlap two completely"),
            (vec![], vec![], "empty"),
            (vec![(2, empty.clip(3, 2)), (5, empty.clip(5, 2)), (1, empty.clip(1, 8))],
             vec![], "empty asset clips"),
        ];

        for (clips, expected, msg) in tests {
            let mut track = Track::new(44100, 1);
            for (position, clip) in clips {
                track.add_clip(position, clip).unwrap();
            }

            for buffer_size in [1, 2, 3, 64] {
                assert_eq!(stream_all(&track, buffer_size), expected, "{msg} (buffer size {buffer_size})");
            }
        }
    }

    #[test]
    fn test_stream_empty_track() {
        let track = Track::new(44100, 2);
        let mut stream = track.stream();
        assert_eq!(stream.pull(16).unwrap(), None);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_stream_chunks() {
        let mut track = Track::new(44100, 1);
        track.add_clip(1, ramp(10).clip(0, 4)).unwrap();
        let mut stream = track.stream();
        assert_eq!(stream.pull(3).unwrap().unwrap().channel(0), [0.0, 10.0, 11.0]);
        assert_eq!(stream.pull(3).unwrap().unwrap().channel(0), [12.0, 13.0]);
        assert_eq!(stream.pull(3).unwrap(), None);
        assert_eq!(stream.position(), 5);
    }

    #[test]
    fn test_stream_multichannel() {
        let asset = Asset::from_buffer(44100, SampleBuffer::from_channels(vec![
            vec![1.0, 2.0, 3.0],
            vec![-1.0, -2.0, -3.0],
        ]));
        let mut track = Track::new(44100, 2);
        track.add_clip(1, asset.clip(0, 3)).unwrap();
        track.add_clip(2, asset.clip(2, 1)).unwrap();

        let out = track.stream().read_to_end(2, 2).unwrap();
        assert_eq!(out.channel(0), [0.0, 1.0, 3.0, 3.0]);
        assert_eq!(out.channel(1), [0.0, -1.0, -3.0, -3.0]);
    }

    #[test]
    fn test_stream_is_a_snapshot() {
        let asset = ramp(10);
        let mut track = Track::new(44100, 1);
        track.add_clip(0, asset.clip(0, 2)).unwrap();
        let mut stream = track.stream();
        track.add_clip(0, asset.clip(5, 4)).unwrap();

        let out = stream.read_to_end(1, 8).unwrap();
        assert_eq!(out.channel(0), [10.0, 11.0]);
    }

    #[test]
    fn test_clip_len_resolved_at_read_time() {
        let asset = Asset::new();
        let mut track = Track::new(44100, 1);
        track.add_clip(1, asset.clip(0, 4)).unwrap();
        assert!(track.is_empty());

        let mut sink = asset.sink(SignalProperties::new(44100, 1)).unwrap();
        crate::Sink::sink(&mut sink, &SampleBuffer::from_channels(vec![vec![5.0, 6.0]])).unwrap();
        assert_eq!(stream_all(&track, 4), [0.0, 5.0, 6.0]);
    }

    #[test]
    fn test_render_all_matches_stream() {
        let mut track = Track::new(44100, 1);
        track.add_clip(3, ramp(10).clip(3, 3)).unwrap();
        track.add_clip(2, ramp(20).clip(5, 2)).unwrap();
        let all = track.render_all().unwrap();
        assert_eq!(all.channel(0), [0.0, 0.0, 25.0, 26.0, 14.0, 15.0]);
        assert_eq!(stream_all(&track, 4), all.channel(0));
    }

    proptest! {
        #[test]
        fn prop_chunk_size_independent(
            clips in prop::collection::vec((0usize..24, 0usize..10, 0usize..12, 0usize..3), 0..8),
            buffer_size in 1usize..20,
        ) {
            let assets = [ramp(0), ramp(100), Asset::new()];
            let mut track = Track::new(44100, 1);
            for (position, start, len, asset) in clips {
                track.add_clip(position, assets[asset].clip(start, len)).unwrap();
            }

            let whole = track.render_all().unwrap();
            prop_assert_eq!(stream_all(&track, 1), whole.channel(0).to_vec());
            prop_assert_eq!(stream_all(&track, buffer_size), whole.channel(0).to_vec());
        }
    }
}
