use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::transport::HostPhase;

/// A decoded, loopable piece of audio. Never mutated once built.
#[derive(Clone, Debug)]
pub struct Clip {
    buffer: AudioBuffer,
    name: Arc<str>, // shared so slots can cache it without allocating
    loop_bars: u32,
    source_bpm: f64,
    source_sample_rate: f64,
}

impl Clip {
    pub fn new(name: &str, buffer: AudioBuffer, loop_bars: u32) -> Self {
        Self {
            buffer,
            name: Arc::from(name),
            loop_bars: loop_bars.max(1),
            source_bpm: 120.0,
            source_sample_rate: 44100.0,
        }
    }

    // Placeholder for a file that failed to decode; keeps bank indices stable.
    pub fn unloaded(name: &str) -> Self {
        Self::new(name, AudioBuffer::default(), 1)
    }

    pub fn with_source_bpm(mut self, bpm: f64) -> Self {
        if bpm > 0.0 {
            self.source_bpm = bpm;
        }
        self
    }

    pub fn with_source_sample_rate(mut self, sample_rate: f64) -> Self {
        if sample_rate > 0.0 {
            self.source_sample_rate = sample_rate;
        }
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.num_samples() > 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn loop_bars(&self) -> u32 {
        self.loop_bars
    }

    pub fn source_bpm(&self) -> f64 {
        self.source_bpm
    }

    pub fn source_sample_rate(&self) -> f64 {
        self.source_sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.buffer.num_channels()
    }

    pub fn len_samples(&self) -> usize {
        self.buffer.num_samples()
    }

    pub fn loop_beats(&self, phase: &HostPhase) -> f64 {
        self.loop_bars as f64 * phase.beats_per_bar()
    }

    // None when the tempo is unusable or the loop would be empty
    pub fn total_samples_at(&self, phase: &HostPhase) -> Option<usize> {
        let spb = phase.samples_per_beat()?;
        let total = (self.loop_beats(phase) * spb).round();
        (total >= 1.0).then_some(total as usize)
    }

    /// Adds `num_samples` samples into `dest` starting at `dest_offset`,
    /// reading from `phase` and wrapping at the end of the clip. Destination
    /// channels beyond the clip's are left alone, extra clip channels are
    /// ignored.
    pub fn render(&self, dest: &mut AudioBuffer, dest_offset: usize, num_samples: usize, phase: usize) {
        let len = self.buffer.num_samples();
        if len == 0 {
            return;
        }
        let end = (dest_offset + num_samples).min(dest.num_samples());
        if end <= dest_offset {
            return;
        }
        let channels = dest.num_channels().min(self.buffer.num_channels());
        let start = phase % len;

        for ch in 0..channels {
            let src = self.buffer.channel(ch);
            let out = &mut dest.channel_mut(ch)[dest_offset..end];
            let mut pos = start;
            for sample in out.iter_mut() {
                *sample += src[pos];
                pos += 1;
                if pos == len {
                    pos = 0;
                }
            }
        }
    }
}
