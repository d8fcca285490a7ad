//! Host transport tracking and bar arithmetic.
//!
//! The host is sampled once per audio callback. [`TransportTracker::refresh`]
//! folds that raw reading into a [`HostPhase`] that always carries usable
//! tempo and signature values, and [`samples_to_next_bar`] turns a phase into
//! the distance to the next bar line.

// Rounding slack for floating point beat arithmetic, in samples.
const SAMPLE_EPSILON: f64 = 1e-6;

/// One raw reading of the host clock, exactly as reported. Any field may be
/// garbage; the tracker decides what to keep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostPosition {
    pub bpm: f64,
    pub numerator: i32,
    pub denominator: i32,
    pub is_playing: bool,
    pub ppq_position: f64,
    pub time_in_samples: i64,
}

/// Normalized host timing. `bpm` and the signature are always positive once
/// they have passed through a [`TransportTracker`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HostPhase {
    pub bpm: f64,
    pub numerator: u32,
    pub denominator: u32,
    pub is_playing: bool,
    pub ppq_position: f64, // beats since host zero
    pub current_sample: i64,
    pub sample_rate: f64,
}

impl Default for HostPhase {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            numerator: 4,
            denominator: 4,
            is_playing: false,
            ppq_position: 0.0,
            current_sample: 0,
            sample_rate: 44100.0,
        }
    }
}

impl HostPhase {
    pub fn samples_per_beat(&self) -> Option<f64> {
        if !(self.bpm > 0.0 && self.bpm.is_finite()) {
            return None;
        }
        if !(self.sample_rate > 0.0 && self.sample_rate.is_finite()) {
            return None;
        }
        Some(60.0 / self.bpm * self.sample_rate)
    }

    pub fn beats_per_bar(&self) -> f64 {
        self.numerator.max(1) as f64
    }

    // both 0-based
    pub fn bar_and_beat(&self) -> (i64, u32) {
        let beats_per_bar = self.beats_per_bar();
        let bar = (self.ppq_position / beats_per_bar).floor();
        let beat = (self.ppq_position - bar * beats_per_bar).floor().max(0.0) as u32;
        (bar as i64, beat.min(self.numerator.max(1) - 1))
    }
}

/// Samples from `phase` to the first sample at or after the next bar line,
/// never less than one. A position within rounding distance of a bar line
/// counts as on it, so the bar it sits on is never reported again. `None`
/// when tempo or sample rate is unusable.
pub fn samples_to_next_bar(phase: &HostPhase) -> Option<usize> {
    let spb = phase.samples_per_beat()?;
    let ppq = phase.ppq_position;
    if !ppq.is_finite() {
        return None;
    }
    let beats_per_bar = phase.beats_per_bar();
    let bar_start = ((ppq + SAMPLE_EPSILON / spb) / beats_per_bar).floor() * beats_per_bar;
    let next_bar = bar_start + beats_per_bar;
    let samples = ((next_bar - ppq) * spb - SAMPLE_EPSILON).ceil();
    Some((samples.max(1.0)) as usize)
}

#[derive(Clone, Debug, Default)]
pub struct TransportTracker {
    phase: HostPhase,
}

impl TransportTracker {
    pub fn new(sample_rate: f64) -> Self {
        let mut tracker = Self::default();
        tracker.set_sample_rate(sample_rate);
        tracker
    }

    // Non-positive rates are ignored; the previous rate stays.
    fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate > 0.0 && sample_rate.is_finite() {
            self.phase.sample_rate = sample_rate;
        }
    }

    // A missing reading keeps everything but forces is_playing off, so nothing
    // commits against stale timing.
    pub fn refresh(&mut self, query: Option<&HostPosition>) -> bool {
        let Some(pos) = query else {
            self.phase.is_playing = false;
            return false;
        };

        if pos.bpm > 0.0 && pos.bpm.is_finite() {
            self.phase.bpm = pos.bpm;
        }
        if pos.numerator > 0 {
            self.phase.numerator = pos.numerator as u32;
        }
        if pos.denominator > 0 {
            self.phase.denominator = pos.denominator as u32;
        }
        self.phase.current_sample = pos.time_in_samples;

        if pos.ppq_position.is_finite() {
            self.phase.ppq_position = pos.ppq_position;
            self.phase.is_playing = pos.is_playing;
        } else {
            self.phase.is_playing = false;
        }
        true
    }

    pub fn phase(&self) -> &HostPhase {
        &self.phase
    }

    pub fn set_ppq(&mut self, ppq: f64) {
        if ppq.is_finite() {
            self.phase.ppq_position = ppq;
        }
    }

    pub fn advance(&mut self, samples: usize) {
        if !self.phase.is_playing {
            return;
        }
        self.phase.current_sample += samples as i64;
        if let Some(spb) = self.phase.samples_per_beat() {
            self.phase.ppq_position += samples as f64 / spb;
        }
    }
}
