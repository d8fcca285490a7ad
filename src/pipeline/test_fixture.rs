// Purely for testing: synthetic clips and host readings that don't need a
// sound card or files on disk.

use crate::audio::{AudioBuffer, Clip, HostPhase, HostPosition};

// Every channel counts up 0, 1, 2, ... so positions are easy to read back.
pub fn ramp_clip(name: &str, channels: usize, len: usize, bars: u32) -> Clip {
    let ramp: Vec<f32> = (0..len).map(|i| i as f32).collect();
    Clip::new(name, AudioBuffer::from_channels(vec![ramp; channels]), bars)
}

pub fn constant_clip(name: &str, channels: usize, len: usize, bars: u32, value: f32) -> Clip {
    Clip::new(name, AudioBuffer::from_channels(vec![vec![value; len]; channels]), bars)
}

// Running transport at the given tempo and position.
pub fn phase_at(bpm: f64, numerator: u32, sample_rate: f64, ppq: f64) -> HostPhase {
    HostPhase {
        bpm,
        numerator,
        sample_rate,
        ppq_position: ppq,
        is_playing: true,
        ..HostPhase::default()
    }
}

pub fn host_position(bpm: f64, numerator: i32, ppq: f64, is_playing: bool) -> HostPosition {
    HostPosition {
        bpm,
        numerator,
        denominator: 4,
        is_playing,
        ppq_position: ppq,
        time_in_samples: 0,
    }
}
