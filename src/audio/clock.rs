use crate::audio_api::TransportCommand;

use super::transport::HostPosition;

// Stands in for a plugin host when barloop drives the sound card itself.
// Position is kept in beats so tempo changes don't move the playhead.
#[derive(Clone, Debug)]
pub struct InternalClock {
    bpm: f64,
    numerator: u32,
    denominator: u32,
    playing: bool,
    ppq: f64,
    sample_pos: i64,
    sample_rate: f64,
}

impl InternalClock {
    pub fn new(sample_rate: f64, bpm: f64, numerator: u32, denominator: u32) -> Self {
        Self {
            bpm: if bpm > 0.0 { bpm } else { 120.0 },
            numerator: numerator.max(1),
            denominator: denominator.max(1),
            playing: false,
            ppq: 0.0,
            sample_pos: 0,
            sample_rate,
        }
    }

    pub fn apply(&mut self, cmd: TransportCommand) {
        match cmd {
            TransportCommand::Play => self.playing = true,
            TransportCommand::Stop => self.playing = false,
            TransportCommand::SetTempo(bpm) => {
                if bpm > 0.0 && bpm.is_finite() {
                    self.bpm = bpm;
                }
            }
            TransportCommand::SetSignature { numerator, denominator } => {
                self.numerator = numerator.max(1);
                self.denominator = denominator.max(1);
            }
            TransportCommand::Relocate(beats) => {
                if beats.is_finite() {
                    self.ppq = beats.max(0.0);
                    self.sample_pos = (self.ppq * self.samples_per_beat()).round() as i64;
                }
            }
        }
    }

    fn samples_per_beat(&self) -> f64 {
        60.0 / self.bpm * self.sample_rate
    }

    pub fn position(&self) -> HostPosition {
        HostPosition {
            bpm: self.bpm,
            numerator: self.numerator as i32,
            denominator: self.denominator as i32,
            is_playing: self.playing,
            ppq_position: self.ppq,
            time_in_samples: self.sample_pos,
        }
    }

    pub fn advance(&mut self, frames: usize) {
        if !self.playing || self.sample_rate <= 0.0 {
            return;
        }
        self.sample_pos += frames as i64;
        self.ppq += frames as f64 / self.samples_per_beat();
    }
}
