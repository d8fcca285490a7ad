use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::clip::Clip;
use super::clip_bank::{ClipBank, ClipIndex};
use super::transport::HostPhase;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SlotState {
    pub active: Option<ClipIndex>,
    pub pending: Option<ClipIndex>,
    pub armed: bool,
    pub mute: bool,
    pub solo: bool,
    pub phase_samples: usize,
}

/// One performer lane. Holds indices into the clip bank, never clips.
/// Idle when `active` is `None`, playing otherwise; `armed` is orthogonal.
#[derive(Clone, Debug, Default)]
pub struct Slot {
    state: SlotState,
    active_name: Option<Arc<str>>,
}

impl Slot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SlotState {
        &self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.active.is_some()
    }

    pub fn is_muted(&self) -> bool {
        self.state.mute
    }

    pub fn is_solo(&self) -> bool {
        self.state.solo
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    // cached at the last commit
    pub fn active_name(&self) -> Option<&str> {
        self.active_name.as_deref()
    }

    pub fn active_clip<'a>(&self, bank: &'a ClipBank) -> Option<&'a Clip> {
        bank.resolve(self.state.active)
    }

    pub fn arm_start(&mut self, clip: Option<ClipIndex>) {
        self.state.armed = true;
        self.state.pending = clip;
    }

    /// Commits the armed clip. Only the engine calls this, and only on a bar
    /// line. An index that does not resolve is dropped, not retried. Returns
    /// whether the active clip changed.
    pub fn apply_armed_start(&mut self, bank: &ClipBank) -> bool {
        if !self.state.armed {
            return false;
        }
        let committed = match bank.resolve(self.state.pending) {
            Some(clip) => {
                self.state.active = self.state.pending;
                self.state.phase_samples = 0;
                self.active_name = Some(clip.shared_name());
                true
            }
            None => false,
        };
        self.state.armed = false;
        self.state.pending = None;
        committed
    }

    pub fn stop(&mut self) {
        self.state.active = None;
        self.state.phase_samples = 0;
        self.active_name = None;
    }

    pub fn toggle_mute(&mut self) {
        self.state.mute = !self.state.mute;
    }

    pub fn set_mute(&mut self, mute: bool) {
        if mute != self.state.mute {
            self.toggle_mute();
        }
    }

    pub fn set_solo(&mut self, solo: bool) {
        self.state.solo = solo;
    }

    // After a bank swap the cached name may belong to a clip that moved.
    pub fn refresh_name(&mut self, bank: &ClipBank) {
        self.active_name = self.active_clip(bank).map(Clip::shared_name);
    }

    // after a relocate; no-op while idle
    pub fn jump_to(&mut self, ppq_position: f64, bank: &ClipBank, hp: &HostPhase) {
        let Some(clip) = self.active_clip(bank) else {
            return;
        };
        let (Some(spb), Some(total)) = (hp.samples_per_beat(), clip.total_samples_at(hp)) else {
            return;
        };
        self.state.phase_samples = clip_phase_at(clip, ppq_position, spb, hp) % total;
    }

    // false (and phase untouched) when muted, idle, or the clip is missing or unloaded
    pub fn render(
        &mut self,
        out: &mut AudioBuffer,
        offset: usize,
        num_samples: usize,
        bank: &ClipBank,
        hp: &HostPhase,
    ) -> bool {
        if self.state.mute {
            return false;
        }
        let Some(clip) = self.active_clip(bank).filter(|c| c.is_loaded()) else {
            return false;
        };

        // Tempo may have changed since the last call.
        let total = clip.total_samples_at(hp).unwrap_or_else(|| clip.len_samples());
        self.state.phase_samples %= total;

        clip.render(out, offset, num_samples, self.state.phase_samples);

        self.state.phase_samples = (self.state.phase_samples + num_samples) % total;
        true
    }
}

fn clip_phase_at(clip: &Clip, ppq_position: f64, samples_per_beat: f64, hp: &HostPhase) -> usize {
    let loop_beats = clip.loop_beats(hp);
    (ppq_position.rem_euclid(loop_beats) * samples_per_beat).floor() as usize
}
