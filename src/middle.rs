// The control-thread side of barloop. Turns key presses into engine commands
// and folds engine snapshots into something the TUI can draw. Nothing here
// runs on the audio thread.

use std::sync::Arc;

use crate::audio::ClipIndex;
use crate::audio_api::{AudioCommand, EngineSnapshot, TransportCommand, UserIntent};
use crate::pipeline::persistence::{clip_position, SessionState, SlotSession};
use crate::pipeline::scenes::SceneBank;
use crate::shared::{DisplayState, InputEvent, SlotView, MAX_SLOTS};

const MIN_BPM: f64 = 20.0;
const MAX_BPM: f64 = 300.0;

pub struct Controller {
    num_slots: usize,
    clip_names: Vec<Arc<str>>, // mirror of the newest bank sent to the engine
    generation: u64, // stamped on that bank
    previous_names: Vec<Arc<str>>, // generation - 1, until the engine catches up
    selected_slot: usize,
    browse: [Option<ClipIndex>; MAX_SLOTS], // per-slot cursor into the bank
    scenes: SceneBank,
    snapshot: EngineSnapshot,
    clock_playing: bool,
    bpm: f64,
    status: String,
}

impl Controller {
    pub fn new(num_slots: usize, bpm: f64) -> Self {
        Self {
            num_slots: num_slots.clamp(1, MAX_SLOTS),
            clip_names: Vec::new(),
            generation: 0,
            previous_names: Vec::new(),
            selected_slot: 0,
            browse: [None; MAX_SLOTS],
            scenes: SceneBank::default(),
            snapshot: EngineSnapshot::default(),
            clock_playing: false,
            bpm,
            status: String::new(),
        }
    }

    /// Mirrors a freshly loaded bank and returns the generation to stamp on
    /// it before it goes to the engine. Scenes and browse cursors follow their
    /// clips by name.
    pub fn set_clip_names(&mut self, names: Vec<Arc<str>>) -> u64 {
        let old = std::mem::replace(&mut self.clip_names, names);
        for cursor in self.browse.iter_mut() {
            *cursor = cursor
                .and_then(|c| old.get(c))
                .and_then(|n| clip_position(&self.clip_names, n));
        }
        let saved = SessionState {
            scenes: SessionState::scenes_to_names(&self.scenes, &old, MAX_SLOTS),
            ..SessionState::default()
        };
        self.scenes = saved.scenes_from_names(&self.clip_names);

        self.previous_names = old;
        self.generation += 1;
        self.status = format!("{} clips", self.clip_names.len());
        self.generation
    }

    // Names for the indices in the current snapshot, which may still describe
    // the bank before the last reload. Empty if it is older than that.
    fn snapshot_names(&self) -> &[Arc<str>] {
        let generation = self.snapshot.bank_generation;
        if generation == self.generation {
            &self.clip_names
        } else if generation + 1 == self.generation {
            &self.previous_names
        } else {
            &[]
        }
    }

    fn snapshot_is_current(&self) -> bool {
        self.snapshot.bank_generation == self.generation
    }

    pub fn on_snapshot(&mut self, snapshot: EngineSnapshot) {
        if snapshot.dropped_requests > self.snapshot.dropped_requests {
            log::warn!(
                "engine dropped {} clip request(s)",
                snapshot.dropped_requests - self.snapshot.dropped_requests
            );
        }
        if snapshot.transport_jumps > self.snapshot.transport_jumps {
            log::debug!("transport relocated to beat {:.3}", snapshot.transport.ppq_position);
        }
        if snapshot.clip_changes > self.snapshot.clip_changes {
            log::debug!("bar {} committed clip changes", snapshot.transport.bar_and_beat().0 + 1);
        }
        self.snapshot = snapshot;
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Vec<AudioCommand> {
        let slot = self.selected_slot;
        match event {
            InputEvent::SelectSlot(n) => {
                if (n as usize) < self.num_slots {
                    self.selected_slot = n as usize;
                }
                vec![]
            }
            InputEvent::CycleSlot(delta) => {
                let next = (self.selected_slot as i64 + delta as i64).rem_euclid(self.num_slots as i64);
                self.selected_slot = next as usize;
                vec![]
            }
            InputEvent::BrowseClip(delta) => {
                self.browse_clip(delta);
                vec![]
            }
            InputEvent::LaunchClip => {
                let Some(clip) = self.browse[slot] else {
                    self.status = "no clip selected".into();
                    return vec![];
                };
                self.status = format!("slot {}: {} at next bar", slot + 1, name_in(&self.clip_names, Some(clip)));
                vec![intent(UserIntent::RequestClipStart { slot, clip: Some(clip) })]
            }
            InputEvent::StopSlot => vec![intent(UserIntent::Stop { slot })],
            InputEvent::ToggleMute => {
                let mute = !self.snapshot.slots[slot].mute;
                vec![intent(UserIntent::SetMute { slot, mute })]
            }
            InputEvent::ToggleSolo => {
                let solo = !self.snapshot.slots[slot].solo;
                vec![intent(UserIntent::SetSolo { slot, solo })]
            }
            InputEvent::LaunchScene(i) => {
                let intents = self.scenes.launch_intents(i as usize, self.num_slots);
                self.status = if intents.is_empty() {
                    format!("scene {} is empty", i + 1)
                } else {
                    format!("scene {} at next bar", i + 1)
                };
                intents.into_iter().map(intent).collect()
            }
            InputEvent::CaptureScene(i) => {
                // indices from an older bank would land on the wrong clips
                if !self.snapshot_is_current() {
                    self.status = "clips are reloading, capture again".into();
                    return vec![];
                }
                self.scenes.capture(i as usize, &self.snapshot);
                self.status = format!("captured scene {}", i + 1);
                vec![]
            }
            InputEvent::PlayPress => {
                self.clock_playing = !self.clock_playing;
                let cmd = if self.clock_playing { TransportCommand::Play } else { TransportCommand::Stop };
                vec![AudioCommand::Transport(cmd)]
            }
            InputEvent::AdjustBpm(delta) => {
                self.bpm = (self.bpm + delta).clamp(MIN_BPM, MAX_BPM);
                vec![AudioCommand::Transport(TransportCommand::SetTempo(self.bpm))]
            }
            InputEvent::Rewind => vec![AudioCommand::Transport(TransportCommand::Relocate(0.0))],
            // handled by the app loop
            InputEvent::ReloadBank | InputEvent::Quit => vec![],
        }
    }

    fn browse_clip(&mut self, delta: i32) {
        let count = self.clip_names.len();
        if count == 0 {
            return;
        }
        let slot = self.selected_slot;
        let active = self.snapshot_is_current().then_some(self.snapshot.slots[slot].active).flatten();
        let start = self.browse[slot].or(active);
        let next = match start {
            Some(c) => (c as i64 + delta as i64).rem_euclid(count as i64) as usize,
            None => 0,
        };
        self.browse[slot] = Some(next);
    }

    pub fn display_state(&self) -> DisplayState {
        let snap = &self.snapshot;
        let names = self.snapshot_names();
        let views = &snap.slots[..self.num_slots];
        let any_solo = views.iter().any(|s| s.solo);
        let slots = views
            .iter()
            .map(|s| SlotView {
                active_name: name_in(names, s.active),
                pending_name: if s.waiting { name_in(names, s.pending) } else { String::new() },
                waiting: s.waiting,
                mute: s.mute,
                solo: s.solo,
                audible: s.active.is_some() && !s.mute && (!any_solo || s.solo),
                progress: if s.loop_samples > 0 {
                    s.phase_samples as f32 / s.loop_samples as f32
                } else {
                    0.0
                },
            })
            .collect();

        let (bar, beat) = snap.transport.bar_and_beat();
        let browse_clip = self.browse[self.selected_slot];
        DisplayState {
            slots,
            selected_slot: self.selected_slot,
            browse_clip,
            browse_name: name_in(&self.clip_names, browse_clip),
            clip_count: self.clip_names.len(),
            playing: snap.transport.is_playing,
            bpm: snap.transport.bpm,
            numerator: snap.transport.numerator,
            denominator: snap.transport.denominator,
            bar: bar + 1,
            beat: beat + 1,
            scenes_used: self.scenes.used(),
            status_text: self.status.clone(),
        }
    }

    pub fn session_state(&self) -> SessionState {
        let names = self.snapshot_names();
        SessionState {
            slots: self.snapshot.slots[..self.num_slots]
                .iter()
                .map(|s| SlotSession {
                    clip: s.active.and_then(|c| names.get(c)).map(|n| n.to_string()),
                    mute: s.mute,
                    solo: s.solo,
                })
                .collect(),
            scenes: SessionState::scenes_to_names(&self.scenes, &self.clip_names, self.num_slots),
            bpm: Some(self.bpm),
        }
    }

    /// Commands that bring a fresh engine back to `session`. Clips are
    /// requested like any other start, so they come in on the first bar.
    pub fn restore_session(&mut self, session: &SessionState) -> Vec<AudioCommand> {
        let mut cmds = Vec::new();
        if let Some(bpm) = session.bpm.filter(|b| *b > 0.0) {
            self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
            cmds.push(AudioCommand::Transport(TransportCommand::SetTempo(self.bpm)));
        }
        for (slot, saved) in session.slots.iter().take(self.num_slots).enumerate() {
            if let Some(clip) = saved.clip.as_deref().and_then(|n| clip_position(&self.clip_names, n)) {
                self.browse[slot] = Some(clip);
                cmds.push(intent(UserIntent::RequestClipStart { slot, clip: Some(clip) }));
            }
            if saved.mute {
                cmds.push(intent(UserIntent::SetMute { slot, mute: true }));
            }
            if saved.solo {
                cmds.push(intent(UserIntent::SetSolo { slot, solo: true }));
            }
        }
        self.scenes = session.scenes_from_names(&self.clip_names);
        cmds
    }
}

fn intent(i: UserIntent) -> AudioCommand {
    AudioCommand::Intent(i)
}

fn name_in(names: &[Arc<str>], clip: Option<ClipIndex>) -> String {
    clip.and_then(|c| names.get(c))
        .map(|n| n.to_string())
        .unwrap_or_default()
}
