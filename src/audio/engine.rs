use crate::audio_api::{AudioCommand, EngineSnapshot, SlotSnapshot, UserIntent};
use crate::shared::MAX_SLOTS;

use super::buffer::AudioBuffer;
use super::clip_bank::ClipBank;
use super::scheduler::{EnqueueOutcome, QuantizedScheduler, StartRequest};
use super::slot::Slot;
use super::transport::{samples_to_next_bar, HostPhase, HostPosition, TransportTracker};

// Host positions closer than this to where we expect to be are not relocates.
const JITTER_SAMPLES: f64 = 2.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub boundaries: usize,
    pub clip_changes: usize,
    pub first_boundary_offset: Option<usize>,
    pub transport_jump: bool,
}

/// Per-callback orchestrator. Everything here runs on the audio thread:
/// no locks, no allocation, no blocking once constructed.
pub struct RenderEngine {
    bank: ClipBank,
    slots: Vec<Slot>, // fixed at construction
    scheduler: QuantizedScheduler,
    tracker: TransportTracker,
    expected_ppq: Option<f64>, // where the next callback should start if nobody relocated
    boundaries: u64,
    clip_changes: u64,
    dropped_requests: u64,
    transport_jumps: u64,
}

impl RenderEngine {
    pub fn new(num_slots: usize, queue_capacity: usize, sample_rate: f64) -> Self {
        let num_slots = num_slots.clamp(1, MAX_SLOTS);
        Self {
            bank: ClipBank::default(),
            slots: vec![Slot::new(); num_slots],
            scheduler: QuantizedScheduler::new(queue_capacity),
            tracker: TransportTracker::new(sample_rate),
            expected_ppq: None,
            boundaries: 0,
            clip_changes: 0,
            dropped_requests: 0,
            transport_jumps: 0,
        }
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn bank(&self) -> &ClipBank {
        &self.bank
    }

    pub fn host_phase(&self) -> &HostPhase {
        self.tracker.phase()
    }

    pub fn has_pending(&self) -> bool {
        self.scheduler.has_pending()
    }

    // The old bank goes back to the caller so it is freed off the audio thread.
    pub fn replace_bank(&mut self, bank: ClipBank) -> ClipBank {
        let old = std::mem::replace(&mut self.bank, bank);
        for slot in self.slots.iter_mut() {
            slot.refresh_name(&self.bank);
        }
        old
    }

    // Transport commands belong to the clock and are ignored here.
    pub fn handle_cmd(&mut self, cmd: AudioCommand) -> Option<ClipBank> {
        match cmd {
            AudioCommand::Intent(intent) => {
                self.handle_intent(intent);
                None
            }
            AudioCommand::ReplaceBank(bank) => Some(self.replace_bank(bank)),
            AudioCommand::Transport(_) => None,
        }
    }

    pub fn handle_intent(&mut self, intent: UserIntent) {
        match intent {
            UserIntent::RequestClipStart { slot, clip } => {
                if slot >= self.slots.len() {
                    self.dropped_requests += 1;
                    return;
                }
                if self.scheduler.enqueue(StartRequest { slot, clip }) == EnqueueOutcome::Rejected {
                    self.dropped_requests += 1;
                }
            }
            UserIntent::SetMute { slot, mute } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.set_mute(mute);
                }
            }
            UserIntent::SetSolo { slot, solo } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.set_solo(solo);
                }
            }
            UserIntent::Stop { slot } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.stop();
                }
            }
        }
    }

    /// Renders `frames` samples into `out`, splitting at every bar line so
    /// queued clip changes commit on the exact boundary sample.
    pub fn process(&mut self, out: &mut AudioBuffer, frames: usize, host: Option<&HostPosition>) -> BlockReport {
        let frames = frames.min(out.num_samples());
        out.clear_range(0, frames);

        let mut report = BlockReport::default();
        self.tracker.refresh(host);
        report.transport_jump = self.reconcile_with_host();

        let any_solo = self.slots.iter().any(Slot::is_solo);
        let mut remaining = frames;
        let mut offset = 0;

        while remaining > 0 {
            let hp = *self.tracker.phase();
            let to_next_bar = if hp.is_playing { samples_to_next_bar(&hp) } else { None };
            let step = to_next_bar.map_or(remaining, |n| remaining.min(n.max(1)));
            let crosses = to_next_bar == Some(step);

            for slot in self.slots.iter_mut() {
                if any_solo && !slot.is_solo() {
                    continue;
                }
                if slot.is_muted() {
                    continue;
                }
                slot.render(out, offset, step, &self.bank, &hp);
            }

            if crosses {
                report.clip_changes += self.commit_at_boundary();
                report.boundaries += 1;
                report.first_boundary_offset.get_or_insert(offset + step);
            }
            self.tracker.advance(step);

            remaining -= step;
            offset += step;
        }

        let hp = self.tracker.phase();
        self.expected_ppq = hp.is_playing.then_some(hp.ppq_position);
        self.boundaries += report.boundaries as u64;
        self.clip_changes += report.clip_changes as u64;
        report
    }

    fn commit_at_boundary(&mut self) -> usize {
        let slots = &mut self.slots;
        self.scheduler.flush(|request| {
            if let Some(slot) = slots.get_mut(request.slot) {
                slot.arm_start(request.clip);
            }
        });
        let mut changed = 0;
        for slot in slots.iter_mut() {
            if slot.apply_armed_start(&self.bank) {
                changed += 1;
            }
        }
        changed
    }

    // Keeps our own beat count while the host roughly agrees with it, and
    // re-derives slot phases when it doesn't (relocate) or just started rolling.
    fn reconcile_with_host(&mut self) -> bool {
        let hp = *self.tracker.phase();
        if !hp.is_playing {
            return false;
        }
        let Some(spb) = hp.samples_per_beat() else {
            return false;
        };
        if let Some(expected) = self.expected_ppq {
            // Bars are committed on whole samples, so a host with a fractional
            // bar length trails us slightly. Trusting it would replay the bar line.
            if (hp.ppq_position - expected).abs() <= JITTER_SAMPLES / spb {
                self.tracker.set_ppq(expected);
                return false;
            }
        }
        for slot in self.slots.iter_mut() {
            slot.jump_to(hp.ppq_position, &self.bank, &hp);
        }
        // a transport start realigns too, but isn't a jump
        let jumped = self.expected_ppq.is_some();
        if jumped {
            self.transport_jumps += 1;
        }
        jumped
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let hp = self.tracker.phase();
        let mut snap = EngineSnapshot {
            num_slots: self.slots.len(),
            transport: *hp,
            boundaries: self.boundaries,
            clip_changes: self.clip_changes,
            dropped_requests: self.dropped_requests,
            transport_jumps: self.transport_jumps,
            bank_generation: self.bank.generation(),
            ..EngineSnapshot::default()
        };
        for (i, (slot, out)) in self.slots.iter().zip(snap.slots.iter_mut()).enumerate() {
            let state = slot.state();
            let queued = self.scheduler.pending_for(i);
            *out = SlotSnapshot {
                active: state.active,
                pending: queued.unwrap_or(state.pending),
                waiting: queued.is_some() || state.armed,
                mute: state.mute,
                solo: state.solo,
                phase_samples: state.phase_samples,
                loop_samples: slot
                    .active_clip(&self.bank)
                    .and_then(|c| c.total_samples_at(hp))
                    .unwrap_or(0),
            };
        }
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{Clip, InternalClock};
    use crate::audio_api::TransportCommand;
    use crate::pipeline::test_fixture::{constant_clip, host_position, ramp_clip};

    const SR: f64 = 48000.0;

    fn engine_with(clips: Vec<Clip>, slots: usize) -> RenderEngine {
        let mut engine = RenderEngine::new(slots, 64, SR);
        engine.replace_bank(ClipBank::new(clips));
        engine
    }

    fn start(engine: &mut RenderEngine, slot: usize, clip: usize) {
        engine.handle_intent(UserIntent::RequestClipStart { slot, clip: Some(clip) });
    }

    fn constant_bank() -> Vec<Clip> {
        vec![
            constant_clip("low", 1, 96000, 1, 1.0),
            constant_clip("high", 1, 96000, 1, 2.0),
            constant_clip("other", 1, 96000, 1, 4.0),
        ]
    }

    // 120bpm, 4/4 at 48k: 24000 samples per beat, 600 samples short of bar 2.
    fn six_hundred_before_bar() -> HostPosition {
        host_position(120.0, 4, 4.0 - 600.0 / 24000.0, true)
    }

    #[test]
    fn commit_lands_on_exact_boundary_sample() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 1024);

        // Get clip 0 going first.
        start(&mut engine, 0, 0);
        let on_bar = host_position(120.0, 4, 3.999_999_999, true);
        engine.process(&mut out, 1, Some(&on_bar));
        assert_eq!(engine.slot(0).unwrap().state().active, Some(0));

        start(&mut engine, 0, 1);
        let report = engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));

        assert_eq!(report.boundaries, 1);
        assert_eq!(report.first_boundary_offset, Some(600));
        assert!(out.channel(0)[..600].iter().all(|&s| s == 1.0));
        assert!(out.channel(0)[600..].iter().all(|&s| s == 2.0));
        assert_eq!(engine.slot(0).unwrap().state().active, Some(1));
        assert_eq!(engine.slot(0).unwrap().state().phase_samples, 424);
    }

    #[test]
    fn no_commit_before_boundary() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 512);
        start(&mut engine, 0, 0);
        let report = engine.process(&mut out, 512, Some(&six_hundred_before_bar()));
        assert_eq!(report.boundaries, 0);
        assert!(engine.has_pending());
        assert_eq!(engine.slot(0).unwrap().state().active, None);
        assert!(out.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn stopped_transport_never_commits() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 0);
        let stopped = host_position(120.0, 4, 3.99, false);
        let report = engine.process(&mut out, 1024, Some(&stopped));
        assert_eq!(report.boundaries, 0);
        assert!(engine.has_pending());

        let report = engine.process(&mut out, 1024, None);
        assert_eq!(report.boundaries, 0);
        assert!(!engine.host_phase().is_playing);
    }

    #[test]
    fn last_request_for_a_slot_wins() {
        let mut engine = engine_with(constant_bank(), 2);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 0);
        start(&mut engine, 1, 2);
        start(&mut engine, 0, 1);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));
        assert_eq!(engine.slot(0).unwrap().state().active, Some(1));
        assert_eq!(engine.slot(1).unwrap().state().active, Some(2));
        assert_eq!(engine.slot(0).unwrap().active_name(), Some("high"));
    }

    #[test]
    fn solo_silences_everyone_else_even_unmuted() {
        let mut engine = engine_with(constant_bank(), 3);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 0);
        start(&mut engine, 1, 1);
        start(&mut engine, 2, 2);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));

        engine.handle_intent(UserIntent::SetSolo { slot: 1, solo: true });
        let next = host_position(120.0, 4, 4.5, true);
        engine.process(&mut out, 256, Some(&next));
        assert!(out.channel(0)[..256].iter().all(|&s| s == 2.0));

        // muted beats soloed
        engine.handle_intent(UserIntent::SetMute { slot: 1, mute: true });
        engine.process(&mut out, 256, Some(&next));
        assert!(out.channel(0)[..256].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn mute_applies_immediately_without_waiting_for_bar() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 0);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));

        engine.handle_intent(UserIntent::SetMute { slot: 0, mute: true });
        let mid_bar = host_position(120.0, 4, 5.0, true);
        let report = engine.process(&mut out, 128, Some(&mid_bar));
        assert_eq!(report.boundaries, 0);
        assert!(out.channel(0)[..128].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn out_of_range_requests_are_dropped() {
        let mut engine = engine_with(constant_bank(), 2);
        let mut out = AudioBuffer::new(1, 1024);
        engine.handle_intent(UserIntent::RequestClipStart { slot: 9, clip: Some(0) });
        start(&mut engine, 0, 99);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));
        assert_eq!(engine.snapshot().dropped_requests, 1);
        assert_eq!(engine.slot(0).unwrap().state().active, None);
        assert!(!engine.slot(0).unwrap().is_armed());
    }

    #[test]
    fn request_after_boundary_waits_for_next_bar() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 0);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));

        start(&mut engine, 0, 1);
        let after = host_position(120.0, 4, 4.0 + 424.0 / 24000.0, true);
        let report = engine.process(&mut out, 1024, Some(&after));
        assert_eq!(report.boundaries, 0);
        assert_eq!(engine.slot(0).unwrap().state().active, Some(0));
    }

    #[test]
    fn small_blocks_cross_bar_exactly_once() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 64);
        start(&mut engine, 0, 0);

        // The engine keeps its own position between callbacks, so feed back
        // what it expects, just like a well-behaved host.
        let mut ppq = 3.0;
        let mut boundaries = 0;
        for _ in 0..(24000 * 2 / 64) {
            let pos = host_position(120.0, 4, ppq, true);
            boundaries += engine.process(&mut out, 64, Some(&pos)).boundaries;
            ppq = engine.host_phase().ppq_position;
        }
        assert_eq!(boundaries, 1);
        assert_eq!(engine.slot(0).unwrap().state().active, Some(0));
    }

    #[test]
    fn tiny_bars_commit_several_times_in_one_block() {
        // 1/4 at 120bpm and 1600Hz: 800 samples per bar.
        let mut engine = RenderEngine::new(1, 8, 1600.0);
        engine.replace_bank(ClipBank::new(vec![ramp_clip("r", 1, 800, 1)]));
        let mut out = AudioBuffer::new(1, 2000);
        start(&mut engine, 0, 0);
        let report = engine.process(&mut out, 2000, Some(&host_position(120.0, 1, 0.5, true)));
        assert_eq!(report.boundaries, 3);
        assert_eq!(report.first_boundary_offset, Some(400));
        assert_eq!(report.clip_changes, 1);
    }

    #[test]
    fn long_session_at_odd_tempo_does_not_drift() {
        // 44.1k at 123bpm: samples per beat is not an integer.
        let mut engine = RenderEngine::new(1, 8, 44100.0);
        engine.replace_bank(ClipBank::new(vec![constant_clip("c", 1, 1000, 1, 1.0)]));
        let mut out = AudioBuffer::new(1, 512);
        start(&mut engine, 0, 0);

        let mut ppq = 0.0;
        let mut boundaries = 0;
        for _ in 0..20_000 {
            let pos = host_position(123.0, 4, ppq, true);
            boundaries += engine.process(&mut out, 512, Some(&pos)).boundaries;
            ppq = engine.host_phase().ppq_position;
        }
        let bars_elapsed = ((ppq + 1e-9) / 4.0).floor() as usize;
        assert_eq!(boundaries, bars_elapsed);
        assert_eq!(engine.snapshot().transport_jumps, 0);

        let slot = engine.slot(0).unwrap();
        let loop_len = slot.active_clip(engine.bank()).unwrap().total_samples_at(engine.host_phase()).unwrap();
        assert!(slot.state().phase_samples < loop_len);
    }

    #[test]
    fn continuous_host_clock_gets_one_commit_per_bar() {
        let mut engine = RenderEngine::new(1, 8, 44100.0);
        engine.replace_bank(ClipBank::new(vec![constant_clip("c", 1, 1000, 1, 1.0)]));
        let mut clock = InternalClock::new(44100.0, 123.0, 4, 4);
        clock.apply(TransportCommand::Play);
        let mut out = AudioBuffer::new(1, 480);

        let mut boundaries = 0;
        for _ in 0..50_000 {
            let pos = clock.position();
            boundaries += engine.process(&mut out, 480, Some(&pos)).boundaries;
            clock.advance(480);
        }
        let bars = (clock.position().ppq_position / 4.0).floor() as usize;
        assert!(boundaries == bars || boundaries == bars + 1);
        assert_eq!(engine.snapshot().transport_jumps, 0);
    }

    #[test]
    fn relocate_realigns_slot_phase() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 0);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));

        // Host jumps to beat 10.5 (bar 3, beat 2.5).
        let report = engine.process(&mut out, 16, Some(&host_position(120.0, 4, 10.5, true)));
        assert!(report.transport_jump);
        assert_eq!(engine.snapshot().transport_jumps, 1);
        // 2.5 beats into a one-bar loop, plus the 16 samples just rendered.
        assert_eq!(engine.slot(0).unwrap().state().phase_samples, 60_000 + 16);
    }

    #[test]
    fn transport_start_realigns_without_counting_a_jump() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 256);
        let stopped = engine.process(&mut out, 256, Some(&host_position(120.0, 4, 0.0, false)));
        assert!(!stopped.transport_jump);

        let rolling = engine.process(&mut out, 256, Some(&host_position(120.0, 4, 0.0, true)));
        assert!(!rolling.transport_jump);
        assert_eq!(engine.snapshot().transport_jumps, 0);
    }

    #[test]
    fn snapshot_echoes_bank_generation() {
        let mut engine = engine_with(constant_bank(), 1);
        assert_eq!(engine.snapshot().bank_generation, 0);
        engine.handle_cmd(AudioCommand::ReplaceBank(ClipBank::new(constant_bank()).with_generation(7)));
        assert_eq!(engine.snapshot().bank_generation, 7);
    }

    #[test]
    fn bank_swap_revalidates_indices() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 1024);
        start(&mut engine, 0, 2);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));
        assert_eq!(engine.slot(0).unwrap().active_name(), Some("other"));

        let old = engine.replace_bank(ClipBank::new(vec![constant_clip("solo", 1, 10, 1, 1.0)]));
        assert_eq!(old.len(), 3);
        assert_eq!(engine.slot(0).unwrap().active_name(), None);

        let mid = host_position(120.0, 4, 4.5, true);
        engine.process(&mut out, 64, Some(&mid));
        assert!(out.channel(0)[..64].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn snapshot_reports_queued_and_active() {
        let mut engine = engine_with(constant_bank(), 2);
        start(&mut engine, 1, 2);
        let snap = engine.snapshot();
        assert_eq!(snap.slots().len(), 2);
        assert!(snap.slots()[1].waiting);
        assert_eq!(snap.slots()[1].pending, Some(2));
        assert_eq!(snap.slots()[1].active, None);
        assert!(!snap.slots()[0].waiting);
    }

    #[test]
    fn stopped_slots_keep_phase_bounded_while_transport_stopped() {
        let mut engine = engine_with(constant_bank(), 1);
        let mut out = AudioBuffer::new(1, 4096);
        start(&mut engine, 0, 0);
        engine.process(&mut out, 1024, Some(&six_hundred_before_bar()));
        let stopped = host_position(120.0, 4, 4.0, false);
        for _ in 0..100 {
            engine.process(&mut out, 4096, Some(&stopped));
        }
        assert!(engine.slot(0).unwrap().state().phase_samples < 96_000);
    }
}
