pub use crate::audio::{ClipBank, ClipIndex, HostPhase};
use crate::shared::MAX_SLOTS;

// Performer intent. Clip starts are quantized to the next bar; everything
// else is applied as soon as the audio thread drains it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UserIntent {
    RequestClipStart { slot: usize, clip: Option<ClipIndex> },
    SetMute { slot: usize, mute: bool },
    SetSolo { slot: usize, solo: bool },
    Stop { slot: usize },
}

// Controls for the standalone clock that plays the part of a host transport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransportCommand {
    Play,
    Stop,
    SetTempo(f64),
    SetSignature { numerator: u32, denominator: u32 },
    Relocate(f64), // beats
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    Intent(UserIntent),

    // The engine can't load files, so banks are decoded elsewhere and swapped
    // in whole. The old bank comes back on the disposal channel.
    ReplaceBank(ClipBank),

    Transport(TransportCommand),
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlotSnapshot {
    pub active: Option<ClipIndex>,
    pub pending: Option<ClipIndex>, // armed or still queued for the next bar
    pub waiting: bool,
    pub mute: bool,
    pub solo: bool,
    pub phase_samples: usize,
    pub loop_samples: usize,
}

// Realized engine state, published after every callback. Copy so the audio
// thread can hand it over without allocating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineSnapshot {
    pub slots: [SlotSnapshot; MAX_SLOTS],
    pub num_slots: usize,
    pub transport: HostPhase,
    pub boundaries: u64,
    pub clip_changes: u64,
    pub dropped_requests: u64,
    pub transport_jumps: u64,
    pub bank_generation: u64, // which bank the clip indices above refer to
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            slots: [SlotSnapshot::default(); MAX_SLOTS],
            num_slots: 0,
            transport: HostPhase::default(),
            boundaries: 0,
            clip_changes: 0,
            dropped_requests: 0,
            transport_jumps: 0,
            bank_generation: 0,
        }
    }
}

impl EngineSnapshot {
    pub fn slots(&self) -> &[SlotSnapshot] {
        &self.slots[..self.num_slots.min(MAX_SLOTS)]
    }
}
