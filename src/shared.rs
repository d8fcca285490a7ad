// Key plan for the terminal front end:
//
// Slots:
//   1 .. 8        //  SelectSlot(0 ..= 7)
//   Tab / S-Tab   //  CycleSlot(+1 / -1), the only way to reach slots past 8
//   j / k         //  BrowseClip(+1 / -1), walks the clip bank for the selected slot
//   Enter         //  LaunchClip: quantized, lands on the next bar
//   x             //  StopSlot: immediate
//   m             //  ToggleMute: immediate
//   s             //  ToggleSolo: immediate
//
// Scenes:
//   F1 .. F8      //  LaunchScene(0 ..= 7), every assigned slot switches on the same bar
//   Shift+F1..F8  //  CaptureScene(0 ..= 7), store what is actually playing now
//
// Transport (the standalone clock stands in for a host):
//   Space         //  PlayPress
//   [ / ]         //  AdjustBpm(-1 / +1)
//   0             //  Rewind to beat 0
//
// Other:
//   r             //  ReloadBank, rescan the clip directory
//   Esc           //  Quit
//
// The TUI only ever reads a `DisplayState`; the controller in middle.rs owns
// every decision and is the only thing that talks to the audio thread.

pub const MAX_SLOTS: usize = 16;
pub const NUM_SCENES: usize = 8;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    SelectSlot(u8),
    CycleSlot(i32),
    BrowseClip(i32),
    LaunchClip,
    StopSlot,
    ToggleMute,
    ToggleSolo,

    LaunchScene(u8),
    CaptureScene(u8),

    PlayPress,
    AdjustBpm(f64),
    Rewind,

    ReloadBank,
    Quit,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SlotView {
    pub active_name: String,  // realized, what you actually hear
    pub pending_name: String, // requested for the next bar
    pub waiting: bool,
    pub mute: bool,
    pub solo: bool,
    pub audible: bool, // after solo/mute policy
    pub progress: f32, // 0.0 ..= 1.0 through the loop
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub slots: Vec<SlotView>,
    pub selected_slot: usize,
    pub browse_clip: Option<usize>,
    pub browse_name: String,
    pub clip_count: usize,
    pub playing: bool,
    pub bpm: f64,
    pub numerator: u32,
    pub denominator: u32,
    pub bar: i64, // 1-based for display
    pub beat: u32, // 1-based for display
    pub scenes_used: [bool; NUM_SCENES],
    pub status_text: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            selected_slot: 0,
            browse_clip: None,
            browse_name: String::new(),
            clip_count: 0,
            playing: false,
            bpm: 120.0,
            numerator: 4,
            denominator: 4,
            bar: 1,
            beat: 1,
            scenes_used: [false; NUM_SCENES],
            status_text: String::new(),
        }
    }
}
