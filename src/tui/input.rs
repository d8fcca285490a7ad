use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crate::shared::{InputEvent, NUM_SCENES};

const BPM_STEP: f64 = 1.0;

// poll for input from tui, resolves key presses into input events for the
// controller. releases and repeats are ignored
pub fn poll_input(timeout: Duration) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key));
    }
    Ok(vec![])
}

pub fn handle_key(key: KeyEvent) -> Vec<InputEvent> {
    match key.code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],

        // slot select
        KeyCode::Char(c @ '1'..='8') => vec![InputEvent::SelectSlot(c as u8 - b'1')],
        KeyCode::Tab => vec![InputEvent::CycleSlot(1)],
        KeyCode::BackTab => vec![InputEvent::CycleSlot(-1)],

        KeyCode::Char('j') | KeyCode::Down => vec![InputEvent::BrowseClip(1)],
        KeyCode::Char('k') | KeyCode::Up => vec![InputEvent::BrowseClip(-1)],
        KeyCode::Enter => vec![InputEvent::LaunchClip],
        KeyCode::Char('x') => vec![InputEvent::StopSlot],
        KeyCode::Char('m') => vec![InputEvent::ToggleMute],
        KeyCode::Char('s') => vec![InputEvent::ToggleSolo],

        // scenes, shift captures. some terminals send shift+f1 as f13
        KeyCode::F(n) => resolve_scene_key(n, key.modifiers),

        KeyCode::Char('[') => vec![InputEvent::AdjustBpm(-BPM_STEP)],
        KeyCode::Char(']') => vec![InputEvent::AdjustBpm(BPM_STEP)],
        KeyCode::Char('0') => vec![InputEvent::Rewind],
        KeyCode::Char('r') => vec![InputEvent::ReloadBank],

        _ => vec![],
    }
}

fn resolve_scene_key(n: u8, modifiers: KeyModifiers) -> Vec<InputEvent> {
    let scenes = NUM_SCENES as u8;
    match n {
        1..=8 if n <= scenes => {
            let scene = n - 1;
            if modifiers.contains(KeyModifiers::SHIFT) {
                vec![InputEvent::CaptureScene(scene)]
            } else {
                vec![InputEvent::LaunchScene(scene)]
            }
        }
        13..=20 if n - 12 <= scenes => vec![InputEvent::CaptureScene(n - 13)],
        _ => vec![],
    }
}
