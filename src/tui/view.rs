use crate::shared::{DisplayState, SlotView};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::grid::draw_scene_grid;

const PROGRESS_WIDTH: usize = 16;
const HELP: &str = "1-8/tab slot  j/k browse  enter launch  x stop  m mute  s solo  \
                    F1-8 scene  shift+F capture  space play  [ ] bpm  0 rewind  r reload  esc quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport
            Constraint::Min(4), // slots
            Constraint::Length(3), // scenes
            Constraint::Length(3), // status + help
        ])
        .split(area);

    draw_transport(frame, sections[0], state);
    draw_slots(frame, sections[1], state, blink_on);
    draw_scene_grid(frame, sections[2], &state.scenes_used);
    draw_status(frame, sections[3], state);
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let (label, color) = if state.playing { ("PLAY", Color::Green) } else { ("STOP", Color::DarkGray) };
    let line = Line::from(vec![
        Span::styled(format!(" {label} "), Style::default().fg(Color::Black).bg(color)),
        Span::raw(format!(
            "  {:.1} bpm  {}/{}  bar {} beat {}",
            state.bpm, state.numerator, state.denominator, state.bar, state.beat
        )),
    ]);
    let block = Block::default().borders(Borders::ALL).title("barloop");
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_slots(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
    let mut lines: Vec<Line> = state
        .slots
        .iter()
        .enumerate()
        .map(|(i, slot)| slot_line(i, slot, i == state.selected_slot, blink_on))
        .collect();

    let browse = match state.browse_clip {
        Some(i) => format!("browse [{}/{}] {}", i + 1, state.clip_count, state.browse_name),
        None if state.clip_count == 0 => "no clips loaded".to_string(),
        None => format!("browse [-/{}]", state.clip_count),
    };
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(browse, Style::default().fg(Color::Cyan))));

    let block = Block::default().borders(Borders::ALL).title("slots");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn slot_line(index: usize, slot: &SlotView, selected: bool, blink_on: bool) -> Line<'static> {
    let marker = if selected { ">" } else { " " };
    let name_style = if slot.audible {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let name = if slot.active_name.is_empty() { "--".to_string() } else { slot.active_name.clone() };

    let mut spans = vec![
        Span::raw(format!("{marker}{:>2} ", index + 1)),
        Span::styled(if slot.mute { "M" } else { "." }, Style::default().fg(Color::Yellow)),
        Span::styled(if slot.solo { "S" } else { "." }, Style::default().fg(Color::LightBlue)),
        Span::raw(format!(" {} ", progress_bar(slot.progress))),
        Span::styled(format!("{name:<20}"), name_style),
    ];
    if slot.waiting {
        // pending clips blink until the bar line takes them
        let style = if blink_on {
            Style::default().fg(Color::LightMagenta)
        } else {
            Style::default().fg(Color::Magenta)
        };
        let pending = if slot.pending_name.is_empty() { "stop" } else { slot.pending_name.as_str() };
        spans.push(Span::styled(format!(" -> {pending}"), style));
    }
    Line::from(spans)
}

fn progress_bar(progress: f32) -> String {
    let filled = ((progress.clamp(0.0, 1.0) * PROGRESS_WIDTH as f32) as usize).min(PROGRESS_WIDTH);
    format!("{}{}", "#".repeat(filled), "-".repeat(PROGRESS_WIDTH - filled))
}

fn draw_status(frame: &mut Frame, area: Rect, state: &DisplayState) {
    let lines = vec![
        Line::from(state.status_text.clone()),
        Line::from(Span::styled(HELP, Style::default().fg(Color::DarkGray))),
    ];
    let block = Block::default().borders(Borders::TOP);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
