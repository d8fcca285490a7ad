use crate::shared::NUM_SCENES;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

// one cell per scene, lit when something is stored in it
pub fn draw_scene_grid(frame: &mut Frame, area: Rect, scenes_used: &[bool; NUM_SCENES]) {
    let col_constraints = [Constraint::Ratio(1, NUM_SCENES as u32); NUM_SCENES];

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(col_constraints)
        .split(area);

    for (scene_idx, cell_area) in cols.iter().enumerate() {
        let color = if scenes_used[scene_idx] {
            Style::default().fg(Color::LightMagenta).bg(Color::Magenta)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("F{}", scene_idx + 1))
            .border_style(color)
            .style(color);
        frame.render_widget(block, *cell_area);
    }
}
