use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use barloop::audio::{self, AudioHandle};
use barloop::audio_api::AudioCommand;
use barloop::loader::ClipLoader;
use barloop::middle::Controller;
use barloop::pipeline::config::{self, LooperConfig, BARLOOP_DIR};
use barloop::pipeline::persistence;
use barloop::shared::InputEvent;
use barloop::tui;

const LOG_FILE: &str = "barloop.log";

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// The terminal belongs to the TUI, so logs go to <project_dir>/.barloop/barloop.log.
// RUST_LOG picks the level as usual.
fn init_logging(project_dir: &Path) {
    let dir = project_dir.join(BARLOOP_DIR);
    let file = std::fs::create_dir_all(&dir)
        .and_then(|_| std::fs::File::create(dir.join(LOG_FILE)));
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

fn run() -> anyhow::Result<()> {
    let project_dir: PathBuf = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("no working directory")?,
    };
    init_logging(&project_dir);

    let config = config::load_or_create(&project_dir)?;
    log::info!("starting with {} slots, project {}", config.num_slots, project_dir.display());
    let audio = audio::start_audio(&config)?;

    let loader = ClipLoader::new(audio.sample_rate(), config.default_loop_bars);
    let mut controller = Controller::new(config.num_slots, config.bpm);
    reload_bank(&loader, &config, &project_dir, &audio, &mut controller);

    if let Some(session) = persistence::load_session(&project_dir) {
        for cmd in controller.restore_session(&session) {
            audio.send(cmd);
        }
    }

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        if let Some(snapshot) = audio.poll_snapshot() {
            controller.on_snapshot(snapshot);
        }
        audio.collect_retired();

        let ds = controller.display_state();
        term.draw(|frame| {
            let area = frame.area();
            tui::view::render(frame, area, &ds, blink_on);
        })?;

        for event in tui::input::poll_input(tick_rate)? {
            match event {
                InputEvent::Quit => {
                    // save before quitting
                    if let Err(e) = persistence::save_session(&project_dir, &controller.session_state()) {
                        log::error!("failed to save session: {e:#}");
                    }
                    drop(term);
                    drop(audio);
                    return Ok(());
                }
                InputEvent::ReloadBank => {
                    reload_bank(&loader, &config, &project_dir, &audio, &mut controller);
                }
                other => {
                    for cmd in controller.handle_input(other) {
                        audio.send(cmd);
                    }
                }
            }
        }
    }
}

// Decoding happens here on the control thread; the engine only ever sees a
// finished bank.
fn reload_bank(
    loader: &ClipLoader,
    config: &LooperConfig,
    project_dir: &Path,
    audio: &AudioHandle,
    controller: &mut Controller,
) {
    let dir = config.clips_dir(project_dir);
    match loader.load_bank(&dir) {
        Ok(bank) => {
            let generation = controller.set_clip_names(bank.names());
            audio.send(AudioCommand::ReplaceBank(bank.with_generation(generation)));
        }
        Err(e) => log::warn!("could not load clips: {e}"),
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
