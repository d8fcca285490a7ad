// Called on startup and quit; remembers what each slot was playing so a
// session comes back the way it was left.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::config::BARLOOP_DIR;
use crate::pipeline::scenes::{Scene, SceneBank};
use crate::shared::NUM_SCENES;

const SESSION_FILE: &str = "session.json";

// Clips are stored by name, not index, so adding files to the clip directory
// doesn't scramble the session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotSession {
    pub clip: Option<String>,
    pub mute: bool,
    pub solo: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub slots: Vec<SlotSession>,
    pub scenes: Vec<Vec<Option<String>>>,
    pub bpm: Option<f64>,
}

impl SessionState {
    pub fn scenes_to_names(scenes: &SceneBank, names: &[Arc<str>], num_slots: usize) -> Vec<Vec<Option<String>>> {
        (0..NUM_SCENES)
            .map(|i| {
                scenes.get(i).slot_clips
                    .iter()
                    .take(num_slots)
                    .map(|c| c.and_then(|i| names.get(i)).map(|n| n.to_string()))
                    .collect()
            })
            .collect()
    }

    /// Rebuilds scenes against the current bank's clip names. Names that no
    /// longer exist are dropped.
    pub fn scenes_from_names(&self, names: &[Arc<str>]) -> SceneBank {
        let mut scenes = SceneBank::default();
        for (i, saved) in self.scenes.iter().take(NUM_SCENES).enumerate() {
            let mut scene = Scene::default();
            for (dst, name) in scene.slot_clips.iter_mut().zip(saved) {
                *dst = name.as_deref().and_then(|n| clip_position(names, n));
            }
            scenes.set(i, scene);
        }
        scenes
    }
}

pub fn clip_position(names: &[Arc<str>], name: &str) -> Option<usize> {
    names.iter().position(|n| &**n == name)
}

// <project_dir>/.barloop/session.json
fn session_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(BARLOOP_DIR).join(SESSION_FILE)
}

pub fn load_session(project_dir: &Path) -> Option<SessionState> {
    let path = session_file_path(project_dir);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(state) => Some(state),
        Err(e) => {
            log::warn!("ignoring unreadable session {}: {e}", path.display());
            None
        }
    }
}

// Save the session to disk, making the files if they don't exist already
pub fn save_session(project_dir: &Path, state: &SessionState) -> anyhow::Result<()> {
    let path = session_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?; // create .barloop/ if needed
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(&path, json)?;
    Ok(())
}
