// A scene is a clip assignment for every slot. Launching one queues all of
// them, so the whole set changes together on the next bar.

use crate::audio::ClipIndex;
use crate::audio_api::{EngineSnapshot, UserIntent};
use crate::shared::{MAX_SLOTS, NUM_SCENES};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scene {
    pub slot_clips: [Option<ClipIndex>; MAX_SLOTS],
}

impl Default for Scene {
    fn default() -> Self {
        Self { slot_clips: [None; MAX_SLOTS] }
    }
}

impl Scene {
    pub fn is_empty(&self) -> bool {
        self.slot_clips.iter().all(Option::is_none)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SceneBank {
    scenes: [Scene; NUM_SCENES],
}

impl SceneBank {
    fn index(i: usize) -> usize {
        i.min(NUM_SCENES - 1)
    }

    pub fn get(&self, i: usize) -> &Scene {
        &self.scenes[Self::index(i)]
    }

    pub fn set(&mut self, i: usize, scene: Scene) {
        self.scenes[Self::index(i)] = scene;
    }

    pub fn clear_all(&mut self) {
        self.scenes = [Scene::default(); NUM_SCENES];
    }

    pub fn used(&self) -> [bool; NUM_SCENES] {
        std::array::from_fn(|i| !self.scenes[i].is_empty())
    }

    /// Stores the clips that are actually playing (not merely requested).
    pub fn capture(&mut self, i: usize, snapshot: &EngineSnapshot) {
        let mut scene = Scene::default();
        for (dst, slot) in scene.slot_clips.iter_mut().zip(snapshot.slots()) {
            *dst = slot.active;
        }
        self.set(i, scene);
    }

    /// One quantized start per assigned slot. Unassigned slots keep playing.
    pub fn launch_intents(&self, i: usize, num_slots: usize) -> Vec<UserIntent> {
        self.get(i)
            .slot_clips
            .iter()
            .take(num_slots)
            .enumerate()
            .filter_map(|(slot, clip)| clip.map(|c| UserIntent::RequestClipStart { slot, clip: Some(c) }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::SlotSnapshot;

    #[test]
    fn capture_then_launch_requests_active_clips() {
        let mut snapshot = EngineSnapshot { num_slots: 3, ..EngineSnapshot::default() };
        snapshot.slots[0] = SlotSnapshot { active: Some(4), ..SlotSnapshot::default() };
        snapshot.slots[2] = SlotSnapshot { active: Some(1), pending: Some(7), ..SlotSnapshot::default() };

        let mut bank = SceneBank::default();
        bank.capture(2, &snapshot);
        assert_eq!(bank.used(), [false, false, true, false, false, false, false, false]);

        let intents = bank.launch_intents(2, 3);
        assert_eq!(
            intents,
            vec![
                UserIntent::RequestClipStart { slot: 0, clip: Some(4) },
                UserIntent::RequestClipStart { slot: 2, clip: Some(1) },
            ]
        );
    }

    #[test]
    fn out_of_range_scene_clamps_to_last() {
        let mut bank = SceneBank::default();
        let mut scene = Scene::default();
        scene.slot_clips[0] = Some(9);
        bank.set(99, scene);
        assert_eq!(bank.get(NUM_SCENES - 1), &scene);
        bank.clear_all();
        assert!(bank.get(NUM_SCENES - 1).is_empty());
    }

    #[test]
    fn launch_ignores_slots_beyond_engine() {
        let mut bank = SceneBank::default();
        let mut scene = Scene::default();
        scene.slot_clips[5] = Some(1);
        bank.set(0, scene);
        assert!(bank.launch_intents(0, 4).is_empty());
    }
}
