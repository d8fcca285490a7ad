use std::sync::Arc;

use super::clip::Clip;

// Position of a clip in the bank. `None` wherever an index is optional
// means "no clip".
pub type ClipIndex = usize;

/// The ordered clip collection shared read-only by every slot. Slots only
/// ever hold indices into it and must look clips up again on each use, since
/// the bank can be replaced between callbacks.
#[derive(Clone, Debug, Default)]
pub struct ClipBank {
    clips: Vec<Clip>,
    generation: u64, // stamped by the control thread, echoed in snapshots
}

impl ClipBank {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self { clips, generation: 0 }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, index: ClipIndex) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn resolve(&self, index: Option<ClipIndex>) -> Option<&Clip> {
        index.and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clip> {
        self.clips.iter()
    }

    pub fn names(&self) -> Vec<Arc<str>> {
        self.clips.iter().map(Clip::shared_name).collect()
    }
}
