use super::clip_bank::ClipIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartRequest {
    pub slot: usize,
    pub clip: Option<ClipIndex>, // validated against the bank at commit time
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    // Queue was full; an older request for the same slot was dropped to make
    // room. The result after flushing is identical.
    Coalesced,
    // Queue was full and nothing could be dropped safely.
    Rejected,
}

/// Deferred-apply FIFO. It has no idea what a bar is; the engine decides
/// when to flush. Storage is reserved up front and never grows, so neither
/// side allocates on the audio thread.
#[derive(Debug)]
pub struct QuantizedScheduler {
    pending: Vec<StartRequest>,
    capacity: usize,
}

impl QuantizedScheduler {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, request: StartRequest) -> EnqueueOutcome {
        if self.pending.len() < self.capacity {
            self.pending.push(request);
            return EnqueueOutcome::Queued;
        }
        // Last write wins per slot, so the oldest same-slot entry is dead weight.
        match self.pending.iter().position(|r| r.slot == request.slot) {
            Some(stale) => {
                self.pending.remove(stale);
                self.pending.push(request);
                EnqueueOutcome::Coalesced
            }
            None => EnqueueOutcome::Rejected,
        }
    }

    // enqueue order
    pub fn flush<F: FnMut(&StartRequest)>(&mut self, mut apply: F) {
        for request in self.pending.drain(..) {
            apply(&request);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_for(&self, slot: usize) -> Option<Option<ClipIndex>> {
        self.pending.iter().rev().find(|r| r.slot == slot).map(|r| r.clip)
    }
}
