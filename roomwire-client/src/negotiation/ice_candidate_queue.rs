use roomwire_core::IceCandidate;
use tracing::debug;

/// Holds remote candidates back until both descriptions are set, then hands
/// them over once, in arrival order.
#[derive(Debug)]
pub struct IceCandidateQueue {
    queued: Option<Vec<IceCandidate>>,
}

impl IceCandidateQueue {
    pub fn new() -> Self {
        Self {
            queued: Some(Vec::new()),
        }
    }

    /// Returns the candidate back if it may be applied right away.
    pub fn push(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        match &mut self.queued {
            Some(queue) => {
                debug!("Queueing remote candidate {}", candidate.candidate);
                queue.push(candidate);
                None
            }
            None => Some(candidate),
        }
    }

    pub fn mark_descriptions_set(&mut self) -> Vec<IceCandidate> {
        let drained = self.queued.take().unwrap_or_default();
        if !drained.is_empty() {
            debug!("Add {} remote candidates", drained.len());
        }
        drained
    }

    /// Candidates still held back.
    pub(crate) fn pending(&self) -> usize {
        self.queued.as_ref().map_or(0, Vec::len)
    }
}

impl Default for IceCandidateQueue {
    fn default() -> Self {
        Self::new()
    }
}
