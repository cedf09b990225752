mod ice_candidate_queue;
mod negotiation_engine;
pub(crate) mod remote_sdp;
mod rtc_engine;

pub use ice_candidate_queue::*;
pub use negotiation_engine::*;
pub use rtc_engine::*;
