mod coordinator_command;
mod negotiation_coordinator;
mod signaling_events;

pub use coordinator_command::RoomState;
pub use negotiation_coordinator::*;
pub use signaling_events::*;
