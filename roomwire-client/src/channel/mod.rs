mod channel_event;
mod signal_channel;
mod ws_transport;

pub use channel_event::{ChannelEvent, ChannelState};
pub use signal_channel::*;
