pub mod channel;
pub mod config;
pub mod coordinator;
pub mod http;
pub mod negotiation;
pub mod room;

pub use channel::{ChannelEvent, ChannelState, SignalChannel, SignalChannelHandle};
pub use config::{ClientConfig, CodecPreferences};
pub use coordinator::{CoordinatorHandle, NegotiationCoordinator, RoomState, SignalingEvents};
pub use http::HttpClient;
pub use negotiation::{
    EngineConfig, EngineEvent, EngineEventReceiver, EngineEventSender, IceCandidateQueue,
    NegotiationEngine, RtcEngine, engine_event_channel,
};
pub use room::RoomClient;
