mod message;
mod room;
mod signaling;

pub use message::{
    JoinResponse, MessageResponse, NegotiationMessage, RelayCommand, RelayEnvelope, RoomParams,
    TurnResponse, embedded_json,
};
pub use room::RoomConnectionParameters;
pub use signaling::{
    IceCandidate, IceServer, KeyValuePair, MediaConstraints, SdpType, SessionDescription,
    SignalingParameters,
};
