use async_trait::async_trait;
use roomwire_core::{IceCandidate, SessionDescription, SignalingParameters};

/// Implemented by whatever sits above the coordinator (UI, CLI, tests).
/// Called from the coordinator task, one call at a time, so an implementation
/// must not wait on a coordinator request from inside a callback.
#[async_trait]
pub trait SignalingEvents: Send + Sync {
    async fn on_connected_to_room(&self, params: SignalingParameters);

    async fn on_remote_description(&self, sdp: SessionDescription);

    async fn on_remote_ice_candidate(&self, candidate: IceCandidate);

    async fn on_channel_closed(&self);

    async fn on_channel_error(&self, description: String);
}
