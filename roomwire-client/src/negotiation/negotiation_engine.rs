use async_trait::async_trait;
use roomwire_core::{IceCandidate, SessionDescription, SignalingParameters};
use tokio::sync::mpsc;

/// What the engine reports back. Posted into the coordinator's queue, never
/// handled on the engine's own callback thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    LocalDescriptionReady(SessionDescription),
    LocalIceCandidate(IceCandidate),
    BothDescriptionsSet,
    Error(String),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// The peer-connection side of negotiation. Results of `create_*` arrive
/// later as [`EngineEvent`]s.
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    /// Prepare a peer connection for a freshly joined room.
    async fn open(&self, _params: &SignalingParameters) -> anyhow::Result<()> {
        Ok(())
    }

    async fn create_offer(&self) -> anyhow::Result<()>;

    async fn create_answer(&self) -> anyhow::Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> anyhow::Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> anyhow::Result<()>;

    async fn close(&self) {}
}
