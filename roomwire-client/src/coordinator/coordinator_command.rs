use crate::channel::ChannelEvent;
use roomwire_core::{
    IceCandidate, RoomConnectionParameters, SessionDescription, SignalingError,
    SignalingParameters,
};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    New,
    Connected,
    Closed,
    Error,
}

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SignalingError>>;

/// Requests from [`CoordinatorHandle`](super::CoordinatorHandle).
#[derive(Debug)]
pub(crate) enum CoordinatorCommand {
    ConnectToRoom {
        connection: RoomConnectionParameters,
        reply: Reply<()>,
    },
    SendOfferSdp {
        sdp: SessionDescription,
        reply: Reply<()>,
    },
    SendAnswerSdp {
        sdp: SessionDescription,
        reply: Reply<()>,
    },
    SendLocalIceCandidate(IceCandidate),
    DisconnectFromRoom {
        done: oneshot::Sender<()>,
    },
}

/// Results of work the coordinator spawned, posted back into its queue.
/// `attempt` identifies the connection attempt that started the work.
#[derive(Debug)]
pub(crate) enum Completion {
    RoomFetched {
        attempt: u64,
        connection: RoomConnectionParameters,
        result: Result<SignalingParameters, SignalingError>,
    },
    MessagePosted {
        attempt: u64,
        result: Result<(), SignalingError>,
    },
    Channel {
        attempt: u64,
        event: ChannelEvent,
    },
}
