use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    New,
    Connected,
    Registered,
    Closed,
    Error,
}

impl ChannelState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Error)
    }
}

/// Notifications from the relay channel to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Inbound text frame, tagged with the channel state it arrived in.
    Message { state: ChannelState, payload: String },
    Closed,
    Error(String),
}

#[derive(Debug)]
pub(crate) enum ChannelCommand {
    Connect {
        ws_url: String,
        post_url: String,
    },
    Register {
        room_id: String,
        client_id: String,
    },
    Send(String),
    Disconnect {
        wait_for_close: bool,
        done: tokio::sync::oneshot::Sender<()>,
    },
}

/// Raised by the socket task, handled inside the channel actor.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    Opened(mpsc::UnboundedSender<Message>),
    Message(String),
    Closed,
    Error(String),
}
