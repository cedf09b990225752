use thiserror::Error;

/// Every failure a signaling session can hit. `Display` is the description
/// handed to `on_channel_error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalingError {
    /// Connection failure or timeout talking to the room server or relay.
    #[error("{0}")]
    Network(String),

    #[error("Non-200 response ({status}) from {url}")]
    HttpStatus { status: u16, url: String },

    /// Malformed JSON, URL or SDP.
    #[error("{0}")]
    Parse(String),

    /// Out-of-sequence negotiation message or a room the server refused.
    #[error("{0}")]
    Protocol(String),

    /// Operation invoked in a state that does not allow it.
    #[error("{0}")]
    State(String),

    /// The negotiation engine rejected a call.
    #[error("{0}")]
    Engine(String),
}

impl SignalingError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Prefix the description, keeping the variant.
    pub fn context(self, prefix: &str) -> Self {
        match self {
            Self::Network(m) => Self::Network(format!("{prefix}: {m}")),
            Self::Parse(m) => Self::Parse(format!("{prefix}: {m}")),
            Self::Protocol(m) => Self::Protocol(format!("{prefix}: {m}")),
            Self::State(m) => Self::State(format!("{prefix}: {m}")),
            Self::Engine(m) => Self::Engine(format!("{prefix}: {m}")),
            other @ Self::HttpStatus { .. } => other,
        }
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(format!("JSON parsing error: {e}"))
    }
}
