use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub uri: String,
    pub username: String,
    pub credential: String,
}

impl IceServer {
    pub fn new(
        uri: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            username: username.into(),
            credential: credential.into(),
        }
    }

    pub fn is_turn(&self) -> bool {
        self.uri.starts_with("turn:")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpType::Offer => write!(f, "offer"),
            SdpType::Answer => write!(f, "answer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Media stream identification (`sdpMid`).
    pub id: String,
    pub sdp_m_line_index: u16,
    pub candidate: String,
}

impl IceCandidate {
    pub fn new(id: impl Into<String>, sdp_m_line_index: u16, candidate: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sdp_m_line_index,
            candidate: candidate.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

/// getUserMedia-style constraints: mandatory key/values plus an ordered
/// optional list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub mandatory: Vec<KeyValuePair>,
    pub optional: Vec<KeyValuePair>,
}

/// Everything the room server told us on join. Consumed once by the
/// coordinator.
///
/// `offer_sdp` and `ice_candidates` are only ever populated for the
/// non-initiating side, from the room's message history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingParameters {
    pub ice_servers: Vec<IceServer>,
    pub initiator: bool,
    pub pc_constraints: Option<MediaConstraints>,
    pub video_constraints: Option<MediaConstraints>,
    pub audio_constraints: Option<MediaConstraints>,
    pub room_id: String,
    pub client_id: String,
    pub wss_url: String,
    pub wss_post_url: String,
    pub offer_sdp: Option<SessionDescription>,
    pub ice_candidates: Option<Vec<IceCandidate>>,
}
