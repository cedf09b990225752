use crate::error::SignalingError;
use crate::model::signaling::{IceCandidate, SdpType, SessionDescription};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outer body of `POST {room_url}/join/{room_id}`.
#[derive(Debug, Deserialize)]
pub struct JoinResponse {
    pub result: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Decoded `params` of a successful join.
#[derive(Debug, Deserialize)]
pub struct RoomParams {
    pub room_id: String,
    pub client_id: String,
    pub wss_url: String,
    pub wss_post_url: String,
    #[serde(deserialize_with = "bool_or_string")]
    pub is_initiator: bool,
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(default)]
    pub pc_config: Option<Value>,
    #[serde(default)]
    pub pc_constraints: Option<Value>,
    #[serde(default)]
    pub media_constraints: Option<Value>,
    #[serde(default)]
    pub turn_url: Option<String>,
}

/// Body of `GET {turn_url}`.
#[derive(Debug, Deserialize)]
pub struct TurnResponse {
    pub username: String,
    pub password: String,
    pub uris: Vec<String>,
}

/// Body of a room-history POST.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub result: String,
}

/// Frames this client writes to the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum RelayCommand {
    Register { roomid: String, clientid: String },
    Send { msg: String },
}

impl RelayCommand {
    pub fn to_json(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Frames the relay writes to us: `{msg}` or `{error}`.
#[derive(Debug, Default, Deserialize)]
pub struct RelayEnvelope {
    #[serde(default)]
    pub msg: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Negotiation payloads, carried either in room history or inside relay
/// `msg` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NegotiationMessage {
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Candidate {
        id: String,
        label: u16,
        candidate: String,
    },
    Bye,
    #[serde(other)]
    Unknown,
}

impl NegotiationMessage {
    pub fn to_json(&self) -> Result<String, SignalingError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&SessionDescription> for NegotiationMessage {
    fn from(desc: &SessionDescription) -> Self {
        match desc.sdp_type {
            SdpType::Offer => Self::Offer {
                sdp: desc.sdp.clone(),
            },
            SdpType::Answer => Self::Answer {
                sdp: desc.sdp.clone(),
            },
        }
    }
}

impl From<&IceCandidate> for NegotiationMessage {
    fn from(c: &IceCandidate) -> Self {
        Self::Candidate {
            id: c.id.clone(),
            label: c.sdp_m_line_index,
            candidate: c.candidate.clone(),
        }
    }
}

/// The room server nests JSON documents as strings; accept either a string
/// holding JSON or the inline value.
pub fn embedded_json<T: DeserializeOwned>(value: &Value) -> Result<T, SignalingError> {
    match value {
        Value::String(text) => Ok(serde_json::from_str(text)?),
        other => Ok(serde_json::from_value(other.clone())?),
    }
}

fn bool_or_string<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(de::Error::custom(format!("expected boolean, got {s:?}"))),
        },
        other => Err(de::Error::custom(format!("expected boolean, got {other}"))),
    }
}
