use roomwire_core::{
    IceCandidate, IceServer, JoinResponse, KeyValuePair, MediaConstraints, NegotiationMessage,
    RoomParams, SessionDescription, SignalingError, SignalingParameters, TurnResponse,
    embedded_json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

#[derive(Deserialize)]
struct PcConfig {
    #[serde(rename = "iceServers", default)]
    ice_servers: Vec<PcIceServer>,
}

#[derive(Deserialize)]
struct PcIceServer {
    urls: Urls,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    credential: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Urls {
    One(String),
    Many(Vec<String>),
}

/// A decoded join: everything but the TURN servers, which may need a second
/// request to `turn_url`.
#[derive(Debug)]
pub(crate) struct JoinedRoom {
    pub params: SignalingParameters,
    pub turn_url: Option<String>,
}

pub(crate) fn decode_join_response(body: &str) -> Result<JoinedRoom, SignalingError> {
    let response: JoinResponse = serde_json::from_str(body)?;
    if response.result != "SUCCESS" {
        return Err(SignalingError::protocol(format!(
            "Room response error: {}",
            response.result
        )));
    }
    let Some(params) = response.params else {
        return Err(SignalingError::parse("Room response has no params"));
    };
    let room: RoomParams = embedded_json(&params)?;

    let (offer_sdp, ice_candidates) = if room.is_initiator {
        (None, None)
    } else {
        let (offer, candidates) = decode_history(room.messages.as_ref())?;
        (offer, Some(candidates))
    };

    debug!("RoomId: {}. ClientId: {}", room.room_id, room.client_id);
    debug!("Initiator: {}", room.is_initiator);
    debug!("WSS url: {}", room.wss_url);
    debug!("WSS POST url: {}", room.wss_post_url);

    let ice_servers = match &room.pc_config {
        Some(pc_config) => ice_servers_from_pc_config(pc_config)?,
        None => Vec::new(),
    };

    let pc_constraints = room
        .pc_constraints
        .as_ref()
        .map(|v| embedded_json::<Value>(v).and_then(|v| constraints_from_json(&v)))
        .transpose()?;

    let (video_constraints, audio_constraints) = match &room.media_constraints {
        Some(media) => {
            let media: Value = embedded_json(media)?;
            (
                track_constraints(&media, "video")?,
                track_constraints(&media, "audio")?,
            )
        }
        None => (None, None),
    };

    Ok(JoinedRoom {
        params: SignalingParameters {
            ice_servers,
            initiator: room.is_initiator,
            pc_constraints,
            video_constraints,
            audio_constraints,
            room_id: room.room_id,
            client_id: room.client_id,
            wss_url: room.wss_url,
            wss_post_url: room.wss_post_url,
            offer_sdp,
            ice_candidates,
        },
        turn_url: room.turn_url,
    })
}

/// Replay the room's message history. The last offer wins; candidates keep
/// their order; anything else is skipped.
fn decode_history(
    messages: Option<&Value>,
) -> Result<(Option<SessionDescription>, Vec<IceCandidate>), SignalingError> {
    let mut offer = None;
    let mut candidates = Vec::new();

    let Some(messages) = messages else {
        return Ok((offer, candidates));
    };
    let messages: Vec<Value> = embedded_json(messages)?;

    for (i, message) in messages.iter().enumerate() {
        debug!("ROOM->C #{}: {}", i, message);
        match embedded_json::<NegotiationMessage>(message)? {
            NegotiationMessage::Offer { sdp } => offer = Some(SessionDescription::offer(sdp)),
            NegotiationMessage::Candidate {
                id,
                label,
                candidate,
            } => candidates.push(IceCandidate::new(id, label, candidate)),
            _ => error!("Unknown message: {}", message),
        }
    }

    Ok((offer, candidates))
}

fn ice_servers_from_pc_config(pc_config: &Value) -> Result<Vec<IceServer>, SignalingError> {
    let config: PcConfig = embedded_json(pc_config)?;

    let mut servers = Vec::new();
    for server in config.ice_servers {
        let urls = match server.urls {
            Urls::One(url) => vec![url],
            Urls::Many(urls) => urls,
        };
        let username = server.username.unwrap_or_default();
        let credential = server.credential.unwrap_or_default();
        for url in urls {
            servers.push(IceServer::new(url, username.clone(), credential.clone()));
        }
    }
    Ok(servers)
}

pub(crate) fn turn_servers_from_response(body: &str) -> Result<Vec<IceServer>, SignalingError> {
    let response: TurnResponse = serde_json::from_str(body)?;
    Ok(response
        .uris
        .into_iter()
        .map(|uri| IceServer::new(uri, response.username.clone(), response.password.clone()))
        .collect())
}

/// `audio`/`video` may be absent, a boolean, or a constraints object.
fn track_constraints(
    media: &Value,
    kind: &str,
) -> Result<Option<MediaConstraints>, SignalingError> {
    match media.get(kind) {
        None | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(MediaConstraints::default())),
        Some(value @ Value::Object(_)) => constraints_from_json(value).map(Some),
        Some(other) => Err(SignalingError::parse(format!(
            "Invalid {kind} media constraints: {other}"
        ))),
    }
}

fn constraints_from_json(json: &Value) -> Result<MediaConstraints, SignalingError> {
    let mut constraints = MediaConstraints::default();

    if let Some(mandatory) = json.get("mandatory").and_then(Value::as_object) {
        for (key, value) in mandatory {
            constraints.mandatory.push(KeyValuePair {
                key: key.clone(),
                value: json_scalar(value),
            });
        }
    }

    if let Some(optional) = json.get("optional").and_then(Value::as_array) {
        for entry in optional {
            let Some((key, value)) = entry.as_object().and_then(|o| o.iter().next()) else {
                return Err(SignalingError::parse(format!(
                    "Invalid optional constraint: {entry}"
                )));
            };
            constraints.optional.push(KeyValuePair {
                key: key.clone(),
                value: json_scalar(value),
            });
        }
    }

    Ok(constraints)
}

fn json_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
