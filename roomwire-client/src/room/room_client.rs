use super::room_response::{decode_join_response, turn_servers_from_response};
use crate::config::ClientConfig;
use crate::http::HttpClient;
use roomwire_core::{IceServer, SignalingError, SignalingParameters};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One-shot room join. Each `fetch` resolves exactly once, with either the
/// decoded parameters or the first failure it hit.
#[derive(Clone)]
pub struct RoomClient {
    http: HttpClient,
    turn_timeout: Duration,
}

impl RoomClient {
    pub fn new(http: HttpClient, config: &ClientConfig) -> Self {
        Self {
            http,
            turn_timeout: config.turn_timeout,
        }
    }

    pub async fn fetch(
        &self,
        join_url: &str,
        join_message: Option<String>,
    ) -> Result<SignalingParameters, SignalingError> {
        info!("Connecting to room: {}", join_url);

        let body = self
            .http
            .post(join_url, join_message)
            .await
            .map_err(|e| e.context("Room connection error"))?;
        debug!("Room response: {}", body);

        let joined = decode_join_response(&body)?;
        let mut params = joined.params;

        if !params.ice_servers.iter().any(IceServer::is_turn) {
            match joined.turn_url {
                Some(turn_url) => {
                    let turn_servers = self.request_turn_servers(&turn_url).await?;
                    params.ice_servers.extend(turn_servers);
                }
                None => warn!("Room has no TURN server and no turn_url"),
            }
        }

        if !params.initiator && params.offer_sdp.is_none() {
            warn!("No offer SDP in room response.");
        }

        Ok(params)
    }

    async fn request_turn_servers(&self, url: &str) -> Result<Vec<IceServer>, SignalingError> {
        debug!("Request TURN from: {}", url);
        let body = self.http.get(url, self.turn_timeout).await?;
        let servers = turn_servers_from_response(&body)?;
        debug!("TURN servers: {:?}", servers);
        Ok(servers)
    }
}
