use super::negotiation_engine::{EngineEvent, EngineEventSender, NegotiationEngine};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use roomwire_core::{IceCandidate, SdpType, SessionDescription, SignalingParameters};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub audio: bool,
    pub video: bool,
    /// Used when the room hands out no ICE servers at all.
    pub fallback_stun: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
            fallback_stun: "stun:stun.l.google.com:19302".to_owned(),
        }
    }
}

/// [`NegotiationEngine`] backed by a webrtc-rs peer connection.
pub struct RtcEngine {
    config: EngineConfig,
    events: EngineEventSender,
    peer_connection: RwLock<Option<Arc<RTCPeerConnection>>>,
    both_set: AtomicBool,
}

impl RtcEngine {
    pub fn new(config: EngineConfig, events: EngineEventSender) -> Self {
        Self {
            config,
            events,
            peer_connection: RwLock::new(None),
            both_set: AtomicBool::new(false),
        }
    }

    async fn connection(&self) -> Result<Arc<RTCPeerConnection>> {
        self.peer_connection
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow!("Peer connection is not open"))
    }

    fn ice_servers(&self, params: &SignalingParameters) -> Vec<RTCIceServer> {
        if params.ice_servers.is_empty() {
            return vec![RTCIceServer {
                urls: vec![self.config.fallback_stun.clone()],
                ..Default::default()
            }];
        }

        params
            .ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: vec![s.uri.clone()],
                username: s.username.clone(),
                credential: s.credential.clone(),
            })
            .collect()
    }

    async fn set_local(&self, pc: &RTCPeerConnection, desc: RTCSessionDescription) -> Result<()> {
        let local = match desc.sdp_type {
            RTCSdpType::Offer => SessionDescription::offer(desc.sdp.clone()),
            _ => SessionDescription::answer(desc.sdp.clone()),
        };
        pc.set_local_description(desc)
            .await
            .context("Failed to set local description")?;
        debug!("Set local {} SDP", local.sdp_type);

        let _ = self.events.send(EngineEvent::LocalDescriptionReady(local));
        self.check_both_set(pc).await;
        Ok(())
    }

    async fn check_both_set(&self, pc: &RTCPeerConnection) {
        if pc.local_description().await.is_none() || pc.remote_description().await.is_none() {
            return;
        }
        if !self.both_set.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(EngineEvent::BothDescriptionsSet);
        }
    }
}

#[async_trait]
impl NegotiationEngine for RtcEngine {
    async fn open(&self, params: &SignalingParameters) -> Result<()> {
        self.close().await;

        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers(params),
            ..Default::default()
        };
        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        if self.config.audio {
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Audio, None)
                .await
                .context("Failed to add audio transceiver")?;
        }
        if self.config.video {
            peer_connection
                .add_transceiver_from_kind(RTPCodecType::Video, None)
                .await
                .context("Failed to add video transceiver")?;
        }

        let state_tx = self.events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    if s == RTCPeerConnectionState::Failed {
                        let _ = tx.send(EngineEvent::Error("ICE connection failed".to_owned()));
                    }
                })
            },
        ));

        let ice_tx = self.events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let _ = tx.send(EngineEvent::LocalIceCandidate(IceCandidate::new(
                    init.sdp_mid.unwrap_or_default(),
                    init.sdp_mline_index.unwrap_or(0),
                    init.candidate,
                )));
            })
        }));

        self.both_set.store(false, Ordering::SeqCst);
        *self.peer_connection.write().await = Some(peer_connection);
        info!("Peer connection created for room {}", params.room_id);
        Ok(())
    }

    async fn create_offer(&self) -> Result<()> {
        let pc = self.connection().await?;
        let offer = pc.create_offer(None).await.context("Failed to create offer")?;
        self.set_local(&pc, offer).await
    }

    async fn create_answer(&self) -> Result<()> {
        let pc = self.connection().await?;
        let answer = pc
            .create_answer(None)
            .await
            .context("Failed to create answer")?;
        self.set_local(&pc, answer).await
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let pc = self.connection().await?;
        let remote = match desc.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        };
        pc.set_remote_description(remote)
            .await
            .context("Failed to set remote description")?;
        debug!("Set remote {} SDP", desc.sdp_type);

        self.check_both_set(&pc).await;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let pc = self.connection().await?;
        pc.add_ice_candidate(RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: Some(candidate.id),
            sdp_mline_index: Some(candidate.sdp_m_line_index),
            ..Default::default()
        })
        .await
        .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) {
        let Some(pc) = self.peer_connection.write().await.take() else {
            return;
        };
        if let Err(e) = pc.close().await {
            error!("Failed to close peer connection: {:?}", e);
        }
    }
}
