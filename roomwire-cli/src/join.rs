use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::*;
use roomwire::client::{
    ClientConfig, CodecPreferences, EngineConfig, NegotiationCoordinator, RtcEngine,
    SignalingEvents, engine_event_channel,
};
use roomwire::model::{IceCandidate, RoomConnectionParameters, SessionDescription, SignalingParameters};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Prints every signaling callback; closure and errors end the session.
struct EventPrinter {
    done_tx: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl SignalingEvents for EventPrinter {
    async fn on_connected_to_room(&self, params: SignalingParameters) {
        println!(
            "{} room {} as {} ({})",
            "✅ Joined".green().bold(),
            params.room_id.bold(),
            params.client_id,
            if params.initiator { "initiator" } else { "receiver" }
        );
        for server in &params.ice_servers {
            println!("   🧊 {}", server.uri);
        }
    }

    async fn on_remote_description(&self, sdp: SessionDescription) {
        println!(
            "{} {:?} ({} bytes)",
            "📨 Remote description".cyan(),
            sdp.sdp_type,
            sdp.sdp.len()
        );
    }

    async fn on_remote_ice_candidate(&self, candidate: IceCandidate) {
        println!(
            "{} [{}:{}] {}",
            "🧊 Remote candidate".cyan(),
            candidate.id,
            candidate.sdp_m_line_index,
            candidate.candidate
        );
    }

    async fn on_channel_closed(&self) {
        println!("{}", "👋 Channel closed".yellow());
        let _ = self.done_tx.send(());
    }

    async fn on_channel_error(&self, description: String) {
        println!("{} {}", "❌ Error:".red().bold(), description);
        let _ = self.done_tx.send(());
    }
}

pub async fn run(
    room_url: String,
    room_id: String,
    loopback: bool,
    codecs: CodecPreferences,
) -> Result<()> {
    println!("{}", "🚀 Connecting...".green().bold());

    let config = ClientConfig {
        codecs,
        ..Default::default()
    };
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let (engine_tx, engine_rx) = engine_event_channel();
    let engine = Arc::new(RtcEngine::new(EngineConfig::default(), engine_tx));

    let coordinator = NegotiationCoordinator::spawn(
        config,
        Arc::new(EventPrinter { done_tx }),
        engine,
        engine_rx,
    )
    .context("Failed to start coordinator")?;

    coordinator
        .connect_to_room(RoomConnectionParameters::new(room_url, room_id, loopback))
        .await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        _ = done_rx.recv() => {}
    }

    coordinator.disconnect_from_room().await;
    println!("{}", "✨ Disconnected".green().bold());
    Ok(())
}
