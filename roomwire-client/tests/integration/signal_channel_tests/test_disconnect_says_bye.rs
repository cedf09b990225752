use roomwire_client::{ChannelState, ClientConfig, HttpClient, SignalChannel};
use serde_json::json;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{MockRoomServer, SIGNAL_TIMEOUT_MS, wait_until};

#[tokio::test]
async fn test_disconnect_sends_bye_and_deletes_registration() {
    init_tracing();

    let server = MockRoomServer::start().await;
    let config = ClientConfig::default();
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let channel = SignalChannel::spawn(&config, HttpClient::new(&config).unwrap(), events_tx);

    channel.connect(server.ws_url(), server.post_url());
    channel.register("room", "client");
    assert!(server.wait_for_registered("client", SIGNAL_TIMEOUT_MS).await);

    channel.disconnect(true).await;

    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(
        server
            .wait_for_relay_frames("client", 2, SIGNAL_TIMEOUT_MS)
            .await
    );
    assert_eq!(server.relayed_messages("client"), vec![json!({"type": "bye"})]);
    assert!(
        wait_until(SIGNAL_TIMEOUT_MS, || server.delete_count("room", "client") == 1).await,
        "registration was not deleted"
    );
    assert!(
        wait_until(SIGNAL_TIMEOUT_MS, || !server.is_registered("client")).await,
        "relay socket stayed open"
    );
}

#[tokio::test]
async fn test_disconnect_before_open_closes_quietly() {
    init_tracing();

    let config = ClientConfig::default();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let channel = SignalChannel::spawn(&config, HttpClient::new(&config).unwrap(), events_tx);

    channel.disconnect(true).await;

    assert_eq!(channel.state(), ChannelState::Closed);
    assert!(events_rx.try_recv().is_err());
}
