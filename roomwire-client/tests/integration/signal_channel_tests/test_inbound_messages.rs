use roomwire_client::{ChannelEvent, ChannelState, ClientConfig, HttpClient, SignalChannel};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{MockRoomServer, QUIET_PERIOD_MS, SIGNAL_TIMEOUT_MS};

#[tokio::test]
async fn test_relay_message_is_delivered_while_registered() {
    init_tracing();

    let server = MockRoomServer::start().await;
    let config = ClientConfig::default();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let channel = SignalChannel::spawn(&config, HttpClient::new(&config).unwrap(), events_tx);

    channel.connect(server.ws_url(), server.post_url());
    channel.register("room", "client");
    assert!(server.wait_for_registered("client", SIGNAL_TIMEOUT_MS).await);

    assert!(server.push_relay_frame("client", r#"{"msg":"hello","error":""}"#));

    let event = tokio::time::timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), events_rx.recv())
        .await
        .expect("no message delivered")
        .expect("channel event stream closed");
    assert_eq!(
        event,
        ChannelEvent::Message {
            state: ChannelState::Registered,
            payload: r#"{"msg":"hello","error":""}"#.to_owned(),
        }
    );

    channel.disconnect(true).await;
}

#[tokio::test]
async fn test_nothing_is_delivered_after_disconnect() {
    init_tracing();

    let server = MockRoomServer::start().await;
    let config = ClientConfig::default();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let channel = SignalChannel::spawn(&config, HttpClient::new(&config).unwrap(), events_tx);

    channel.connect(server.ws_url(), server.post_url());
    channel.register("room", "client");
    assert!(server.wait_for_registered("client", SIGNAL_TIMEOUT_MS).await);

    channel.disconnect(true).await;
    assert_eq!(channel.state(), ChannelState::Closed);

    // The relay may still hold the sender for a moment; whatever it pushes
    // now must not surface.
    server.push_relay_frame("client", r#"{"msg":"late","error":""}"#);
    channel.send("also dropped");

    let event = tokio::time::timeout(Duration::from_millis(QUIET_PERIOD_MS), events_rx.recv()).await;
    assert!(
        !matches!(event, Ok(Some(ChannelEvent::Message { .. }))),
        "unexpected event after close: {event:?}"
    );
}
