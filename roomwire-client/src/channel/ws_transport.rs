use super::channel_event::TransportEvent;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Open the relay socket and pump it until it closes.
///
/// `closed_tx` flips to `true` once the socket is gone for good, whatever the
/// reason; `disconnect(wait_for_close)` waits on it.
pub(crate) fn spawn_ws_transport(
    ws_url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    closed_tx: watch::Sender<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Connecting WebSocket to: {}", ws_url);

        let ws_stream = match connect_async(ws_url.as_str()).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                let _ = events.send(TransportEvent::Error(format!(
                    "WebSocket connection error: {e}"
                )));
                closed_tx.send_replace(true);
                return;
            }
        };
        info!("WebSocket connection opened to: {}", ws_url);

        let (mut sender, mut receiver) = ws_stream.split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Message>();

        // mpsc -> websocket sink
        let send_task = tokio::spawn(async move {
            while let Some(msg) = writer_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sender.send(msg).await {
                    warn!("WebSocket write failed: {:?}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let _ = events.send(TransportEvent::Opened(writer_tx));

        let mut failure = None;
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                }
                Ok(Message::Close(frame)) => {
                    debug!("WebSocket close frame: {:?}", frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    failure = Some(format!("WebSocket read error: {e}"));
                    break;
                }
            }
        }

        let event = match failure {
            Some(e) => TransportEvent::Error(e),
            None => TransportEvent::Closed,
        };
        let _ = events.send(event);
        closed_tx.send_replace(true);

        send_task.abort();
        info!("WebSocket connection closed: {}", ws_url);
    })
}
