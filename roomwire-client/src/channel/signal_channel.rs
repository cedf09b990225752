use super::channel_event::{ChannelCommand, ChannelEvent, ChannelState, TransportEvent};
use super::ws_transport::spawn_ws_transport;
use crate::config::ClientConfig;
use crate::http::HttpClient;
use roomwire_core::{NegotiationMessage, RelayCommand};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

/// Cheap handle to a running [`SignalChannel`]. Every call is posted to the
/// channel task and handled there in arrival order.
#[derive(Clone)]
pub struct SignalChannelHandle {
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    state_rx: watch::Receiver<ChannelState>,
}

impl SignalChannelHandle {
    pub fn connect(&self, ws_url: impl Into<String>, post_url: impl Into<String>) {
        self.post(ChannelCommand::Connect {
            ws_url: ws_url.into(),
            post_url: post_url.into(),
        });
    }

    pub fn register(&self, room_id: impl Into<String>, client_id: impl Into<String>) {
        self.post(ChannelCommand::Register {
            room_id: room_id.into(),
            client_id: client_id.into(),
        });
    }

    pub fn send(&self, message: impl Into<String>) {
        self.post(ChannelCommand::Send(message.into()));
    }

    /// Resolves once the channel has handled the request, and with
    /// `wait_for_close` also once the socket is gone (bounded by
    /// `ClientConfig::close_timeout`).
    pub async fn disconnect(&self, wait_for_close: bool) {
        let (done, done_rx) = oneshot::channel();
        self.post(ChannelCommand::Disconnect {
            wait_for_close,
            done,
        });
        let _ = done_rx.await;
    }

    pub fn state(&self) -> ChannelState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    fn post(&self, command: ChannelCommand) {
        if self.command_tx.send(command).is_err() {
            warn!("Signal channel task is gone, dropping command");
        }
    }
}

/// Relay connection actor: owns the socket, the channel state and the send
/// queue.
pub struct SignalChannel {
    state: ChannelState,
    state_tx: watch::Sender<ChannelState>,
    http: HttpClient,
    close_timeout: Duration,
    post_url: Option<String>,
    room_id: Option<String>,
    client_id: Option<String>,
    send_queue: VecDeque<String>,
    writer: Option<mpsc::UnboundedSender<Message>>,
    transport: Option<JoinHandle<()>>,
    closed_rx: Option<watch::Receiver<bool>>,
    command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl SignalChannel {
    pub fn spawn(
        config: &ClientConfig,
        http: HttpClient,
        events_tx: mpsc::UnboundedSender<ChannelEvent>,
    ) -> SignalChannelHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (channel, state_rx) = Self::new(config, http, command_rx, events_tx);
        tokio::spawn(channel.run());

        SignalChannelHandle {
            command_tx,
            state_rx,
        }
    }

    fn new(
        config: &ClientConfig,
        http: HttpClient,
        command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        events_tx: mpsc::UnboundedSender<ChannelEvent>,
    ) -> (Self, watch::Receiver<ChannelState>) {
        let (state_tx, state_rx) = watch::channel(ChannelState::New);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        let channel = Self {
            state: ChannelState::New,
            state_tx,
            http,
            close_timeout: config.close_timeout,
            post_url: None,
            room_id: None,
            client_id: None,
            send_queue: VecDeque::new(),
            writer: None,
            transport: None,
            closed_rx: None,
            command_rx,
            transport_rx,
            transport_tx,
            events_tx,
        };
        (channel, state_rx)
    }

    async fn run(mut self) {
        debug!("Signal channel loop started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => break,
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt);
                }
            }
        }

        if let Some(transport) = self.transport.take() {
            transport.abort();
        }
        debug!("Signal channel loop finished");
    }

    async fn handle_command(&mut self, cmd: ChannelCommand) {
        match cmd {
            ChannelCommand::Connect { ws_url, post_url } => self.connect(ws_url, post_url),
            ChannelCommand::Register { room_id, client_id } => self.register(room_id, client_id),
            ChannelCommand::Send(message) => self.send(message),
            ChannelCommand::Disconnect {
                wait_for_close,
                done,
            } => {
                self.disconnect(wait_for_close).await;
                let _ = done.send(());
            }
        }
    }

    fn connect(&mut self, ws_url: String, post_url: String) {
        if self.state != ChannelState::New {
            error!("WebSocket is already connected.");
            return;
        }
        if let Err(e) = Url::parse(&ws_url) {
            self.fail(format!("Invalid WebSocket URL {ws_url}: {e}"));
            return;
        }

        self.post_url = Some(post_url);
        let (closed_tx, closed_rx) = watch::channel(false);
        self.closed_rx = Some(closed_rx);
        self.transport = Some(spawn_ws_transport(
            ws_url,
            self.transport_tx.clone(),
            closed_tx,
        ));
    }

    fn register(&mut self, room_id: String, client_id: String) {
        match self.state {
            ChannelState::New => {
                debug!("WebSocket register() before open, deferring");
                self.room_id = Some(room_id);
                self.client_id = Some(client_id);
            }
            ChannelState::Connected => {
                self.room_id = Some(room_id);
                self.client_id = Some(client_id);
                self.send_register();
            }
            _ => warn!("WebSocket register() in state {:?}", self.state),
        }
    }

    fn send_register(&mut self) {
        let (Some(room_id), Some(client_id)) = (self.room_id.clone(), self.client_id.clone())
        else {
            return;
        };
        info!(
            "Registering WebSocket for room {}. ClientID: {}",
            room_id, client_id
        );

        let register = RelayCommand::Register {
            roomid: room_id,
            clientid: client_id,
        };
        if !self.transmit(&register) {
            return;
        }
        self.set_state(ChannelState::Registered);

        let pending: Vec<String> = self.send_queue.drain(..).collect();
        for msg in pending {
            if !self.transmit(&RelayCommand::Send { msg }) {
                break;
            }
        }
    }

    fn send(&mut self, message: String) {
        match self.state {
            ChannelState::New | ChannelState::Connected => {
                debug!("WS ACC: {}", message);
                self.send_queue.push_back(message);
            }
            ChannelState::Registered => {
                self.transmit(&RelayCommand::Send { msg: message });
            }
            ChannelState::Closed | ChannelState::Error => {
                warn!("WebSocket send() in error or closed state : {}", message);
            }
        }
    }

    async fn disconnect(&mut self, wait_for_close: bool) {
        info!("Disconnect WebSocket. State: {:?}", self.state);

        if self.state == ChannelState::Registered {
            match NegotiationMessage::Bye.to_json() {
                Ok(bye) => {
                    self.transmit(&RelayCommand::Send { msg: bye });
                }
                Err(e) => error!("Failed to encode bye: {}", e),
            }
            self.set_state(ChannelState::Connected);
        }

        match self.state {
            ChannelState::Connected | ChannelState::Error => {
                if let Some(writer) = self.writer.take() {
                    let _ = writer.send(Message::Close(None));
                }
                self.set_state(ChannelState::Closed);
                self.delete_registration();

                if wait_for_close {
                    self.wait_for_close().await;
                }
            }
            ChannelState::New => {
                if let Some(transport) = self.transport.take() {
                    transport.abort();
                }
                self.set_state(ChannelState::Closed);
            }
            _ => {}
        }

        debug!("Disconnecting WebSocket done.");
    }

    async fn wait_for_close(&mut self) {
        let Some(closed_rx) = self.closed_rx.as_mut() else {
            return;
        };

        match tokio::time::timeout(self.close_timeout, closed_rx.wait_for(|closed| *closed)).await
        {
            Ok(_) => debug!("WebSocket close confirmed"),
            Err(_) => warn!(
                "WebSocket did not close within {:?}",
                self.close_timeout
            ),
        }
    }

    /// Best effort; the relay forgets us on socket close anyway.
    fn delete_registration(&self) {
        let (Some(post_url), Some(room_id), Some(client_id)) =
            (&self.post_url, &self.room_id, &self.client_id)
        else {
            return;
        };

        let url = format!(
            "{}/{}/{}",
            post_url.trim_end_matches('/'),
            room_id,
            client_id
        );
        let http = self.http.clone();
        tokio::spawn(async move {
            debug!("WS DELETE: {}", url);
            if let Err(e) = http.delete(&url).await {
                warn!("WS DELETE error: {}", e);
            }
        });
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened(writer) => {
                if self.state.is_terminal() {
                    let _ = writer.send(Message::Close(None));
                    return;
                }
                self.writer = Some(writer);
                self.set_state(ChannelState::Connected);

                if self.room_id.is_some() && self.client_id.is_some() {
                    self.send_register();
                }
            }

            TransportEvent::Message(payload) => {
                debug!("WSS->C: {}", payload);
                match self.state {
                    ChannelState::Connected | ChannelState::Registered => {
                        let _ = self.events_tx.send(ChannelEvent::Message {
                            state: self.state,
                            payload,
                        });
                    }
                    state => debug!("Dropping WebSocket message in state {:?}", state),
                }
            }

            TransportEvent::Closed => {
                info!("WebSocket connection closed. State: {:?}", self.state);
                self.writer = None;
                if !self.state.is_terminal() {
                    self.set_state(ChannelState::Closed);
                    let _ = self.events_tx.send(ChannelEvent::Closed);
                }
            }

            TransportEvent::Error(e) => self.fail(e),
        }
    }

    fn transmit(&mut self, command: &RelayCommand) -> bool {
        let text = match command.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode relay frame: {}", e);
                return false;
            }
        };
        debug!("C->WSS: {}", text);

        let Some(writer) = &self.writer else {
            error!("WebSocket is not open, dropping: {}", text);
            return false;
        };
        if writer.send(Message::text(text)).is_err() {
            self.fail("WebSocket send error: socket closed".to_owned());
            return false;
        }
        true
    }

    fn fail(&mut self, description: String) {
        error!("{}", description);
        self.writer = None;
        if !self.state.is_terminal() {
            self.set_state(ChannelState::Error);
            let _ = self.events_tx.send(ChannelEvent::Error(description));
        }
    }

    fn set_state(&mut self, state: ChannelState) {
        debug!("Channel state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
    }
}
