use super::coordinator_command::{Completion, CoordinatorCommand, RoomState};
use super::signaling_events::SignalingEvents;
use crate::channel::{ChannelEvent, ChannelState, SignalChannel, SignalChannelHandle};
use crate::config::ClientConfig;
use crate::http::HttpClient;
use crate::negotiation::remote_sdp::rewrite_remote_description;
use crate::negotiation::{EngineEvent, EngineEventReceiver, IceCandidateQueue, NegotiationEngine};
use crate::room::RoomClient;
use roomwire_core::{
    IceCandidate, MessageResponse, NegotiationMessage, RelayEnvelope, RoomConnectionParameters,
    SdpType, SessionDescription, SignalingError, SignalingParameters, embedded_json,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Handle to a running [`NegotiationCoordinator`].
#[derive(Clone)]
pub struct CoordinatorHandle {
    command_tx: mpsc::UnboundedSender<CoordinatorCommand>,
    state_rx: watch::Receiver<RoomState>,
}

impl CoordinatorHandle {
    /// Starts a join. The outcome arrives through [`SignalingEvents`]; only a
    /// request the coordinator refuses outright is returned here.
    pub async fn connect_to_room(
        &self,
        connection: RoomConnectionParameters,
    ) -> Result<(), SignalingError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(CoordinatorCommand::ConnectToRoom { connection, reply }, reply_rx)
            .await
    }

    pub async fn send_offer_sdp(&self, sdp: SessionDescription) -> Result<(), SignalingError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(CoordinatorCommand::SendOfferSdp { sdp, reply }, reply_rx)
            .await
    }

    pub async fn send_answer_sdp(&self, sdp: SessionDescription) -> Result<(), SignalingError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(CoordinatorCommand::SendAnswerSdp { sdp, reply }, reply_rx)
            .await
    }

    pub fn send_local_ice_candidate(&self, candidate: IceCandidate) {
        if self
            .command_tx
            .send(CoordinatorCommand::SendLocalIceCandidate(candidate))
            .is_err()
        {
            warn!("Coordinator is gone, dropping local ICE candidate");
        }
    }

    /// Returns once the relay channel is torn down.
    pub async fn disconnect_from_room(&self) {
        let (done, done_rx) = oneshot::channel();
        if self
            .command_tx
            .send(CoordinatorCommand::DisconnectFromRoom { done })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }

    pub fn state(&self) -> RoomState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RoomState> {
        self.state_rx.clone()
    }

    async fn request(
        &self,
        command: CoordinatorCommand,
        reply_rx: oneshot::Receiver<Result<(), SignalingError>>,
    ) -> Result<(), SignalingError> {
        self.command_tx.send(command).map_err(|_| stopped())?;
        reply_rx.await.map_err(|_| stopped())?
    }
}

fn stopped() -> SignalingError {
    SignalingError::state("Negotiation coordinator is not running")
}

struct Session {
    connection: RoomConnectionParameters,
    params: SignalingParameters,
    message_url: String,
    leave_url: String,
    channel: SignalChannelHandle,
}

struct RoomPost {
    attempt: u64,
    url: String,
    message: String,
}

pub struct NegotiationCoordinator {
    config: ClientConfig,
    http: HttpClient,
    room_client: RoomClient,
    events: Arc<dyn SignalingEvents>,
    engine: Arc<dyn NegotiationEngine>,
    state: RoomState,
    state_tx: watch::Sender<RoomState>,
    attempt: u64,
    session: Option<Session>,
    candidates: IceCandidateQueue,
    room_post_tx: mpsc::UnboundedSender<RoomPost>,
    command_rx: mpsc::UnboundedReceiver<CoordinatorCommand>,
    engine_rx: EngineEventReceiver,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl NegotiationCoordinator {
    pub fn spawn(
        config: ClientConfig,
        events: Arc<dyn SignalingEvents>,
        engine: Arc<dyn NegotiationEngine>,
        engine_rx: EngineEventReceiver,
    ) -> Result<CoordinatorHandle, SignalingError> {
        let http = HttpClient::new(&config)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(RoomState::New);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let room_post_tx = spawn_room_poster(http.clone(), completion_tx.clone());

        let coordinator = Self {
            room_client: RoomClient::new(http.clone(), &config),
            config,
            http,
            events,
            engine,
            state: RoomState::New,
            state_tx,
            attempt: 0,
            session: None,
            candidates: IceCandidateQueue::new(),
            room_post_tx,
            command_rx,
            engine_rx,
            completion_rx,
            completion_tx,
        };
        tokio::spawn(coordinator.run());

        Ok(CoordinatorHandle {
            command_tx,
            state_rx,
        })
    }

    async fn run(mut self) {
        info!("Negotiation coordinator started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => self.handle_command(c).await,
                        None => {
                            info!("Command channel closed. Shutting down coordinator.");
                            break;
                        }
                    }
                }

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion).await;
                }

                Some(event) = self.engine_rx.recv() => {
                    self.handle_engine_event(event).await;
                }
            }
        }

        if let Some(session) = self.session.take() {
            session.channel.disconnect(false).await;
        }
        info!("Negotiation coordinator finished");
    }

    async fn handle_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::ConnectToRoom { connection, reply } => {
                let result = self.connect_to_room(connection).await;
                let _ = reply.send(result);
            }
            CoordinatorCommand::SendOfferSdp { sdp, reply } => {
                let result = self.send_offer_sdp(sdp).await;
                let _ = reply.send(result);
            }
            CoordinatorCommand::SendAnswerSdp { sdp, reply } => {
                let result = self.send_answer_sdp(sdp);
                let _ = reply.send(result);
            }
            CoordinatorCommand::SendLocalIceCandidate(candidate) => {
                self.send_local_ice_candidate(candidate).await;
            }
            CoordinatorCommand::DisconnectFromRoom { done } => {
                self.disconnect_from_room().await;
                let _ = done.send(());
            }
        }
    }

    async fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::RoomFetched {
                attempt,
                connection,
                result,
            } => {
                if attempt != self.attempt || self.state != RoomState::New {
                    debug!("Discarding room response for attempt {}", attempt);
                    return;
                }
                match result {
                    Ok(params) => self.on_room_joined(connection, params).await,
                    Err(e) => self.report_error(e).await,
                }
            }

            Completion::MessagePosted { attempt, result } => {
                if attempt != self.attempt || self.state != RoomState::Connected {
                    return;
                }
                if let Err(e) = result {
                    self.report_error(e).await;
                }
            }

            Completion::Channel { attempt, event } => {
                if attempt != self.attempt || self.state != RoomState::Connected {
                    debug!("Discarding channel event {:?}", event);
                    return;
                }
                self.handle_channel_event(event).await;
            }
        }
    }

    async fn connect_to_room(
        &mut self,
        connection: RoomConnectionParameters,
    ) -> Result<(), SignalingError> {
        if self.state == RoomState::Connected {
            return Err(SignalingError::state("Already connected to a room"));
        }
        if let Some(previous) = self.session.take() {
            previous.channel.disconnect(false).await;
        }

        self.attempt += 1;
        self.candidates = IceCandidateQueue::new();
        self.set_state(RoomState::New);

        let join_url = connection.join_url();
        info!("Connect to room: {}", join_url);

        let attempt = self.attempt;
        let room_client = self.room_client.clone();
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = room_client.fetch(&join_url, None).await;
            let _ = completion_tx.send(Completion::RoomFetched {
                attempt,
                connection,
                result,
            });
        });

        Ok(())
    }

    async fn on_room_joined(
        &mut self,
        connection: RoomConnectionParameters,
        params: SignalingParameters,
    ) {
        if connection.loopback && (!params.initiator || params.offer_sdp.is_some()) {
            self.report_error(SignalingError::protocol("Loopback room is busy."))
                .await;
            return;
        }
        info!(
            "Joined room {} as {}. Initiator: {}",
            params.room_id, params.client_id, params.initiator
        );

        let message_url = connection.message_url(&params.client_id);
        let leave_url = connection.leave_url(&params.client_id);
        self.set_state(RoomState::Connected);
        self.events.on_connected_to_room(params.clone()).await;

        let (channel_tx, mut channel_rx) = mpsc::unbounded_channel();
        let channel = SignalChannel::spawn(&self.config, self.http.clone(), channel_tx);

        let attempt = self.attempt;
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = channel_rx.recv().await {
                if completion_tx
                    .send(Completion::Channel { attempt, event })
                    .is_err()
                {
                    break;
                }
            }
        });

        channel.connect(&params.wss_url, &params.wss_post_url);
        channel.register(&params.room_id, &params.client_id);

        self.session = Some(Session {
            connection,
            params: params.clone(),
            message_url,
            leave_url,
            channel,
        });

        self.start_negotiation(params).await;
    }

    async fn start_negotiation(&mut self, params: SignalingParameters) {
        if let Err(e) = self.engine.open(&params).await {
            self.report_error(engine_error("Peer connection setup", e))
                .await;
            return;
        }

        if params.initiator {
            info!("Creating OFFER...");
            if let Err(e) = self.engine.create_offer().await {
                self.report_error(engine_error("createOffer", e)).await;
            }
            return;
        }

        if let Some(offer) = params.offer_sdp {
            info!("Received remote offer from room history, creating ANSWER...");
            self.apply_remote_description(offer).await;
        }
        for candidate in params.ice_candidates.unwrap_or_default() {
            self.apply_remote_candidate(candidate).await;
        }
    }

    async fn send_offer_sdp(&mut self, sdp: SessionDescription) -> Result<(), SignalingError> {
        let Some(session) = self.connected_session() else {
            return Err(SignalingError::state(
                "Sending offer SDP in non connected state.",
            ));
        };

        if session.connection.loopback {
            // The room echoes nothing back in loopback; answer ourselves.
            let answer = SessionDescription::answer(sdp.sdp);
            self.handle_remote_description(answer).await;
            return Ok(());
        }

        let url = session.message_url.clone();
        let message = NegotiationMessage::Offer { sdp: sdp.sdp }.to_json()?;
        self.post_room_message(url, message);
        Ok(())
    }

    fn send_answer_sdp(&self, sdp: SessionDescription) -> Result<(), SignalingError> {
        let Some(session) = self.connected_session() else {
            return Err(SignalingError::state(
                "Sending answer SDP in non connected state.",
            ));
        };

        if session.connection.loopback {
            error!("Sending answer in loopback mode.");
            return Ok(());
        }

        let message = NegotiationMessage::Answer { sdp: sdp.sdp }.to_json()?;
        session.channel.send(message);
        Ok(())
    }

    async fn send_local_ice_candidate(&mut self, candidate: IceCandidate) {
        let Some(session) = &self.session else {
            warn!(
                "Not in a room, dropping local ICE candidate {}",
                candidate.candidate
            );
            return;
        };
        let initiator = session.params.initiator;
        let loopback = session.connection.loopback;
        let url = session.message_url.clone();
        let channel = session.channel.clone();

        let message = match NegotiationMessage::from(&candidate).to_json() {
            Ok(message) => message,
            Err(e) => {
                self.report_error(e).await;
                return;
            }
        };

        if !initiator {
            // The offering peer is already live on the relay.
            channel.send(message);
            return;
        }

        if self.state != RoomState::Connected {
            self.report_error(SignalingError::state(
                "Sending ICE candidate in non connected state.",
            ))
            .await;
            return;
        }
        self.post_room_message(url, message);
        if loopback {
            self.handle_remote_candidate(candidate).await;
        }
    }

    async fn disconnect_from_room(&mut self) {
        info!("Disconnect. Room state: {:?}", self.state);

        if self.state == RoomState::Connected
            && let Some(session) = &self.session
        {
            info!("Closing room.");
            let http = self.http.clone();
            let url = session.leave_url.clone();
            tokio::spawn(async move {
                debug!("C->ROOM: POST {}", url);
                if let Err(e) = http.post(&url, None).await {
                    warn!("Leave room error: {}", e);
                }
            });
        }
        self.set_state(RoomState::Closed);

        if let Some(session) = self.session.take() {
            session.channel.disconnect(true).await;
        }
        self.engine.close().await;
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message { state, payload } => {
                if state != ChannelState::Registered {
                    error!("Got WebSocket message in non registered state.");
                    return;
                }
                self.handle_relay_message(payload).await;
            }
            ChannelEvent::Closed => {
                info!("Relay channel closed");
                self.events.on_channel_closed().await;
            }
            ChannelEvent::Error(e) => {
                self.report_error(SignalingError::network(format!("WebSocket error: {e}")))
                    .await;
            }
        }
    }

    async fn handle_relay_message(&mut self, payload: String) {
        let envelope: RelayEnvelope = match serde_json::from_str(&payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.report_error(
                    SignalingError::from(e).context("WebSocket message JSON parsing error"),
                )
                .await;
                return;
            }
        };

        // The relay sends `"msg": ""` alongside an error.
        let msg = envelope
            .msg
            .filter(|m| !matches!(m, Value::String(s) if s.is_empty()));
        let Some(msg) = msg else {
            let err = match envelope.error.filter(|e| !e.is_empty()) {
                Some(e) => format!("WebSocket error message: {e}"),
                None => format!("Unexpected WebSocket message: {payload}"),
            };
            self.report_error(SignalingError::protocol(err)).await;
            return;
        };

        let message = match embedded_json::<NegotiationMessage>(&msg) {
            Ok(message) => message,
            Err(e) => {
                self.report_error(e.context("WebSocket message JSON parsing error"))
                    .await;
                return;
            }
        };
        let initiator = self.session.as_ref().is_some_and(|s| s.params.initiator);

        match message {
            NegotiationMessage::Candidate {
                id,
                label,
                candidate,
            } => {
                self.handle_remote_candidate(IceCandidate::new(id, label, candidate))
                    .await;
            }
            NegotiationMessage::Answer { sdp } if initiator => {
                self.handle_remote_description(SessionDescription::answer(sdp))
                    .await;
            }
            NegotiationMessage::Answer { .. } => {
                self.report_error(SignalingError::protocol(format!(
                    "Received answer for call initiator: {payload}"
                )))
                .await;
            }
            NegotiationMessage::Offer { sdp } if !initiator => {
                self.handle_remote_description(SessionDescription::offer(sdp))
                    .await;
            }
            NegotiationMessage::Offer { .. } => {
                self.report_error(SignalingError::protocol(format!(
                    "Received offer for call receiver: {payload}"
                )))
                .await;
            }
            NegotiationMessage::Bye => {
                info!("Remote end hung up");
                self.events.on_channel_closed().await;
            }
            NegotiationMessage::Unknown => {
                self.report_error(SignalingError::protocol(format!(
                    "Unexpected WebSocket message: {payload}"
                )))
                .await;
            }
        }
    }

    async fn handle_remote_description(&mut self, desc: SessionDescription) {
        self.events.on_remote_description(desc.clone()).await;
        self.apply_remote_description(desc).await;
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        self.events.on_remote_ice_candidate(candidate.clone()).await;
        self.apply_remote_candidate(candidate).await;
    }

    async fn apply_remote_description(&mut self, desc: SessionDescription) {
        if self.state == RoomState::Error {
            return;
        }
        let rewritten = rewrite_remote_description(&desc, &self.config.codecs);
        if let Err(e) = self.engine.set_remote_description(rewritten).await {
            self.report_error(engine_error("setRemoteDescription", e))
                .await;
            return;
        }

        if desc.sdp_type == SdpType::Offer
            && let Err(e) = self.engine.create_answer().await
        {
            self.report_error(engine_error("createAnswer", e)).await;
        }
    }

    async fn apply_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.state == RoomState::Error {
            return;
        }
        let Some(candidate) = self.candidates.push(candidate) else {
            debug!("{} remote candidates pending", self.candidates.pending());
            return;
        };
        if let Err(e) = self.engine.add_ice_candidate(candidate).await {
            self.report_error(engine_error("addIceCandidate", e)).await;
        }
    }

    async fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.state != RoomState::Connected {
            debug!(
                "Dropping engine event in state {:?}: {:?}",
                self.state, event
            );
            return;
        }

        match event {
            EngineEvent::LocalDescriptionReady(desc) => {
                let result = match desc.sdp_type {
                    SdpType::Offer => self.send_offer_sdp(desc).await,
                    SdpType::Answer => self.send_answer_sdp(desc),
                };
                if let Err(e) = result {
                    self.report_error(e).await;
                }
            }
            EngineEvent::LocalIceCandidate(candidate) => {
                self.send_local_ice_candidate(candidate).await;
            }
            EngineEvent::BothDescriptionsSet => {
                for candidate in self.candidates.mark_descriptions_set() {
                    if let Err(e) = self.engine.add_ice_candidate(candidate).await {
                        self.report_error(engine_error("addIceCandidate", e)).await;
                        return;
                    }
                }
            }
            EngineEvent::Error(e) => {
                self.report_error(SignalingError::Engine(e)).await;
            }
        }
    }

    fn connected_session(&self) -> Option<&Session> {
        match self.state {
            RoomState::Connected => self.session.as_ref(),
            _ => None,
        }
    }

    fn post_room_message(&self, url: String, message: String) {
        debug!("C->ROOM: {}", message);
        let post = RoomPost {
            attempt: self.attempt,
            url,
            message,
        };
        if self.room_post_tx.send(post).is_err() {
            error!("Room poster is gone, dropping message");
        }
    }

    async fn report_error(&mut self, e: SignalingError) {
        error!("Room error: {}", e);
        if self.state != RoomState::Error {
            self.set_state(RoomState::Error);
            self.events.on_channel_error(e.to_string()).await;
        }
    }

    fn set_state(&mut self, state: RoomState) {
        debug!("Room state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

fn engine_error(operation: &str, e: anyhow::Error) -> SignalingError {
    SignalingError::Engine(format!("{operation} failed: {e:#}"))
}

/// Room-history POSTs go out one at a time so the server stores them in the
/// order they were sent.
fn spawn_room_poster(
    http: HttpClient,
    completion_tx: mpsc::UnboundedSender<Completion>,
) -> mpsc::UnboundedSender<RoomPost> {
    let (post_tx, mut post_rx) = mpsc::unbounded_channel::<RoomPost>();

    tokio::spawn(async move {
        while let Some(post) = post_rx.recv().await {
            let result = post_room_message(&http, &post.url, post.message).await;
            if completion_tx
                .send(Completion::MessagePosted {
                    attempt: post.attempt,
                    result,
                })
                .is_err()
            {
                break;
            }
        }
    });

    post_tx
}

async fn post_room_message(
    http: &HttpClient,
    url: &str,
    message: String,
) -> Result<(), SignalingError> {
    let body = http
        .post(url, Some(message))
        .await
        .map_err(|e| e.context("Room POST error"))?;
    let response: MessageResponse = serde_json::from_str(&body)?;
    if response.result != "SUCCESS" {
        return Err(SignalingError::protocol(format!(
            "Room POST error: {}",
            response.result
        )));
    }
    Ok(())
}
