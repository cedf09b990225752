use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::wait_helpers::wait_until;

/// Everything the mock room and relay have been told, plus the canned
/// responses they give.
#[derive(Default)]
pub struct RoomServerState {
    joins: DashMap<String, (StatusCode, String)>,
    join_requests: AtomicUsize,
    turn_body: Mutex<Option<String>>,
    turn_requests: AtomicUsize,
    message_result: Mutex<Option<String>>,
    room_messages: DashMap<String, Vec<Value>>,
    leaves: DashMap<String, usize>,
    deletes: DashMap<String, usize>,
    ws_connections: AtomicUsize,
    relay_frames: DashMap<String, Vec<Value>>,
    relay_peers: DashMap<String, mpsc::UnboundedSender<Message>>,
}

/// In-process stand-in for the room server: join/message/leave/TURN over
/// HTTP and the relay over WebSocket, all on one port.
pub struct MockRoomServer {
    pub addr: SocketAddr,
    pub state: Arc<RoomServerState>,
}

impl MockRoomServer {
    pub async fn start() -> Self {
        let state = Arc::new(RoomServerState::default());

        let app = Router::new()
            .route("/join/{room_id}", post(join_handler))
            .route("/message/{room_id}/{client_id}", post(message_handler))
            .route("/leave/{room_id}/{client_id}", post(leave_handler))
            .route("/turn", get(turn_handler))
            .route("/ws", get(relay_ws_handler))
            .route("/ws/{room_id}/{client_id}", delete(relay_delete_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock room server");
        let addr = listener.local_addr().expect("No local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock room server died");
        });

        Self { addr, state }
    }

    pub fn room_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn post_url(&self) -> String {
        format!("http://{}/ws", self.addr)
    }

    pub fn turn_url(&self) -> String {
        format!("http://{}/turn", self.addr)
    }

    /// Canned join response for `room_id`.
    pub fn set_join_response(&self, room_id: &str, status: StatusCode, body: impl Into<String>) {
        self.state
            .joins
            .insert(room_id.to_owned(), (status, body.into()));
    }

    /// A successful join where this client creates the offer.
    pub fn join_as_initiator(&self, room_id: &str, client_id: &str) {
        let body = self.join_body(room_id, client_id, true, Vec::new());
        self.set_join_response(room_id, StatusCode::OK, body);
    }

    /// A successful join into a room whose history holds `history`.
    pub fn join_as_receiver(&self, room_id: &str, client_id: &str, history: Vec<Value>) {
        let body = self.join_body(room_id, client_id, false, history);
        self.set_join_response(room_id, StatusCode::OK, body);
    }

    pub fn join_body(
        &self,
        room_id: &str,
        client_id: &str,
        initiator: bool,
        history: Vec<Value>,
    ) -> String {
        let is_initiator = if initiator { "true" } else { "false" };
        let mut params = json!({
            "room_id": room_id,
            "client_id": client_id,
            "wss_url": self.ws_url(),
            "wss_post_url": self.post_url(),
            "is_initiator": is_initiator,
            "pc_config": json!({
                "iceServers": [{"urls": "turn:turn.example:3478", "credential": "secret"}]
            }).to_string(),
            "pc_constraints": json!({"optional": [{"DtlsSrtpKeyAgreement": true}]}).to_string(),
            "media_constraints": json!({"audio": true, "video": true}).to_string(),
            "turn_url": self.turn_url(),
        });
        if !initiator {
            params["messages"] = Value::Array(
                history
                    .into_iter()
                    .map(|m| Value::String(m.to_string()))
                    .collect(),
            );
        }

        json!({"result": "SUCCESS", "params": params.to_string()}).to_string()
    }

    pub fn set_turn_response(&self, body: impl Into<String>) {
        *self.state.turn_body.lock().unwrap() = Some(body.into());
    }

    /// Result the room returns for history POSTs (default `SUCCESS`).
    pub fn set_message_result(&self, result: &str) {
        *self.state.message_result.lock().unwrap() = Some(result.to_owned());
    }

    pub fn join_requests(&self) -> usize {
        self.state.join_requests.load(Ordering::SeqCst)
    }

    pub fn turn_requests(&self) -> usize {
        self.state.turn_requests.load(Ordering::SeqCst)
    }

    pub fn ws_connections(&self) -> usize {
        self.state.ws_connections.load(Ordering::SeqCst)
    }

    pub fn room_messages(&self, room_id: &str, client_id: &str) -> Vec<Value> {
        self.state
            .room_messages
            .get(&format!("{room_id}/{client_id}"))
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    pub fn leave_count(&self, room_id: &str, client_id: &str) -> usize {
        self.state
            .leaves
            .get(&format!("{room_id}/{client_id}"))
            .map_or(0, |c| *c)
    }

    pub fn delete_count(&self, room_id: &str, client_id: &str) -> usize {
        self.state
            .deletes
            .get(&format!("{room_id}/{client_id}"))
            .map_or(0, |c| *c)
    }

    /// Frames the relay received from `client_id`, starting with its
    /// `register` frame.
    pub fn relay_frames(&self, client_id: &str) -> Vec<Value> {
        self.state
            .relay_frames
            .get(client_id)
            .map(|f| f.value().clone())
            .unwrap_or_default()
    }

    /// Inner `msg` payloads of the `send` frames from `client_id`, decoded.
    pub fn relayed_messages(&self, client_id: &str) -> Vec<Value> {
        self.relay_frames(client_id)
            .into_iter()
            .filter(|f| f["cmd"] == "send")
            .filter_map(|f| f["msg"].as_str().and_then(|m| serde_json::from_str(m).ok()))
            .collect()
    }

    /// Deliver a raw relay frame to a registered client.
    pub fn push_relay_frame(&self, client_id: &str, frame: impl Into<String>) -> bool {
        let Some(peer) = self.state.relay_peers.get(client_id) else {
            return false;
        };
        let frame: String = frame.into();
        peer.send(Message::Text(frame.into())).is_ok()
    }

    /// Deliver `{msg: "<message>"}` the way the relay forwards a peer's send.
    pub fn push_relay_message(&self, client_id: &str, message: Value) -> bool {
        let frame = json!({"msg": message.to_string(), "error": ""}).to_string();
        self.push_relay_frame(client_id, frame)
    }

    /// Whether `client_id` currently holds an open, registered relay socket.
    pub fn is_registered(&self, client_id: &str) -> bool {
        self.state.relay_peers.contains_key(client_id)
    }

    pub async fn wait_for_registered(&self, client_id: &str, timeout_ms: u64) -> bool {
        wait_until(timeout_ms, || self.is_registered(client_id)).await
    }

    pub async fn wait_for_unregistered(&self, client_id: &str, timeout_ms: u64) -> bool {
        wait_until(timeout_ms, || !self.is_registered(client_id)).await
    }

    pub async fn wait_for_relay_frames(&self, client_id: &str, count: usize, timeout_ms: u64) -> bool {
        wait_until(timeout_ms, || self.relay_frames(client_id).len() >= count).await
    }

    pub async fn wait_for_room_messages(
        &self,
        room_id: &str,
        client_id: &str,
        count: usize,
        timeout_ms: u64,
    ) -> bool {
        wait_until(timeout_ms, || {
            self.room_messages(room_id, client_id).len() >= count
        })
        .await
    }
}

async fn join_handler(
    Path(room_id): Path<String>,
    State(state): State<Arc<RoomServerState>>,
) -> impl IntoResponse {
    state.join_requests.fetch_add(1, Ordering::SeqCst);
    match state.joins.get(&room_id) {
        Some(entry) => (entry.0, entry.1.clone()),
        None => (StatusCode::NOT_FOUND, "unknown room".to_owned()),
    }
}

async fn message_handler(
    Path((room_id, client_id)): Path<(String, String)>,
    State(state): State<Arc<RoomServerState>>,
    body: String,
) -> String {
    let value = serde_json::from_str(&body).unwrap_or(Value::String(body));
    state
        .room_messages
        .entry(format!("{room_id}/{client_id}"))
        .or_default()
        .push(value);

    let result = state
        .message_result
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| "SUCCESS".to_owned());
    json!({"result": result}).to_string()
}

async fn leave_handler(
    Path((room_id, client_id)): Path<(String, String)>,
    State(state): State<Arc<RoomServerState>>,
) -> StatusCode {
    *state
        .leaves
        .entry(format!("{room_id}/{client_id}"))
        .or_default() += 1;
    StatusCode::OK
}

async fn turn_handler(State(state): State<Arc<RoomServerState>>) -> impl IntoResponse {
    state.turn_requests.fetch_add(1, Ordering::SeqCst);
    match state.turn_body.lock().unwrap().clone() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn relay_delete_handler(
    Path((room_id, client_id)): Path<(String, String)>,
    State(state): State<Arc<RoomServerState>>,
) -> StatusCode {
    *state
        .deletes
        .entry(format!("{room_id}/{client_id}"))
        .or_default() += 1;
    StatusCode::OK
}

async fn relay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<RoomServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state))
}

async fn handle_relay_socket(socket: WebSocket, state: Arc<RoomServerState>) {
    state.ws_connections.fetch_add(1, Ordering::SeqCst);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut client_id: Option<String> = None;
    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };

        if frame["cmd"] == "register" {
            let id = frame["clientid"].as_str().unwrap_or_default().to_owned();
            state.relay_peers.insert(id.clone(), tx.clone());
            client_id = Some(id);
        }
        let key = client_id.clone().unwrap_or_default();
        state.relay_frames.entry(key).or_default().push(frame);
    }

    if let Some(id) = &client_id {
        state.relay_peers.remove(id);
    }
    send_task.abort();
}
