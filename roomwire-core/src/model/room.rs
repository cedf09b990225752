use serde::{Deserialize, Serialize};

const ROOM_JOIN: &str = "join";
const ROOM_MESSAGE: &str = "message";
const ROOM_LEAVE: &str = "leave";

/// Where and how to join. Created once per connection attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConnectionParameters {
    pub room_url: String,
    pub room_id: String,
    pub loopback: bool,
}

impl RoomConnectionParameters {
    pub fn new(room_url: impl Into<String>, room_id: impl Into<String>, loopback: bool) -> Self {
        Self {
            room_url: room_url.into(),
            room_id: room_id.into(),
            loopback,
        }
    }

    pub fn join_url(&self) -> String {
        format!("{}/{}/{}", self.base(), ROOM_JOIN, self.room_id)
    }

    /// Room-history endpoint for this client's offers and candidates.
    pub fn message_url(&self, client_id: &str) -> String {
        format!("{}/{}/{}/{}", self.base(), ROOM_MESSAGE, self.room_id, client_id)
    }

    pub fn leave_url(&self, client_id: &str) -> String {
        format!("{}/{}/{}/{}", self.base(), ROOM_LEAVE, self.room_id, client_id)
    }

    fn base(&self) -> &str {
        self.room_url.trim_end_matches('/')
    }
}
