mod room_client;
mod room_response;

pub use room_client::*;
