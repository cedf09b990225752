pub mod error;
pub mod model;
pub mod sdp;

pub use error::SignalingError;
pub use model::*;
