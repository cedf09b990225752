pub use roomwire_core::SignalingError;

pub mod model {
    pub use roomwire_core::model::*;
}

pub mod sdp {
    pub use roomwire_core::sdp::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use roomwire_client::*;
}
