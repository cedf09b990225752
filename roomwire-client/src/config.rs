use std::time::Duration;

/// Timeouts and HTTP settings shared by the room client and relay channel.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub http_timeout: Duration,
    pub turn_timeout: Duration,
    /// How long `disconnect(wait_for_close = true)` waits for the relay to
    /// confirm closure.
    pub close_timeout: Duration,
    pub http_origin: String,
    pub codecs: CodecPreferences,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_millis(8000),
            turn_timeout: Duration::from_millis(5000),
            close_timeout: Duration::from_millis(1000),
            http_origin: "https://apprtc.appspot.com".to_owned(),
            codecs: CodecPreferences::default(),
        }
    }
}

/// SDP rewrites applied to every remote description before it reaches the
/// negotiation engine. A bitrate of 0 leaves the description alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecPreferences {
    pub preferred_audio_codec: Option<String>,
    pub preferred_video_codec: Option<String>,
    pub video_start_bitrate_kbps: u32,
    pub audio_start_bitrate_kbps: u32,
}
