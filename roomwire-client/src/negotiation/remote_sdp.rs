use crate::config::CodecPreferences;
use roomwire_core::SessionDescription;
use roomwire_core::sdp::{MediaKind, prefer_codec, set_start_bitrate};

const VIDEO_BITRATE_CODECS: [&str; 3] = ["VP8", "VP9", "H264"];
const AUDIO_BITRATE_CODEC: &str = "opus";

/// Apply codec and bitrate preferences to a description received from the
/// remote side. Each rewrite runs at most once per description.
pub(crate) fn rewrite_remote_description(
    desc: &SessionDescription,
    prefs: &CodecPreferences,
) -> SessionDescription {
    let mut sdp = desc.sdp.clone();

    if let Some(codec) = &prefs.preferred_audio_codec {
        sdp = prefer_codec(&sdp, codec, MediaKind::Audio);
    }
    if let Some(codec) = &prefs.preferred_video_codec {
        sdp = prefer_codec(&sdp, codec, MediaKind::Video);
    }
    if prefs.video_start_bitrate_kbps > 0 {
        for codec in VIDEO_BITRATE_CODECS {
            sdp = set_start_bitrate(&sdp, codec, MediaKind::Video, prefs.video_start_bitrate_kbps);
        }
    }
    if prefs.audio_start_bitrate_kbps > 0 {
        sdp = set_start_bitrate(
            &sdp,
            AUDIO_BITRATE_CODEC,
            MediaKind::Audio,
            prefs.audio_start_bitrate_kbps,
        );
    }

    SessionDescription {
        sdp_type: desc.sdp_type,
        sdp,
    }
}
