//! Codec preference and bitrate rewriting over CRLF-delimited SDP bodies.
//!
//! Both rewrites append rather than replace: running either twice for the
//! same codec produces a duplicate parameter. Callers apply each rewrite once
//! per description.

use tracing::{debug, error, warn};

const LINE_BREAK: &str = "\r\n";
const VIDEO_START_BITRATE_PARAM: &str = "x-google-start-bitrate";
const AUDIO_BITRATE_PARAM: &str = "maxaveragebitrate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    fn m_line_prefix(self) -> &'static str {
        match self {
            MediaKind::Audio => "m=audio ",
            MediaKind::Video => "m=video ",
        }
    }
}

/// Move `codec`'s payload type to the front of the `m=` line for `kind`.
///
/// Returns the input unchanged when the section or the codec's rtpmap is
/// missing.
pub fn prefer_codec(sdp: &str, codec: &str, kind: MediaKind) -> String {
    let mut lines: Vec<String> = sdp.split(LINE_BREAK).map(str::to_owned).collect();
    let prefix = kind.m_line_prefix();

    let m_line_index = lines.iter().position(|l| l.starts_with(prefix));
    let payload_type = lines
        .iter()
        .find_map(|l| rtpmap_payload_type(l, codec))
        .map(str::to_owned);

    let Some(m_line_index) = m_line_index else {
        warn!("No {}line, so can't prefer {}", prefix, codec);
        return sdp.to_owned();
    };
    let Some(payload_type) = payload_type else {
        warn!("No rtpmap for {}", codec);
        return sdp.to_owned();
    };
    debug!(
        "Found {} rtpmap {}, prefer at {}",
        codec, payload_type, lines[m_line_index]
    );

    let parts: Vec<&str> = lines[m_line_index].split(' ').collect();
    if parts.len() <= 3 {
        error!("Wrong SDP media description format: {}", lines[m_line_index]);
        return sdp.to_owned();
    }

    // m=<media> <port> <proto> <fmt> ...
    let mut rewritten: Vec<&str> = parts[..3].to_vec();
    rewritten.push(&payload_type);
    rewritten.extend(parts[3..].iter().filter(|p| **p != payload_type));
    let new_m_line = rewritten.join(" ");
    debug!("Change media description: {}", new_m_line);

    lines[m_line_index] = new_m_line;
    lines.join(LINE_BREAK)
}

/// Inject a start bitrate for `codec`: `x-google-start-bitrate` (kbps) for
/// video, `maxaveragebitrate` (bps) for audio.
///
/// An existing `a=fmtp` line for the payload type is extended; otherwise a new
/// one is inserted right after the rtpmap line.
pub fn set_start_bitrate(sdp: &str, codec: &str, kind: MediaKind, bitrate_kbps: u32) -> String {
    let mut lines: Vec<String> = sdp.split(LINE_BREAK).map(str::to_owned).collect();

    let Some((rtpmap_index, payload_type)) = lines
        .iter()
        .enumerate()
        .find_map(|(i, l)| rtpmap_payload_type(l, codec).map(|pt| (i, pt.to_owned())))
    else {
        warn!("No rtpmap for {} codec", codec);
        return sdp.to_owned();
    };
    debug!(
        "Found {} rtpmap {} at {}",
        codec, payload_type, lines[rtpmap_index]
    );

    let param = match kind {
        MediaKind::Video => format!("{}={}", VIDEO_START_BITRATE_PARAM, bitrate_kbps),
        MediaKind::Audio => format!("{}={}", AUDIO_BITRATE_PARAM, u64::from(bitrate_kbps) * 1000),
    };

    if let Some(fmtp) = lines.iter_mut().find(|l| is_fmtp_for(l, &payload_type)) {
        fmtp.push_str("; ");
        fmtp.push_str(&param);
        debug!("Update remote SDP line: {}", fmtp);
    } else {
        let fmtp = format!("a=fmtp:{} {}", payload_type, param);
        debug!("Add remote SDP line: {}", fmtp);
        lines.insert(rtpmap_index + 1, fmtp);
    }

    lines.join(LINE_BREAK)
}

/// Payload type of `a=rtpmap:<pt> <codec>/<clock>[/<params>]`, if `line` is
/// that codec's rtpmap.
fn rtpmap_payload_type<'a>(line: &'a str, codec: &str) -> Option<&'a str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let (payload_type, encoding) = line.strip_prefix("a=rtpmap:")?.split_once(' ')?;
    if !is_digits(payload_type) {
        return None;
    }

    let rates = encoding.strip_prefix(codec)?.strip_prefix('/')?;
    rates.split('/').all(is_digits).then_some(payload_type)
}

/// `a=fmtp:<pt> <params>` for this payload type.
fn is_fmtp_for(line: &str, payload_type: &str) -> bool {
    line.strip_prefix("a=fmtp:")
        .and_then(|rest| rest.strip_prefix(payload_type))
        .and_then(|rest| rest.strip_prefix(' '))
        .is_some_and(|params| !params.trim_end_matches('\r').is_empty())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
