use anyhow::Result;
use async_trait::async_trait;
use roomwire_client::{EngineEvent, EngineEventSender, NegotiationEngine};
use roomwire_core::{IceCandidate, SessionDescription, SignalingParameters};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub const MOCK_OFFER_SDP: &str = "v=0\r\n\
o=- 1 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 103\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=rtpmap:103 ISAC/16000\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 98\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtpmap:98 VP9/90000\r\n";

pub const MOCK_ANSWER_SDP: &str = "v=0\r\n\
o=- 3 4 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
a=rtpmap:111 opus/48000/2\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
a=rtpmap:96 VP8/90000\r\n";

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Open { initiator: bool },
    CreateOffer,
    CreateAnswer,
    SetRemoteDescription(SessionDescription),
    AddIceCandidate(IceCandidate),
    Close,
}

/// Negotiation engine double. Behaves like a peer connection as far as
/// event ordering goes: local descriptions are reported right away and
/// `BothDescriptionsSet` fires once both sides are in.
pub struct MockEngine {
    events: EngineEventSender,
    calls: Arc<Mutex<Vec<EngineCall>>>,
    local_set: AtomicBool,
    remote_set: AtomicBool,
}

impl MockEngine {
    pub fn new(events: EngineEventSender) -> Self {
        Self {
            events,
            calls: Arc::new(Mutex::new(Vec::new())),
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
        }
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().await.clone()
    }

    pub async fn added_candidates(&self) -> Vec<IceCandidate> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                EngineCall::AddIceCandidate(candidate) => Some(candidate.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                EngineCall::SetRemoteDescription(desc) => Some(desc.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `count` calls matching `predicate` were recorded.
    pub async fn wait_for_calls<F>(&self, count: usize, timeout_ms: u64, predicate: F) -> bool
    where
        F: Fn(&EngineCall) -> bool,
    {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        loop {
            if self.calls.lock().await.iter().filter(|c| predicate(c)).count() >= count {
                return true;
            }
            if start.elapsed() > timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Pretend the engine gathered a local candidate.
    pub fn gather_candidate(&self, candidate: IceCandidate) {
        let _ = self.events.send(EngineEvent::LocalIceCandidate(candidate));
    }

    async fn record(&self, call: EngineCall) {
        tracing::debug!("[MockEngine] {:?}", call);
        self.calls.lock().await.push(call);
    }

    fn set_local(&self, desc: SessionDescription) {
        self.local_set.store(true, Ordering::SeqCst);
        let _ = self.events.send(EngineEvent::LocalDescriptionReady(desc));
        self.check_both_set();
    }

    fn check_both_set(&self) {
        if self.local_set.load(Ordering::SeqCst) && self.remote_set.load(Ordering::SeqCst) {
            let _ = self.events.send(EngineEvent::BothDescriptionsSet);
        }
    }
}

#[async_trait]
impl NegotiationEngine for MockEngine {
    async fn open(&self, params: &SignalingParameters) -> Result<()> {
        self.local_set.store(false, Ordering::SeqCst);
        self.remote_set.store(false, Ordering::SeqCst);
        self.record(EngineCall::Open {
            initiator: params.initiator,
        })
        .await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<()> {
        self.record(EngineCall::CreateOffer).await;
        self.set_local(SessionDescription::offer(MOCK_OFFER_SDP));
        Ok(())
    }

    async fn create_answer(&self) -> Result<()> {
        self.record(EngineCall::CreateAnswer).await;
        self.set_local(SessionDescription::answer(MOCK_ANSWER_SDP));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(EngineCall::SetRemoteDescription(desc)).await;
        self.remote_set.store(true, Ordering::SeqCst);
        self.check_both_set();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(EngineCall::AddIceCandidate(candidate)).await;
        Ok(())
    }

    async fn close(&self) {
        self.record(EngineCall::Close).await;
    }
}
