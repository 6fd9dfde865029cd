//! Notification channels — the two named session outputs.
//!
//! A session reports every new cumulative aggregate on exactly one of
//! two channels: `live` for a fresh insert, `replayed` for the single
//! reconciliation emitted after a rebuild. Sends are fire-and-forget;
//! ordering between sends on one channel is preserved per process.

use std::sync::{Arc, Mutex};

/// One named session output. Implementations must not block the
/// calling thread for long — the caller holds the group key's lock.
pub trait Channel: Send + Sync {
    fn send(&self, aggregate: i64);
}

/// The channel pair every session emits into.
#[derive(Clone)]
pub struct SessionChannels {
    pub live: Arc<dyn Channel>,
    pub replayed: Arc<dyn Channel>,
}

impl SessionChannels {
    pub fn new(live: Arc<dyn Channel>, replayed: Arc<dyn Channel>) -> Self {
        Self { live, replayed }
    }

    /// Channel pair that discards every send. Used by drift
    /// verification, where rebuild side effects must be suppressed.
    pub fn muted() -> Self {
        let null: Arc<dyn Channel> = Arc::new(NullChannel);
        Self {
            live: null.clone(),
            replayed: null,
        }
    }
}

/// Discards every notification.
pub struct NullChannel;

impl Channel for NullChannel {
    fn send(&self, _aggregate: i64) {}
}

/// Records every notification in order. In-memory, for assertions.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<i64>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<i64> {
        self.sent.lock().expect("recording channel lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.sent
            .lock()
            .expect("recording channel lock poisoned")
            .clear();
    }
}

impl Channel for RecordingChannel {
    fn send(&self, aggregate: i64) {
        self.sent
            .lock()
            .expect("recording channel lock poisoned")
            .push(aggregate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_channel_preserves_send_order() {
        let chan = RecordingChannel::new();
        chan.send(10);
        chan.send(30);
        chan.send(60);
        assert_eq!(chan.sent(), vec![10, 30, 60]);
        chan.clear();
        assert!(chan.sent().is_empty());
    }

    #[test]
    fn muted_pair_discards_sends() {
        let channels = SessionChannels::muted();
        channels.live.send(1);
        channels.replayed.send(2);
    }
}
