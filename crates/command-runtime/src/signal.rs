//! Live completion-signal handle for commands predating the future-based
//! contract. Observers subscribe for `complete`/`error` notifications
//! instead of awaiting a future.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub enum SignalEvent {
    Complete(Vec<Value>),
    Error(String),
}

/// Emitting is fire-and-forget: absent or lagging receivers are not errors.
/// The most recent error is additionally latched so late observers can still
/// inspect it.
#[derive(Clone, Debug)]
pub struct CompletionSignal {
    tx: broadcast::Sender<SignalEvent>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl CompletionSignal {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.tx.subscribe()
    }

    pub fn emit_complete(&self, args: Vec<Value>) {
        let _ = self.tx.send(SignalEvent::Complete(args));
    }

    pub fn emit_error(&self, message: impl Into<String>) {
        let message = message.into();
        *self.last_error.write().expect("signal state lock") = Some(message.clone());
        let _ = self.tx.send(SignalEvent::Error(message));
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().expect("signal state lock").clone()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_completion_events() {
        let signal = CompletionSignal::default();
        let mut rx = signal.subscribe();

        signal.emit_complete(vec![json!(1), json!("done")]);

        match rx.recv().await.unwrap() {
            SignalEvent::Complete(args) => assert_eq!(args, vec![json!(1), json!("done")]),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn errors_are_latched_for_late_observers() {
        let signal = CompletionSignal::default();
        signal.emit_error("element vanished");
        assert_eq!(signal.last_error().as_deref(), Some("element vanished"));
    }

    #[test]
    fn emitting_without_receivers_is_not_an_error() {
        let signal = CompletionSignal::default();
        signal.emit_complete(vec![]);
        signal.emit_error("dropped");
    }
}
