use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// A human-readable state-change notification destined for the UI
/// collaborator. Fire-and-forget: the producer never blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNotification {
    pub state: String,
    pub detail: String,
}

impl StateNotification {
    pub fn new(state: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            detail: detail.into(),
        }
    }
}

/// Sink for state-change notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: StateNotification);
}

/// Sink that forwards into a bounded channel; full channel drops the
/// notification rather than blocking the producer.
pub struct ChannelNotifier {
    tx: Sender<StateNotification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, Receiver<StateNotification>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: StateNotification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                tracing::debug!("Notification channel full, dropped: {}", n.state);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Sink that just logs; used when no UI collaborator is attached.
#[derive(Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: StateNotification) {
        tracing::info!(
            state = %notification.state,
            detail = %notification.detail,
            "state notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_notifier_delivers() {
        let (notifier, rx) = ChannelNotifier::new(4);
        notifier.notify(StateNotification::new("reconnecting", "attempt 1"));
        let n = rx.recv().unwrap();
        assert_eq!(n.state, "reconnecting");
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (notifier, rx) = ChannelNotifier::new(1);
        notifier.notify(StateNotification::new("a", ""));
        notifier.notify(StateNotification::new("b", ""));
        assert_eq!(rx.recv().unwrap().state, "a");
        assert!(rx.try_recv().is_err());
    }
}
