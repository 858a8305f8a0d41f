use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::AppError;
use crate::notify::{NotificationSink, StateNotification};

/// Device runtime lifecycle. Recovering covers an audio pipeline restart
/// after the capture thread dies; the runtime either returns to Running or
/// gives up and stops.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceState {
    Initializing,
    Running,
    Recovering { reason: String },
    Stopping,
    Stopped,
}

impl DeviceState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Recovering { .. } => "recovering",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }

    fn accepts(&self, next: &DeviceState) -> bool {
        use DeviceState::*;
        matches!(
            (self, next),
            (Initializing, Running)
                | (Running, Recovering { .. })
                | (Running, Stopping)
                | (Recovering { .. }, Running)
                | (Recovering { .. }, Stopping)
                | (Stopping, Stopped)
        )
    }
}

/// Validates lifecycle transitions and publishes each accepted one to the
/// notification sink.
pub struct StateManager {
    state: RwLock<DeviceState>,
    notifier: Arc<dyn NotificationSink>,
}

impl StateManager {
    pub fn new(notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            state: RwLock::new(DeviceState::Initializing),
            notifier,
        }
    }

    pub fn transition(&self, next: DeviceState) -> Result<(), AppError> {
        let mut current = self.state.write();
        if !current.accepts(&next) {
            return Err(AppError::Fatal(format!(
                "invalid state transition: {:?} -> {:?}",
                *current, next
            )));
        }

        tracing::info!(from = current.label(), to = next.label(), "device state");
        let detail = match &next {
            DeviceState::Recovering { reason } => reason.clone(),
            _ => String::new(),
        };
        self.notifier
            .notify(StateNotification::new(next.label(), detail));
        *current = next;
        Ok(())
    }

    pub fn current(&self) -> DeviceState {
        self.state.read().clone()
    }
}
