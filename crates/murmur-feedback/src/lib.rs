//! Bidirectional control channel between the device and the speech server.
//!
//! Audio frames travel over UDP (see `murmur-transport`); this crate carries
//! everything else over a WebSocket: wake word detection reports, server
//! validation verdicts, remote threshold updates, periodic statistics, and
//! TTS playback markers used for echo suppression.

pub mod channel;
pub mod error;
pub mod messages;
pub mod pending;

pub use channel::{
    ChannelState, FeedbackChannel, FeedbackConfig, FeedbackHandle, FeedbackListener,
    FeedbackStats, ThresholdUpdate, ValidationOutcome,
};
pub use error::FeedbackError;
pub use messages::{ControlMessage, VadStatsReport, WakeWordStatsReport};
pub use pending::PendingValidations;
