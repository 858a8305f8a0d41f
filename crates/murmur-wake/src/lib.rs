pub mod config;
pub mod detector;
pub mod error;
pub mod pattern;
pub mod types;

pub use config::{WakeWordConfig, MAX_PATTERN_FRAMES};
pub use detector::{WakeEventSink, WakeWordDetector};
pub use error::WakeError;
pub use types::{WakeWordResult, WakeWordState, WakeWordStats};
