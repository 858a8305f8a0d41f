pub mod config;
pub mod consistency;
pub mod constants;
pub mod energy;
pub mod spectral;
pub mod types;
pub mod vad;

pub use config::{VadConfig, VadFeatures};
pub use constants::{FRAME_DURATION_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use types::{ConversationContext, VadResult, VadStats};
pub use vad::AdaptiveVad;
