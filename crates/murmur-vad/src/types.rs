use serde::{Deserialize, Serialize};

/// Interaction phase of the device, used to bias detection sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationContext {
    Idle,
    Listening,
    Speaking,
    Processing,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::Idle
    }
}

/// Per-frame classification output. Produced fresh on every call; the
/// detector never retains a reference to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadResult {
    pub voice_detected: bool,
    /// Edge: first voiced frame of a segment
    pub speech_started: bool,
    /// Edge: fires once per segment when accumulated silence passes the threshold
    pub speech_ended: bool,
    /// Window-averaged confidence, 0.0-1.0
    pub confidence: f32,
    pub max_amplitude: i16,
    pub noise_floor: f32,
    pub snr_db: f32,
    pub zero_crossing_rate: u16,
    pub low_freq_energy_ratio: f32,
    /// confidence scaled to 0-255 for the wire header
    pub detection_quality: u8,
    pub high_confidence: bool,
    pub conversation_context: ConversationContext,
    pub echo_suppression_active: bool,
    /// Spectral layer judged the frame speech-like
    pub spectral_valid: bool,
    /// The noise floor absorbed this frame
    pub noise_floor_updated: bool,
    /// Adaptive thresholding is enabled in the active config
    pub adaptive_threshold_active: bool,
    /// Milliseconds since the current segment started (0 outside a segment)
    pub voice_duration_ms: u64,
    /// Accumulated silence inside an open segment
    pub silence_duration_ms: u64,
}

impl VadResult {
    /// All-zero result: no voice, no edges, no features. Also handy as a
    /// starting point when building results by hand in tests.
    pub fn quiescent(context: ConversationContext) -> Self {
        Self {
            voice_detected: false,
            speech_started: false,
            speech_ended: false,
            confidence: 0.0,
            max_amplitude: 0,
            noise_floor: 0.0,
            snr_db: 0.0,
            zero_crossing_rate: 0,
            low_freq_energy_ratio: 0.0,
            detection_quality: 0,
            high_confidence: false,
            conversation_context: context,
            echo_suppression_active: false,
            spectral_valid: false,
            noise_floor_updated: false,
            adaptive_threshold_active: false,
            voice_duration_ms: 0,
            silence_duration_ms: 0,
        }
    }
}

/// Running detector statistics, reset only on explicit request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VadStats {
    pub frames_processed: u64,
    /// Completed segments at least min_voice_duration_ms long
    pub detection_count: u64,
    /// Noise-floor updates applied
    pub adaptations_count: u64,
    pub average_confidence: f32,
    pub current_noise_floor: f32,
    pub min_noise_floor: f32,
    pub max_noise_floor: f32,
}
