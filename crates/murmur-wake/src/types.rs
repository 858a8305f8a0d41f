use serde::{Deserialize, Serialize};

/// Detection window state. Listening is the rest state; Triggered opens a
/// window awaiting server validation; Confirmed/Rejected are the two ways
/// that window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeWordState {
    Listening,
    Triggered,
    Confirmed,
    Rejected,
}

impl Default for WakeWordState {
    fn default() -> Self {
        Self::Listening
    }
}

/// Per-frame detector output. `state` is an event for this frame:
/// Triggered appears exactly once per detection, Confirmed/Rejected exactly
/// once when server feedback lands, Listening everywhere else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeWordResult {
    pub state: WakeWordState,
    /// Scored confidence of the most recent detection
    pub confidence_score: f32,
    /// Pattern correlation scaled to 0-1000 for the wire header
    pub pattern_match_score: u16,
    pub syllable_count: u8,
    /// Unique per Triggered transition, 0 before the first
    pub detection_id: u32,
    /// Length of the scored pattern in milliseconds
    pub duration_ms: u32,
    /// RMS energy of the current frame
    pub energy_level: f32,
    /// Voice flag carried over from the VAD result, if one was supplied
    pub vad_active: bool,
    pub server_validated: bool,
    pub server_rejected: bool,
}

impl WakeWordResult {
    /// Rest-state result: Listening, zero scores. Also the usual starting
    /// point when building results by hand.
    pub fn listening() -> Self {
        Self {
            state: WakeWordState::Listening,
            confidence_score: 0.0,
            pattern_match_score: 0,
            syllable_count: 0,
            detection_id: 0,
            duration_ms: 0,
            energy_level: 0.0,
            vad_active: false,
            server_validated: false,
            server_rejected: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WakeWordStats {
    pub total_detections: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub consecutive_false_positives: u32,
    /// Triggers discarded by the per-minute rate limit
    pub rate_limited: u64,
    pub threshold_adjustments: u64,
    pub average_confidence: f32,
    pub false_positive_rate: f32,
    pub current_energy_threshold: f32,
    pub current_confidence_threshold: f32,
}
