use serde::{Deserialize, Serialize};

use murmur_vad::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

/// Hard cap on the pattern buffer, 600ms at the 20ms frame cadence.
pub const MAX_PATTERN_FRAMES: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeWordConfig {
    /// Base energy threshold for opening a detection window
    pub energy_threshold: f32,
    /// Minimum scored confidence for a Triggered transition
    pub confidence_threshold: f32,
    /// Below-threshold gap that closes an open window and forces evaluation
    pub silence_timeout_ms: u32,
    /// Pattern buffer length; evaluation fires when it fills
    pub pattern_frames: usize,
    /// Buffers shorter than this are discarded, not scored
    pub min_detection_frames: usize,
    /// Background threshold re-centering toward ambient energy
    pub enable_adaptation: bool,
    /// Smoothing weight for each background re-centering step
    pub adaptation_rate: f32,
    /// Rolling-minute cap on Triggered transitions
    pub max_detections_per_min: u32,
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 3500.0,
            confidence_threshold: 0.65,
            silence_timeout_ms: 2000,
            pattern_frames: MAX_PATTERN_FRAMES,
            min_detection_frames: 10,
            enable_adaptation: true,
            adaptation_rate: 0.1,
            max_detections_per_min: 10,
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_size_samples: FRAME_SIZE_SAMPLES,
        }
    }
}

impl WakeWordConfig {
    pub fn frame_duration_ms(&self) -> u32 {
        (self.frame_size_samples as u32 * 1000) / self.sample_rate_hz
    }

    /// Out-of-range values are clamped, never rejected.
    pub fn clamped(mut self) -> Self {
        self.energy_threshold = self.energy_threshold.clamp(100.0, 32767.0);
        self.confidence_threshold = self.confidence_threshold.clamp(0.1, 1.0);
        self.adaptation_rate = self.adaptation_rate.clamp(0.0, 1.0);
        self.pattern_frames = self.pattern_frames.clamp(2, MAX_PATTERN_FRAMES);
        self.min_detection_frames = self.min_detection_frames.clamp(2, self.pattern_frames);
        self.max_detections_per_min = self.max_detections_per_min.max(1);
        self.sample_rate_hz = self.sample_rate_hz.clamp(8_000, 48_000);
        self.frame_size_samples = self.frame_size_samples.clamp(64, 1024);
        self
    }

    /// Adaptive energy threshold bounds relative to the configured base.
    pub fn energy_threshold_bounds(&self) -> (f32, f32) {
        (self.energy_threshold / 3.0, self.energy_threshold * 4.0)
    }

    /// Confidence threshold bounds for server-suggested adjustments.
    pub fn confidence_threshold_bounds(&self) -> (f32, f32) {
        (
            self.confidence_threshold / 2.0,
            (self.confidence_threshold * 3.0).min(1.0),
        )
    }
}
