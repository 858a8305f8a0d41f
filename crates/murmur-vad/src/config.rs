use serde::{Deserialize, Serialize};

use super::constants::{FRAME_SIZE_SAMPLES, MAX_CONSISTENCY_FRAMES, SAMPLE_RATE_HZ};

/// Named feature switches for the detector layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VadFeatures {
    pub adaptive_threshold: bool,
    pub spectral_analysis: bool,
    pub consistency_check: bool,
    pub snr_analysis: bool,
    pub conversation_aware: bool,
}

impl Default for VadFeatures {
    fn default() -> Self {
        Self {
            adaptive_threshold: true,
            spectral_analysis: true,
            consistency_check: true,
            snr_analysis: true,
            conversation_aware: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Base amplitude threshold in raw sample units
    pub amplitude_threshold: f32,
    /// Accumulated silence required before a speech segment ends
    pub silence_threshold_ms: u32,
    /// Segments shorter than this are not counted as detections
    pub min_voice_duration_ms: u32,
    /// EWMA rate for the noise floor (applied only while un-voiced)
    pub noise_floor_alpha: f32,
    /// SNR margin above the noise floor for the adaptive threshold
    pub snr_threshold_db: f32,
    /// Accepted zero-crossing band for speech-like frames
    pub zcr_min: u16,
    pub zcr_max: u16,
    /// Minimum low-frequency energy ratio for speech-like frames
    pub low_freq_ratio_threshold: f32,
    /// Sliding-window length for the consistency layer
    pub consistency_frames: usize,
    /// Average window confidence required for a voiced decision
    pub confidence_threshold: f32,
    /// Per-context threshold multipliers, in percent
    pub idle_multiplier_percent: u16,
    pub listening_multiplier_percent: u16,
    pub speaking_multiplier_percent: u16,
    pub processing_multiplier_percent: u16,
    /// Threshold lift applied while the device's own speaker is active
    pub echo_suppression_db: f32,
    pub features: VadFeatures,
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            amplitude_threshold: 2000.0,
            silence_threshold_ms: 1500,
            min_voice_duration_ms: 200,
            noise_floor_alpha: 0.05,
            snr_threshold_db: 8.0,
            zcr_min: 5,
            zcr_max: 200,
            low_freq_ratio_threshold: 0.4,
            consistency_frames: 5,
            confidence_threshold: 0.6,
            idle_multiplier_percent: 80,
            listening_multiplier_percent: 100,
            speaking_multiplier_percent: 150,
            processing_multiplier_percent: 100,
            echo_suppression_db: 15.0,
            features: VadFeatures::default(),
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_size_samples: FRAME_SIZE_SAMPLES,
        }
    }
}

impl VadConfig {
    /// Tuned preset for back-and-forth conversation: ends segments sooner and
    /// leans harder against speaker echo.
    pub fn conversation() -> Self {
        Self {
            silence_threshold_ms: 1000,
            idle_multiplier_percent: 75,
            speaking_multiplier_percent: 170,
            echo_suppression_db: 18.0,
            ..Default::default()
        }
    }

    pub fn with_amplitude_threshold(mut self, threshold: f32) -> Self {
        self.amplitude_threshold = threshold;
        self
    }

    pub fn with_silence_threshold_ms(mut self, ms: u32) -> Self {
        self.silence_threshold_ms = ms;
        self
    }

    pub fn with_features(mut self, features: VadFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn frame_duration_ms(&self) -> u32 {
        (self.frame_size_samples as u32 * 1000) / self.sample_rate_hz
    }

    /// Out-of-range values are clamped, never rejected.
    pub fn clamped(mut self) -> Self {
        self.amplitude_threshold = self.amplitude_threshold.clamp(1.0, 32767.0);
        self.noise_floor_alpha = self.noise_floor_alpha.clamp(0.001, 0.5);
        self.snr_threshold_db = self.snr_threshold_db.clamp(0.0, 40.0);
        self.low_freq_ratio_threshold = self.low_freq_ratio_threshold.clamp(0.0, 1.0);
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        self.consistency_frames = self.consistency_frames.clamp(1, MAX_CONSISTENCY_FRAMES);
        self.echo_suppression_db = self.echo_suppression_db.clamp(0.0, 40.0);
        self.sample_rate_hz = self.sample_rate_hz.clamp(8_000, 48_000);
        self.frame_size_samples = self.frame_size_samples.clamp(64, 1024);
        if self.zcr_max < self.zcr_min {
            std::mem::swap(&mut self.zcr_min, &mut self.zcr_max);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_clamping() {
        let cfg = VadConfig::default().clamped();
        assert_eq!(cfg.amplitude_threshold, 2000.0);
        assert_eq!(cfg.consistency_frames, 5);
        assert_eq!(cfg.silence_threshold_ms, 1500);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = VadConfig {
            noise_floor_alpha: 3.0,
            consistency_frames: 100,
            confidence_threshold: -1.0,
            zcr_min: 300,
            zcr_max: 10,
            ..Default::default()
        }
        .clamped();
        assert_eq!(cfg.noise_floor_alpha, 0.5);
        assert_eq!(cfg.consistency_frames, MAX_CONSISTENCY_FRAMES);
        assert_eq!(cfg.confidence_threshold, 0.0);
        assert!(cfg.zcr_min <= cfg.zcr_max);
    }

    #[test]
    fn zeroed_rates_are_clamped_to_safe_values() {
        let cfg = VadConfig {
            sample_rate_hz: 0,
            frame_size_samples: 0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(cfg.sample_rate_hz, 8_000);
        assert_eq!(cfg.frame_size_samples, 64);
        assert!(cfg.frame_duration_ms() > 0);
    }

    #[test]
    fn conversation_preset_tightens_timing() {
        let cfg = VadConfig::conversation();
        assert_eq!(cfg.silence_threshold_ms, 1000);
        assert_eq!(cfg.speaking_multiplier_percent, 170);
    }
}
