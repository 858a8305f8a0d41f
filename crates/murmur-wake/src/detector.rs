use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use murmur_vad::energy;
use murmur_vad::VadResult;

use super::config::WakeWordConfig;
use super::error::WakeError;
use super::pattern::{
    self, EXPECTED_SYLLABLES, REFERENCE_ENVELOPE, SYLLABLE_LEVEL,
};
use super::types::{WakeWordResult, WakeWordState, WakeWordStats};

/// Lock budget on the real-time audio path
const PROCESS_LOCK_TIMEOUT: Duration = Duration::from_millis(10);
/// Lock budget off the hot path (network-side calls)
const CONTROL_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

const ENERGY_HISTORY_FRAMES: usize = 50;
/// Background threshold re-centering cadence, ~5s at 20ms frames
const RECENTER_INTERVAL_FRAMES: u64 = 250;

/// Listener for Triggered transitions. Implementations must return quickly;
/// they run on the audio thread. Queue the result, don't act on it inline.
pub trait WakeEventSink: Send + Sync {
    fn wake_word_detected(&self, result: &WakeWordResult);
}

#[derive(Debug, Clone, Copy)]
struct Detection {
    id: u32,
    confidence: f32,
    pattern_score: u16,
    syllables: u8,
    duration_ms: u32,
}

struct Inner {
    config: WakeWordConfig,
    enabled: bool,
    current_energy_threshold: f32,
    current_confidence_threshold: f32,

    clock_ms: u64,
    frames_processed: u64,

    pattern: Vec<f32>,
    collecting: bool,
    gap_ms: u64,

    energy_history: [f32; ENERGY_HISTORY_FRAMES],
    history_head: usize,
    history_filled: usize,

    state: WakeWordState,
    open_detection: Option<Detection>,
    last_detection: Option<Detection>,
    /// Confirmed/Rejected event waiting to surface on the next process call
    pending_report: Option<WakeWordState>,
    next_detection_id: u32,

    window_start_ms: u64,
    detections_in_window: u32,

    stats: WakeWordStats,
    sink: Option<Arc<dyn WakeEventSink>>,
}

/// Energy-envelope wake word detector.
///
/// A detection window opens when frame energy clears the adaptive threshold;
/// while open, every frame's normalized energy joins the pattern buffer so
/// inter-syllable dips are preserved. A full buffer or a long enough
/// below-threshold gap closes the window and scores the buffer against the
/// reference envelope.
///
/// All methods take `&self`; internal state sits behind a mutex with bounded
/// waits so the audio thread and the network thread can never deadlock each
/// other. A lock timeout surfaces as `WakeError::Busy` and the frame is
/// dropped for this stage.
pub struct WakeWordDetector {
    inner: Mutex<Inner>,
}

impl WakeWordDetector {
    pub fn new(config: WakeWordConfig) -> Self {
        let config = config.clamped();
        let energy_threshold = config.energy_threshold;
        let confidence_threshold = config.confidence_threshold;
        Self {
            inner: Mutex::new(Inner {
                config,
                enabled: true,
                current_energy_threshold: energy_threshold,
                current_confidence_threshold: confidence_threshold,
                clock_ms: 0,
                frames_processed: 0,
                pattern: Vec::with_capacity(super::config::MAX_PATTERN_FRAMES),
                collecting: false,
                gap_ms: 0,
                energy_history: [0.0; ENERGY_HISTORY_FRAMES],
                history_head: 0,
                history_filled: 0,
                state: WakeWordState::Listening,
                open_detection: None,
                last_detection: None,
                pending_report: None,
                next_detection_id: 1,
                window_start_ms: 0,
                detections_in_window: 0,
                stats: WakeWordStats::default(),
                sink: None,
            }),
        }
    }

    pub fn set_sink(&self, sink: Arc<dyn WakeEventSink>) {
        self.inner.lock().sink = Some(sink);
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut inner = self.inner.lock();
        inner.enabled = enabled;
        if !enabled {
            inner.pattern.clear();
            inner.collecting = false;
            inner.gap_ms = 0;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Current window state (Triggered while awaiting server validation).
    pub fn state(&self) -> WakeWordState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> WakeWordStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats;
        stats.current_energy_threshold = inner.current_energy_threshold;
        stats.current_confidence_threshold = inner.current_confidence_threshold;
        let judged = stats.true_positives + stats.false_positives;
        stats.false_positive_rate = if judged > 0 {
            stats.false_positives as f32 / judged as f32
        } else {
            0.0
        };
        stats
    }

    /// Real-time path. Never blocks longer than the lock budget.
    pub fn process(
        &self,
        frame: &[i16],
        vad: Option<&VadResult>,
    ) -> Result<WakeWordResult, WakeError> {
        if frame.is_empty() {
            return Err(WakeError::EmptyFrame);
        }

        let mut inner = self
            .inner
            .try_lock_for(PROCESS_LOCK_TIMEOUT)
            .ok_or(WakeError::Busy(PROCESS_LOCK_TIMEOUT))?;

        let frame_ms = inner.config.frame_duration_ms() as u64;
        inner.clock_ms += frame_ms;
        inner.frames_processed += 1;

        let rms = energy::measure(frame).rms;
        inner.push_energy(rms);
        if inner.config.enable_adaptation
            && inner.frames_processed % RECENTER_INTERVAL_FRAMES == 0
        {
            inner.recenter_threshold();
        }

        let mut result = WakeWordResult::listening();
        result.energy_level = rms;
        result.vad_active = vad.map(|v| v.voice_detected).unwrap_or(false);

        if !inner.enabled {
            return Ok(result);
        }

        let voice_ok = vad.map(|v| v.voice_detected).unwrap_or(true);
        let above = rms > inner.current_energy_threshold && voice_ok;

        if above {
            if !inner.collecting {
                inner.collecting = true;
                inner.pattern.clear();
            }
            inner.gap_ms = 0;
        } else if inner.collecting {
            inner.gap_ms += frame_ms;
        }

        let mut triggered = None;
        if inner.collecting {
            let normalized = (rms / (2.0 * inner.current_energy_threshold)).min(1.0);
            inner.pattern.push(normalized);

            let full = inner.pattern.len() >= inner.config.pattern_frames;
            let gap_elapsed = inner.gap_ms > inner.config.silence_timeout_ms as u64;
            if full || gap_elapsed {
                triggered = inner.evaluate(vad);
            }
        }

        if let Some(detection) = triggered {
            result.state = WakeWordState::Triggered;
            result.detection_id = detection.id;
            result.confidence_score = detection.confidence;
            result.pattern_match_score = detection.pattern_score;
            result.syllable_count = detection.syllables;
            result.duration_ms = detection.duration_ms;
        } else if let Some(report) = inner.pending_report.take() {
            result.state = report;
            result.server_validated = report == WakeWordState::Confirmed;
            result.server_rejected = report == WakeWordState::Rejected;
            if let Some(last) = inner.last_detection {
                result.detection_id = last.id;
                result.confidence_score = last.confidence;
                result.pattern_match_score = last.pattern_score;
                result.syllable_count = last.syllables;
                result.duration_ms = last.duration_ms;
            }
        }

        let sink = inner.sink.clone();
        drop(inner);
        if result.state == WakeWordState::Triggered {
            if let Some(sink) = sink {
                sink.wake_word_detected(&result);
            }
        }

        Ok(result)
    }

    /// Server verdict for a reported detection. Called from the network
    /// path; adjusts the adaptive energy threshold and closes the matching
    /// detection window.
    pub fn server_feedback(
        &self,
        detection_id: u32,
        validated: bool,
        rtt_ms: u64,
    ) -> Result<(), WakeError> {
        let mut inner = self
            .inner
            .try_lock_for(CONTROL_LOCK_TIMEOUT)
            .ok_or(WakeError::Busy(CONTROL_LOCK_TIMEOUT))?;

        let (lo, hi) = inner.config.energy_threshold_bounds();
        if validated {
            inner.stats.true_positives += 1;
            inner.stats.consecutive_false_positives = 0;
            if inner.stats.true_positives > 5 {
                inner.current_energy_threshold =
                    (inner.current_energy_threshold * 0.98).clamp(lo, hi);
                inner.stats.threshold_adjustments += 1;
            }
        } else {
            inner.stats.false_positives += 1;
            inner.stats.consecutive_false_positives += 1;
            inner.current_energy_threshold =
                (inner.current_energy_threshold * 1.05).clamp(lo, hi);
            inner.stats.threshold_adjustments += 1;
            if inner.stats.consecutive_false_positives > 2 {
                inner.stats.consecutive_false_positives = 0;
            }
        }

        let matches_open = inner
            .open_detection
            .map(|d| d.id == detection_id)
            .unwrap_or(false);
        if matches_open && inner.state == WakeWordState::Triggered {
            inner.pending_report = Some(if validated {
                WakeWordState::Confirmed
            } else {
                WakeWordState::Rejected
            });
            inner.state = WakeWordState::Listening;
            inner.open_detection = None;
        }

        tracing::debug!(
            detection_id,
            validated,
            rtt_ms,
            threshold = inner.current_energy_threshold,
            "wake word server feedback"
        );
        Ok(())
    }

    /// Server-pushed threshold override. Out-of-range fields are ignored,
    /// in-range fields are clamped to the adaptation bounds.
    pub fn update_thresholds(&self, energy: f32, confidence: f32) -> Result<(), WakeError> {
        let mut inner = self
            .inner
            .try_lock_for(CONTROL_LOCK_TIMEOUT)
            .ok_or(WakeError::Busy(CONTROL_LOCK_TIMEOUT))?;

        if energy.is_finite() && energy > 0.0 {
            let (lo, hi) = inner.config.energy_threshold_bounds();
            inner.current_energy_threshold = energy.clamp(lo, hi);
            inner.stats.threshold_adjustments += 1;
        }
        if confidence.is_finite() && confidence > 0.0 && confidence <= 1.0 {
            let (lo, hi) = inner.config.confidence_threshold_bounds();
            inner.current_confidence_threshold = confidence.clamp(lo, hi);
            inner.stats.threshold_adjustments += 1;
        }
        Ok(())
    }
}

impl Inner {
    fn push_energy(&mut self, rms: f32) {
        self.energy_history[self.history_head] = rms;
        self.history_head = (self.history_head + 1) % ENERGY_HISTORY_FRAMES;
        if self.history_filled < ENERGY_HISTORY_FRAMES {
            self.history_filled += 1;
        }
    }

    fn recenter_threshold(&mut self) {
        if self.history_filled < ENERGY_HISTORY_FRAMES {
            return;
        }
        let avg: f32 =
            self.energy_history.iter().sum::<f32>() / ENERGY_HISTORY_FRAMES as f32;
        let target = avg * 2.5;
        let rate = self.config.adaptation_rate;
        let (lo, hi) = self.config.energy_threshold_bounds();
        self.current_energy_threshold =
            ((1.0 - rate) * self.current_energy_threshold + rate * target).clamp(lo, hi);
    }

    fn evaluate(&mut self, vad: Option<&VadResult>) -> Option<Detection> {
        let long_enough = self.pattern.len() >= self.config.min_detection_frames;
        let detection = if long_enough {
            let pattern_match = pattern::correlation(&self.pattern, &REFERENCE_ENVELOPE);
            let syllables = pattern::count_syllables(&self.pattern, SYLLABLE_LEVEL);
            let vad_high = vad.map(|v| v.high_confidence).unwrap_or(false);
            let confidence = pattern::score_confidence(
                pattern_match,
                syllables,
                EXPECTED_SYLLABLES,
                vad_high,
            );
            let duration_ms = self.pattern.len() as u32 * self.config.frame_duration_ms();

            if confidence >= self.current_confidence_threshold {
                self.try_trigger(confidence, pattern_match, syllables, duration_ms)
            } else {
                tracing::trace!(
                    confidence,
                    pattern_match,
                    syllables,
                    "wake word candidate below confidence threshold"
                );
                None
            }
        } else {
            None
        };

        self.pattern.clear();
        self.collecting = false;
        self.gap_ms = 0;
        detection
    }

    fn try_trigger(
        &mut self,
        confidence: f32,
        pattern_match: f32,
        syllables: u8,
        duration_ms: u32,
    ) -> Option<Detection> {
        // Rolling-minute rate limit.
        if self.clock_ms.saturating_sub(self.window_start_ms) >= 60_000 {
            self.window_start_ms = self.clock_ms;
            self.detections_in_window = 0;
        }
        if self.detections_in_window >= self.config.max_detections_per_min {
            self.stats.rate_limited += 1;
            tracing::warn!("wake word detection discarded by rate limit");
            return None;
        }
        self.detections_in_window += 1;

        let detection = Detection {
            id: self.next_detection_id,
            confidence,
            pattern_score: (pattern_match.clamp(0.0, 1.0) * 1000.0) as u16,
            syllables,
            duration_ms,
        };
        self.next_detection_id = self.next_detection_id.wrapping_add(1).max(1);

        self.state = WakeWordState::Triggered;
        self.open_detection = Some(detection);
        self.last_detection = Some(detection);

        self.stats.total_detections += 1;
        let n = self.stats.total_detections as f32;
        self.stats.average_confidence += (confidence - self.stats.average_confidence) / n;

        tracing::info!(
            detection_id = detection.id,
            confidence,
            syllables,
            duration_ms,
            "wake word triggered"
        );
        Some(detection)
    }
}
