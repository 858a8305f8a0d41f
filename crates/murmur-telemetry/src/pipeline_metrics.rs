use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared metrics for cross-thread pipeline monitoring
#[derive(Clone)]
pub struct PipelineMetrics {
    // Audio level monitoring
    pub current_peak: Arc<AtomicI16>, // Peak sample value in current window
    pub current_rms: Arc<AtomicU64>,  // RMS * 1000 for precision
    pub audio_level_db: Arc<AtomicI16>, // Current level in dB * 10

    // Pipeline stage tracking
    pub stage_capture: Arc<AtomicBool>,
    pub stage_vad: Arc<AtomicBool>,
    pub stage_wake: Arc<AtomicBool>,
    pub stage_transport: Arc<AtomicBool>,

    // Frame rate tracking
    pub capture_fps: Arc<AtomicU64>, // Frames per second * 10

    // Event counters
    pub frames_processed: Arc<AtomicU64>,
    pub speech_segments: Arc<AtomicU64>,
    pub wake_detections: Arc<AtomicU64>,
    pub packets_sent: Arc<AtomicU64>,
    pub packets_suppressed: Arc<AtomicU64>,
    pub feedback_drops: Arc<AtomicU64>,

    // Error tracking
    pub capture_errors: Arc<AtomicU64>,
    pub transport_errors: Arc<AtomicU64>,
    pub busy_skips: Arc<AtomicU64>,

    // Activity indicators
    pub is_speaking: Arc<AtomicBool>,
    pub last_speech_time: Arc<RwLock<Option<Instant>>>,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self {
            current_peak: Arc::new(AtomicI16::new(0)),
            current_rms: Arc::new(AtomicU64::new(0)),
            audio_level_db: Arc::new(AtomicI16::new(-900)),

            stage_capture: Arc::new(AtomicBool::new(false)),
            stage_vad: Arc::new(AtomicBool::new(false)),
            stage_wake: Arc::new(AtomicBool::new(false)),
            stage_transport: Arc::new(AtomicBool::new(false)),

            capture_fps: Arc::new(AtomicU64::new(0)),

            frames_processed: Arc::new(AtomicU64::new(0)),
            speech_segments: Arc::new(AtomicU64::new(0)),
            wake_detections: Arc::new(AtomicU64::new(0)),
            packets_sent: Arc::new(AtomicU64::new(0)),
            packets_suppressed: Arc::new(AtomicU64::new(0)),
            feedback_drops: Arc::new(AtomicU64::new(0)),

            capture_errors: Arc::new(AtomicU64::new(0)),
            transport_errors: Arc::new(AtomicU64::new(0)),
            busy_skips: Arc::new(AtomicU64::new(0)),

            is_speaking: Arc::new(AtomicBool::new(false)),
            last_speech_time: Arc::new(RwLock::new(None)),
        }
    }
}

impl PipelineMetrics {
    pub fn update_audio_level(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }

        let peak = samples.iter().map(|&s| s.saturating_abs()).max().unwrap_or(0);
        self.current_peak.store(peak, Ordering::Relaxed);

        let sum: i64 = samples.iter().map(|&s| s as i64 * s as i64).sum();
        let rms = ((sum as f64 / samples.len() as f64).sqrt() * 1000.0) as u64;
        self.current_rms.store(rms, Ordering::Relaxed);

        let db = if peak > 0 {
            (20.0 * (peak as f64 / 32768.0).log10() * 10.0) as i16
        } else {
            -900
        };
        self.audio_level_db.store(db, Ordering::Relaxed);
    }

    pub fn mark_stage_active(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Capture => self.stage_capture.store(true, Ordering::Relaxed),
            PipelineStage::Vad => self.stage_vad.store(true, Ordering::Relaxed),
            PipelineStage::Wake => self.stage_wake.store(true, Ordering::Relaxed),
            PipelineStage::Transport => self.stage_transport.store(true, Ordering::Relaxed),
        }
    }

    pub fn decay_stages(&self) {
        self.stage_capture.store(false, Ordering::Relaxed);
        self.stage_vad.store(false, Ordering::Relaxed);
        self.stage_wake.store(false, Ordering::Relaxed);
        self.stage_transport.store(false, Ordering::Relaxed);
    }

    pub fn update_capture_fps(&self, fps: f64) {
        self.capture_fps.store((fps * 10.0) as u64, Ordering::Relaxed);
    }

    pub fn increment_frames(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.is_speaking.store(speaking, Ordering::Relaxed);
        if speaking {
            *self.last_speech_time.write() = Some(Instant::now());
            self.speech_segments.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PipelineStage {
    Capture,
    Vad,
    Wake,
    Transport,
}

#[derive(Debug)]
pub struct FpsTracker {
    last_update: Instant,
    frame_count: u64,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    pub fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed >= Duration::from_secs(1) {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.last_update = Instant::now();
            self.frame_count = 0;
            Some(fps)
        } else {
            None
        }
    }
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_level_silence() {
        let metrics = PipelineMetrics::default();
        metrics.update_audio_level(&[0i16; 320]);
        assert_eq!(metrics.current_peak.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.audio_level_db.load(Ordering::Relaxed), -900);
    }

    #[test]
    fn audio_level_full_scale() {
        let metrics = PipelineMetrics::default();
        metrics.update_audio_level(&[32767i16; 320]);
        assert_eq!(metrics.current_peak.load(Ordering::Relaxed), 32767);
        // Full scale is ~0 dBFS, stored as dB * 10.
        assert!(metrics.audio_level_db.load(Ordering::Relaxed) >= -5);
    }

    #[test]
    fn speaking_bumps_segment_count() {
        let metrics = PipelineMetrics::default();
        metrics.set_speaking(true);
        metrics.set_speaking(false);
        metrics.set_speaking(true);
        assert_eq!(metrics.speech_segments.load(Ordering::Relaxed), 2);
    }
}
