use super::config::VadConfig;
use super::consistency::ConsistencyWindow;
use super::constants::MAX_CONSISTENCY_FRAMES;
use super::energy::{self, NoiseFloor};
use super::spectral;
use super::types::{ConversationContext, VadResult, VadStats};

/// Three-layer adaptive voice activity detector.
///
/// Layer 1 gates on frame energy against a noise-floor-derived adaptive
/// threshold, layer 2 checks cheap spectral cues (ZCR band, low-frequency
/// energy ratio), layer 3 smooths the per-frame decision over a sliding
/// window. Time is a logical clock advanced by one frame period per call,
/// so behavior is deterministic at the 20ms cadence.
///
/// `process` is a hard real-time call: no locking, no allocation, always
/// returns a result.
pub struct AdaptiveVad {
    config: VadConfig,
    noise_floor: NoiseFloor,
    window: ConsistencyWindow<MAX_CONSISTENCY_FRAMES>,
    context: ConversationContext,
    echo_reference_level: f32,
    clock_ms: u64,
    /// True between a speech_started and its speech_ended
    in_segment: bool,
    voice_active: bool,
    segment_start_ms: u64,
    silence_accum_ms: u64,
    stats: VadStats,
}

impl AdaptiveVad {
    pub fn new(config: VadConfig) -> Self {
        let config = config.clamped();
        let initial_floor = config.amplitude_threshold * 0.3;
        let window = ConsistencyWindow::new(config.consistency_frames);
        Self {
            config,
            noise_floor: NoiseFloor::new(initial_floor),
            window,
            context: ConversationContext::Idle,
            echo_reference_level: 0.0,
            clock_ms: 0,
            in_segment: false,
            voice_active: false,
            segment_start_ms: 0,
            silence_accum_ms: 0,
            stats: VadStats {
                current_noise_floor: initial_floor,
                min_noise_floor: initial_floor,
                max_noise_floor: initial_floor,
                ..Default::default()
            },
        }
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn stats(&self) -> VadStats {
        let mut stats = self.stats;
        stats.current_noise_floor = self.noise_floor.current();
        stats.min_noise_floor = self.noise_floor.min_seen();
        stats.max_noise_floor = self.noise_floor.max_seen();
        stats
    }

    /// Replace the configuration. Detection state (noise floor, open
    /// segment, clock) is preserved; the consistency window restarts if its
    /// length changed.
    pub fn update_config(&mut self, config: VadConfig) {
        let config = config.clamped();
        if config.consistency_frames != self.window.window_len() {
            self.window.set_window_len(config.consistency_frames);
        }
        self.config = config;
    }

    pub fn set_conversation_context(&mut self, context: ConversationContext) {
        self.context = context;
    }

    pub fn conversation_context(&self) -> ConversationContext {
        self.context
    }

    /// Last-known playback level, 0.0-1.0. A level above 0.1 means the
    /// speaker is audibly active, so the detector enters the Speaking
    /// context; dropping back below releases it.
    pub fn set_echo_reference_level(&mut self, level: f32) {
        self.echo_reference_level = level.clamp(0.0, 1.0);
        if self.echo_reference_level > 0.1 {
            self.context = ConversationContext::Speaking;
        } else if self.context == ConversationContext::Speaking {
            self.context = ConversationContext::Listening;
        }
    }

    pub fn reset(&mut self) {
        let initial_floor = self.config.amplitude_threshold * 0.3;
        self.noise_floor = NoiseFloor::new(initial_floor);
        self.window.clear();
        self.clock_ms = 0;
        self.in_segment = false;
        self.voice_active = false;
        self.segment_start_ms = 0;
        self.silence_accum_ms = 0;
        self.echo_reference_level = 0.0;
        self.stats = VadStats {
            current_noise_floor: initial_floor,
            min_noise_floor: initial_floor,
            max_noise_floor: initial_floor,
            ..Default::default()
        };
    }

    pub fn process(&mut self, frame: &[i16]) -> VadResult {
        if frame.is_empty() {
            return VadResult::quiescent(self.context);
        }

        self.clock_ms += self.config.frame_duration_ms() as u64;
        self.stats.frames_processed += 1;

        let energy = energy::measure(frame);
        let threshold = self.effective_threshold();
        let snr_db = self.noise_floor.snr_db(energy.rms);

        let energy_voiced = energy.rms > threshold;
        let energy_confidence = if !energy_voiced {
            0.0
        } else if self.config.features.snr_analysis {
            (snr_db / (2.0 * self.config.snr_threshold_db.max(0.1))).clamp(0.0, 1.0)
        } else {
            (energy.rms / (2.0 * threshold)).clamp(0.0, 1.0)
        };

        // Floor only tracks un-voiced frames, so speech can't pull it up.
        if !energy_voiced {
            self.noise_floor
                .update(energy.rms, self.config.noise_floor_alpha);
            self.stats.adaptations_count += 1;
        }

        let spectral = spectral::analyze(frame, &self.config);
        let (frame_voiced, frame_confidence) = if self.config.features.spectral_analysis {
            let spectral_confidence = if spectral.speech_like { 1.0 } else { 0.0 };
            (
                energy_voiced && spectral.speech_like,
                0.6 * energy_confidence + 0.4 * spectral_confidence,
            )
        } else {
            (energy_voiced, energy_confidence)
        };

        let (voiced, confidence) = if self.config.features.consistency_check {
            self.window.push(frame_voiced, frame_confidence);
            let consensus = self.window.consensus();
            let avg = self.window.average_confidence();
            // No voiced verdict until the window has seen a full history.
            (
                self.window.is_full()
                    && consensus >= 0.6
                    && avg >= self.config.confidence_threshold,
                avg,
            )
        } else {
            (frame_voiced, frame_confidence)
        };

        let mut speech_started = false;
        let mut speech_ended = false;

        if voiced {
            if !self.in_segment {
                speech_started = true;
                self.in_segment = true;
                self.segment_start_ms = self.clock_ms;
            }
            self.silence_accum_ms = 0;
        } else if self.in_segment {
            self.silence_accum_ms += self.config.frame_duration_ms() as u64;
            if self.silence_accum_ms >= self.config.silence_threshold_ms as u64 {
                speech_ended = true;
                self.in_segment = false;
                let duration = self
                    .clock_ms
                    .saturating_sub(self.segment_start_ms)
                    .saturating_sub(self.silence_accum_ms);
                if duration >= self.config.min_voice_duration_ms as u64 {
                    self.stats.detection_count += 1;
                }
                self.silence_accum_ms = 0;
            }
        }
        self.voice_active = voiced;

        let n = self.stats.frames_processed as f32;
        self.stats.average_confidence += (confidence - self.stats.average_confidence) / n;

        VadResult {
            voice_detected: voiced,
            speech_started,
            speech_ended,
            confidence,
            max_amplitude: energy.peak,
            noise_floor: self.noise_floor.current(),
            snr_db,
            zero_crossing_rate: spectral.zero_crossings,
            low_freq_energy_ratio: spectral.low_freq_ratio,
            detection_quality: (confidence.clamp(0.0, 1.0) * 255.0) as u8,
            high_confidence: confidence >= 0.8,
            conversation_context: self.context,
            echo_suppression_active: self.echo_suppression_active(),
            spectral_valid: spectral.speech_like,
            noise_floor_updated: !energy_voiced,
            adaptive_threshold_active: self.config.features.adaptive_threshold,
            voice_duration_ms: if self.in_segment {
                self.clock_ms - self.segment_start_ms
            } else {
                0
            },
            silence_duration_ms: self.silence_accum_ms,
        }
    }

    fn echo_suppression_active(&self) -> bool {
        self.context == ConversationContext::Speaking && self.echo_reference_level > 0.1
    }

    fn effective_threshold(&self) -> f32 {
        let base = self.config.amplitude_threshold;
        let mut threshold = if self.config.features.adaptive_threshold {
            self.noise_floor
                .adaptive_threshold(self.config.snr_threshold_db, base)
        } else {
            base
        };

        if self.config.features.conversation_aware {
            let percent = match self.context {
                ConversationContext::Idle => self.config.idle_multiplier_percent,
                ConversationContext::Listening => self.config.listening_multiplier_percent,
                ConversationContext::Speaking => self.config.speaking_multiplier_percent,
                ConversationContext::Processing => self.config.processing_multiplier_percent,
            };
            threshold *= percent as f32 / 100.0;

            if self.context == ConversationContext::Speaking && self.echo_reference_level > 0.0 {
                let lift = 1.0 - 10f32.powf(-self.config.echo_suppression_db / 20.0);
                threshold *= 1.0 + self.echo_reference_level * lift;
            }
        }

        threshold
    }
}
