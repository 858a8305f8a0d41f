use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use murmur_feedback::{
    ChannelState, FeedbackError, FeedbackHandle, FeedbackListener, ThresholdUpdate,
    ValidationOutcome,
};
use murmur_foundation::{NotificationSink, StateNotification};
use murmur_telemetry::PipelineMetrics;
use murmur_wake::{WakeEventSink, WakeWordDetector, WakeWordResult};

use crate::pipeline::PipelineCommand;

/// Forwards wake word detections from the audio thread to the feedback
/// channel. Queue-full drops are counted, never blocked on.
pub struct DetectionReporter {
    feedback: FeedbackHandle,
    metrics: PipelineMetrics,
}

impl DetectionReporter {
    pub fn new(feedback: FeedbackHandle, metrics: PipelineMetrics) -> Self {
        Self { feedback, metrics }
    }
}

impl WakeEventSink for DetectionReporter {
    fn wake_word_detected(&self, result: &WakeWordResult) {
        match self.feedback.report_wake_word(result, None) {
            Ok(()) => {}
            Err(FeedbackError::QueueFull) => {
                self.metrics.feedback_drops.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(error = %e, detection_id = result.detection_id,
                    "failed to report wake word detection");
            }
        }
    }
}

/// Applies server-side events to the local detectors: validation verdicts
/// and threshold pushes go to the wake word detector, TTS playback markers
/// become echo-suppression commands for the VAD.
pub struct ServerEventBridge {
    detector: Arc<WakeWordDetector>,
    pipeline_cmds: Mutex<Sender<PipelineCommand>>,
    metrics: PipelineMetrics,
    notifier: Arc<dyn NotificationSink>,
}

impl ServerEventBridge {
    pub fn new(
        detector: Arc<WakeWordDetector>,
        pipeline_cmds: Sender<PipelineCommand>,
        metrics: PipelineMetrics,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            detector,
            pipeline_cmds: Mutex::new(pipeline_cmds),
            metrics,
            notifier,
        }
    }

    /// Point server events at a freshly spawned pipeline after a restart.
    pub fn rebind_pipeline(&self, cmds: Sender<PipelineCommand>) {
        *self.pipeline_cmds.lock() = cmds;
    }
}

impl FeedbackListener for ServerEventBridge {
    fn on_validation(&self, outcome: ValidationOutcome) {
        let result = self.detector.server_feedback(
            outcome.detection_id,
            outcome.validated,
            outcome.rtt_ms.unwrap_or(0),
        );
        if result.is_err() {
            self.metrics.busy_skips.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                detection_id = outcome.detection_id,
                "detector busy, validation verdict dropped"
            );
            return;
        }

        // Server may piggyback tuned thresholds on a verdict.
        if outcome.suggested_energy_threshold.is_some()
            || outcome.suggested_confidence_threshold.is_some()
        {
            let energy = outcome.suggested_energy_threshold.unwrap_or(0.0);
            let confidence = outcome.suggested_confidence_threshold.unwrap_or(0.0);
            if self.detector.update_thresholds(energy, confidence).is_err() {
                self.metrics.busy_skips.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn on_threshold_update(&self, update: ThresholdUpdate) {
        tracing::info!(
            energy = update.energy_threshold,
            confidence = update.confidence_threshold,
            reason = %update.reason,
            urgency = %update.urgency,
            "server threshold update"
        );
        if self
            .detector
            .update_thresholds(update.energy_threshold, update.confidence_threshold)
            .is_err()
        {
            self.metrics.busy_skips.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_state_change(&self, state: ChannelState) {
        tracing::info!(?state, "feedback channel state");
        self.notifier.notify(StateNotification::new(
            format!("{state:?}").to_lowercase(),
            "feedback channel",
        ));
    }

    fn on_playback_level(&self, level: f32) {
        if self
            .pipeline_cmds
            .lock()
            .try_send(PipelineCommand::SetPlaybackLevel(level))
            .is_err()
        {
            tracing::warn!(level, "pipeline command queue full, playback level dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use murmur_foundation::{ChannelNotifier, LogNotifier};
    use murmur_wake::{WakeWordConfig, WakeWordStats};

    fn bridge_with_queue(
        capacity: usize,
    ) -> (ServerEventBridge, crossbeam_channel::Receiver<PipelineCommand>) {
        let detector = Arc::new(WakeWordDetector::new(WakeWordConfig::default()));
        let (tx, rx) = bounded(capacity);
        let bridge = ServerEventBridge::new(
            detector,
            tx,
            PipelineMetrics::default(),
            Arc::new(LogNotifier),
        );
        (bridge, rx)
    }

    #[test]
    fn playback_level_becomes_pipeline_command() {
        let (bridge, rx) = bridge_with_queue(4);
        bridge.on_playback_level(1.0);
        match rx.try_recv().unwrap() {
            PipelineCommand::SetPlaybackLevel(level) => assert_eq!(level, 1.0),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejection_verdict_raises_detector_threshold() {
        let detector = Arc::new(WakeWordDetector::new(WakeWordConfig::default()));
        let (tx, _rx) = bounded(4);
        let bridge = ServerEventBridge::new(
            Arc::clone(&detector),
            tx,
            PipelineMetrics::default(),
            Arc::new(LogNotifier),
        );
        let before = detector.stats().current_energy_threshold;

        bridge.on_validation(ValidationOutcome {
            detection_id: 1,
            validated: false,
            confidence: 0.3,
            rtt_ms: Some(40),
            suggested_energy_threshold: None,
            suggested_confidence_threshold: None,
        });

        let stats: WakeWordStats = detector.stats();
        assert_eq!(stats.false_positives, 1);
        assert!(stats.current_energy_threshold > before);
    }

    #[test]
    fn threshold_update_is_applied_within_bounds() {
        let (bridge, _rx) = bridge_with_queue(4);
        bridge.on_threshold_update(ThresholdUpdate {
            energy_threshold: 4000.0,
            confidence_threshold: 0.7,
            reason: "drift".into(),
            urgency: "normal".into(),
        });
        let stats = bridge.detector.stats();
        assert_eq!(stats.current_energy_threshold, 4000.0);
        assert_eq!(stats.current_confidence_threshold, 0.7);
    }

    #[test]
    fn rebind_points_commands_at_the_new_pipeline() {
        let (bridge, old_rx) = bridge_with_queue(4);
        let (new_tx, new_rx) = bounded(4);
        bridge.rebind_pipeline(new_tx);

        bridge.on_playback_level(0.5);
        assert!(old_rx.try_recv().is_err());
        match new_rx.try_recv().unwrap() {
            PipelineCommand::SetPlaybackLevel(level) => assert_eq!(level, 0.5),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn channel_state_changes_are_published() {
        let detector = Arc::new(WakeWordDetector::new(WakeWordConfig::default()));
        let (tx, _rx) = bounded(4);
        let (notifier, notifications) = ChannelNotifier::new(4);
        let bridge = ServerEventBridge::new(
            detector,
            tx,
            PipelineMetrics::default(),
            Arc::new(notifier),
        );

        bridge.on_state_change(ChannelState::Connected);
        let n = notifications.try_recv().unwrap();
        assert_eq!(n.state, "connected");
    }

    #[test]
    fn suggested_thresholds_on_verdict_are_applied() {
        let (bridge, _rx) = bridge_with_queue(4);
        bridge.on_validation(ValidationOutcome {
            detection_id: 2,
            validated: true,
            confidence: 0.9,
            rtt_ms: None,
            suggested_energy_threshold: Some(3800.0),
            suggested_confidence_threshold: None,
        });
        assert_eq!(bridge.detector.stats().current_energy_threshold, 3800.0);
    }
}
