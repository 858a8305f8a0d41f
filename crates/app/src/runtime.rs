use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use murmur_feedback::{FeedbackChannel, FeedbackError};
use murmur_foundation::{
    DeviceState, LogNotifier, NotificationSink, ShutdownHandler, StateManager,
};
use murmur_telemetry::PipelineMetrics;
use murmur_transport::{FrameTransport, UdpDatagramSink};
use murmur_vad::AdaptiveVad;
use murmur_wake::WakeWordDetector;

use crate::bridge::{DetectionReporter, ServerEventBridge};
use crate::capture::SyntheticCapture;
use crate::config::AppSettings;
use crate::pipeline::{AudioPipeline, PipelineHandle};

/// Restart budget for a pipeline that dies on its own.
const MAX_PIPELINE_RESTARTS: u32 = 3;

fn spawn_pipeline(
    settings: &AppSettings,
    detector: &Arc<WakeWordDetector>,
    metrics: &PipelineMetrics,
) -> anyhow::Result<PipelineHandle> {
    let vad = AdaptiveVad::new(settings.vad.clone());
    let sink = UdpDatagramSink::connect(&settings.device.audio_server)
        .with_context(|| format!("connecting to audio server {}", settings.device.audio_server))?;
    let transport = FrameTransport::new(Box::new(sink), settings.transport.to_config());

    // Stand-in capture source; a hardware microphone plugs in behind the
    // same CaptureSource trait.
    let capture = SyntheticCapture::new(settings.vad.sample_rate_hz, 100, 40, 4000).paced();

    Ok(AudioPipeline::spawn(
        capture,
        vad,
        Arc::clone(detector),
        transport,
        metrics.clone(),
    ))
}

/// Wires the full device pipeline together and runs it until shutdown:
/// capture thread, VAD, wake word detector, UDP frame transport, and the
/// WebSocket feedback channel. A pipeline that dies on its own is restarted
/// through the Recovering state, up to the restart budget.
pub async fn run(settings: AppSettings) -> anyhow::Result<()> {
    let notifier: Arc<dyn NotificationSink> = Arc::new(LogNotifier);
    let state_manager = StateManager::new(Arc::clone(&notifier));
    let shutdown = ShutdownHandler::new().install().await;
    let metrics = PipelineMetrics::default();

    let detector = Arc::new(WakeWordDetector::new(settings.wake.clone()));

    let mut pipeline = spawn_pipeline(&settings, &detector, &metrics)?;
    tracing::info!(server = %settings.device.audio_server, "audio transport ready");

    let bridge = Arc::new(ServerEventBridge::new(
        Arc::clone(&detector),
        pipeline.command_sender(),
        metrics.clone(),
        Arc::clone(&notifier),
    ));
    let (feedback, feedback_task) = FeedbackChannel::spawn(settings.feedback_config(), bridge.clone());
    detector.set_sink(Arc::new(DetectionReporter::new(
        feedback.clone(),
        metrics.clone(),
    )));

    state_manager.transition(DeviceState::Running)?;

    let mut stats_interval = tokio::time::interval(Duration::from_secs(
        settings.feedback.stats_interval_secs.max(1),
    ));
    stats_interval.tick().await; // skip the immediate first tick
    let mut pipeline_watchdog = tokio::time::interval(Duration::from_secs(1));
    let mut restarts = 0u32;

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                tracing::info!("shutdown requested");
                break;
            }
            _ = stats_interval.tick() => {
                let wake_stats = detector.stats();
                let transport_stats = pipeline.transport_stats();
                tracing::info!(
                    detections = wake_stats.total_detections,
                    packets = transport_stats.packets_sent,
                    suppressed = transport_stats.suppressed_packets,
                    saved_bytes = transport_stats.bandwidth_saved_bytes,
                    "pipeline statistics"
                );
                match feedback.report_statistics(&wake_stats, &transport_stats) {
                    Ok(()) | Err(FeedbackError::QueueFull) => {}
                    Err(e) => tracing::debug!(error = %e, "statistics report not sent"),
                }
            }
            _ = pipeline_watchdog.tick() => {
                if pipeline.is_running() {
                    continue;
                }
                if restarts >= MAX_PIPELINE_RESTARTS {
                    tracing::error!(restarts, "audio pipeline keeps dying, shutting down");
                    break;
                }
                restarts += 1;
                state_manager.transition(DeviceState::Recovering {
                    reason: format!("pipeline restart {restarts}"),
                })?;
                tracing::warn!(restarts, "audio pipeline stopped on its own, restarting");

                let fresh = spawn_pipeline(&settings, &detector, &metrics)?;
                std::mem::replace(&mut pipeline, fresh).stop();
                bridge.rebind_pipeline(pipeline.command_sender());
                state_manager.transition(DeviceState::Running)?;
            }
        }
    }

    state_manager.transition(DeviceState::Stopping)?;

    pipeline.stop();
    tracing::info!("audio pipeline stopped");

    feedback.disconnect();
    feedback_task.abort();
    let _ = feedback_task.await;
    tracing::info!("feedback channel closed");

    state_manager.transition(DeviceState::Stopped)?;
    Ok(())
}
