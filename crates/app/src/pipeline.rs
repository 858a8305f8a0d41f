use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use murmur_foundation::{AppError, CaptureError};
use murmur_telemetry::{FpsTracker, PipelineMetrics, PipelineStage};
use murmur_transport::{FrameTransport, TransportStats};
use murmur_vad::{AdaptiveVad, ConversationContext, VadConfig};
use murmur_wake::{WakeError, WakeWordDetector, WakeWordState};

use crate::capture::CaptureSource;

const COMMAND_QUEUE_CAPACITY: usize = 16;
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Control messages applied between frames on the audio thread.
#[derive(Debug, Clone)]
pub enum PipelineCommand {
    /// Speaker playback level for echo suppression, 0.0-1.0
    SetPlaybackLevel(f32),
    SetContext(ConversationContext),
    UpdateVadConfig(VadConfig),
}

/// The real-time audio loop: capture, VAD, wake word scoring, packetized
/// transport. Runs on a dedicated thread; everything else talks to it
/// through the command channel or the shared detector handle.
pub struct AudioPipeline<C: CaptureSource> {
    capture: C,
    vad: AdaptiveVad,
    wake: Arc<WakeWordDetector>,
    transport: FrameTransport,
    metrics: PipelineMetrics,
    cmd_rx: Receiver<PipelineCommand>,
    running: Arc<AtomicBool>,
    transport_stats: Arc<Mutex<TransportStats>>,
    frame: Vec<i16>,
    fps: FpsTracker,
}

pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    cmd_tx: Sender<PipelineCommand>,
    transport_stats: Arc<Mutex<TransportStats>>,
    join: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Non-blocking; returns false when the command queue is full or the
    /// pipeline has stopped.
    pub fn send_command(&self, cmd: PipelineCommand) -> bool {
        self.cmd_tx.try_send(cmd).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Cloneable sender for collaborators that issue commands directly.
    pub fn command_sender(&self) -> Sender<PipelineCommand> {
        self.cmd_tx.clone()
    }

    /// Snapshot of the transport counters, refreshed once per frame.
    pub fn transport_stats(&self) -> TransportStats {
        *self.transport_stats.lock()
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("audio pipeline thread panicked");
            }
        }
    }
}

impl<C: CaptureSource + 'static> AudioPipeline<C> {
    pub fn spawn(
        capture: C,
        vad: AdaptiveVad,
        wake: Arc<WakeWordDetector>,
        transport: FrameTransport,
        metrics: PipelineMetrics,
    ) -> PipelineHandle {
        let (pipeline, running, cmd_tx, transport_stats) =
            Self::build(capture, vad, wake, transport, metrics);
        let join = std::thread::spawn(move || pipeline.run());
        PipelineHandle {
            running,
            cmd_tx,
            transport_stats,
            join: Some(join),
        }
    }

    fn build(
        capture: C,
        vad: AdaptiveVad,
        wake: Arc<WakeWordDetector>,
        transport: FrameTransport,
        metrics: PipelineMetrics,
    ) -> (
        Self,
        Arc<AtomicBool>,
        Sender<PipelineCommand>,
        Arc<Mutex<TransportStats>>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(COMMAND_QUEUE_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let transport_stats = Arc::new(Mutex::new(TransportStats::default()));
        let frame = vec![0i16; vad.config().frame_size_samples];
        let pipeline = Self {
            capture,
            vad,
            wake,
            transport,
            metrics,
            cmd_rx,
            running: Arc::clone(&running),
            transport_stats: Arc::clone(&transport_stats),
            frame,
            fps: FpsTracker::new(),
        };
        (pipeline, running, cmd_tx, transport_stats)
    }

    fn run(mut self) {
        tracing::info!(
            frame_samples = self.frame.len(),
            sample_rate = self.capture.sample_rate(),
            "audio pipeline started"
        );
        let mut consecutive_errors = 0u32;

        while self.running.load(Ordering::SeqCst) {
            match self.step() {
                Ok(true) => consecutive_errors = 0,
                Ok(false) => {
                    tracing::info!("capture source exhausted, pipeline stopping");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(error = %e, attempt = consecutive_errors, "pipeline step failed");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        tracing::error!("giving up after repeated pipeline errors");
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.metrics.decay_stages();
        tracing::info!(stats = ?self.transport.stats(), "audio pipeline stopped");
    }

    /// One frame through the whole pipeline. Ok(false) means the capture
    /// source is done and the loop should stop.
    fn step(&mut self) -> Result<bool, AppError> {
        self.drain_commands();

        let mut frame = std::mem::take(&mut self.frame);
        let capture_result = self.capture.next_frame(&mut frame);
        self.frame = frame;
        match capture_result {
            Ok(()) => {}
            Err(CaptureError::Exhausted) => return Ok(false),
            Err(e) => {
                self.metrics.capture_errors.fetch_add(1, Ordering::Relaxed);
                return Err(AppError::Capture(e));
            }
        }

        self.metrics.mark_stage_active(PipelineStage::Capture);
        self.metrics.update_audio_level(&self.frame);
        self.metrics.increment_frames();
        if let Some(fps) = self.fps.tick() {
            self.metrics.update_capture_fps(fps);
        }

        let vad = self.vad.process(&self.frame);
        self.metrics.mark_stage_active(PipelineStage::Vad);
        if vad.speech_started {
            self.metrics.set_speaking(true);
        } else if vad.speech_ended {
            self.metrics.set_speaking(false);
        }

        let wake = match self.wake.process(&self.frame, Some(&vad)) {
            Ok(result) => {
                self.metrics.mark_stage_active(PipelineStage::Wake);
                if result.state == WakeWordState::Triggered {
                    self.metrics.wake_detections.fetch_add(1, Ordering::Relaxed);
                }
                Some(result)
            }
            Err(WakeError::Busy(_)) => {
                // Control path holds the detector lock; skip scoring for
                // this frame rather than stalling the audio thread.
                self.metrics.busy_skips.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "wake word processing failed");
                None
            }
        };

        match self
            .transport
            .send_with_wake_word(&self.frame, Some(&vad), wake.as_ref())
        {
            Ok(sent) => {
                self.metrics.mark_stage_active(PipelineStage::Transport);
                if sent {
                    self.metrics.packets_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.metrics
                        .packets_suppressed
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                self.metrics.transport_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "frame transmission failed");
            }
        }

        *self.transport_stats.lock() = self.transport.stats();
        Ok(true)
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            match cmd {
                PipelineCommand::SetPlaybackLevel(level) => {
                    self.vad.set_echo_reference_level(level);
                }
                PipelineCommand::SetContext(context) => {
                    self.vad.set_conversation_context(context);
                }
                PipelineCommand::UpdateVadConfig(config) => {
                    self.vad.update_config(config);
                }
            }
        }
    }
}
