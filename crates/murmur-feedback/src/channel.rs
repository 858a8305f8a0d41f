use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::{Sink, SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use murmur_transport::TransportStats;
use murmur_vad::VadResult;
use murmur_wake::{WakeWordResult, WakeWordStats};

use super::error::FeedbackError;
use super::messages::{ControlMessage, VadStatsReport, WakeWordStatsReport};
use super::pending::PendingValidations;

#[derive(Debug, Clone)]
pub struct FeedbackConfig {
    pub server_url: String,
    pub device_id: String,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub keepalive_interval: Duration,
    pub send_queue_capacity: usize,
    pub pending_capacity: usize,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8765/feedback".into(),
            device_id: "murmur-device".into(),
            reconnect_interval: Duration::from_secs(10),
            max_reconnect_attempts: 5,
            keepalive_interval: Duration::from_secs(30),
            send_queue_capacity: 20,
            pending_capacity: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Reconnect budget exhausted; the channel parks until connect()
    Failed,
}

/// Server verdict delivered back to the wake word detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationOutcome {
    pub detection_id: u32,
    pub validated: bool,
    pub confidence: f32,
    /// None when the pending table had no entry for this id
    pub rtt_ms: Option<u64>,
    pub suggested_energy_threshold: Option<f32>,
    pub suggested_confidence_threshold: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdUpdate {
    pub energy_threshold: f32,
    pub confidence_threshold: f32,
    pub reason: String,
    pub urgency: String,
}

/// Inbound event listener. Invoked from the network task; implementations
/// must hand work off quickly (apply thresholds, push to channels).
pub trait FeedbackListener: Send + Sync {
    fn on_validation(&self, outcome: ValidationOutcome);
    fn on_threshold_update(&self, update: ThresholdUpdate);
    fn on_state_change(&self, state: ChannelState);
    /// 1.0 while the server streams TTS audio, 0.0 when it stops
    fn on_playback_level(&self, level: f32);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeedbackStats {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub dropped_messages: u64,
    pub connect_count: u64,
    pub reconnections: u64,
    pub validations_received: u64,
    pub validations_positive: u64,
    pub validations_negative: u64,
    pub threshold_updates: u64,
    pub average_feedback_latency_ms: f32,
    pub latency_samples: u64,
    /// Milliseconds since the current connection was established; 0 while
    /// disconnected. Filled in by the stats() snapshot.
    pub uptime_ms: u64,
}

struct Shared {
    stats: Mutex<FeedbackStats>,
    pending: Mutex<PendingValidations>,
    connected: AtomicBool,
    connected_at: Mutex<Option<Instant>>,
    /// Whether the owner wants the channel up (connect/disconnect)
    desired: watch::Sender<bool>,
}

impl Shared {
    fn record_latency(&self, rtt_ms: u64) {
        let mut stats = self.stats.lock();
        stats.latency_samples += 1;
        let n = stats.latency_samples as f32;
        stats.average_feedback_latency_ms +=
            (rtt_ms as f32 - stats.average_feedback_latency_ms) / n;
    }
}

/// Caller-side handle. All methods are non-blocking: outbound messages go
/// through a bounded queue and are dropped (and counted) when it is full.
#[derive(Clone)]
pub struct FeedbackHandle {
    tx: mpsc::Sender<ControlMessage>,
    shared: Arc<Shared>,
    device_id: String,
}

impl FeedbackHandle {
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> FeedbackStats {
        let mut stats = *self.shared.stats.lock();
        if let Some(connected_at) = *self.shared.connected_at.lock() {
            stats.uptime_ms = connected_at.elapsed().as_millis() as u64;
        }
        stats
    }

    /// Ask the task to (re-)establish the connection.
    pub fn connect(&self) {
        self.shared.desired.send_replace(true);
    }

    /// Tear down the connection. Pending validations are abandoned.
    pub fn disconnect(&self) {
        self.shared.pending.lock().clear();
        self.shared.desired.send_replace(false);
    }

    pub fn report_wake_word(
        &self,
        wake: &WakeWordResult,
        vad: Option<&VadResult>,
    ) -> Result<(), FeedbackError> {
        let msg = ControlMessage::WakeWordDetection {
            detection_id: wake.detection_id,
            device_id: self.device_id.clone(),
            timestamp: now_ms(),
            confidence: wake.confidence_score,
            energy_level: wake.energy_level,
            pattern_score: wake.pattern_match_score,
            syllable_count: wake.syllable_count,
            duration_ms: wake.duration_ms,
            vad_active: wake.vad_active,
            snr_db: vad.map(|v| v.snr_db).unwrap_or(0.0),
        };
        self.try_send(msg)?;
        if !self
            .shared
            .pending
            .lock()
            .insert(wake.detection_id, Instant::now())
        {
            tracing::debug!(
                detection_id = wake.detection_id,
                "pending validation table full, RTT tracking dropped"
            );
        }
        Ok(())
    }

    pub fn report_statistics(
        &self,
        wake: &WakeWordStats,
        transport: &TransportStats,
    ) -> Result<(), FeedbackError> {
        self.try_send(ControlMessage::DeviceStatistics {
            device_id: self.device_id.clone(),
            timestamp: now_ms(),
            wake_word_stats: WakeWordStatsReport::from(wake),
            vad_stats: VadStatsReport::from(transport),
        })
    }

    pub fn ping(&self) -> Result<(), FeedbackError> {
        self.try_send(ControlMessage::Ping {
            device_id: self.device_id.clone(),
            timestamp: now_ms(),
        })
    }

    fn try_send(&self, msg: ControlMessage) -> Result<(), FeedbackError> {
        match self.tx.try_send(msg) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.shared.stats.lock().dropped_messages += 1;
                Err(FeedbackError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(FeedbackError::NotConnected),
        }
    }
}

enum ServeExit {
    /// The handle asked for a disconnect; park until reconnect is requested.
    Disconnected,
    /// Every handle has been dropped; the task can exit.
    HandlesDropped,
}

/// Owns the WebSocket control connection: a single sender loop drains the
/// bounded queue, inbound messages are dispatched to the listener, and a
/// reconnect loop with an attempt budget keeps the link alive.
pub struct FeedbackChannel {
    config: FeedbackConfig,
    listener: Arc<dyn FeedbackListener>,
    rx: mpsc::Receiver<ControlMessage>,
    shared: Arc<Shared>,
    desired_rx: watch::Receiver<bool>,
}

impl FeedbackChannel {
    pub fn spawn(
        config: FeedbackConfig,
        listener: Arc<dyn FeedbackListener>,
    ) -> (FeedbackHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.send_queue_capacity.max(1));
        let (desired, desired_rx) = watch::channel(true);
        let shared = Arc::new(Shared {
            stats: Mutex::new(FeedbackStats::default()),
            pending: Mutex::new(PendingValidations::new(config.pending_capacity)),
            connected: AtomicBool::new(false),
            connected_at: Mutex::new(None),
            desired,
        });
        let handle = FeedbackHandle {
            tx,
            shared: Arc::clone(&shared),
            device_id: config.device_id.clone(),
        };
        let channel = Self {
            config,
            listener,
            rx,
            shared,
            desired_rx,
        };
        let task = tokio::spawn(channel.run());
        (handle, task)
    }

    async fn run(mut self) {
        loop {
            if !*self.shared.desired.borrow() {
                self.set_state(ChannelState::Disconnected);
                // wait_for re-checks the current value before parking, so a
                // connect() landing just before the await is not lost
                if self.desired_rx.wait_for(|up| *up).await.is_err() {
                    return;
                }
                continue;
            }

            let mut attempts = 0u32;
            while *self.shared.desired.borrow() {
                let reconnect = self.shared.stats.lock().connect_count > 0;
                self.set_state(if reconnect {
                    ChannelState::Reconnecting
                } else {
                    ChannelState::Connecting
                });

                let connects_before = self.shared.stats.lock().connect_count;
                match self.connect_and_serve().await {
                    Ok(ServeExit::HandlesDropped) => {
                        tracing::debug!("all feedback handles dropped, channel task exiting");
                        return;
                    }
                    Ok(ServeExit::Disconnected) => {
                        // Clean disconnect requested by the handle.
                        break;
                    }
                    Err(e) => {
                        self.shared.connected.store(false, Ordering::SeqCst);
                        // The budget counts consecutive failures; a served
                        // connection starts it over.
                        if self.shared.stats.lock().connect_count > connects_before {
                            attempts = 0;
                        }
                        attempts += 1;
                        tracing::warn!(
                            attempt = attempts,
                            error = %e,
                            "feedback connection lost"
                        );
                        if attempts >= self.config.max_reconnect_attempts {
                            tracing::error!(
                                attempts,
                                "feedback channel giving up until reconnect is requested"
                            );
                            self.shared.desired.send_replace(false);
                            self.set_state(ChannelState::Failed);
                            break;
                        }
                        tokio::time::sleep(self.config.reconnect_interval).await;
                    }
                }
            }
        }
    }

    async fn connect_and_serve(&mut self) -> Result<ServeExit, FeedbackError> {
        tracing::info!(url = %self.config.server_url, "connecting feedback channel");
        let (ws_stream, _) = connect_async(&self.config.server_url).await?;
        let (mut write, mut read) = ws_stream.split();

        self.shared.connected.store(true, Ordering::SeqCst);
        *self.shared.connected_at.lock() = Some(Instant::now());
        {
            let mut stats = self.shared.stats.lock();
            stats.connect_count += 1;
            if stats.connect_count > 1 {
                stats.reconnections += 1;
            }
        }
        self.set_state(ChannelState::Connected);

        let mut keepalive = tokio::time::interval(self.config.keepalive_interval);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        keepalive.tick().await; // first tick fires immediately

        let result = loop {
            tokio::select! {
                inbound = read.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            {
                                let mut stats = self.shared.stats.lock();
                                stats.messages_received += 1;
                                stats.bytes_received += text.len() as u64;
                            }
                            let reply = handle_inbound(
                                self.listener.as_ref(),
                                &self.shared,
                                &text,
                            );
                            if let Some(reply) = reply {
                                self.send_message(&mut write, &reply).await?;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "server closed feedback channel");
                            break Err(FeedbackError::NotConnected);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => break Err(e.into()),
                        None => break Err(FeedbackError::NotConnected),
                    }
                }
                outbound = self.rx.recv() => {
                    match outbound {
                        Some(msg) => self.send_message(&mut write, &msg).await?,
                        // All handles gone: shut the channel down cleanly.
                        None => break Ok(ServeExit::HandlesDropped),
                    }
                }
                _ = keepalive.tick() => {
                    let ping = ControlMessage::Ping {
                        device_id: self.config.device_id.clone(),
                        timestamp: now_ms(),
                    };
                    self.send_message(&mut write, &ping).await?;
                }
                changed = self.desired_rx.changed() => {
                    if changed.is_err() || !*self.desired_rx.borrow_and_update() {
                        break Ok(ServeExit::Disconnected);
                    }
                }
            }
        };

        self.shared.connected.store(false, Ordering::SeqCst);
        *self.shared.connected_at.lock() = None;
        if result.is_ok() {
            self.set_state(ChannelState::Disconnected);
        }
        result
    }

    async fn send_message<S>(
        &self,
        write: &mut S,
        msg: &ControlMessage,
    ) -> Result<(), FeedbackError>
    where
        S: Sink<Message> + Unpin,
        FeedbackError: From<S::Error>,
    {
        let json = serde_json::to_string(msg)?;
        {
            let mut stats = self.shared.stats.lock();
            stats.messages_sent += 1;
            stats.bytes_sent += json.len() as u64;
        }
        write.send(Message::Text(json.into())).await?;
        Ok(())
    }

    fn set_state(&self, state: ChannelState) {
        self.listener.on_state_change(state);
    }
}

/// Dispatch one inbound control message; returns a reply to send, if any.
fn handle_inbound(
    listener: &dyn FeedbackListener,
    shared: &Shared,
    text: &str,
) -> Option<ControlMessage> {
    let msg: ControlMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unrecognized control message");
            return None;
        }
    };

    match msg {
        ControlMessage::WakeWordValidation {
            detection_id,
            validated,
            confidence,
            suggested_energy_threshold,
            suggested_confidence_threshold,
        } => {
            let rtt_ms = shared
                .pending
                .lock()
                .remove(detection_id)
                .map(|sent| sent.elapsed().as_millis() as u64);
            {
                let mut stats = shared.stats.lock();
                stats.validations_received += 1;
                if validated {
                    stats.validations_positive += 1;
                } else {
                    stats.validations_negative += 1;
                }
            }
            if let Some(rtt) = rtt_ms {
                shared.record_latency(rtt);
            }
            listener.on_validation(ValidationOutcome {
                detection_id,
                validated,
                confidence,
                rtt_ms,
                suggested_energy_threshold,
                suggested_confidence_threshold,
            });
            None
        }
        ControlMessage::ThresholdUpdate {
            energy_threshold,
            confidence_threshold,
            reason,
            urgency,
        } => {
            shared.stats.lock().threshold_updates += 1;
            listener.on_threshold_update(ThresholdUpdate {
                energy_threshold,
                confidence_threshold,
                reason,
                urgency,
            });
            None
        }
        ControlMessage::Ping { timestamp, .. } => Some(ControlMessage::Pong { timestamp }),
        ControlMessage::Pong { .. } => {
            tracing::trace!("feedback keepalive acknowledged");
            None
        }
        ControlMessage::TtsAudioStart { session_id } => {
            tracing::debug!(%session_id, "server TTS playback started");
            listener.on_playback_level(1.0);
            None
        }
        ControlMessage::TtsAudioEnd { session_id } => {
            tracing::debug!(%session_id, "server TTS playback ended");
            listener.on_playback_level(0.0);
            None
        }
        other => {
            tracing::debug!(?other, "unexpected device-originated message from server");
            None
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
