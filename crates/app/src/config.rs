use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use murmur_feedback::FeedbackConfig;
use murmur_transport::TransportConfig;
use murmur_vad::VadConfig;
use murmur_wake::WakeWordConfig;

/// Top-level application settings, loaded from a TOML file. Every section
/// is optional and falls back to defaults so a minimal file only names the
/// device and the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSettings {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub vad: VadConfig,
    #[serde(default)]
    pub wake: WakeWordConfig,
    #[serde(default)]
    pub transport: TransportSettings,
    #[serde(default)]
    pub feedback: FeedbackSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            device: DeviceSettings::default(),
            vad: VadConfig::default(),
            wake: WakeWordConfig::default(),
            transport: TransportSettings::default(),
            feedback: FeedbackSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSettings {
    pub device_id: String,
    /// UDP endpoint the audio frames are streamed to
    pub audio_server: String,
    /// WebSocket URL for the feedback channel
    pub feedback_url: String,
    pub log_dir: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            device_id: "murmur-device".into(),
            audio_server: "127.0.0.1:8003".into(),
            feedback_url: "ws://127.0.0.1:8765/feedback".into(),
            log_dir: "logs".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSettings {
    pub silence_suppression: bool,
    pub silence_interval_ms: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        let base = TransportConfig::default();
        Self {
            silence_suppression: base.silence_suppression,
            silence_interval_ms: base.silence_interval_ms,
        }
    }
}

impl TransportSettings {
    pub fn to_config(&self) -> TransportConfig {
        TransportConfig {
            silence_suppression: self.silence_suppression,
            silence_interval_ms: self.silence_interval_ms.max(1),
            ..TransportConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackSettings {
    pub reconnect_interval_secs: u64,
    pub max_reconnect_attempts: u32,
    pub keepalive_interval_secs: u64,
    pub send_queue_capacity: usize,
    pub pending_capacity: usize,
    /// Cadence of the periodic statistics report
    pub stats_interval_secs: u64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        let base = FeedbackConfig::default();
        Self {
            reconnect_interval_secs: base.reconnect_interval.as_secs(),
            max_reconnect_attempts: base.max_reconnect_attempts,
            keepalive_interval_secs: base.keepalive_interval.as_secs(),
            send_queue_capacity: base.send_queue_capacity,
            pending_capacity: base.pending_capacity,
            stats_interval_secs: 60,
        }
    }
}

impl AppSettings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let settings: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(settings)
    }

    pub fn feedback_config(&self) -> FeedbackConfig {
        FeedbackConfig {
            server_url: self.device.feedback_url.clone(),
            device_id: self.device.device_id.clone(),
            reconnect_interval: Duration::from_secs(self.feedback.reconnect_interval_secs.max(1)),
            max_reconnect_attempts: self.feedback.max_reconnect_attempts.max(1),
            keepalive_interval: Duration::from_secs(self.feedback.keepalive_interval_secs.max(1)),
            send_queue_capacity: self.feedback.send_queue_capacity.max(1),
            pending_capacity: self.feedback.pending_capacity.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_gets_defaults() {
        let settings: AppSettings = toml::from_str(
            r#"
            [device]
            device_id = "kitchen-mic"
            audio_server = "10.0.0.2:8003"
            feedback_url = "ws://10.0.0.2:8765/feedback"
            log_dir = "logs"
            "#,
        )
        .unwrap();
        assert_eq!(settings.device.device_id, "kitchen-mic");
        assert_eq!(settings.vad.amplitude_threshold, 2000.0);
        assert_eq!(settings.wake.energy_threshold, 3500.0);
        assert!(settings.transport.silence_suppression);
        assert_eq!(settings.feedback.stats_interval_secs, 60);
    }

    #[test]
    fn sections_override_defaults() {
        let settings: AppSettings = toml::from_str(
            r#"
            [vad]
            amplitude_threshold = 1500.0
            silence_threshold_ms = 1000

            [wake]
            energy_threshold = 4200.0
            max_detections_per_min = 5

            [transport]
            silence_suppression = false
            silence_interval_ms = 200
            "#,
        )
        .unwrap();
        assert_eq!(settings.vad.amplitude_threshold, 1500.0);
        assert_eq!(settings.vad.silence_threshold_ms, 1000);
        assert_eq!(settings.wake.max_detections_per_min, 5);
        assert!(!settings.transport.to_config().silence_suppression);
        assert_eq!(settings.transport.to_config().silence_interval_ms, 200);
    }

    #[test]
    fn partial_sections_fill_in_field_defaults() {
        let settings: AppSettings = toml::from_str(
            r#"
            [device]
            device_id = "porch-mic"

            [transport]
            silence_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(settings.device.device_id, "porch-mic");
        assert_eq!(settings.device.audio_server, "127.0.0.1:8003");
        assert_eq!(settings.device.log_dir, "logs");
        assert!(settings.transport.silence_suppression);
        assert_eq!(settings.transport.to_config().silence_interval_ms, 250);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<AppSettings>(
            r#"
            [device]
            device_id = "x"
            audio_server = "127.0.0.1:8003"
            feedback_url = "ws://127.0.0.1:8765"
            log_dir = "logs"
            mystery_knob = 3
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn feedback_config_carries_device_identity() {
        let settings = AppSettings::default();
        let cfg = settings.feedback_config();
        assert_eq!(cfg.device_id, "murmur-device");
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(10));
        assert_eq!(cfg.max_reconnect_attempts, 5);
    }
}
