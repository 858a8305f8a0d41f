use serde::{Deserialize, Serialize};

use murmur_transport::TransportStats;
use murmur_wake::WakeWordStats;

/// Wake word counters as reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WakeWordStatsReport {
    pub total_detections: u64,
    pub true_positives: u64,
    pub false_positives: u64,
    pub avg_confidence: f32,
    pub current_threshold: f32,
}

impl From<&WakeWordStats> for WakeWordStatsReport {
    fn from(stats: &WakeWordStats) -> Self {
        Self {
            total_detections: stats.total_detections,
            true_positives: stats.true_positives,
            false_positives: stats.false_positives,
            avg_confidence: stats.average_confidence,
            current_threshold: stats.current_energy_threshold,
        }
    }
}

/// Voice/silence traffic counters as reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VadStatsReport {
    pub voice_packets: u64,
    pub silence_packets: u64,
    pub suppressed_packets: u64,
    pub avg_confidence: f32,
}

impl From<&TransportStats> for VadStatsReport {
    fn from(stats: &TransportStats) -> Self {
        Self {
            voice_packets: stats.voice_packets,
            silence_packets: stats.silence_packets,
            suppressed_packets: stats.suppressed_packets,
            avg_confidence: stats.average_confidence,
        }
    }
}

/// Typed control-channel messages, tagged by a `type` field on the wire.
/// Outbound and inbound variants share the enum; the channel only ever
/// receives the server-originated ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    WakeWordDetection {
        detection_id: u32,
        device_id: String,
        timestamp: u64,
        confidence: f32,
        energy_level: f32,
        pattern_score: u16,
        syllable_count: u8,
        duration_ms: u32,
        vad_active: bool,
        snr_db: f32,
    },
    DeviceStatistics {
        device_id: String,
        timestamp: u64,
        wake_word_stats: WakeWordStatsReport,
        vad_stats: VadStatsReport,
    },
    Ping {
        device_id: String,
        timestamp: u64,
    },
    Pong {
        #[serde(default)]
        timestamp: u64,
    },
    WakeWordValidation {
        detection_id: u32,
        validated: bool,
        confidence: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_energy_threshold: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_confidence_threshold: Option<f32>,
    },
    ThresholdUpdate {
        energy_threshold: f32,
        confidence_threshold: f32,
        reason: String,
        urgency: String,
    },
    /// Server starts streaming synthesized speech to the playback
    /// collaborator; the device raises echo suppression for the duration.
    TtsAudioStart {
        #[serde(default)]
        session_id: String,
    },
    TtsAudioEnd {
        #[serde(default)]
        session_id: String,
    },
}
