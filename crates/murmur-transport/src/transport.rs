use bytes::{BufMut, BytesMut};

use murmur_vad::{VadResult, FRAME_DURATION_MS, SAMPLE_RATE_HZ};
use murmur_wake::{WakeWordResult, WakeWordState};

use super::error::TransportError;
use super::sink::DatagramSink;
use super::wire::{
    BasicHeader, EnhancedHeader, PacketHeader, WakeWordHeader, ENHANCED_HEADER_LEN,
    WAKE_WORD_HEADER_LEN,
};

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Master switch for the transmission-reduction policy; off means every
    /// frame is transmitted regardless of the other knobs
    pub optimization_enabled: bool,
    /// Suppress packets during confirmed silence
    pub silence_suppression: bool,
    /// One silence packet is still sent per elapsed interval
    pub silence_interval_ms: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub sample_rate_hz: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            optimization_enabled: true,
            silence_suppression: true,
            silence_interval_ms: 100,
            channels: 1,
            bits_per_sample: 16,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransportStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub voice_packets: u64,
    pub silence_packets: u64,
    pub suppressed_packets: u64,
    pub bandwidth_saved_bytes: u64,
    pub high_confidence_packets: u64,
    pub wake_word_packets: u64,
    pub vad_state_changes: u64,
    pub send_errors: u64,
    pub average_confidence: f32,
    pub average_send_interval_ms: f32,
}

/// Encodes PCM frames plus VAD/wake metadata into versioned packets and
/// applies the transmission-reduction policy before the datagram sink.
///
/// Time is a logical clock: every send call advances it by one frame
/// period, so the suppression cadence is exact at the fixed frame rate.
pub struct FrameTransport {
    sink: Box<dyn DatagramSink>,
    config: TransportConfig,
    sequence: u32,
    clock_ms: u64,
    last_silence_tx_ms: u64,
    last_tx_ms: Option<u64>,
    last_voice_state: bool,
    stats: TransportStats,
    buf: BytesMut,
}

impl FrameTransport {
    pub fn new(sink: Box<dyn DatagramSink>, config: TransportConfig) -> Self {
        Self {
            sink,
            config,
            sequence: 0,
            clock_ms: 0,
            last_silence_tx_ms: 0,
            last_tx_ms: None,
            last_voice_state: false,
            stats: TransportStats::default(),
            buf: BytesMut::with_capacity(WAKE_WORD_HEADER_LEN + 2 * 512),
        }
    }

    pub fn set_silence_suppression(&mut self, enabled: bool, interval_ms: u32) {
        self.config.silence_suppression = enabled;
        self.config.silence_interval_ms = interval_ms.max(1);
    }

    pub fn set_optimization(&mut self, enabled: bool) {
        self.config.optimization_enabled = enabled;
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = TransportStats::default();
    }

    /// Send a frame with VAD metadata (version 2 header). Returns whether
    /// the packet was actually transmitted.
    pub fn send_with_vad(
        &mut self,
        frame: &[i16],
        vad: &VadResult,
    ) -> Result<bool, TransportError> {
        self.send_frame(frame, Some(vad), None)
    }

    /// Send a frame with optional VAD and wake word metadata. A wake word
    /// result selects the version 3 header; otherwise version 2 with
    /// zero-filled VAD fields when absent.
    pub fn send_with_wake_word(
        &mut self,
        frame: &[i16],
        vad: Option<&VadResult>,
        wake: Option<&WakeWordResult>,
    ) -> Result<bool, TransportError> {
        self.send_frame(frame, vad, wake)
    }

    fn send_frame(
        &mut self,
        frame: &[i16],
        vad: Option<&VadResult>,
        wake: Option<&WakeWordResult>,
    ) -> Result<bool, TransportError> {
        if frame.is_empty() {
            return Err(TransportError::EmptyFrame);
        }
        self.clock_ms += self.frame_duration_ms(frame.len()) as u64;

        let voice = vad.map(|v| v.voice_detected).unwrap_or(false);
        if voice != self.last_voice_state {
            self.stats.vad_state_changes += 1;
            self.last_voice_state = voice;
        }

        let header_len = if wake.is_some() {
            WAKE_WORD_HEADER_LEN
        } else {
            ENHANCED_HEADER_LEN
        };

        if !self.should_transmit(vad, wake) {
            self.stats.suppressed_packets += 1;
            self.stats.bandwidth_saved_bytes += (header_len + 2 * frame.len()) as u64;
            return Ok(false);
        }

        let basic = BasicHeader {
            sequence: self.sequence,
            sample_count: frame.len() as u16,
            sample_rate: self.config.sample_rate_hz.min(u16::MAX as u32) as u16,
            channels: self.config.channels,
            bits_per_sample: self.config.bits_per_sample,
            flags: 0,
        };
        let header = match wake {
            Some(w) => PacketHeader::WakeWord(WakeWordHeader::new(basic, vad, w)),
            None => PacketHeader::Enhanced(EnhancedHeader::new(basic, vad)),
        };

        self.buf.clear();
        header.encode_into(&mut self.buf);
        for &sample in frame {
            self.buf.put_i16_le(sample);
        }

        match self.sink.send(&self.buf) {
            Ok(_) => {}
            Err(e) => {
                self.stats.send_errors += 1;
                tracing::warn!(sequence = self.sequence, error = %e, "datagram send failed");
                return Err(TransportError::Io(e));
            }
        }

        self.sequence = self.sequence.wrapping_add(1);
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += self.buf.len() as u64;
        if voice {
            self.stats.voice_packets += 1;
        } else {
            self.stats.silence_packets += 1;
            self.last_silence_tx_ms = self.clock_ms;
        }
        if wake.is_some() {
            self.stats.wake_word_packets += 1;
        }
        if let Some(v) = vad {
            if v.high_confidence {
                self.stats.high_confidence_packets += 1;
            }
            let n = self.stats.packets_sent as f32;
            self.stats.average_confidence +=
                (v.confidence - self.stats.average_confidence) / n;
        }
        if let Some(last) = self.last_tx_ms {
            let interval = (self.clock_ms - last) as f32;
            let n = self.stats.packets_sent as f32;
            self.stats.average_send_interval_ms +=
                (interval - self.stats.average_send_interval_ms) / n;
        }
        self.last_tx_ms = Some(self.clock_ms);

        Ok(true)
    }

    fn should_transmit(
        &self,
        vad: Option<&VadResult>,
        wake: Option<&WakeWordResult>,
    ) -> bool {
        if !self.config.optimization_enabled || !self.config.silence_suppression {
            return true;
        }
        if let Some(v) = vad {
            if v.voice_detected || v.speech_started || v.speech_ended {
                return true;
            }
        }
        if let Some(w) = wake {
            if w.state != WakeWordState::Listening {
                return true;
            }
        }
        // Silence: one packet per elapsed interval keeps the server's jitter
        // buffer fed and carries fresh noise-floor metadata.
        self.clock_ms - self.last_silence_tx_ms >= self.config.silence_interval_ms as u64
    }

    fn frame_duration_ms(&self, samples: usize) -> u32 {
        if samples == 0 || self.config.sample_rate_hz == 0 {
            return FRAME_DURATION_MS;
        }
        (samples as u32 * 1000) / self.config.sample_rate_hz
    }
}
