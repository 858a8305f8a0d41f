use bytes::{Buf, BufMut};

use murmur_vad::VadResult;
use murmur_wake::{WakeWordResult, WakeWordState};

use super::error::TransportError;

pub const BASIC_HEADER_LEN: usize = 12;
pub const ENHANCED_HEADER_LEN: usize = 24;
pub const WAKE_WORD_HEADER_LEN: usize = 36;

pub const VERSION_ENHANCED: u8 = 2;
pub const VERSION_WAKE_WORD: u8 = 3;

/// VAD metadata bits carried in the enhanced header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VadFlags(pub u8);

impl VadFlags {
    pub const VOICE_ACTIVE: u8 = 0x01;
    pub const SPEECH_START: u8 = 0x02;
    pub const SPEECH_END: u8 = 0x04;
    pub const HIGH_CONFIDENCE: u8 = 0x08;
    pub const NOISE_UPDATED: u8 = 0x10;
    pub const SPECTRAL_VALID: u8 = 0x20;
    pub const ADAPTIVE_ACTIVE: u8 = 0x40;

    pub fn from_result(vad: &VadResult) -> Self {
        let mut bits = 0u8;
        if vad.voice_detected {
            bits |= Self::VOICE_ACTIVE;
        }
        if vad.speech_started {
            bits |= Self::SPEECH_START;
        }
        if vad.speech_ended {
            bits |= Self::SPEECH_END;
        }
        if vad.high_confidence {
            bits |= Self::HIGH_CONFIDENCE;
        }
        if vad.noise_floor_updated {
            bits |= Self::NOISE_UPDATED;
        }
        if vad.spectral_valid {
            bits |= Self::SPECTRAL_VALID;
        }
        if vad.adaptive_threshold_active {
            bits |= Self::ADAPTIVE_ACTIVE;
        }
        Self(bits)
    }

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Wake word metadata bits carried in the wake word header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WakeFlags(pub u8);

impl WakeFlags {
    pub const DETECTED: u8 = 0x01;
    pub const CONFIRMED: u8 = 0x02;
    pub const REJECTED: u8 = 0x04;
    pub const HIGH_CONFIDENCE: u8 = 0x08;

    pub fn from_result(wake: &WakeWordResult) -> Self {
        let mut bits = 0u8;
        match wake.state {
            WakeWordState::Triggered => bits |= Self::DETECTED,
            WakeWordState::Confirmed => bits |= Self::CONFIRMED,
            WakeWordState::Rejected => bits |= Self::REJECTED,
            WakeWordState::Listening => {}
        }
        if wake.confidence_score >= 0.8 {
            bits |= Self::HIGH_CONFIDENCE;
        }
        Self(bits)
    }

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Legacy 12-byte header shared by all packet versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicHeader {
    pub sequence: u32,
    pub sample_count: u16,
    pub sample_rate: u16,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub flags: u16,
}

impl BasicHeader {
    fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.sequence);
        buf.put_u16_le(self.sample_count);
        buf.put_u16_le(self.sample_rate);
        buf.put_u8(self.channels);
        buf.put_u8(self.bits_per_sample);
        buf.put_u16_le(self.flags);
    }

    fn decode_from(buf: &mut impl Buf) -> Self {
        Self {
            sequence: buf.get_u32_le(),
            sample_count: buf.get_u16_le(),
            sample_rate: buf.get_u16_le(),
            channels: buf.get_u8(),
            bits_per_sample: buf.get_u8(),
            flags: buf.get_u16_le(),
        }
    }
}

/// Version 2: basic header plus packed VAD metadata. Fields are zero-filled
/// when no VAD data accompanies the frame, so the layout never varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhancedHeader {
    pub basic: BasicHeader,
    pub vad_flags: VadFlags,
    pub vad_confidence: u8,
    pub detection_quality: u8,
    pub max_amplitude: u16,
    pub noise_floor: u16,
    pub zero_crossing_rate: u16,
    /// SNR in dB, scaled x2 and saturated
    pub snr_scaled: u8,
}

impl EnhancedHeader {
    pub fn new(basic: BasicHeader, vad: Option<&VadResult>) -> Self {
        match vad {
            Some(v) => Self {
                basic,
                vad_flags: VadFlags::from_result(v),
                vad_confidence: (v.confidence.clamp(0.0, 1.0) * 255.0) as u8,
                detection_quality: v.detection_quality,
                max_amplitude: v.max_amplitude.max(0) as u16,
                noise_floor: v.noise_floor.clamp(0.0, u16::MAX as f32) as u16,
                zero_crossing_rate: v.zero_crossing_rate,
                snr_scaled: (v.snr_db.clamp(0.0, 127.5) * 2.0) as u8,
            },
            None => Self {
                basic,
                vad_flags: VadFlags::default(),
                vad_confidence: 0,
                detection_quality: 0,
                max_amplitude: 0,
                noise_floor: 0,
                zero_crossing_rate: 0,
                snr_scaled: 0,
            },
        }
    }

    fn encode_into(&self, version: u8, buf: &mut impl BufMut) {
        self.basic.encode_into(buf);
        buf.put_u8(version);
        buf.put_u8(self.vad_flags.0);
        buf.put_u8(self.vad_confidence);
        buf.put_u8(self.detection_quality);
        buf.put_u16_le(self.max_amplitude);
        buf.put_u16_le(self.noise_floor);
        buf.put_u16_le(self.zero_crossing_rate);
        buf.put_u8(self.snr_scaled);
        buf.put_u8(0); // reserved
    }

    fn decode_from(basic: BasicHeader, buf: &mut impl Buf) -> Self {
        let _version = buf.get_u8();
        let vad_flags = VadFlags(buf.get_u8());
        let vad_confidence = buf.get_u8();
        let detection_quality = buf.get_u8();
        let max_amplitude = buf.get_u16_le();
        let noise_floor = buf.get_u16_le();
        let zero_crossing_rate = buf.get_u16_le();
        let snr_scaled = buf.get_u8();
        let _reserved = buf.get_u8();
        Self {
            basic,
            vad_flags,
            vad_confidence,
            detection_quality,
            max_amplitude,
            noise_floor,
            zero_crossing_rate,
            snr_scaled,
        }
    }
}

/// Version 3: enhanced header plus wake word detection metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeWordHeader {
    pub enhanced: EnhancedHeader,
    pub detection_id: u32,
    pub wake_flags: WakeFlags,
    pub wake_confidence: u8,
    /// Pattern correlation scaled to 0-1000
    pub pattern_score: u16,
    pub syllable_count: u8,
    /// Pattern duration in ms, clamped to 255
    pub duration_ms: u8,
}

impl WakeWordHeader {
    pub fn new(
        basic: BasicHeader,
        vad: Option<&VadResult>,
        wake: &WakeWordResult,
    ) -> Self {
        Self {
            enhanced: EnhancedHeader::new(basic, vad),
            detection_id: wake.detection_id,
            wake_flags: WakeFlags::from_result(wake),
            wake_confidence: (wake.confidence_score.clamp(0.0, 1.0) * 255.0) as u8,
            pattern_score: wake.pattern_match_score.min(1000),
            syllable_count: wake.syllable_count,
            duration_ms: wake.duration_ms.min(255) as u8,
        }
    }

    fn encode_into(&self, buf: &mut impl BufMut) {
        self.enhanced.encode_into(VERSION_WAKE_WORD, buf);
        buf.put_u32_le(self.detection_id);
        buf.put_u8(self.wake_flags.0);
        buf.put_u8(self.wake_confidence);
        buf.put_u16_le(self.pattern_score);
        buf.put_u8(self.syllable_count);
        buf.put_u8(self.duration_ms);
        buf.put_u16_le(0); // reserved
    }

    fn decode_from(enhanced: EnhancedHeader, buf: &mut impl Buf) -> Self {
        let detection_id = buf.get_u32_le();
        let wake_flags = WakeFlags(buf.get_u8());
        let wake_confidence = buf.get_u8();
        let pattern_score = buf.get_u16_le();
        let syllable_count = buf.get_u8();
        let duration_ms = buf.get_u8();
        let _reserved = buf.get_u16_le();
        Self {
            enhanced,
            detection_id,
            wake_flags,
            wake_confidence,
            pattern_score,
            syllable_count,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    Basic(BasicHeader),
    Enhanced(EnhancedHeader),
    WakeWord(WakeWordHeader),
}

impl PacketHeader {
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Basic(_) => BASIC_HEADER_LEN,
            Self::Enhanced(_) => ENHANCED_HEADER_LEN,
            Self::WakeWord(_) => WAKE_WORD_HEADER_LEN,
        }
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        match self {
            Self::Basic(h) => h.encode_into(buf),
            Self::Enhanced(h) => h.encode_into(VERSION_ENHANCED, buf),
            Self::WakeWord(h) => h.encode_into(buf),
        }
    }

    /// Decode a received packet, dispatching on the version byte at offset
    /// 12. Returns the header and the PCM payload that follows it.
    /// Undersized or unknown-version packets are rejected whole.
    pub fn decode(packet: &[u8]) -> Result<(Self, &[u8]), TransportError> {
        if packet.len() < BASIC_HEADER_LEN {
            return Err(TransportError::Undersized(packet.len()));
        }
        if packet.len() == BASIC_HEADER_LEN {
            let mut buf = packet;
            return Ok((Self::Basic(BasicHeader::decode_from(&mut buf)), &[]));
        }

        match packet[BASIC_HEADER_LEN] {
            VERSION_ENHANCED => {
                if packet.len() < ENHANCED_HEADER_LEN {
                    return Err(TransportError::Undersized(packet.len()));
                }
                let mut buf = packet;
                let basic = BasicHeader::decode_from(&mut buf);
                let enhanced = EnhancedHeader::decode_from(basic, &mut buf);
                Ok((
                    Self::Enhanced(enhanced),
                    &packet[ENHANCED_HEADER_LEN..],
                ))
            }
            VERSION_WAKE_WORD => {
                if packet.len() < WAKE_WORD_HEADER_LEN {
                    return Err(TransportError::Undersized(packet.len()));
                }
                let mut buf = packet;
                let basic = BasicHeader::decode_from(&mut buf);
                let enhanced = EnhancedHeader::decode_from(basic, &mut buf);
                let wake = WakeWordHeader::decode_from(enhanced, &mut buf);
                Ok((Self::WakeWord(wake), &packet[WAKE_WORD_HEADER_LEN..]))
            }
            version => Err(TransportError::UnknownVersion(version)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use murmur_vad::ConversationContext;

    fn sample_basic() -> BasicHeader {
        BasicHeader {
            sequence: 0xDEAD_BEEF,
            sample_count: 320,
            sample_rate: 16_000,
            channels: 1,
            bits_per_sample: 16,
            flags: 0x0102,
        }
    }

    fn sample_vad() -> VadResult {
        let mut v = VadResult::quiescent(ConversationContext::Listening);
        v.voice_detected = true;
        v.speech_started = true;
        v.confidence = 0.75;
        v.max_amplitude = 12_345;
        v.noise_floor = 812.0;
        v.snr_db = 14.5;
        v.zero_crossing_rate = 42;
        v.detection_quality = 191;
        v.spectral_valid = true;
        v.adaptive_threshold_active = true;
        v
    }

    fn sample_wake() -> WakeWordResult {
        let mut w = WakeWordResult::listening();
        w.state = WakeWordState::Triggered;
        w.detection_id = 7;
        w.confidence_score = 0.9;
        w.pattern_match_score = 874;
        w.syllable_count = 3;
        w.duration_ms = 580;
        w
    }

    #[test]
    fn basic_header_round_trip() {
        let header = sample_basic();
        let mut buf = BytesMut::new();
        PacketHeader::Basic(header).encode_into(&mut buf);
        assert_eq!(buf.len(), BASIC_HEADER_LEN);

        let (decoded, payload) = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded, PacketHeader::Basic(header));
        assert!(payload.is_empty());
    }

    #[test]
    fn enhanced_header_round_trip_with_payload() {
        let header = EnhancedHeader::new(sample_basic(), Some(&sample_vad()));
        let mut buf = BytesMut::new();
        PacketHeader::Enhanced(header).encode_into(&mut buf);
        assert_eq!(buf.len(), ENHANCED_HEADER_LEN);
        buf.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        let (decoded, payload) = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded, PacketHeader::Enhanced(header));
        assert_eq!(payload, &[0x01, 0x02, 0x03, 0x04]);

        assert!(header.vad_flags.contains(VadFlags::VOICE_ACTIVE));
        assert!(header.vad_flags.contains(VadFlags::SPEECH_START));
        assert!(!header.vad_flags.contains(VadFlags::SPEECH_END));
        assert!(header.vad_flags.contains(VadFlags::SPECTRAL_VALID));
        assert_eq!(header.snr_scaled, 29);
        assert_eq!(header.max_amplitude, 12_345);
    }

    #[test]
    fn wake_word_header_round_trip() {
        let header = WakeWordHeader::new(sample_basic(), Some(&sample_vad()), &sample_wake());
        let mut buf = BytesMut::new();
        PacketHeader::WakeWord(header).encode_into(&mut buf);
        assert_eq!(buf.len(), WAKE_WORD_HEADER_LEN);

        let (decoded, _) = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded, PacketHeader::WakeWord(header));

        assert!(header.wake_flags.contains(WakeFlags::DETECTED));
        assert!(header.wake_flags.contains(WakeFlags::HIGH_CONFIDENCE));
        assert_eq!(header.duration_ms, 255); // 580ms clamps
        assert_eq!(header.pattern_score, 874);
    }

    #[test]
    fn missing_vad_zero_fills_metadata() {
        let header = EnhancedHeader::new(sample_basic(), None);
        assert_eq!(header.vad_flags.0, 0);
        assert_eq!(header.vad_confidence, 0);
        assert_eq!(header.noise_floor, 0);
    }

    #[test]
    fn undersized_packet_is_rejected() {
        assert!(matches!(
            PacketHeader::decode(&[0u8; 7]),
            Err(TransportError::Undersized(7))
        ));

        // Enhanced version byte but truncated body.
        let mut buf = BytesMut::new();
        PacketHeader::Enhanced(EnhancedHeader::new(sample_basic(), None)).encode_into(&mut buf);
        assert!(matches!(
            PacketHeader::decode(&buf[..20]),
            Err(TransportError::Undersized(20))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut buf = BytesMut::new();
        PacketHeader::Enhanced(EnhancedHeader::new(sample_basic(), None)).encode_into(&mut buf);
        buf[BASIC_HEADER_LEN] = 9;
        assert!(matches!(
            PacketHeader::decode(&buf),
            Err(TransportError::UnknownVersion(9))
        ));
    }

    #[test]
    fn decode_dispatches_on_version_byte_only() {
        let basic = sample_basic();
        let mut enhanced = BytesMut::new();
        PacketHeader::Enhanced(EnhancedHeader::new(basic, None)).encode_into(&mut enhanced);
        let mut wake = BytesMut::new();
        PacketHeader::WakeWord(WakeWordHeader::new(basic, None, &sample_wake()))
            .encode_into(&mut wake);

        assert!(matches!(
            PacketHeader::decode(&enhanced).unwrap().0,
            PacketHeader::Enhanced(_)
        ));
        assert!(matches!(
            PacketHeader::decode(&wake).unwrap().0,
            PacketHeader::WakeWord(_)
        ));
    }
}
