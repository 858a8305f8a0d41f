use super::config::VadConfig;

/// Cheap time-domain spectral cues. The low-frequency ratio is deliberately
/// the energy of the first third of the frame over the total, not a real
/// transform; the 0.4 ratio and ZCR band thresholds were tuned against this
/// approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralFeatures {
    pub zero_crossings: u16,
    pub low_freq_ratio: f32,
    pub speech_like: bool,
}

pub fn analyze(frame: &[i16], cfg: &VadConfig) -> SpectralFeatures {
    if frame.len() < 3 {
        return SpectralFeatures {
            zero_crossings: 0,
            low_freq_ratio: 0.0,
            speech_like: false,
        };
    }

    let mut crossings: u16 = 0;
    for pair in frame.windows(2) {
        if (pair[0] >= 0) != (pair[1] >= 0) {
            crossings = crossings.saturating_add(1);
        }
    }

    let third = frame.len() / 3;
    let mut first_third: i64 = 0;
    let mut total: i64 = 0;
    for (i, &sample) in frame.iter().enumerate() {
        let sq = sample as i64 * sample as i64;
        total += sq;
        if i < third {
            first_third += sq;
        }
    }
    let low_freq_ratio = if total > 0 {
        first_third as f32 / total as f32
    } else {
        0.0
    };

    let zcr_ok = crossings >= cfg.zcr_min && crossings <= cfg.zcr_max;
    let ratio_ok = low_freq_ratio >= cfg.low_freq_ratio_threshold;

    SpectralFeatures {
        zero_crossings: crossings,
        low_freq_ratio,
        speech_like: zcr_ok && ratio_ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_SIZE_SAMPLES;

    #[test]
    fn dc_frame_has_no_crossings() {
        let cfg = VadConfig::default();
        let frame = vec![4000i16; FRAME_SIZE_SAMPLES];
        let f = analyze(&frame, &cfg);
        assert_eq!(f.zero_crossings, 0);
        assert!(!f.speech_like);
    }

    #[test]
    fn square_wave_crossing_count() {
        let cfg = VadConfig::default();
        // Sign flips every 8 samples: 39 transitions over 320 samples.
        let frame: Vec<i16> = (0..FRAME_SIZE_SAMPLES)
            .map(|i| if (i / 8) % 2 == 0 { 4000 } else { -4000 })
            .collect();
        let f = analyze(&frame, &cfg);
        assert_eq!(f.zero_crossings, 39);
        // Uniform energy: first third is exactly a third of the total.
        assert!((f.low_freq_ratio - 1.0 / 3.0).abs() < 0.01);
        assert!(!f.speech_like); // ratio below the 0.4 threshold
    }

    #[test]
    fn front_loaded_energy_is_speech_like() {
        let cfg = VadConfig::default();
        let third = FRAME_SIZE_SAMPLES / 3;
        let frame: Vec<i16> = (0..FRAME_SIZE_SAMPLES)
            .map(|i| {
                let amp: i16 = if i < third { 4000 } else { 2400 };
                if (i / 8) % 2 == 0 {
                    amp
                } else {
                    -amp
                }
            })
            .collect();
        let f = analyze(&frame, &cfg);
        assert!(f.low_freq_ratio > 0.4);
        assert!(f.speech_like);
    }
}
