/// Reference energy envelope for the trigger phrase: three syllable humps
/// with inter-syllable dips and a quiet tail, normalized to [0,1].
pub const REFERENCE_ENVELOPE: [f32; 11] = [
    0.9, 1.0, 0.3, 0.9, 1.0, 0.3, 0.9, 0.2, 0.1, 0.1, 0.0,
];

/// Syllable count of the target phrase
pub const EXPECTED_SYLLABLES: u8 = 3;

/// Near-match syllable band that still earns a bonus
pub const SYLLABLE_NEAR_MIN: u8 = 2;
pub const SYLLABLE_NEAR_MAX: u8 = 4;

/// Segmentation level for syllable counting on normalized energy
pub const SYLLABLE_LEVEL: f32 = 0.4;

/// Normalized cross-correlation of a pattern buffer against the reference
/// envelope. The buffer is resampled to the envelope length by nearest
/// index. Negative correlation is clipped to zero: an anti-matching shape
/// is just "no match".
pub fn correlation(buffer: &[f32], envelope: &[f32]) -> f32 {
    let n = envelope.len();
    if buffer.len() < 2 || n < 2 {
        return 0.0;
    }

    let mut resampled = vec![0.0f32; n];
    for (j, slot) in resampled.iter_mut().enumerate() {
        let pos = (j as f32 * (buffer.len() - 1) as f32) / (n - 1) as f32;
        *slot = buffer[pos.round() as usize];
    }

    let b_mean: f32 = resampled.iter().sum::<f32>() / n as f32;
    let e_mean: f32 = envelope.iter().sum::<f32>() / n as f32;

    let mut cov = 0.0f32;
    let mut b_var = 0.0f32;
    let mut e_var = 0.0f32;
    for (b, e) in resampled.iter().zip(envelope.iter()) {
        let db = b - b_mean;
        let de = e - e_mean;
        cov += db * de;
        b_var += db * db;
        e_var += de * de;
    }

    if b_var <= f32::EPSILON || e_var <= f32::EPSILON {
        return 0.0;
    }
    (cov / (b_var.sqrt() * e_var.sqrt())).max(0.0)
}

/// Contiguous runs of normalized energy above the segmentation level.
pub fn count_syllables(buffer: &[f32], level: f32) -> u8 {
    let mut count: u8 = 0;
    let mut in_run = false;
    for &v in buffer {
        if v > level {
            if !in_run {
                count = count.saturating_add(1);
                in_run = true;
            }
        } else {
            in_run = false;
        }
    }
    count
}

/// Combine the correlation with syllable and VAD bonuses.
pub fn score_confidence(
    pattern_match: f32,
    syllables: u8,
    expected: u8,
    vad_high_confidence: bool,
) -> f32 {
    let syllable_factor = if syllables == expected {
        1.2
    } else if (SYLLABLE_NEAR_MIN..=SYLLABLE_NEAR_MAX).contains(&syllables) {
        1.1
    } else {
        0.8
    };

    let mut confidence = pattern_match * syllable_factor;
    if vad_high_confidence {
        confidence *= 1.1;
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_matches_itself_perfectly() {
        let r = correlation(&REFERENCE_ENVELOPE, &REFERENCE_ENVELOPE);
        assert!((r - 1.0).abs() < 1e-5);
    }

    #[test]
    fn anti_shape_scores_zero() {
        let inverted: Vec<f32> = REFERENCE_ENVELOPE.iter().map(|v| 1.0 - v).collect();
        assert_eq!(correlation(&inverted, &REFERENCE_ENVELOPE), 0.0);
    }

    #[test]
    fn flat_buffer_scores_zero() {
        let flat = [0.5f32; 20];
        assert_eq!(correlation(&flat, &REFERENCE_ENVELOPE), 0.0);
    }

    #[test]
    fn envelope_has_expected_syllables() {
        assert_eq!(
            count_syllables(&REFERENCE_ENVELOPE, SYLLABLE_LEVEL),
            EXPECTED_SYLLABLES
        );
    }

    #[test]
    fn syllable_runs_are_counted_not_frames() {
        let buffer = [0.9, 0.9, 0.1, 0.9, 0.1, 0.9, 0.9, 0.9];
        assert_eq!(count_syllables(&buffer, 0.4), 3);
    }

    #[test]
    fn confidence_is_monotonic_in_correlation() {
        // Below the clamp, more correlation must mean strictly more
        // confidence when everything else is held fixed.
        let mut last = -1.0f32;
        for r in [0.1, 0.3, 0.5, 0.7] {
            let c = score_confidence(r, EXPECTED_SYLLABLES, EXPECTED_SYLLABLES, false);
            assert!(c > last);
            last = c;
        }
    }

    #[test]
    fn syllable_bonus_ordering() {
        let exact = score_confidence(0.7, 3, 3, false);
        let near = score_confidence(0.7, 2, 3, false);
        let far = score_confidence(0.7, 6, 3, false);
        assert!(exact > near && near > far);
    }

    #[test]
    fn vad_bonus_applies_and_clamps() {
        let plain = score_confidence(0.7, 3, 3, false);
        let boosted = score_confidence(0.7, 3, 3, true);
        assert!(boosted > plain);
        assert_eq!(score_confidence(0.95, 3, 3, true), 1.0);
    }
}
