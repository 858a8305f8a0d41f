use murmur_vad::{AdaptiveVad, VadConfig, FRAME_SIZE_SAMPLES};

/// Speech-shaped frame: energy front-loaded into the first third, sign flip
/// every 8 samples so the zero-crossing rate lands inside the speech band.
fn speech_frame(amplitude: i16) -> Vec<i16> {
    let third = FRAME_SIZE_SAMPLES / 3;
    (0..FRAME_SIZE_SAMPLES)
        .map(|i| {
            let amp = if i < third {
                amplitude
            } else {
                (amplitude as i32 * 6 / 10) as i16
            };
            if (i / 8) % 2 == 0 {
                amp
            } else {
                -amp
            }
        })
        .collect()
}

struct EdgeLog {
    starts: Vec<usize>,
    ends: Vec<usize>,
}

fn run_sequence(vad: &mut AdaptiveVad, bursts: &[(usize, i16)]) -> EdgeLog {
    let mut log = EdgeLog {
        starts: Vec::new(),
        ends: Vec::new(),
    };
    let mut frame_index = 0usize;
    for &(count, amplitude) in bursts {
        let frame = speech_frame(amplitude);
        for _ in 0..count {
            let r = vad.process(&frame);
            if r.speech_started {
                log.starts.push(frame_index);
            }
            if r.speech_ended {
                log.ends.push(frame_index);
            }
            // Edge pairing invariants, checked on every frame.
            assert!(log.ends.len() <= log.starts.len());
            assert!(!(r.speech_started && r.speech_ended));
            frame_index += 1;
        }
    }
    log
}

#[test]
fn single_utterance_produces_one_start_and_one_end() {
    // 50 quiet frames, 30 loud, 80 quiet. The start lands once the
    // consistency window fills with loud frames; the end fires after
    // 1500ms (75 frames) of accumulated silence.
    let mut vad = AdaptiveVad::new(VadConfig::default());
    let log = run_sequence(&mut vad, &[(50, 50), (30, 4000), (80, 50)]);

    assert_eq!(log.starts.len(), 1, "starts: {:?}", log.starts);
    assert_eq!(log.ends.len(), 1, "ends: {:?}", log.ends);
    assert!(
        (50..=58).contains(&log.starts[0]),
        "start at {}",
        log.starts[0]
    );
    assert!(
        (150..=159).contains(&log.ends[0]),
        "end at {}",
        log.ends[0]
    );

    assert_eq!(vad.stats().detection_count, 1);
}

#[test]
fn two_utterances_produce_paired_edges() {
    let mut vad = AdaptiveVad::new(VadConfig::default());
    let log = run_sequence(
        &mut vad,
        &[(40, 50), (20, 4000), (85, 50), (15, 4000), (85, 50)],
    );

    assert_eq!(log.starts.len(), 2, "starts: {:?}", log.starts);
    assert_eq!(log.ends.len(), 2, "ends: {:?}", log.ends);
    assert!(log.starts[0] < log.ends[0]);
    assert!(log.ends[0] < log.starts[1]);
    assert!(log.starts[1] < log.ends[1]);
}

#[test]
fn short_pause_does_not_split_the_segment() {
    // A 600ms gap is well under the 1500ms silence threshold, so the
    // segment stays open across it: one start, one end.
    let mut vad = AdaptiveVad::new(VadConfig::default());
    let log = run_sequence(
        &mut vad,
        &[(40, 50), (20, 4000), (30, 50), (20, 4000), (85, 50)],
    );

    assert_eq!(log.starts.len(), 1, "starts: {:?}", log.starts);
    assert_eq!(log.ends.len(), 1, "ends: {:?}", log.ends);
}

#[test]
fn random_noise_never_triggers() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    let mut vad = AdaptiveVad::new(VadConfig::default());
    for _ in 0..300 {
        let frame: Vec<i16> = (0..FRAME_SIZE_SAMPLES)
            .map(|_| rng.gen_range(-80..=80))
            .collect();
        let r = vad.process(&frame);
        assert!(!r.voice_detected);
        assert!(!r.speech_started);
    }
}

#[test]
fn conversation_preset_ends_segments_sooner() {
    // 1000ms silence threshold: the end fires ~50 frames into the tail.
    let mut vad = AdaptiveVad::new(VadConfig::conversation());
    let log = run_sequence(&mut vad, &[(50, 50), (30, 4000), (80, 50)]);

    assert_eq!(log.starts.len(), 1);
    assert_eq!(log.ends.len(), 1);
    assert!(log.ends[0] < 140, "end at {}", log.ends[0]);
}
