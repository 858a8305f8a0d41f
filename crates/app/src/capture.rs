use std::time::Duration;

use murmur_foundation::CaptureError;

/// Source of fixed-size PCM frames feeding the pipeline thread. Implementors
/// block until a frame is available or return an error the recovery policy
/// can act on.
pub trait CaptureSource: Send {
    fn sample_rate(&self) -> u32;
    fn next_frame(&mut self, frame: &mut [i16]) -> Result<(), CaptureError>;
}

/// Deterministic capture source producing alternating quiet spans and
/// speech-shaped bursts. Used by the demo binary and the pipeline tests;
/// a real microphone source plugs in behind the same trait.
pub struct SyntheticCapture {
    sample_rate: u32,
    quiet_frames: u32,
    burst_frames: u32,
    amplitude: i16,
    /// None runs forever; Some(n) reports Exhausted after n full cycles
    cycles: Option<u32>,
    frame_index: u32,
    completed_cycles: u32,
    /// Sleep one frame period per frame to mimic real-time capture
    pace: bool,
}

impl SyntheticCapture {
    pub fn new(sample_rate: u32, quiet_frames: u32, burst_frames: u32, amplitude: i16) -> Self {
        Self {
            sample_rate,
            quiet_frames: quiet_frames.max(1),
            burst_frames: burst_frames.max(1),
            amplitude,
            cycles: None,
            frame_index: 0,
            completed_cycles: 0,
            pace: false,
        }
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = Some(cycles);
        self
    }

    pub fn paced(mut self) -> Self {
        self.pace = true;
        self
    }

    fn fill_quiet(&self, frame: &mut [i16]) {
        for (i, sample) in frame.iter_mut().enumerate() {
            // Low-level deterministic hiss, well under any threshold.
            *sample = ((i % 13) as i16 - 6) * 5;
        }
    }

    fn fill_burst(&self, frame: &mut [i16]) {
        let third = frame.len() / 3;
        for (i, sample) in frame.iter_mut().enumerate() {
            let amp = if i < third {
                self.amplitude as i32
            } else {
                (self.amplitude as i32 * 6) / 10
            };
            // Sign flip every 8 samples keeps the zero-crossing count in
            // the speech band at 20ms/16kHz frames.
            let sign = if (i / 8) % 2 == 0 { 1 } else { -1 };
            *sample = (amp * sign) as i16;
        }
    }
}

impl CaptureSource for SyntheticCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_frame(&mut self, frame: &mut [i16]) -> Result<(), CaptureError> {
        if frame.is_empty() {
            return Err(CaptureError::FrameSize {
                expected: 1,
                got: 0,
            });
        }
        if let Some(cycles) = self.cycles {
            if self.completed_cycles >= cycles {
                return Err(CaptureError::Exhausted);
            }
        }

        let cycle_len = self.quiet_frames + self.burst_frames;
        let pos = self.frame_index % cycle_len;
        if pos < self.quiet_frames {
            self.fill_quiet(frame);
        } else {
            self.fill_burst(frame);
        }

        self.frame_index += 1;
        if self.frame_index % cycle_len == 0 {
            self.completed_cycles += 1;
        }

        if self.pace {
            let frame_ms = frame.len() as u64 * 1000 / self.sample_rate.max(1) as u64;
            std::thread::sleep(Duration::from_millis(frame_ms));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(frame: &[i16]) -> f32 {
        let sum: f64 = frame.iter().map(|&s| s as f64 * s as f64).sum();
        (sum / frame.len() as f64).sqrt() as f32
    }

    #[test]
    fn bursts_are_much_louder_than_quiet_spans() {
        let mut capture = SyntheticCapture::new(16_000, 2, 2, 4000);
        let mut frame = [0i16; 320];

        capture.next_frame(&mut frame).unwrap();
        let quiet_rms = rms(&frame);
        capture.next_frame(&mut frame).unwrap();
        capture.next_frame(&mut frame).unwrap();
        let burst_rms = rms(&frame);

        assert!(quiet_rms < 50.0, "quiet rms {quiet_rms}");
        assert!(burst_rms > 2000.0, "burst rms {burst_rms}");
    }

    #[test]
    fn bounded_source_exhausts_after_cycles() {
        let mut capture = SyntheticCapture::new(16_000, 1, 1, 4000).with_cycles(2);
        let mut frame = [0i16; 320];
        for _ in 0..4 {
            capture.next_frame(&mut frame).unwrap();
        }
        assert!(matches!(
            capture.next_frame(&mut frame),
            Err(CaptureError::Exhausted)
        ));
    }

    #[test]
    fn empty_frame_is_rejected() {
        let mut capture = SyntheticCapture::new(16_000, 1, 1, 4000);
        assert!(matches!(
            capture.next_frame(&mut []),
            Err(CaptureError::FrameSize { .. })
        ));
    }
}
