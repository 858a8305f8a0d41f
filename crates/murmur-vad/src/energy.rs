/// Per-frame energy measurements in raw sample units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameEnergy {
    pub rms: f32,
    pub peak: i16,
}

pub fn measure(frame: &[i16]) -> FrameEnergy {
    if frame.is_empty() {
        return FrameEnergy { rms: 0.0, peak: 0 };
    }

    let mut sum_squares: i64 = 0;
    let mut peak: i16 = 0;
    for &sample in frame {
        let s = sample as i64;
        sum_squares += s * s;
        let abs = sample.saturating_abs();
        if abs > peak {
            peak = abs;
        }
    }

    let mean_square = sum_squares as f64 / frame.len() as f64;
    FrameEnergy {
        rms: mean_square.sqrt() as f32,
        peak,
    }
}

/// Exponentially-weighted noise floor estimate. Updated only while the
/// current frame is classified un-voiced, so speech never drags it upward.
#[derive(Debug, Clone, Copy)]
pub struct NoiseFloor {
    floor: f32,
    min_seen: f32,
    max_seen: f32,
}

impl NoiseFloor {
    pub fn new(initial: f32) -> Self {
        Self {
            floor: initial,
            min_seen: initial,
            max_seen: initial,
        }
    }

    pub fn current(&self) -> f32 {
        self.floor
    }

    pub fn min_seen(&self) -> f32 {
        self.min_seen
    }

    pub fn max_seen(&self) -> f32 {
        self.max_seen
    }

    pub fn update(&mut self, rms: f32, alpha: f32) {
        self.floor = alpha * rms + (1.0 - alpha) * self.floor;
        if self.floor < self.min_seen {
            self.min_seen = self.floor;
        }
        if self.floor > self.max_seen {
            self.max_seen = self.floor;
        }
    }

    /// SNR of the given level against the floor, with +1 guards so silence
    /// yields 0 dB instead of a division blowup.
    pub fn snr_db(&self, rms: f32) -> f32 {
        20.0 * ((rms + 1.0) / (self.floor + 1.0)).log10()
    }

    /// Threshold the frame RMS must clear, `snr_margin_db` above the floor
    /// but never below a quarter of the configured base threshold.
    pub fn adaptive_threshold(&self, snr_margin_db: f32, base_threshold: f32) -> f32 {
        let derived = self.floor * 10f32.powf(snr_margin_db / 20.0);
        derived.max(base_threshold / 4.0)
    }
}
