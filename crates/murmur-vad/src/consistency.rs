/// Fixed-capacity ring of recent per-frame decisions and confidences.
/// The active window length is set at runtime but can never exceed CAP.
#[derive(Debug, Clone)]
pub struct ConsistencyWindow<const CAP: usize> {
    decisions: [bool; CAP],
    confidences: [f32; CAP],
    window_len: usize,
    head: usize,
    filled: usize,
}

impl<const CAP: usize> ConsistencyWindow<CAP> {
    pub fn new(window_len: usize) -> Self {
        Self {
            decisions: [false; CAP],
            confidences: [0.0; CAP],
            window_len: window_len.clamp(1, CAP),
            head: 0,
            filled: 0,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn set_window_len(&mut self, window_len: usize) {
        self.window_len = window_len.clamp(1, CAP);
        self.clear();
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.window_len
    }

    pub fn push(&mut self, decision: bool, confidence: f32) {
        self.decisions[self.head] = decision;
        self.confidences[self.head] = confidence;
        self.head = (self.head + 1) % self.window_len;
        if self.filled < self.window_len {
            self.filled += 1;
        }
    }

    /// Fraction of frames in the window currently voiced.
    pub fn consensus(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        let voiced = self.decisions[..self.window_len]
            .iter()
            .take(self.filled)
            .filter(|&&d| d)
            .count();
        voiced as f32 / self.filled as f32
    }

    pub fn average_confidence(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        let sum: f32 = self.confidences[..self.window_len]
            .iter()
            .take(self.filled)
            .sum();
        sum / self.filled as f32
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.filled = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consensus_tracks_majority() {
        let mut w: ConsistencyWindow<16> = ConsistencyWindow::new(5);
        for _ in 0..3 {
            w.push(true, 0.9);
        }
        w.push(false, 0.1);
        w.push(false, 0.1);
        assert!((w.consensus() - 0.6).abs() < 1e-6);
        assert!((w.average_confidence() - 0.58).abs() < 1e-6);
    }

    #[test]
    fn partial_fill_averages_over_filled_only() {
        let mut w: ConsistencyWindow<16> = ConsistencyWindow::new(5);
        w.push(true, 1.0);
        w.push(true, 0.5);
        assert_eq!(w.consensus(), 1.0);
        assert!((w.average_confidence() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn ring_overwrites_oldest() {
        let mut w: ConsistencyWindow<16> = ConsistencyWindow::new(3);
        w.push(true, 1.0);
        w.push(true, 1.0);
        w.push(true, 1.0);
        w.push(false, 0.0); // evicts the first entry
        assert!((w.consensus() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn window_len_is_capped() {
        let w: ConsistencyWindow<4> = ConsistencyWindow::new(10);
        assert_eq!(w.window_len(), 4);
    }
}
