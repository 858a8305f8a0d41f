use std::time::Instant;

/// Bounded table of detections awaiting server validation, keyed by
/// detection_id with the report's send time for RTT measurement.
///
/// When full, a new entry is dropped rather than evicting the oldest: a
/// validation for a dropped id still reaches the caller, it just carries
/// no RTT sample.
#[derive(Debug)]
pub struct PendingValidations {
    entries: Vec<(u32, Instant)>,
    capacity: usize,
}

impl PendingValidations {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Returns false when the table is full and the entry was dropped.
    pub fn insert(&mut self, detection_id: u32, sent_at: Instant) -> bool {
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push((detection_id, sent_at));
        true
    }

    pub fn remove(&mut self, detection_id: u32) -> Option<Instant> {
        let idx = self.entries.iter().position(|(id, _)| *id == detection_id)?;
        Some(self.entries.swap_remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_round_trip() {
        let mut table = PendingValidations::new(10);
        let t = Instant::now();
        assert!(table.insert(1, t));
        assert!(table.insert(2, t));
        assert_eq!(table.len(), 2);
        assert!(table.remove(1).is_some());
        assert!(table.remove(1).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn full_table_drops_new_entries_and_keeps_old() {
        let mut table = PendingValidations::new(10);
        let t = Instant::now();
        for id in 0..10 {
            assert!(table.insert(id, t));
        }
        // 11th report: dropped, not evicting anything.
        assert!(!table.insert(10, t));
        assert_eq!(table.len(), 10);
        assert!(table.remove(10).is_none());
        for id in 0..10 {
            assert!(table.remove(id).is_some(), "entry {id} was corrupted");
        }
        assert!(table.is_empty());
    }
}
