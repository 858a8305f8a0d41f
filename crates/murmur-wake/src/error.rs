use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WakeError {
    /// Lock contention on the real-time path. The frame is dropped for
    /// this stage; the caller must not retry inline.
    #[error("Wake detector busy: lock not acquired within {0:?}")]
    Busy(Duration),

    #[error("Empty audio frame")]
    EmptyFrame,
}
