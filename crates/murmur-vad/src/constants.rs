/// Audio sample rate for all pipeline processing
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Frame size in samples (20ms at 16kHz)
pub const FRAME_SIZE_SAMPLES: usize = 320;

/// Frame duration in milliseconds
pub const FRAME_DURATION_MS: u32 = 20;

/// Upper bound for the consistency window capacity
pub const MAX_CONSISTENCY_FRAMES: usize = 16;
