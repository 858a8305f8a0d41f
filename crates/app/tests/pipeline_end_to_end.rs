use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use murmur_app::capture::SyntheticCapture;
use murmur_app::pipeline::{AudioPipeline, PipelineCommand};
use murmur_telemetry::PipelineMetrics;
use murmur_transport::{DatagramSink, FrameTransport, TransportConfig};
use murmur_vad::{AdaptiveVad, VadConfig};
use murmur_wake::{WakeWordConfig, WakeWordDetector};

struct CountingSink {
    packets: AtomicU64,
}

impl DatagramSink for CountingSink {
    fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.packets.fetch_add(1, Ordering::Relaxed);
        Ok(packet.len())
    }
}

fn wait_until_stopped(handle: &murmur_app::pipeline::PipelineHandle) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.is_running() {
        assert!(Instant::now() < deadline, "pipeline never finished");
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn full_pipeline_runs_to_exhaustion() {
    let sink = Arc::new(CountingSink {
        packets: AtomicU64::new(0),
    });
    let capture = SyntheticCapture::new(16_000, 40, 30, 4000).with_cycles(2);
    let metrics = PipelineMetrics::default();

    let vad = AdaptiveVad::new(VadConfig {
        silence_threshold_ms: 400,
        ..VadConfig::default()
    });
    let wake = Arc::new(WakeWordDetector::new(WakeWordConfig::default()));
    let transport = FrameTransport::new(
        Box::new(SharedSink(Arc::clone(&sink))),
        TransportConfig::default(),
    );

    let handle = AudioPipeline::spawn(capture, vad, wake, transport, metrics.clone());
    wait_until_stopped(&handle);

    let stats = handle.transport_stats();
    assert_eq!(
        metrics.frames_processed.load(Ordering::Relaxed),
        140,
        "two cycles of 70 frames each"
    );
    assert!(stats.voice_packets > 0, "{stats:?}");
    assert!(stats.suppressed_packets > 0, "{stats:?}");
    assert_eq!(stats.packets_sent, sink.packets.load(Ordering::Relaxed));
    assert!(metrics.speech_segments.load(Ordering::Relaxed) >= 1);

    handle.stop();
}

#[test]
fn commands_are_accepted_while_running() {
    let sink = Arc::new(CountingSink {
        packets: AtomicU64::new(0),
    });
    let capture = SyntheticCapture::new(16_000, 10, 5, 2000).with_cycles(50).paced();
    let handle = AudioPipeline::spawn(
        capture,
        AdaptiveVad::new(VadConfig::default()),
        Arc::new(WakeWordDetector::new(WakeWordConfig::default())),
        FrameTransport::new(
            Box::new(SharedSink(Arc::clone(&sink))),
            TransportConfig::default(),
        ),
        PipelineMetrics::default(),
    );

    assert!(handle.send_command(PipelineCommand::SetPlaybackLevel(0.8)));
    assert!(handle.send_command(PipelineCommand::SetPlaybackLevel(0.0)));
    handle.stop();
}

struct SharedSink(Arc<CountingSink>);

impl DatagramSink for SharedSink {
    fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.0.send(packet)
    }
}
