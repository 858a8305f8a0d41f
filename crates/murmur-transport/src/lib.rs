pub mod error;
pub mod sink;
pub mod transport;
pub mod wire;

pub use error::TransportError;
pub use sink::{DatagramSink, UdpDatagramSink};
pub use transport::{FrameTransport, TransportConfig, TransportStats};
pub use wire::{
    BasicHeader, EnhancedHeader, PacketHeader, VadFlags, WakeFlags, WakeWordHeader,
    BASIC_HEADER_LEN, ENHANCED_HEADER_LEN, WAKE_WORD_HEADER_LEN,
};
