use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Rejected synchronously, no state change.
    #[error("Empty audio frame")]
    EmptyFrame,

    /// Protocol violation: the packet is discarded, nothing is partially
    /// processed.
    #[error("Packet too short: {0} bytes")]
    Undersized(usize),

    #[error("Unknown packet version {0}")]
    UnknownVersion(u8),

    /// Datagram send failure. Counted and reported; retry policy belongs
    /// to the datagram collaborator, not this layer.
    #[error("Datagram send failed: {0}")]
    Io(#[from] std::io::Error),
}
