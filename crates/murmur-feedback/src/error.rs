use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Feedback channel is not connected")]
    NotConnected,

    #[error("Outbound queue full, message dropped")]
    QueueFull,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Message serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
