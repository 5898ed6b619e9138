use thiserror::Error;

pub type StreamResult<T> = Result<T, StreamError>;

/// Error type for the streaming core.
///
/// Schema/Decode/Encode are kept distinct so callers can tell a bad schema
/// file (fatal at startup) from a bad payload (skip or abort per context).
#[derive(Error, Debug)]
pub enum StreamError {
    // ===== Avro =====
    #[error("schema error: {0}")]
    Schema(String),

    #[error("avro decode error: {0}")]
    Decode(String),

    #[error("avro encode error: {0}")]
    Encode(String),

    // ===== Kafka =====
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("consumer error: {0}")]
    Consumer(String),

    // ===== TOM =====
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tom error: {0}")]
    Tom(String),

    // ===== Local state =====
    #[error("journal error: {0}")]
    Journal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
