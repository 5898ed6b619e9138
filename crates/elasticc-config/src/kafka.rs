// ============================================================================
// Kafka Configuration
// ============================================================================

use crate::constants::*;

/// Kafka configuration shared by the consumer and producer wrappers.
///
/// `producer_batch_size` (bytes) and `producer_linger_ms` are the two levers
/// controlling the throughput-vs-latency trade-off of the batch publisher.
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated list of Kafka brokers (e.g. "kafka1:9092,kafka2:9092")
    pub brokers: String,
    /// Topic alerts are streamed to / consumed from
    pub topic: String,
    /// Consumer group ID
    pub consumer_group: String,
    /// Maximum messages pulled in one consume call
    pub consume_batch_size: usize,
    /// Bound on one batch pull (seconds)
    pub consume_timeout_secs: u64,
    /// Poll-loop sleep when a pull returns no messages (seconds)
    pub nomsg_sleep_secs: u64,
    /// Producer batch size in bytes
    pub producer_batch_size: u32,
    /// Producer linger before flushing a partially-full batch (milliseconds)
    pub producer_linger_ms: u32,
}

impl KafkaConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            brokers: std::env::var("ELASTICC_ALERT_SERVER")
                .unwrap_or_else(|_| DEFAULT_BROKERS.to_string()),
            topic: std::env::var("ELASTICC_ALERT_TOPIC")
                .unwrap_or_else(|_| DEFAULT_TOPIC.to_string()),
            consumer_group: std::env::var("ELASTICC_CONSUMER_GROUP")
                .unwrap_or_else(|_| DEFAULT_CONSUMER_GROUP.to_string()),
            consume_batch_size: std::env::var("ELASTICC_CONSUME_BATCH_SIZE")
                .unwrap_or_else(|_| DEFAULT_CONSUME_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_CONSUME_BATCH_SIZE),
            consume_timeout_secs: std::env::var("ELASTICC_CONSUME_TIMEOUT_SECS")
                .unwrap_or_else(|_| DEFAULT_CONSUME_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_CONSUME_TIMEOUT_SECS),
            nomsg_sleep_secs: std::env::var("ELASTICC_NOMSG_SLEEP_SECS")
                .unwrap_or_else(|_| DEFAULT_NOMSG_SLEEP_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_NOMSG_SLEEP_SECS),
            producer_batch_size: std::env::var("ELASTICC_PRODUCER_BATCH_SIZE")
                .unwrap_or_else(|_| DEFAULT_PRODUCER_BATCH_SIZE.to_string())
                .parse()
                .unwrap_or(DEFAULT_PRODUCER_BATCH_SIZE),
            producer_linger_ms: std::env::var("ELASTICC_PRODUCER_LINGER_MS")
                .unwrap_or_else(|_| DEFAULT_PRODUCER_LINGER_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_PRODUCER_LINGER_MS),
        }
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: DEFAULT_BROKERS.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
            consume_batch_size: DEFAULT_CONSUME_BATCH_SIZE,
            consume_timeout_secs: DEFAULT_CONSUME_TIMEOUT_SECS,
            nomsg_sleep_secs: DEFAULT_NOMSG_SLEEP_SECS,
            producer_batch_size: DEFAULT_PRODUCER_BATCH_SIZE,
            producer_linger_ms: DEFAULT_PRODUCER_LINGER_MS,
        }
    }
}
