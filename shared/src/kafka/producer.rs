// ============================================================================
// Batch Publisher
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info};

use elasticc_config::KafkaConfig;

use crate::error::{StreamError, StreamResult};
use crate::kafka::config::create_client_config;

/// Publish/flush seam the streamer and broker are written against.
///
/// `publish` enqueues one payload for asynchronous send; `flush` blocks until
/// every previously enqueued payload is acknowledged or failed.  Flush is
/// called at logical boundaries (end of an exposure, end of a night, end of
/// a run) so a unit of work is durable before it is reported complete.
#[async_trait]
pub trait AlertPublisher: Send {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> StreamResult<()>;
    async fn flush(&mut self) -> StreamResult<()>;
}

type Delivery = tokio::task::JoinHandle<
    Result<(i32, i64), (rdkafka::error::KafkaError, rdkafka::message::OwnedMessage)>,
>;

/// Kafka-backed batch publisher.
///
/// Buffering and network I/O are delegated to the client, configured with an
/// explicit `batch.size` and `linger.ms`.  Delivery results are retained and
/// only inspected at flush, so publishes are fire-and-forget in between.
pub struct BatchPublisher {
    producer: FutureProducer,
    inflight: Vec<Delivery>,
    messages_sent: u64,
    bytes_sent: u64,
}

impl BatchPublisher {
    pub fn new(config: &KafkaConfig) -> StreamResult<Self> {
        info!(
            brokers = %config.brokers,
            batch_size = config.producer_batch_size,
            linger_ms = config.producer_linger_ms,
            "initializing kafka producer"
        );
        let producer: FutureProducer = create_client_config(config)
            .set("batch.size", config.producer_batch_size.to_string())
            .set("linger.ms", config.producer_linger_ms.to_string())
            .create()?;
        Ok(Self {
            producer,
            inflight: Vec::new(),
            messages_sent: 0,
            bytes_sent: 0,
        })
    }

    /// Total messages enqueued since construction.
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    /// Total payload bytes enqueued since construction.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

#[async_trait]
impl AlertPublisher for BatchPublisher {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> StreamResult<()> {
        self.messages_sent += 1;
        self.bytes_sent += payload.len() as u64;
        let producer = self.producer.clone();
        let topic = topic.to_string();
        self.inflight.push(tokio::spawn(async move {
            producer
                .send(
                    FutureRecord::<(), Vec<u8>>::to(&topic).payload(&payload),
                    Timeout::Never,
                )
                .await
        }));
        Ok(())
    }

    async fn flush(&mut self) -> StreamResult<()> {
        let pending: Vec<Delivery> = self.inflight.drain(..).collect();
        debug!(pending = pending.len(), "flushing publisher");
        for delivery in pending {
            match delivery.await {
                Ok(Ok((_partition, _offset))) => {}
                Ok(Err((e, _msg))) => return Err(e.into()),
                Err(join_err) => {
                    return Err(StreamError::Publish(format!(
                        "delivery task failed: {join_err}"
                    )))
                }
            }
        }
        self.producer.flush(Duration::from_secs(30))?;
        Ok(())
    }
}

/// Publisher that drops everything; wiring stand-in for dry runs.
#[derive(Default)]
pub struct NoopPublisher {
    pub published: u64,
}

#[async_trait]
impl AlertPublisher for NoopPublisher {
    async fn publish(&mut self, _topic: &str, payload: Vec<u8>) -> StreamResult<()> {
        self.published += 1;
        debug!(bytes = payload.len(), "noop publish");
        Ok(())
    }

    async fn flush(&mut self) -> StreamResult<()> {
        Ok(())
    }
}
