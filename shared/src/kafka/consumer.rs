// ============================================================================
// Message Consumer
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use tracing::{debug, info, warn};

use elasticc_config::KafkaConfig;

use crate::error::{StreamError, StreamResult};
use crate::kafka::config::create_client_config;
use crate::kafka::poll::MessageSource;

/// Owned copy of one consumed message, detached from the client's buffers.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    /// Broker/producer timestamp, ms since epoch, when available
    pub timestamp: Option<i64>,
}

/// Logs partition assignments as the group coordinator hands them out.
pub struct StreamContext;

impl ClientContext for StreamContext {}

impl ConsumerContext for StreamContext {
    fn post_rebalance(&self, rebalance: &Rebalance) {
        match rebalance {
            Rebalance::Assign(partitions) => {
                for elem in partitions.elements() {
                    info!(
                        topic = elem.topic(),
                        partition = elem.partition(),
                        offset = ?elem.offset(),
                        "consumer subscribed, partition assigned"
                    );
                }
            }
            Rebalance::Revoke(partitions) => {
                info!(count = partitions.count(), "partitions revoked");
            }
            Rebalance::Error(e) => {
                warn!(error = %e, "rebalance error");
            }
        }
    }
}

/// Batch-oriented wrapper around a Kafka consumer group subscription.
///
/// A `MessageConsumer` owns one subscription and is single-threaded by
/// construction: every operation takes `&mut self`, so concurrent calls from
/// two logical threads of control are a compile error rather than the
/// undefined behavior the underlying client would exhibit.
pub struct MessageConsumer {
    consumer: Option<StreamConsumer<StreamContext>>,
    topics: Vec<String>,
}

impl MessageConsumer {
    /// Create a consumer and subscribe to the given topics.
    ///
    /// # Configuration
    /// - `auto.offset.reset=earliest`: read from the beginning on first start.
    /// - Offset commits are left to the client's auto-commit policy; the only
    ///   explicit commit this wrapper issues is the synchronous one in
    ///   [`MessageConsumer::reset_to_start`].
    pub fn new(config: &KafkaConfig, topics: &[String]) -> StreamResult<Self> {
        info!(
            brokers = %config.brokers,
            group = %config.consumer_group,
            ?topics,
            "initializing kafka consumer"
        );
        let consumer: StreamConsumer<StreamContext> = create_client_config(config)
            .set("group.id", &config.consumer_group)
            .set("auto.offset.reset", "earliest")
            .create_with_context(StreamContext)?;

        let mut this = Self {
            consumer: Some(consumer),
            topics: topics.to_vec(),
        };
        let topics = this.topics.clone();
        this.subscribe(&topics)?;
        Ok(this)
    }

    /// Topics this consumer was created with.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    fn consumer(&self) -> StreamResult<&StreamConsumer<StreamContext>> {
        self.consumer
            .as_ref()
            .ok_or_else(|| StreamError::Consumer("consumer is closed".to_string()))
    }

    /// Join the consumer group for the given topics.  No-op with a warning
    /// if `topics` is empty.
    pub fn subscribe(&mut self, topics: &[String]) -> StreamResult<()> {
        if topics.is_empty() {
            warn!("no topics given, not subscribing");
            return Ok(());
        }
        let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer()?.subscribe(&refs)?;
        Ok(())
    }

    /// Pull up to `max_messages` raw messages, waiting at most `timeout`.
    ///
    /// Returns between 0 and `max_messages` messages.  Delivery order is
    /// preserved within a partition; no ordering holds across partitions.
    pub async fn pull(
        &mut self,
        max_messages: usize,
        timeout: Duration,
    ) -> StreamResult<Vec<RawMessage>> {
        let consumer = self.consumer()?;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut batch = Vec::with_capacity(max_messages);
        while batch.len() < max_messages {
            match tokio::time::timeout_at(deadline, consumer.recv()).await {
                Ok(Ok(msg)) => batch.push(RawMessage {
                    topic: msg.topic().to_string(),
                    partition: msg.partition(),
                    offset: msg.offset(),
                    key: msg.key().map(<[u8]>::to_vec),
                    payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    timestamp: msg.timestamp().to_millis(),
                }),
                Ok(Err(e)) => return Err(e.into()),
                // Timeout: return whatever we have, possibly nothing.
                Err(_) => break,
            }
        }
        debug!(pulled = batch.len(), max_messages, "batch pull complete");
        Ok(batch)
    }

    /// Rewind every partition of `topic` to its earliest offset and commit
    /// the rewound positions synchronously.
    ///
    /// Destructive; intended for test/replay use.  Must be called before any
    /// other pull so the whole topic is replayed.  A throwaway poll is issued
    /// first to force partition assignment; its result is discarded.
    pub async fn reset_to_start(&mut self, topic: &str) -> StreamResult<()> {
        info!(topic, "resetting partitions to start");
        let throwaway = self.pull(1, Duration::from_secs(4)).await?;
        debug!(
            got_message = !throwaway.is_empty(),
            "throwaway poll before reset"
        );

        let consumer = self.consumer()?;
        let metadata = consumer.fetch_metadata(Some(topic), Duration::from_secs(10))?;
        let topic_meta = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| StreamError::Consumer(format!("no metadata for topic {topic}")))?;

        let mut rewound = TopicPartitionList::new();
        for partition in topic_meta.partitions() {
            let (low, high) =
                consumer.fetch_watermarks(topic, partition.id(), Duration::from_secs(10))?;
            info!(
                topic,
                partition = partition.id(),
                low,
                high,
                "resetting partition"
            );
            if low < high {
                consumer.seek(topic, partition.id(), Offset::Offset(low), Duration::from_secs(10))?;
            }
            rewound.add_partition_offset(topic, partition.id(), Offset::Offset(low))?;
        }
        info!("committing rewound partition offsets");
        consumer.commit(&rewound, CommitMode::Sync)?;
        Ok(())
    }

    /// Log every topic the broker knows about.
    pub fn log_topics(&self) -> StreamResult<()> {
        let metadata = self.consumer()?.fetch_metadata(None, Duration::from_secs(10))?;
        let mut names: Vec<&str> = metadata.topics().iter().map(|t| t.name()).collect();
        names.sort_unstable();
        info!(topics = ?names, "broker topics");
        Ok(())
    }

    /// Log the current partition assignments and consumer positions.
    pub fn log_assignments(&self) -> StreamResult<()> {
        let consumer = self.consumer()?;
        let positions = consumer.position()?;
        for elem in positions.elements() {
            info!(
                topic = elem.topic(),
                partition = elem.partition(),
                offset = ?elem.offset(),
                "current assignment"
            );
        }
        Ok(())
    }

    /// Release the underlying connection.  Idempotent; later calls no-op,
    /// and any later pull fails with a consumer-closed error.
    pub fn close(&mut self) {
        if self.consumer.take().is_some() {
            info!("kafka consumer closed");
        }
    }
}

impl Drop for MessageConsumer {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl MessageSource for MessageConsumer {
    async fn pull(&mut self, max_messages: usize, timeout: Duration) -> StreamResult<Vec<RawMessage>> {
        MessageConsumer::pull(self, max_messages, timeout).await
    }
}
