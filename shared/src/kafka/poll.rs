// ============================================================================
// Poll Loop
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

use elasticc_config::KafkaConfig;

use crate::error::StreamResult;
use crate::kafka::consumer::RawMessage;

/// Anything batches of raw messages can be pulled from.  Lets the poll loop
/// run against a fake source in tests.
#[async_trait]
pub trait MessageSource: Send {
    async fn pull(&mut self, max_messages: usize, timeout: Duration)
        -> StreamResult<Vec<RawMessage>>;
}

/// Consumes one batch at a time.  A handler error is fatal to the loop.
#[async_trait]
pub trait BatchHandler: Send {
    async fn handle(&mut self, batch: Vec<RawMessage>) -> StreamResult<()>;
}

/// Cooperative poll loop: pull a batch, hand it to the handler, sleep when
/// the topic is idle, stop once a wall-clock duration has elapsed.
///
/// At most one handler invocation is in flight at a time; the only
/// suspension points are the pull call and the idle sleep.
pub struct PollLoop {
    pub batch_size: usize,
    pub pull_timeout: Duration,
    pub idle_sleep: Duration,
}

impl PollLoop {
    pub fn from_config(config: &KafkaConfig) -> Self {
        Self {
            batch_size: config.consume_batch_size,
            pull_timeout: Duration::from_secs(config.consume_timeout_secs),
            idle_sleep: Duration::from_secs(config.nomsg_sleep_secs),
        }
    }

    /// Run until `stop_after` wall-clock time has elapsed (checked once per
    /// iteration, after the handler or the idle sleep) or an error occurs.
    pub async fn run<S, H>(
        &self,
        source: &mut S,
        handler: &mut H,
        stop_after: Duration,
    ) -> StreamResult<()>
    where
        S: MessageSource,
        H: BatchHandler,
    {
        let started = Instant::now();
        loop {
            debug!(
                batch_size = self.batch_size,
                timeout_secs = self.pull_timeout.as_secs_f64(),
                "trying to consume messages"
            );
            let batch = source.pull(self.batch_size, self.pull_timeout).await?;
            if batch.is_empty() {
                debug!(
                    sleep_secs = self.idle_sleep.as_secs_f64(),
                    "no messages, sleeping"
                );
                tokio::time::sleep(self.idle_sleep).await;
            } else {
                handler.handle(batch).await?;
            }
            if started.elapsed() >= stop_after {
                info!("ending poll loop");
                return Ok(());
            }
        }
    }
}
