// alert-tail
//
// Pull alerts from an ELAsTiCC alert server and print them.  Mostly useful
// for eyeballing a topic: optionally reset to the start of the stream, poll
// for a bounded duration, pretty-print every decoded alert.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use apache_avro::Schema;
use async_trait::async_trait;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elasticc_config::KafkaConfig;
use elasticc_shared::alert::Alert;
use elasticc_shared::avro;
use elasticc_shared::kafka::{BatchHandler, MessageConsumer, PollLoop, RawMessage};
use elasticc_shared::StreamResult;

/// Pull alerts from an ELAsTiCC alerts server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// File with the schema of the alerts on the topic
    schema: PathBuf,

    /// Kafka server to read from
    #[arg(short, long, default_value = "brahms.lbl.gov:9092")]
    server: String,

    /// Just list the broker's topics and exit
    #[arg(long, default_value_t = false)]
    list_topics: bool,

    /// Topic to poll
    #[arg(short, long)]
    topic: Option<String>,

    /// Reset the topic to its earliest offset before polling
    #[arg(short, long, default_value_t = false)]
    reset_to_start: bool,

    /// Batch size
    #[arg(short, long, default_value_t = 100)]
    batch_size: usize,

    /// Duration in minutes to keep polling
    #[arg(short, long, default_value_t = 1.0)]
    duration: f64,

    /// Consumer group ID
    #[arg(short, long, default_value = "elasticc-tail")]
    group_id: String,
}

/// Prints every alert of every batch, with the message coordinates.
struct AlertPrinter {
    schema: Schema,
    total_handled: u64,
}

#[async_trait]
impl BatchHandler for AlertPrinter {
    async fn handle(&mut self, batch: Vec<RawMessage>) -> StreamResult<()> {
        info!(messages = batch.len(), "handling batch");
        for msg in &batch {
            let alert: Alert = avro::decode_datum(&self.schema, &msg.payload)?;
            let pretty = serde_json::to_string_pretty(&alert)
                .unwrap_or_else(|e| format!("<unprintable alert: {e}>"));
            info!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                key = ?msg.key,
                timestamp = ?msg.timestamp,
                alert = %pretty,
                "alert"
            );
        }
        self.total_handled += batch.len() as u64;
        info!(total = self.total_handled, "messages handled so far");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let schema = avro::load_schema(&args.schema).context("failed to load schema")?;

    let topics: Vec<String> = args.topic.clone().into_iter().collect();
    let config = KafkaConfig {
        brokers: args.server.clone(),
        consumer_group: args.group_id.clone(),
        consume_batch_size: args.batch_size,
        ..KafkaConfig::default()
    };
    let mut consumer =
        MessageConsumer::new(&config, &topics).context("failed to create consumer")?;

    if args.list_topics {
        consumer.log_topics()?;
        return Ok(());
    }
    if topics.is_empty() {
        info!("no topic given, exiting");
        return Ok(());
    }
    if args.reset_to_start {
        for topic in consumer.topics().to_vec() {
            consumer.reset_to_start(&topic).await?;
        }
    }

    let mut printer = AlertPrinter {
        schema,
        total_handled: 0,
    };
    let poll_loop = PollLoop::from_config(&config);
    poll_loop
        .run(
            &mut consumer,
            &mut printer,
            Duration::from_secs_f64(args.duration * 60.0),
        )
        .await?;

    consumer.log_assignments()?;
    consumer.close();
    Ok(())
}
