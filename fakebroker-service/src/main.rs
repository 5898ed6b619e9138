// Fake Broker service
//
// Consumes alerts from a source topic, runs the mock classifiers over each
// batch, and republishes broker-classification messages to a destination
// topic.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elasticc_config::KafkaConfig;
use elasticc_shared::avro;
use elasticc_shared::broker::{Classify, FakeBroker, NugentClassifier, RandomSnType};
use elasticc_shared::kafka::{BatchPublisher, MessageConsumer, PollLoop};

/// Pretend to be an ELAsTiCC broker.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Server to pull alerts from
    #[arg(long, default_value = "brahms.lbl.gov:9092")]
    source: String,

    /// Topic on the source server
    #[arg(short = 't', long)]
    source_topic: String,

    /// Consumer group ID to use on the source server
    #[arg(short, long, default_value = "fakebroker")]
    group_id: String,

    /// Reset to the beginning of the source stream
    #[arg(short, long, default_value_t = false)]
    reset: bool,

    /// Server to push broker messages to
    #[arg(long, default_value = "brahms.lbl.gov:9092")]
    dest: String,

    /// Topic on the destination server
    #[arg(short = 'u', long)]
    dest_topic: String,

    /// File with the alert schema
    #[arg(short = 's', long, default_value = "schema/elasticc.v0_9_1.alert.avsc")]
    alert_schema: PathBuf,

    /// File with the broker message schema
    #[arg(
        short = 'b',
        long,
        default_value = "schema/elasticc.v0_9_1.brokerClassification.avsc"
    )]
    brokermessage_schema: PathBuf,

    /// How many messages to pull per batch
    #[arg(long, default_value_t = 100)]
    batch_size: usize,

    /// How long to keep polling, in minutes
    #[arg(short, long, default_value_t = 60.0)]
    duration: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let alert_schema =
        avro::load_schema(&args.alert_schema).context("failed to load alert schema")?;
    let message_schema = avro::load_schema(&args.brokermessage_schema)
        .context("failed to load broker message schema")?;

    let source_config = KafkaConfig {
        brokers: args.source.clone(),
        topic: args.source_topic.clone(),
        consumer_group: args.group_id.clone(),
        consume_batch_size: args.batch_size,
        ..KafkaConfig::default()
    };
    let dest_config = KafkaConfig {
        brokers: args.dest.clone(),
        topic: args.dest_topic.clone(),
        ..KafkaConfig::default()
    };

    let mut consumer =
        MessageConsumer::new(&source_config, &[args.source_topic.clone()])
            .context("failed to create source consumer")?;
    if args.reset {
        consumer.reset_to_start(&args.source_topic).await?;
    }

    let publisher = BatchPublisher::new(&dest_config)
        .context("failed to create destination producer")?;
    let classifiers: Vec<Box<dyn Classify>> = vec![
        Box::new(NugentClassifier::new()),
        Box::new(RandomSnType::new()),
    ];
    let mut broker = FakeBroker::new(
        alert_schema,
        message_schema,
        classifiers,
        Box::new(publisher),
        args.dest_topic.clone(),
    );

    info!(
        source = %args.source,
        source_topic = %args.source_topic,
        dest = %args.dest,
        dest_topic = %args.dest_topic,
        "fake broker polling"
    );
    let poll_loop = PollLoop::from_config(&source_config);
    poll_loop
        .run(
            &mut consumer,
            &mut broker,
            Duration::from_secs_f64(args.duration * 60.0),
        )
        .await?;

    info!(classified = broker.classified(), "fake broker done");
    consumer.close();
    Ok(())
}
