// Nightly Alert Streamer service
//
// Streams archived per-night alerts to the alert topic on a compressed
// simulated-time schedule.  Runs forever: one batch attempt per hour, with
// the nights-done journal providing crash resumption.  An out-of-range
// window is not an error; the service just waits for the next attempt.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elasticc_config::Config;
use elasticc_shared::journal::NightJournal;
use elasticc_shared::kafka::{AlertPublisher, BatchPublisher, NoopPublisher};
use elasticc_shared::streamer::NightlyAlertStreamer;
use elasticc_shared::tom::{AlertTracker, NoopTracker, TomClient};
use elasticc_shared::{avro, StreamResult};

const BATCH_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("=== Nightly Alert Streamer starting ===");
    info!(brokers = %config.kafka.brokers, topic = %config.kafka.topic, "kafka");
    info!(
        campaign_start = %config.streamer.campaign_start,
        compression_factor = config.streamer.compression_factor,
        first_night = config.streamer.first_night,
        last_night = config.streamer.last_night,
        "campaign"
    );
    info!(schema = %config.streamer.schema_file.display(), "reading alert schema");

    let schema = avro::load_schema(&config.streamer.schema_file)
        .context("failed to load alert schema")?;
    let journal = NightJournal::load(&config.streamer.journal_file)
        .context("failed to load nights-done journal")?;

    let (publisher, tracker): (Box<dyn AlertPublisher>, Box<dyn AlertTracker>) =
        if config.streamer.dry_run {
            info!("dry run: publish and TOM notification are disabled");
            (
                Box::new(NoopPublisher::default()),
                Box::new(NoopTracker::default()),
            )
        } else {
            let publisher =
                BatchPublisher::new(&config.kafka).context("failed to create kafka producer")?;
            let mut tom = TomClient::new(&config.tom)?;
            tom.login().await.context("TOM login failed")?;
            (Box::new(publisher), Box::new(tom))
        };

    let mut streamer = NightlyAlertStreamer::new(
        config.streamer.clone(),
        config.kafka.topic.clone(),
        schema,
        journal,
        publisher,
        tracker,
    );

    loop {
        run_batch(&mut streamer).await?;
        info!(secs = BATCH_INTERVAL.as_secs(), "sleeping until next batch");
        tokio::time::sleep(BATCH_INTERVAL).await;
    }
}

async fn run_batch(streamer: &mut NightlyAlertStreamer) -> StreamResult<()> {
    match streamer.stream_todays_batch(Utc::now()).await? {
        Some(totals) => {
            info!(
                nights = totals.nights_streamed,
                alerts = totals.alerts_streamed,
                "batch complete"
            );
        }
        None => {
            error!("window out of range; will retry on the next scheduled attempt");
        }
    }
    Ok(())
}
