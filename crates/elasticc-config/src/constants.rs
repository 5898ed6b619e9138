// ============================================================================
// Configuration Constants
// ============================================================================

// Kafka defaults
pub(crate) const DEFAULT_BROKERS: &str = "brahms.lbl.gov:9092";
pub(crate) const DEFAULT_TOPIC: &str = "elasticc-test-only-1";
pub(crate) const DEFAULT_CONSUMER_GROUP: &str = "elasticc-stream";

// Consumer pull defaults.  The consume timeout bounds one batch pull; the
// no-message sleep paces the poll loop when the topic is idle.
pub(crate) const DEFAULT_CONSUME_BATCH_SIZE: usize = 10;
pub(crate) const DEFAULT_CONSUME_TIMEOUT_SECS: u64 = 1;
pub(crate) const DEFAULT_NOMSG_SLEEP_SECS: u64 = 1;

// Producer batching: these two are the throughput-vs-latency levers.
pub(crate) const DEFAULT_PRODUCER_BATCH_SIZE: u32 = 131072;
pub(crate) const DEFAULT_PRODUCER_LINGER_MS: u32 = 50;

// Streamer defaults
pub(crate) const DEFAULT_ALERT_DIRS: &str =
    "/alerts/ELASTICC_ALERTS_TEST_EXTRAGALACTIC-SNIa/ALERTS:\
     /alerts/ELASTICC_ALERTS_TEST_EXTRAGALACTIC-nonIa/ALERTS:\
     /alerts/ELASTICC_ALERTS_TEST_GALACTIC/ALERTS";
pub(crate) const DEFAULT_SCHEMA_FILE: &str = "/elasticc/schema/elasticc.v0_9_1.alert.avsc";
pub(crate) const DEFAULT_JOURNAL_FILE: &str = "/nightcache/nightsdone.lis";
pub(crate) const DEFAULT_COMPRESSION_FACTOR: i64 = 10;
pub(crate) const DEFAULT_CAMPAIGN_START: &str = "2022-07-06T07:00:00Z";

// The simulation covers nights 60274 through 61378 inclusive.
pub(crate) const DEFAULT_FIRST_NIGHT: i64 = 60274;
pub(crate) const DEFAULT_LAST_NIGHT: i64 = 61378;

// Rate-limiting delays (seconds)
pub(crate) const DEFAULT_ALERT_DELAY_SECS: f64 = 0.0;
pub(crate) const DEFAULT_EXPOSURE_DELAY_SECS: f64 = 0.2;
pub(crate) const DEFAULT_NIGHT_DELAY_SECS: f64 = 5.0;

// TOM defaults
pub(crate) const DEFAULT_TOM_URL: &str = "https://desc-tom.lbl.gov";
pub(crate) const DEFAULT_TOM_NOTIFY_ENDPOINT: &str = "elasticc/markalertsent";
pub(crate) const DEFAULT_TOM_RETRY_ATTEMPTS: u32 = 5;
pub(crate) const DEFAULT_TOM_RETRY_BACKOFF_SECS: f64 = 1.0;
