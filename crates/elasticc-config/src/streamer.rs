// ============================================================================
// Nightly Streamer Configuration
// ============================================================================

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::constants::*;

/// Configuration for the nightly alert streamer.
#[derive(Clone, Debug)]
pub struct StreamerConfig {
    /// Source directories holding per-night NITE<n>.tar.gz archives
    pub alert_dirs: Vec<PathBuf>,
    /// Path to the alert Avro schema (.avsc)
    pub schema_file: PathBuf,
    /// Nights-done journal file (one night id per line, append-only)
    pub journal_file: PathBuf,
    /// Simulated nights streamed per real elapsed day
    pub compression_factor: i64,
    /// Wall-clock start of the streaming campaign
    pub campaign_start: DateTime<Utc>,
    /// First night of the overall simulation
    pub first_night: i64,
    /// Last night of the overall simulation (inclusive)
    pub last_night: i64,
    /// Delay between individual alerts (seconds; rate-limiting knob)
    pub alert_delay_secs: f64,
    /// Delay between exposures (MJD changes) within a night
    pub exposure_delay_secs: f64,
    /// Delay between nights
    pub night_delay_secs: f64,
    /// When set, archives are read and decoded but nothing is published
    /// and the TOM is never contacted.
    pub dry_run: bool,
}

impl StreamerConfig {
    pub(crate) fn from_env() -> Result<Self> {
        let campaign_start = std::env::var("ELASTICC_START_TIME")
            .unwrap_or_else(|_| DEFAULT_CAMPAIGN_START.to_string());
        let campaign_start = DateTime::parse_from_rfc3339(&campaign_start)
            .with_context(|| format!("invalid ELASTICC_START_TIME '{campaign_start}'"))?
            .with_timezone(&Utc);

        Ok(Self {
            alert_dirs: std::env::var("ELASTICC_ALERT_DIRS")
                .unwrap_or_else(|_| DEFAULT_ALERT_DIRS.to_string())
                .split(':')
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect(),
            schema_file: std::env::var("ELASTICC_SCHEMA_FILE")
                .unwrap_or_else(|_| DEFAULT_SCHEMA_FILE.to_string())
                .into(),
            journal_file: std::env::var("ELASTICC_JOURNAL_FILE")
                .unwrap_or_else(|_| DEFAULT_JOURNAL_FILE.to_string())
                .into(),
            compression_factor: std::env::var("ELASTICC_COMPRESSION_FACTOR")
                .unwrap_or_else(|_| DEFAULT_COMPRESSION_FACTOR.to_string())
                .parse()
                .unwrap_or(DEFAULT_COMPRESSION_FACTOR),
            campaign_start,
            first_night: std::env::var("ELASTICC_FIRST_NIGHT")
                .unwrap_or_else(|_| DEFAULT_FIRST_NIGHT.to_string())
                .parse()
                .unwrap_or(DEFAULT_FIRST_NIGHT),
            last_night: std::env::var("ELASTICC_LAST_NIGHT")
                .unwrap_or_else(|_| DEFAULT_LAST_NIGHT.to_string())
                .parse()
                .unwrap_or(DEFAULT_LAST_NIGHT),
            alert_delay_secs: std::env::var("ELASTICC_ALERT_DELAY_SECS")
                .unwrap_or_else(|_| DEFAULT_ALERT_DELAY_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_ALERT_DELAY_SECS),
            exposure_delay_secs: std::env::var("ELASTICC_EXPOSURE_DELAY_SECS")
                .unwrap_or_else(|_| DEFAULT_EXPOSURE_DELAY_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_EXPOSURE_DELAY_SECS),
            night_delay_secs: std::env::var("ELASTICC_NIGHT_DELAY_SECS")
                .unwrap_or_else(|_| DEFAULT_NIGHT_DELAY_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_NIGHT_DELAY_SECS),
            dry_run: std::env::var("ELASTICC_DRY_RUN")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }
}
