// ============================================================================
// Nightly Alert Streamer
// ============================================================================
//
// For each night of today's window, reads the per-night NITE<n>.tar.gz
// archives from every source directory, decodes the alert files they hold,
// and re-publishes the alerts in exposure order.  After every exposure (MJD
// change) the publisher is flushed and the TOM is told which alert ids went
// out; after every night the night id is journaled so a restart never
// streams it again.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use apache_avro::Schema;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use elasticc_config::StreamerConfig;

use crate::alert::Alert;
use crate::avro;
use crate::error::StreamResult;
use crate::journal::NightJournal;
use crate::kafka::AlertPublisher;
use crate::tom::AlertTracker;

static ALERT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"alert_mjd([0-9]+\.[0-9]+)_obj([0-9]+)_src([0-9]+)\.avro\.gz$")
        .expect("alert filename pattern is valid")
});

/// Fields embedded in an archive member name.
///
/// The MJD is kept as the raw token, not parsed to a float: member names are
/// fixed-width zero-padded, so lexicographic order of the token equals
/// chronological order, and the token doubles as the exposure grouping key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAlertName {
    pub mjd: String,
    pub object_id: i64,
    pub source_id: i64,
}

pub fn parse_alert_name(name: &str) -> Option<ParsedAlertName> {
    let caps = ALERT_NAME_RE.captures(name)?;
    Some(ParsedAlertName {
        mjd: caps[1].to_string(),
        object_id: caps[2].parse().ok()?,
        source_id: caps[3].parse().ok()?,
    })
}

/// Compute the night window to stream "today".
///
/// With compression factor `c`, `k` whole days since the campaign start map
/// to `[first + k*c, first + k*c + c - 1]`, clamped to `[first, last]`.
/// Returns `None` when the raw window falls entirely outside the simulation
/// range; the caller logs and waits for the next scheduled invocation.
pub fn night_window(
    now: DateTime<Utc>,
    campaign_start: DateTime<Utc>,
    compression_factor: i64,
    first_night: i64,
    last_night: i64,
) -> Option<(i64, i64)> {
    let elapsed_days = (now - campaign_start).num_seconds().div_euclid(86400);
    let n0 = first_night + elapsed_days * compression_factor;
    let n1 = n0 + compression_factor - 1;
    if n0 > last_night || n1 < first_night {
        return None;
    }
    Some((n0.max(first_night), n1.min(last_night)))
}

/// Totals for one `stream_todays_batch` invocation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamTotals {
    pub nights_streamed: u32,
    pub alerts_streamed: u64,
    pub bytes_streamed: u64,
}

pub struct NightlyAlertStreamer {
    config: StreamerConfig,
    topic: String,
    schema: Schema,
    journal: NightJournal,
    publisher: Box<dyn AlertPublisher>,
    tracker: Box<dyn AlertTracker>,
}

impl NightlyAlertStreamer {
    pub fn new(
        config: StreamerConfig,
        topic: String,
        schema: Schema,
        journal: NightJournal,
        publisher: Box<dyn AlertPublisher>,
        tracker: Box<dyn AlertTracker>,
    ) -> Self {
        info!(
            campaign_start = %config.campaign_start,
            compression_factor = config.compression_factor,
            %topic,
            dry_run = config.dry_run,
            "alert streamer ready"
        );
        Self {
            config,
            topic,
            schema,
            journal,
            publisher,
            tracker,
        }
    }

    /// Stream every not-yet-journaled night of today's window.
    ///
    /// Returns `Ok(None)` when the window is outside the simulation range.
    /// Any publish-flush or notification failure aborts the run with the
    /// current night left out of the journal, so the next run re-streams it
    /// from scratch (downstream must tolerate redelivery).
    pub async fn stream_todays_batch(
        &mut self,
        now: DateTime<Utc>,
    ) -> StreamResult<Option<StreamTotals>> {
        let Some((n0, n1)) = night_window(
            now,
            self.config.campaign_start,
            self.config.compression_factor,
            self.config.first_night,
            self.config.last_night,
        ) else {
            error!(
                first_night = self.config.first_night,
                last_night = self.config.last_night,
                "today's window is outside the overall night range"
            );
            return Ok(None);
        };

        info!(n0, n1, "streaming alerts for tonight's window");
        info!(
            alert_delay = self.config.alert_delay_secs,
            exposure_delay = self.config.exposure_delay_secs,
            night_delay = self.config.night_delay_secs,
            "inter-alert / inter-exposure / inter-night delays"
        );

        let mut totals = StreamTotals::default();
        let mut pending_ids: Vec<i64> = Vec::new();
        for night in n0..=n1 {
            if self.journal.contains(night) {
                warn!(night, "night already done, not doing it again");
                continue;
            }
            self.stream_night(night, &mut pending_ids, &mut totals).await?;
        }

        // Covers anything from the last night not yet flushed if the window
        // ended early.
        self.flush_and_notify(&mut pending_ids).await?;
        info!(
            nights = totals.nights_streamed,
            alerts = totals.alerts_streamed,
            mib = totals.bytes_streamed as f64 / 1024.0 / 1024.0,
            "done with today's batch"
        );
        Ok(Some(totals))
    }

    async fn stream_night(
        &mut self,
        night: i64,
        pending_ids: &mut Vec<i64>,
        totals: &mut StreamTotals,
    ) -> StreamResult<()> {
        info!(night, "doing night");

        // Build the full list of alert files to stream.  Member names embed
        // the source id, so a name appearing in two archives is unexpected.
        let mut member_names: Vec<String> = Vec::new();
        let mut alerts_by_member: HashMap<String, Vec<Alert>> = HashMap::new();
        for dir in self.config.alert_dirs.clone() {
            info!(dir = %dir.display(), "looking for night archive");
            let tarpath = dir.join(format!("NITE{night}.tar.gz"));
            match self.read_night_archive(&tarpath) {
                Ok(members) => {
                    for (name, alerts) in members {
                        if alerts_by_member.contains_key(&name) {
                            warn!(name = %name, "alert file seen twice, and shouldn't be");
                            continue;
                        }
                        member_names.push(name.clone());
                        alerts_by_member.insert(name, alerts);
                    }
                }
                Err(e) => {
                    error!(
                        archive = %tarpath.display(),
                        error = %e,
                        "could not read night archive, moving on"
                    );
                }
            }
            info!(
                files = member_names.len(),
                "done reading archives so far for this night"
            );
        }

        // Sort by member name, which sorts by MJD: the fixed-width encoding
        // makes string order and numeric order agree.
        member_names.sort();
        info!(night, files = member_names.len(), "streaming alerts");

        let mut night_alerts: u64 = 0;
        let mut night_bytes: u64 = 0;
        let mut last_mjd = String::new();
        for name in &member_names {
            let Some(parsed) = parse_alert_name(name) else {
                error!(name = %name, "failed to parse member name; this should not happen");
                continue;
            };
            if parsed.mjd != last_mjd {
                // Exposure boundary: everything published so far becomes
                // durable and the TOM hears about it before the next
                // exposure begins.
                self.flush_and_notify(pending_ids).await?;
                debug!(
                    mjd = %parsed.mjd,
                    night,
                    streamed = night_alerts,
                    "starting exposure"
                );
                self.pace(self.config.exposure_delay_secs).await;
                last_mjd = parsed.mjd.clone();
            }
            let Some(alerts) = alerts_by_member.get(name) else {
                continue;
            };
            for alert in alerts {
                if night_alerts % 500 == 0 {
                    info!(night, streamed = night_alerts, "night progress");
                }
                let payload = avro::encode_datum(&self.schema, alert)?;
                night_bytes += payload.len() as u64;
                night_alerts += 1;
                if !self.config.dry_run {
                    self.publisher.publish(&self.topic, payload).await?;
                }
                pending_ids.push(alert.alert_id);
                self.pace(self.config.alert_delay_secs).await;
            }
        }

        self.flush_and_notify(pending_ids).await?;
        info!(
            night,
            alerts = night_alerts,
            mib = night_bytes as f64 / 1024.0 / 1024.0,
            "streamed night"
        );
        self.pace(self.config.night_delay_secs).await;

        // Journal the night only after its last flush+notify succeeded; a
        // crash before this line re-streams the whole night next run.  A dry
        // run journals nothing, so it never eats a night a real run would
        // have streamed.
        if !self.config.dry_run {
            self.journal.record(night)?;
        }
        totals.nights_streamed += 1;
        totals.alerts_streamed += night_alerts;
        totals.bytes_streamed += night_bytes;
        Ok(())
    }

    /// Read one night archive, returning (member name, decoded alerts) for
    /// every member whose name matches the alert pattern.
    fn read_night_archive(&self, tarpath: &Path) -> StreamResult<Vec<(String, Vec<Alert>)>> {
        let file = File::open(tarpath)?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        let mut members = Vec::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            if parse_alert_name(&name).is_none() {
                debug!(name = %name, "skipping non-alert archive member");
                continue;
            }
            let alerts: Vec<Alert> = avro::read_container(GzDecoder::new(&mut entry))?;
            members.push((name, alerts));
        }
        Ok(members)
    }

    async fn flush_and_notify(&mut self, pending_ids: &mut Vec<i64>) -> StreamResult<()> {
        if self.config.dry_run {
            pending_ids.clear();
            return Ok(());
        }
        self.publisher.flush().await?;
        if !pending_ids.is_empty() {
            let ids = std::mem::take(pending_ids);
            self.tracker.notify(&ids).await?;
        }
        Ok(())
    }

    async fn pace(&self, seconds: f64) {
        if seconds > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn window_advances_by_compression_factor_per_day() {
        let t0 = utc(2022, 7, 6, 7);
        // Day zero
        assert_eq!(
            night_window(t0, t0, 10, 60274, 61378),
            Some((60274, 60283))
        );
        // Three days in
        assert_eq!(
            night_window(utc(2022, 7, 9, 7), t0, 10, 60274, 61378),
            Some((60304, 60313))
        );
        // Partial day does not advance the window
        assert_eq!(
            night_window(utc(2022, 7, 9, 23), t0, 10, 60274, 61378),
            Some((60304, 60313))
        );
    }

    #[test]
    fn window_clamps_at_the_end_of_the_simulation() {
        let t0 = utc(2022, 7, 6, 7);
        // 110 days * 10 nights/day puts the raw window at [61374, 61383]
        let now = t0 + chrono::Duration::days(110);
        assert_eq!(
            night_window(now, t0, 10, 60274, 61378),
            Some((61374, 61378))
        );
    }

    #[test]
    fn window_outside_the_range_is_none() {
        let t0 = utc(2022, 7, 6, 7);
        let now = t0 + chrono::Duration::days(200);
        assert_eq!(night_window(now, t0, 10, 60274, 61378), None);
    }

    #[test]
    fn alert_names_parse_and_reject() {
        let parsed = parse_alert_name("alert_mjd60001.00_obj3042_src9981.avro.gz").unwrap();
        assert_eq!(
            parsed,
            ParsedAlertName {
                mjd: "60001.00".to_string(),
                object_id: 3042,
                source_id: 9981,
            }
        );
        // Paths inside the tar keep their directory component
        assert!(parse_alert_name("NITE100/alert_mjd60001.00_obj1_src2.avro.gz").is_some());
        assert!(parse_alert_name("alert_mjd60001.00_obj1_src2.avro").is_none());
        assert!(parse_alert_name("README.txt").is_none());
        assert!(parse_alert_name("alert_mjd_obj1_src2.avro.gz").is_none());
    }

    #[test]
    fn filename_sort_equals_mjd_sort_for_fixed_width_tokens() {
        let mut names = vec![
            "alert_mjd60002.32_obj5_src9.avro.gz".to_string(),
            "alert_mjd60001.07_obj2_src4.avro.gz".to_string(),
            "alert_mjd60001.07_obj2_src3.avro.gz".to_string(),
            "alert_mjd60010.99_obj1_src1.avro.gz".to_string(),
        ];
        names.sort();
        let mjds: Vec<f64> = names
            .iter()
            .map(|n| parse_alert_name(n).unwrap().mjd.parse().unwrap())
            .collect();
        let mut sorted = mjds.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(mjds, sorted);
    }
}
