// ============================================================================
// Nightly Streamer Integration Tests
// ============================================================================
//
// Drives the streamer against fixture night archives on disk, with a
// recording publisher and tracker standing in for Kafka and the TOM.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use apache_avro::Schema;
use async_trait::async_trait;
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;

use elasticc_config::StreamerConfig;
use elasticc_shared::alert::{Alert, DiaSource};
use elasticc_shared::avro;
use elasticc_shared::journal::NightJournal;
use elasticc_shared::kafka::AlertPublisher;
use elasticc_shared::streamer::NightlyAlertStreamer;
use elasticc_shared::tom::AlertTracker;
use elasticc_shared::StreamResult;

const ALERT_SCHEMA: &str = include_str!("../../schema/elasticc.v0_9_1.alert.avsc");

fn alert(alert_id: i64, source_id: i64, mjd: f64) -> Alert {
    Alert {
        alert_id,
        dia_source: DiaSource {
            dia_source_id: source_id,
            dia_object_id: Some(source_id / 10),
            mid_point_tai: mjd,
            filter_name: "g".to_string(),
            ra: 151.25,
            decl: 2.18,
            ps_flux: 980.4,
            ps_flux_err: 31.7,
            snr: 30.9,
        },
        dia_object: None,
    }
}

/// Shared counters behind the publisher/tracker test doubles.
#[derive(Clone, Default)]
struct Recording {
    published: Arc<Mutex<Vec<Vec<u8>>>>,
    flushes: Arc<Mutex<u32>>,
    notifies: Arc<Mutex<Vec<Vec<i64>>>>,
}

struct RecordingPublisher(Recording);

#[async_trait]
impl AlertPublisher for RecordingPublisher {
    async fn publish(&mut self, _topic: &str, payload: Vec<u8>) -> StreamResult<()> {
        self.0.published.lock().unwrap().push(payload);
        Ok(())
    }

    async fn flush(&mut self) -> StreamResult<()> {
        *self.0.flushes.lock().unwrap() += 1;
        Ok(())
    }
}

struct RecordingTracker(Recording);

#[async_trait]
impl AlertTracker for RecordingTracker {
    async fn notify(&mut self, ids: &[i64]) -> StreamResult<()> {
        self.0.notifies.lock().unwrap().push(ids.to_vec());
        Ok(())
    }
}

/// Write a NITE<night>.tar.gz archive with the given (member name, alerts)
/// pairs, each member a gzipped Avro container file.
fn write_archive(dir: &Path, night: i64, members: &[(&str, Vec<Alert>)]) {
    let schema = Schema::parse_str(ALERT_SCHEMA).unwrap();
    let tar_gz = File::create(dir.join(format!("NITE{night}.tar.gz"))).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(tar_gz, Compression::default()));
    for (name, alerts) in members {
        let mut writer = apache_avro::Writer::new(&schema, Vec::new());
        for a in alerts {
            writer.append_ser(a).unwrap();
        }
        let avro_bytes = writer.into_inner().unwrap();

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&avro_bytes).unwrap();
        let member_bytes = gz.finish().unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_size(member_bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, &member_bytes[..]).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn config(alert_dirs: Vec<PathBuf>, journal_file: PathBuf, dry_run: bool) -> StreamerConfig {
    StreamerConfig {
        alert_dirs,
        schema_file: PathBuf::new(), // schema is passed in parsed
        journal_file,
        compression_factor: 1,
        campaign_start: Utc::now(),
        first_night: 100,
        last_night: 100,
        alert_delay_secs: 0.0,
        exposure_delay_secs: 0.0,
        night_delay_secs: 0.0,
        dry_run,
    }
}

fn streamer(cfg: StreamerConfig, recording: &Recording) -> NightlyAlertStreamer {
    let schema = Schema::parse_str(ALERT_SCHEMA).unwrap();
    let journal = NightJournal::load(&cfg.journal_file).unwrap();
    NightlyAlertStreamer::new(
        cfg,
        "elasticc-test".to_string(),
        schema,
        journal,
        Box::new(RecordingPublisher(recording.clone())),
        Box::new(RecordingTracker(recording.clone())),
    )
}

/// One exposure holding src1+src2, a second exposure holding src3.
fn spec_fixture(dir: &Path) {
    write_archive(
        dir,
        100,
        &[
            (
                "alert_mjd60001.00_obj1_src1.avro.gz",
                vec![alert(1001, 1, 60001.0)],
            ),
            (
                "alert_mjd60001.00_obj1_src2.avro.gz",
                vec![alert(1002, 2, 60001.0)],
            ),
            (
                "alert_mjd60002.00_obj2_src3.avro.gz",
                vec![alert(1003, 3, 60002.0)],
            ),
        ],
    );
}

#[tokio::test]
async fn exposure_boundaries_partition_the_notified_ids() {
    let dir = tempfile::tempdir().unwrap();
    spec_fixture(dir.path());

    let recording = Recording::default();
    let cfg = config(
        vec![dir.path().to_path_buf()],
        dir.path().join("nightsdone.lis"),
        false,
    );
    let totals = streamer(cfg, &recording)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(totals.nights_streamed, 1);
    assert_eq!(totals.alerts_streamed, 3);

    // No id duplicated or dropped across boundaries: one notification per
    // completed exposure, one at end of night.
    let notifies = recording.notifies.lock().unwrap().clone();
    assert_eq!(notifies, vec![vec![1001, 1002], vec![1003]]);
    assert!(*recording.flushes.lock().unwrap() >= 2);

    // The wire payloads are schemaless datums of the original records.
    let published = recording.published.lock().unwrap().clone();
    assert_eq!(published.len(), 3);
    let schema = Schema::parse_str(ALERT_SCHEMA).unwrap();
    let first: Alert = avro::decode_datum(&schema, &published[0]).unwrap();
    assert_eq!(first.alert_id, 1001);
    let last: Alert = avro::decode_datum(&schema, &published[2]).unwrap();
    assert_eq!(last.dia_source.dia_source_id, 3);
}

#[tokio::test]
async fn journaled_nights_are_never_restreamed() {
    let dir = tempfile::tempdir().unwrap();
    spec_fixture(dir.path());
    let journal_file = dir.path().join("nightsdone.lis");

    let first = Recording::default();
    let cfg = config(vec![dir.path().to_path_buf()], journal_file.clone(), false);
    streamer(cfg.clone(), &first)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.published.lock().unwrap().len(), 3);

    // Fresh streamer, same journal: night 100 must be skipped.
    let second = Recording::default();
    let totals = streamer(cfg, &second)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(totals.nights_streamed, 0);
    assert_eq!(totals.alerts_streamed, 0);
    assert!(second.published.lock().unwrap().is_empty());
    assert!(second.notifies.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_decodes_everything_but_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    spec_fixture(dir.path());

    let recording = Recording::default();
    let cfg = config(
        vec![dir.path().to_path_buf()],
        dir.path().join("nightsdone.lis"),
        true,
    );
    let totals = streamer(cfg, &recording)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap()
        .unwrap();

    // Same decode path and totals as a live run...
    assert_eq!(totals.nights_streamed, 1);
    assert_eq!(totals.alerts_streamed, 3);
    // ...but nothing reaches the publish/notify boundary.
    assert!(recording.published.lock().unwrap().is_empty());
    assert_eq!(*recording.flushes.lock().unwrap(), 0);
    assert!(recording.notifies.lock().unwrap().is_empty());
    // And the night is not journaled, so a real run will still stream it.
    assert!(!dir.path().join("nightsdone.lis").exists());
}

#[tokio::test]
async fn missing_archive_in_one_directory_is_tolerated() {
    let with_archive = tempfile::tempdir().unwrap();
    let without_archive = tempfile::tempdir().unwrap();
    spec_fixture(with_archive.path());

    let recording = Recording::default();
    let cfg = config(
        vec![
            without_archive.path().to_path_buf(),
            with_archive.path().to_path_buf(),
        ],
        with_archive.path().join("nightsdone.lis"),
        false,
    );
    let totals = streamer(cfg, &recording)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap()
        .unwrap();

    // Streaming proceeds with whatever archives are found.
    assert_eq!(totals.nights_streamed, 1);
    assert_eq!(totals.alerts_streamed, 3);
}

#[tokio::test]
async fn alerts_merge_across_directories_in_mjd_order() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    // Later exposure lives in the first-listed directory.
    write_archive(
        dir_a.path(),
        100,
        &[(
            "alert_mjd60005.00_obj7_src7.avro.gz",
            vec![alert(7007, 7, 60005.0)],
        )],
    );
    write_archive(
        dir_b.path(),
        100,
        &[(
            "alert_mjd60001.00_obj6_src6.avro.gz",
            vec![alert(6006, 6, 60001.0)],
        )],
    );

    let recording = Recording::default();
    let cfg = config(
        vec![dir_a.path().to_path_buf(), dir_b.path().to_path_buf()],
        dir_a.path().join("nightsdone.lis"),
        false,
    );
    streamer(cfg, &recording)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap()
        .unwrap();

    let notifies = recording.notifies.lock().unwrap().clone();
    assert_eq!(notifies, vec![vec![6006], vec![7007]]);
}

#[tokio::test]
async fn out_of_range_window_aborts_without_error() {
    let dir = tempfile::tempdir().unwrap();
    let recording = Recording::default();
    let mut cfg = config(
        vec![dir.path().to_path_buf()],
        dir.path().join("nightsdone.lis"),
        false,
    );
    // Whole campaign already streamed: "today" is far past the last night.
    cfg.campaign_start = Utc::now() - chrono::Duration::days(365);
    let outcome = streamer(cfg, &recording)
        .stream_todays_batch(Utc::now())
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(recording.published.lock().unwrap().is_empty());
}
