// ============================================================================
// Alert & Broker-Message Records
// ============================================================================
//
// Typed records matching the ELAsTiCC Avro schemas (schema/*.avsc).  Records
// are validated against the loaded schema at decode time; payloads that do
// not fit these shapes are rejected at the boundary instead of flowing
// through the pipeline as loose maps.

use serde::{Deserialize, Serialize};

/// One source detection within an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaSource {
    pub dia_source_id: i64,
    pub dia_object_id: Option<i64>,
    /// Exposure midpoint, Modified Julian Date (TAI)
    pub mid_point_tai: f64,
    pub filter_name: String,
    pub ra: f64,
    pub decl: f64,
    pub ps_flux: f32,
    pub ps_flux_err: f32,
    pub snr: f32,
}

/// The long-lived object an alert's source was associated with, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaObject {
    pub dia_object_id: i64,
    pub ra: f64,
    pub decl: f64,
    pub mwebv: Option<f32>,
    #[serde(rename = "z_final")]
    pub z_final: Option<f32>,
}

/// One schema-typed alert describing a single detected transient-source
/// observation.  Identified externally by `alertId` and
/// `diaSource.diaSourceId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub alert_id: i64,
    pub dia_source: DiaSource,
    pub dia_object: Option<DiaObject>,
}

/// One (class, probability) entry of a broker classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub class_id: i32,
    pub probability: f32,
}

/// Message a broker publishes after classifying one alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerClassification {
    pub alert_id: i64,
    pub dia_source_id: i64,
    /// When the alert was published to the alert stream (ms since epoch)
    pub elasticc_publish_timestamp: i64,
    /// When the broker ingested the alert (ms since epoch)
    pub broker_ingest_timestamp: i64,
    pub broker_name: String,
    pub broker_version: String,
    pub classifier_name: String,
    pub classifier_params: String,
    pub classifications: Vec<Classification>,
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// An alert with plausible values for tests.
    pub fn alert(alert_id: i64, source_id: i64, mjd: f64) -> Alert {
        Alert {
            alert_id,
            dia_source: DiaSource {
                dia_source_id: source_id,
                dia_object_id: Some(source_id / 10),
                mid_point_tai: mjd,
                filter_name: "r".to_string(),
                ra: 214.93,
                decl: -32.11,
                ps_flux: 1432.5,
                ps_flux_err: 55.2,
                snr: 25.9,
            },
            dia_object: None,
        }
    }
}
