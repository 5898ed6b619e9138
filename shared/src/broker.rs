// ============================================================================
// Fake Broker
// ============================================================================
//
// Pretends to be an ELAsTiCC broker: consumes alerts, attaches mock
// classifications, and republishes broker-classification messages.  Useful
// for exercising downstream ingestion without a real classifier.

use apache_avro::Schema;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::alert::{Alert, BrokerClassification, Classification};
use crate::avro;
use crate::error::StreamResult;
use crate::kafka::poll::BatchHandler;
use crate::kafka::{AlertPublisher, RawMessage};

use async_trait::async_trait;

/// Identity fields stamped onto every message a classifier produces.
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    pub broker_name: String,
    pub broker_version: String,
    pub classifier_name: String,
    pub classifier_params: String,
}

impl ClassifierInfo {
    fn new(classifier_name: &str, classifier_params: &str) -> Self {
        Self {
            broker_name: "FakeBroker".to_string(),
            broker_version: "v1.0".to_string(),
            classifier_name: classifier_name.to_string(),
            classifier_params: classifier_params.to_string(),
        }
    }
}

/// Given an alert, produce (classId, probability) pairs.
pub trait Classify: Send {
    fn info(&self) -> &ClassifierInfo;
    fn determine(&mut self, alert: &Alert) -> Vec<Classification>;
}

/// Everything is a SNIa.
pub struct NugentClassifier {
    info: ClassifierInfo,
}

impl NugentClassifier {
    pub fn new() -> Self {
        Self {
            info: ClassifierInfo::new("NugentClassifier", "100%"),
        }
    }
}

impl Default for NugentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classify for NugentClassifier {
    fn info(&self) -> &ClassifierInfo {
        &self.info
    }

    fn determine(&mut self, _alert: &Alert) -> Vec<Classification> {
        vec![Classification {
            class_id: 111,
            probability: 1.0,
        }]
    }
}

/// Random probabilities over the SN classes, remainder to SLSN.
pub struct RandomSnType {
    info: ClassifierInfo,
    rng: StdRng,
}

const SN_CLASS_IDS: [i32; 6] = [111, 112, 113, 114, 115, 135];
const SLSN_CLASS_ID: i32 = 131;

impl RandomSnType {
    pub fn new() -> Self {
        Self {
            info: ClassifierInfo::new("RandomSNType", "Perfect"),
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomSnType {
    fn default() -> Self {
        Self::new()
    }
}

impl Classify for RandomSnType {
    fn info(&self) -> &ClassifierInfo {
        &self.info
    }

    fn determine(&mut self, _alert: &Alert) -> Vec<Classification> {
        let mut total = 0.0f32;
        let mut classifications = Vec::with_capacity(SN_CLASS_IDS.len() + 1);
        for class_id in SN_CLASS_IDS {
            let probability = self.rng.gen::<f32>() * (1.0 - total);
            total += probability;
            classifications.push(Classification {
                class_id,
                probability,
            });
        }
        classifications.push(Classification {
            class_id: SLSN_CLASS_ID,
            probability: 1.0 - total,
        });
        classifications
    }
}

/// Batch handler wiring classifiers between the inbound alert stream and the
/// outbound broker-message topic.
pub struct FakeBroker {
    alert_schema: Schema,
    message_schema: Schema,
    classifiers: Vec<Box<dyn Classify>>,
    publisher: Box<dyn AlertPublisher>,
    topic: String,
    classified: u64,
    log_every: u64,
    next_log: u64,
}

impl FakeBroker {
    pub fn new(
        alert_schema: Schema,
        message_schema: Schema,
        classifiers: Vec<Box<dyn Classify>>,
        publisher: Box<dyn AlertPublisher>,
        topic: String,
    ) -> Self {
        Self {
            alert_schema,
            message_schema,
            classifiers,
            publisher,
            topic,
            classified: 0,
            log_every: 10,
            next_log: 10,
        }
    }

    pub fn classified(&self) -> u64 {
        self.classified
    }
}

#[async_trait]
impl BatchHandler for FakeBroker {
    async fn handle(&mut self, batch: Vec<RawMessage>) -> StreamResult<()> {
        for msg in &batch {
            let alert: Alert = avro::decode_datum(&self.alert_schema, &msg.payload)?;
            for classifier in &mut self.classifiers {
                let classifications = classifier.determine(&alert);
                let info = classifier.info();
                let broker_msg = BrokerClassification {
                    alert_id: alert.alert_id,
                    dia_source_id: alert.dia_source.dia_source_id,
                    elasticc_publish_timestamp: msg.timestamp.unwrap_or(0),
                    broker_ingest_timestamp: Utc::now().timestamp_millis(),
                    broker_name: info.broker_name.clone(),
                    broker_version: info.broker_version.clone(),
                    classifier_name: info.classifier_name.clone(),
                    classifier_params: info.classifier_params.clone(),
                    classifications,
                };
                let payload = avro::encode_datum(&self.message_schema, &broker_msg)?;
                self.publisher.publish(&self.topic, payload).await?;
            }
        }
        self.publisher.flush().await?;

        self.classified += batch.len() as u64;
        if self.classified > self.next_log {
            info!(classified = self.classified, "fake broker progress");
            self.next_log = self.log_every * (self.classified / self.log_every + 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::testutil;
    use crate::error::StreamResult;
    use std::sync::{Arc, Mutex};

    const ALERT_SCHEMA: &str = include_str!("../../schema/elasticc.v0_9_1.alert.avsc");
    const MESSAGE_SCHEMA: &str =
        include_str!("../../schema/elasticc.v0_9_1.brokerClassification.avsc");

    #[derive(Clone, Default)]
    struct CapturingPublisher {
        payloads: Arc<Mutex<Vec<Vec<u8>>>>,
        flushes: Arc<Mutex<u32>>,
    }

    #[async_trait]
    impl AlertPublisher for CapturingPublisher {
        async fn publish(&mut self, _topic: &str, payload: Vec<u8>) -> StreamResult<()> {
            self.payloads.lock().unwrap().push(payload);
            Ok(())
        }

        async fn flush(&mut self) -> StreamResult<()> {
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_broker_message_per_classifier_per_alert() {
        let alert_schema = Schema::parse_str(ALERT_SCHEMA).unwrap();
        let message_schema = Schema::parse_str(MESSAGE_SCHEMA).unwrap();
        let publisher = CapturingPublisher::default();

        let mut broker = FakeBroker::new(
            alert_schema.clone(),
            message_schema.clone(),
            vec![
                Box::new(NugentClassifier::new()),
                Box::new(RandomSnType::new()),
            ],
            Box::new(publisher.clone()),
            "broker-messages".to_string(),
        );

        let alert = testutil::alert(9001, 42, 60012.5);
        let payload = avro::encode_datum(&alert_schema, &alert).unwrap();
        let batch = vec![
            RawMessage {
                topic: "alerts".to_string(),
                partition: 0,
                offset: 17,
                key: None,
                payload,
                timestamp: Some(1_700_000_000_000),
            };
            2
        ];
        broker.handle(batch).await.unwrap();

        assert_eq!(broker.classified(), 2);
        // 2 alerts x 2 classifiers, flushed once per batch.
        let payloads = publisher.payloads.lock().unwrap().clone();
        assert_eq!(payloads.len(), 4);
        assert_eq!(*publisher.flushes.lock().unwrap(), 1);

        let first: BrokerClassification =
            avro::decode_datum(&message_schema, &payloads[0]).unwrap();
        assert_eq!(first.alert_id, 9001);
        assert_eq!(first.dia_source_id, 42);
        assert_eq!(first.elasticc_publish_timestamp, 1_700_000_000_000);
        assert_eq!(first.broker_name, "FakeBroker");
        assert_eq!(first.classifier_name, "NugentClassifier");
        assert_eq!(first.classifications.len(), 1);
    }

    #[test]
    fn nugent_is_always_certain_of_snia() {
        let mut classifier = NugentClassifier::new();
        let alert = testutil::alert(1, 2, 60001.0);
        assert_eq!(
            classifier.determine(&alert),
            vec![Classification {
                class_id: 111,
                probability: 1.0
            }]
        );
    }

    #[test]
    fn random_sn_type_probabilities_sum_to_one() {
        let mut classifier = RandomSnType::new();
        let alert = testutil::alert(1, 2, 60001.0);
        for _ in 0..20 {
            let classifications = classifier.determine(&alert);
            assert_eq!(classifications.len(), SN_CLASS_IDS.len() + 1);
            let total: f32 = classifications.iter().map(|c| c.probability).sum();
            assert!((total - 1.0).abs() < 1e-5, "probabilities sum to {total}");
            assert!(classifications.iter().all(|c| c.probability >= 0.0));
            assert_eq!(classifications.last().unwrap().class_id, SLSN_CLASS_ID);
        }
    }
}
