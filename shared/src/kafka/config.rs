use rdkafka::config::ClientConfig;
use tracing::debug;

use elasticc_config::KafkaConfig;

/// Creates an `rdkafka::config::ClientConfig` from the application's
/// `KafkaConfig`, so consumers and producers are configured consistently.
pub fn create_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", &config.brokers);
    debug!(brokers = %config.brokers, "assembled base kafka client config");
    client_config
}
