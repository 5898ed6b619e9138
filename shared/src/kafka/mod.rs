// Kafka integration for the alert pipeline.
//
// The consumer and publisher here only add batching, pacing, and offset
// reset on top of rdkafka; group coordination, rebalancing, and delivery
// semantics stay with the client library.

pub mod config;
pub mod consumer;
pub mod poll;
pub mod producer;

pub use config::create_client_config;
pub use consumer::{MessageConsumer, RawMessage};
pub use poll::{BatchHandler, MessageSource, PollLoop};
pub use producer::{AlertPublisher, BatchPublisher, NoopPublisher};
