// Streaming core for the ELAsTiCC alert pipeline.
//
// The modules here split along the pipeline's seams: `avro` turns bytes into
// typed records and back, `kafka` owns the broker-facing batching, `streamer`
// drives a night of archived alerts through publish/notify boundaries, and
// `tom` keeps the tracking service informed.

pub mod alert;
pub mod avro;
pub mod broker;
pub mod error;
pub mod journal;
pub mod kafka;
pub mod retry;
pub mod streamer;
pub mod tom;

pub use error::{StreamError, StreamResult};
