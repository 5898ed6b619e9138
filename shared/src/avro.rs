// ============================================================================
// Avro Schema Codec
// ============================================================================
//
// Wire payloads are schemaless (headerless) Avro datums; the schema is known
// to both ends out-of-band via the configured .avsc files.  Archive members
// are Avro object-container files and carry their own embedded schema.

use std::io::Read;
use std::path::Path;

use apache_avro::types::Value;
use apache_avro::{from_avro_datum, from_value, to_avro_datum, to_value, Reader, Schema};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StreamError, StreamResult};

/// Load and parse an Avro schema definition file.
pub fn load_schema(path: &Path) -> StreamResult<Schema> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| StreamError::Schema(format!("reading {}: {e}", path.display())))?;
    Schema::parse_str(&raw)
        .map_err(|e| StreamError::Schema(format!("parsing {}: {e}", path.display())))
}

/// Deserialize one schemaless Avro datum into a typed record.
pub fn decode_datum<T: DeserializeOwned>(schema: &Schema, mut bytes: &[u8]) -> StreamResult<T> {
    let value = from_avro_datum(schema, &mut bytes, None)
        .map_err(|e| StreamError::Decode(e.to_string()))?;
    from_value::<T>(&value).map_err(|e| StreamError::Decode(e.to_string()))
}

/// Serialize a typed record as a schemaless Avro datum (no framing/header).
pub fn encode_datum<T: Serialize>(schema: &Schema, record: &T) -> StreamResult<Vec<u8>> {
    let value = to_value(record).map_err(|e| StreamError::Encode(e.to_string()))?;
    to_avro_datum(schema, value).map_err(|e| StreamError::Encode(e.to_string()))
}

/// Read every record of an Avro object-container stream (the format of the
/// per-alert files inside the nightly archives).
pub fn read_container<T: DeserializeOwned, R: Read>(reader: R) -> StreamResult<Vec<T>> {
    let avro_reader = Reader::new(reader).map_err(|e| StreamError::Decode(e.to_string()))?;
    let mut records = Vec::new();
    for value in avro_reader {
        let value: Value = value.map_err(|e| StreamError::Decode(e.to_string()))?;
        records.push(from_value::<T>(&value).map_err(|e| StreamError::Decode(e.to_string()))?);
    }
    Ok(records)
}
