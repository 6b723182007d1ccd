//! Protobuf payload serialization
//!
//! Payloads inside a frame are protobuf messages. Unknown fields are skipped
//! on decode, so clients built against a newer schema keep working.

use crate::error::Result;
use crate::protocol::frame;
use crate::protocol::messages::{ActuatorRequests, SensorMeasurements};
use prost::Message as ProstMessage;

/// Decode one client frame
pub fn decode_requests(payload: &[u8]) -> Result<ActuatorRequests> {
    Ok(ActuatorRequests::decode(payload)?)
}

/// Serialize a batch into a ready-to-send frame (length prefix included)
pub fn encode_measurements_frame(batch: &SensorMeasurements) -> Result<Vec<u8>> {
    let len = batch.encoded_len();
    let mut out = Vec::with_capacity(frame::HEADER_LEN + len);
    frame::write_header(len, &mut out);
    batch.encode(&mut out)?;
    Ok(out)
}

/// Payload size of a batch without serializing it
pub fn measurements_len(batch: &SensorMeasurements) -> usize {
    batch.encoded_len()
}
