//! Carbon pickle framing.
//!
//! Wire format of one message:
//!
//! ```text
//! +----------------------+--------------------------------------------+
//! | u32 big-endian len   | pickle (protocol 2) of                     |
//! |                      | [(name, (timestamp, value)), ...]          |
//! +----------------------+--------------------------------------------+
//! ```
//!
//! See the "pickle protocol" section of the Carbon feeding docs.

use serde_pickle::SerOptions;

use crate::{
    error::EncodeError,
    schema::{MetricValue, PointBatch},
};

/// Size of the big-endian length prefix.
pub const HEADER_LEN: usize = 4;

/// Serializes a batch and prepends the length header.
pub fn encode(batch: &PointBatch) -> Result<Vec<u8>, EncodeError> {
    let tuples: Vec<(&str, (i64, MetricValue))> = batch
        .points
        .iter()
        .map(|p| (p.name.as_str(), (p.timestamp, p.value)))
        .collect();

    let payload = serde_pickle::to_vec(&tuples, SerOptions::new().proto_v2())?;
    frame(payload)
}

fn frame(payload: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
    let len = u32::try_from(payload.len()).map_err(|_| EncodeError::TooLarge(payload.len()))?;

    let mut message = Vec::with_capacity(HEADER_LEN + payload.len());
    message.extend_from_slice(&len.to_be_bytes());
    message.extend_from_slice(&payload);
    Ok(message)
}
