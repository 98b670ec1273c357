//! Segment snapshot format.
//!
//! Each sensor segment holds the latest reading of its sensor as one count
//! byte followed by that many Typed Fields. A zeroed segment (count 0) means
//! the sensor has not published yet. The control segment holds count `1` and
//! a single float: the current tick period in microseconds.

use crate::archive::{ArchiveError, ArchiveReader, ArchiveWriter};
use crate::record::SensorRecord;
use crate::sensor::SensorKind;

/// Encode `record` as a segment snapshot no larger than `limit` bytes.
pub fn encode_record(record: &SensorRecord, limit: usize) -> Result<Vec<u8>, ArchiveError> {
    let count = u8::try_from(record.value_count()).map_err(|_| ArchiveError::FieldCount {
        expected: u8::MAX as usize,
        found: record.value_count(),
    })?;
    let mut w = ArchiveWriter::with_limit(limit);
    w.put_raw_u8(count)?;
    record.encode_values(&mut w)?;
    Ok(w.into_bytes())
}

/// Decode the snapshot held in a segment of `kind`.
///
/// Returns `Ok(None)` while the segment is still empty or for kinds without a
/// record. Trailing bytes after the declared values are ignored; they are
/// leftovers of a longer earlier snapshot.
pub fn decode_record(kind: SensorKind, bytes: &[u8]) -> Result<Option<SensorRecord>, ArchiveError> {
    let mut r = ArchiveReader::new(bytes);
    let count = r.get_raw_u8()? as usize;
    if count == 0 {
        return Ok(None);
    }
    SensorRecord::decode_values(kind, &mut r, count).transpose()
}

/// Encode the control segment payload.
pub fn encode_period(period_us: f32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(6);
    bytes.push(1);
    bytes.push(crate::archive::TypeTag::Float as u8);
    bytes.extend_from_slice(&period_us.to_le_bytes());
    bytes
}

/// Decode the control segment payload. Returns `Ok(None)` before the first publish.
pub fn decode_period(bytes: &[u8]) -> Result<Option<f32>, ArchiveError> {
    let mut r = ArchiveReader::new(bytes);
    match r.get_raw_u8()? {
        0 => Ok(None),
        1 => Ok(Some(r.get::<f32>()?)),
        found => Err(ArchiveError::FieldCount { expected: 1, found: found as usize }),
    }
}
