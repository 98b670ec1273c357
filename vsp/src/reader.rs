//! Record Readers.
//!
//! One reader per recorded sensor kind. Each attaches to its sensor's segment,
//! refreshes its decoded record once per tick and hands it to the frame
//! composer.

use tracing::{debug, warn};
use vsp_common::prelude::{ArchiveError, ArchiveWriter, SensorKind, SensorRecord};
use vsp_common::snapshot::decode_record;
use vsp_ipc::{Segment, SegmentLayout, ShmResult};

/// Decodes the latest snapshot of one sensor segment.
#[derive(Debug)]
pub struct RecordReader {
    kind: SensorKind,
    segment: Segment,
    record: Option<SensorRecord>,
    decode_errors: u64,
}

impl RecordReader {
    /// Attach to the segment of `kind` in region `shm_name`.
    pub fn open(shm_name: &str, layout: SegmentLayout, kind: SensorKind) -> ShmResult<Self> {
        let segment = Segment::open(shm_name, layout, kind.segment_id())?;
        debug!("Record reader for {} attached to segment {}", kind, segment.id());
        Ok(Self {
            kind,
            segment,
            record: None,
            decode_errors: 0,
        })
    }

    /// Sensor kind this reader serves.
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Re-read the segment and return the fresh record, if any.
    ///
    /// A snapshot that fails to decode (sensor not written yet with a valid
    /// layout, or a torn read) clears the record for this tick.
    pub fn tick(&mut self) -> Option<&SensorRecord> {
        let snapshot = self.segment.snapshot();
        self.record = match decode_record(self.kind, &snapshot) {
            Ok(record) => record,
            Err(e) => {
                self.decode_errors += 1;
                // First failure and then every hundredth, a dead sensor would flood the log
                if self.decode_errors == 1 || self.decode_errors % 100 == 0 {
                    warn!(
                        "{} segment undecodable ({} times): {}",
                        self.kind, self.decode_errors, e
                    );
                }
                None
            }
        };
        self.record.as_ref()
    }

    /// Record decoded by the last [`tick`](Self::tick).
    pub fn record(&self) -> Option<&SensorRecord> {
        self.record.as_ref()
    }

    /// Whether the last tick produced no values.
    pub fn is_empty(&self) -> bool {
        self.record.is_none()
    }

    /// Append this reader's Record Block to `w`. Writes nothing when empty.
    pub fn encode_block(&self, w: &mut ArchiveWriter) -> Result<(), ArchiveError> {
        match &self.record {
            Some(record) => record.encode_block(w),
            None => Ok(()),
        }
    }

    /// Snapshots that failed to decode so far.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsp_common::prelude::{TemperatureRecord, ThroughputRecord};
    use vsp_common::snapshot::encode_record;
    use vsp_ipc::SegmentStore;

    fn store(tag: &str) -> SegmentStore {
        let name = format!("reader_{}_{}", tag, std::process::id());
        SegmentStore::create(&name, SegmentLayout::default()).unwrap()
    }

    #[test]
    fn test_empty_segment_yields_no_block() {
        let store = store("empty");
        let mut reader = RecordReader::open(store.name(), store.layout(), SensorKind::Gps).unwrap();
        assert!(reader.tick().is_none());

        let mut w = ArchiveWriter::new();
        reader.encode_block(&mut w).unwrap();
        assert!(w.is_empty());
    }

    #[test]
    fn test_tick_picks_up_latest_snapshot() {
        let store = store("latest");
        let mut seg = store.segment(SensorKind::Temperature.segment_id()).unwrap();
        let mut reader =
            RecordReader::open(store.name(), store.layout(), SensorKind::Temperature).unwrap();

        let first = SensorRecord::Temperature(TemperatureRecord {
            ambient: 21.5,
            fan_duty: 10,
        });
        seg.write(&encode_record(&first, seg.size()).unwrap()).unwrap();
        assert_eq!(reader.tick(), Some(&first));

        let second = SensorRecord::Temperature(TemperatureRecord {
            ambient: 40.0,
            fan_duty: 80,
        });
        seg.write(&encode_record(&second, seg.size()).unwrap()).unwrap();
        assert_eq!(reader.tick(), Some(&second));
    }

    #[test]
    fn test_garbage_snapshot_counts_error() {
        let store = store("garbage");
        let mut seg = store.segment(SensorKind::Throughput.segment_id()).unwrap();
        let mut reader =
            RecordReader::open(store.name(), store.layout(), SensorKind::Throughput).unwrap();

        // count 2 but an unknown tag follows
        seg.write(&[2, 0xEE, 0, 0]).unwrap();
        assert!(reader.tick().is_none());
        assert_eq!(reader.decode_errors(), 1);

        let good = SensorRecord::Throughput(ThroughputRecord {
            transfer: 1.0,
            bandwidth: 2.0,
        });
        seg.write(&encode_record(&good, seg.size()).unwrap()).unwrap();
        assert!(reader.tick().is_some());

        let mut w = ArchiveWriter::new();
        reader.encode_block(&mut w).unwrap();
        assert_eq!(w.as_bytes()[0], SensorKind::Throughput.as_u8());
    }
}
