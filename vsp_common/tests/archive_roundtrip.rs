//! Property tests for the Archive Codec and Record Blocks.

use proptest::prelude::*;
use vsp_common::archive::{ArchiveError, ArchiveReader, ArchiveWriter, Decode, Encode, TimeValue};
use vsp_common::datum::{Datum, encode_frame};
use vsp_common::record::{
    GpsRecord, RtcRecord, SensorRecord, TemperatureRecord, ThroughputRecord, WlanNetwork,
    WlanRecord,
};

fn single_field<T: Encode + Decode>(value: &T) -> (T, usize) {
    let mut w = ArchiveWriter::new();
    w.put(value).expect("encode");
    let bytes = w.into_bytes();
    let mut r = ArchiveReader::new(&bytes);
    let back = r.get::<T>().expect("decode");
    (back, r.remaining())
}

proptest! {
    #[test]
    fn bool_roundtrip(v in any::<bool>()) {
        prop_assert_eq!(single_field(&v), (v, 0));
    }

    #[test]
    fn short_roundtrip(v in any::<i16>()) {
        prop_assert_eq!(single_field(&v), (v, 0));
    }

    #[test]
    fn int_roundtrip(v in any::<i32>()) {
        prop_assert_eq!(single_field(&v), (v, 0));
    }

    #[test]
    fn long_roundtrip(v in any::<i64>()) {
        prop_assert_eq!(single_field(&v), (v, 0));
    }

    #[test]
    fn char_roundtrip(v in any::<u8>()) {
        prop_assert_eq!(single_field(&v), (v, 0));
    }

    #[test]
    fn time_roundtrip(v in any::<i64>()) {
        prop_assert_eq!(single_field(&TimeValue(v)), (TimeValue(v), 0));
    }

    #[test]
    fn float_roundtrip_is_bit_exact(v in any::<f32>()) {
        let (back, rest) = single_field(&v);
        prop_assert_eq!(back.to_bits(), v.to_bits());
        prop_assert_eq!(rest, 0);
    }

    #[test]
    fn string_roundtrip(v in ".{0,64}") {
        prop_assert_eq!(single_field(&v), (v.clone(), 0));
    }

    #[test]
    fn buffer_roundtrip(v in proptest::collection::vec(any::<u8>(), 0..128)) {
        prop_assert_eq!(single_field(&v), (v.clone(), 0));
    }

    /// Any strict prefix of a string field fails cleanly instead of reading out of bounds.
    #[test]
    fn truncated_string_never_panics(v in ".{1,32}", cut in 0usize..100) {
        let mut w = ArchiveWriter::new();
        w.put(&v).expect("encode");
        let bytes = w.into_bytes();
        let cut = cut % bytes.len();
        let mut r = ArchiveReader::new(&bytes[..cut]);
        let err = r.get::<String>().unwrap_err();
        prop_assert!(matches!(err, ArchiveError::TruncatedFrame { .. }), "expected TruncatedFrame, got {:?}", err);
    }

    /// Arbitrary bytes never panic the frame decoder.
    #[test]
    fn frame_decoder_total_on_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let decoded = Datum::decode(&bytes, chrono::Utc::now());
        prop_assert!(decoded.blocks <= bytes.len());
    }

    #[test]
    fn frame_roundtrip(
        transfer in -1e6f32..1e6,
        bandwidth in 0f32..1e4,
        ambient in -40f32..85.0,
        fan in 0i32..=100,
        epoch in 0i64..4_000_000_000,
        lat in "-?[0-9]{1,2}\\.[0-9]{1,6}",
        names in proptest::collection::vec("[a-z]{0,12}", 0..4),
    ) {
        let networks: Vec<WlanNetwork> = names
            .iter()
            .enumerate()
            .map(|(i, name)| WlanNetwork {
                bssid: format!("00:00:00:00:00:{i:02x}"),
                name: name.clone(),
                ..Default::default()
            })
            .collect();
        let records = vec![
            SensorRecord::Throughput(ThroughputRecord { transfer, bandwidth }),
            SensorRecord::Gps(GpsRecord { latitude: lat.clone(), ..Default::default() }),
            SensorRecord::Temperature(TemperatureRecord { ambient, fan_duty: fan }),
            SensorRecord::Rtc(RtcRecord { status: true, epoch: TimeValue(epoch) }),
            SensorRecord::Wlan(WlanRecord { networks: networks.clone() }),
        ];
        let frame = encode_frame(&records, 4096).expect("encode frame");
        let decoded = Datum::decode(&frame, chrono::Utc::now());

        prop_assert!(decoded.error.is_none());
        prop_assert_eq!(decoded.blocks, 5);
        let d = decoded.datum;
        prop_assert_eq!(d.throughput, Some(ThroughputRecord { transfer, bandwidth }));
        prop_assert_eq!(d.gps.map(|g| g.latitude), Some(lat));
        prop_assert_eq!(d.rtc.map(|r| r.epoch), Some(TimeValue(epoch)));
        prop_assert_eq!(d.networks.len(), networks.len());
    }
}
