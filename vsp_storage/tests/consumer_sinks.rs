//! Frames travelling through a real queue into each built-in sink.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tempfile::tempdir;
use vsp_common::consts::{CHANNEL_DATA, DATA_MSG_MAX};
use vsp_common::datum::encode_frame;
use vsp_common::prelude::*;
use vsp_ipc::QueueChannel;
use vsp_storage::{Poll, SinkKind, SinkRegistry, StorageConsumer};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_key() -> i32 {
    0x7655_0000
        | (((std::process::id() & 0xff) as i32) << 8)
        | (COUNTER.fetch_add(1, Ordering::Relaxed) & 0xff) as i32
}

fn records(lat: &str) -> Vec<SensorRecord> {
    vec![
        SensorRecord::Throughput(ThroughputRecord {
            transfer: 3.5,
            bandwidth: 28.0,
        }),
        SensorRecord::Gps(GpsRecord {
            latitude: lat.into(),
            longitude: "-0.1276".into(),
            speed: "30".into(),
            elevation: "11".into(),
            heading: "45".into(),
        }),
        SensorRecord::Wlan(WlanRecord {
            networks: vec![WlanNetwork {
                bssid: "00:11:22:33:44:55".into(),
                data_rate: "54".into(),
                signal_power: "-60".into(),
                channel: "6".into(),
                name: "depot & yard".into(),
            }],
        }),
    ]
}

fn consumer_for(kind: SinkKind, path: &std::path::Path) -> (StorageConsumer, QueueChannel) {
    let key = unique_key();
    let tx = QueueChannel::create(key, CHANNEL_DATA, DATA_MSG_MAX).unwrap();
    let rx = QueueChannel::open(key, CHANNEL_DATA, DATA_MSG_MAX).unwrap();
    let mut sink = SinkRegistry::with_builtin().create(kind).unwrap();
    sink.initialize(path).unwrap();
    sink.open().unwrap();
    (
        StorageConsumer::new(rx, sink, Duration::from_millis(1)),
        tx,
    )
}

fn drain(consumer: &mut StorageConsumer) {
    while consumer.poll_once() == Poll::Message {}
}

#[test]
fn binary_sink_concatenates_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frames.bin");
    let (mut consumer, mut tx) = consumer_for(SinkKind::Binary, &path);

    let a = encode_frame(&records("51.5"), DATA_MSG_MAX).unwrap();
    let b = encode_frame(&records("51.6"), DATA_MSG_MAX).unwrap();
    tx.send(&a).unwrap();
    tx.send(&b).unwrap();
    drain(&mut consumer);
    consumer.finish().unwrap();

    let stored = std::fs::read(&path).unwrap();
    assert_eq!(stored, [a, b].concat());
}

#[test]
fn text_sink_renders_each_datum() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    let (mut consumer, mut tx) = consumer_for(SinkKind::Text, &path);

    tx.send(&encode_frame(&records("51.5"), DATA_MSG_MAX).unwrap()).unwrap();
    // Garbage discriminator: decoded prefix is empty, nothing stored
    tx.send(&[0x99, 1, 2]).unwrap();
    drain(&mut consumer);

    let stats = consumer.stats();
    assert_eq!(stats.messages, 2);
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.decode_failures, 1);
    consumer.finish().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("throughput: transfer=3.50 MB bandwidth=28.00 Mbit/s"));
    assert!(text.contains("gps: lat=51.5 lon=-0.1276"));
    assert!(text.contains("wlan 00:11:22:33:44:55: name=\"depot & yard\""));
}

#[test]
fn kml_sink_writes_track_on_finish() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("track.kml");
    let (mut consumer, mut tx) = consumer_for(SinkKind::Kml, &path);

    for lat in ["51.50", "51.51", "51.52"] {
        tx.send(&encode_frame(&records(lat), DATA_MSG_MAX).unwrap()).unwrap();
    }
    drain(&mut consumer);
    assert!(!path.exists());
    consumer.finish().unwrap();

    let doc = std::fs::read_to_string(&path).unwrap();
    assert_eq!(doc.matches("<Placemark>").count(), 3);
    assert!(doc.contains("<coordinates>-0.1276,51.52,11</coordinates>"));
    assert!(doc.contains("depot &amp; yard"));
}

#[test]
fn consumer_stops_when_queue_removed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frames.bin");
    let (mut consumer, tx) = consumer_for(SinkKind::Binary, &path);
    tx.close().unwrap();

    assert_eq!(consumer.poll_once(), Poll::Closed);
    consumer.run();
    consumer.finish().unwrap();
}
