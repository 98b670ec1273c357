//! Cross-handle behaviour of segments and queue channels.

use std::sync::atomic::{AtomicU32, Ordering};
use vsp_common::consts::{CHANNEL_BUTTON, CHANNEL_DATA, CHANNEL_GUI, SEGMENT_SIZE};
use vsp_ipc::{QueueChannel, QueueError, Segment, SegmentLayout, SegmentStore, ShmError};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_name(tag: &str) -> String {
    format!(
        "it_{}_{}_{}",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

fn unique_key() -> i32 {
    0x7651_0000
        | (((std::process::id() & 0xff) as i32) << 8)
        | (COUNTER.fetch_add(1, Ordering::Relaxed) & 0xff) as i32
}

#[test]
fn segments_are_isolated() {
    let name = unique_name("iso");
    let layout = SegmentLayout::default();
    let store = SegmentStore::create(&name, layout).unwrap();

    let mut gps = Segment::open(&name, layout, 2).unwrap();
    let temp = Segment::open(&name, layout, 4).unwrap();
    let gps_reader = store.segment(2).unwrap();

    gps.write(&[0xAB; SEGMENT_SIZE]).unwrap();

    assert_eq!(gps_reader.snapshot(), vec![0xAB; SEGMENT_SIZE]);
    assert!(temp.snapshot().iter().all(|&b| b == 0));
    for id in [0, 1, 3, 5, 6] {
        assert!(store.segment(id).unwrap().snapshot().iter().all(|&b| b == 0));
    }
}

#[test]
fn read_into_returns_prefix() {
    let name = unique_name("prefix");
    let store = SegmentStore::create(&name, SegmentLayout::default()).unwrap();
    let mut seg = store.segment(1).unwrap();
    seg.write(b"hello").unwrap();

    let mut buf = [0u8; 3];
    seg.read_into(&mut buf).unwrap();
    assert_eq!(&buf, b"hel");
}

#[test]
fn last_write_wins() {
    let name = unique_name("lww");
    let store = SegmentStore::create(&name, SegmentLayout::default()).unwrap();
    let mut writer = store.segment(5).unwrap();
    let reader = store.segment(5).unwrap();

    writer.write(&[1, 1, 1, 1]).unwrap();
    writer.write(&[2, 2]).unwrap();
    assert_eq!(&reader.snapshot()[..4], &[2, 2, 1, 1]);
}

#[test]
fn owner_close_removes_region() {
    let name = unique_name("close");
    let layout = SegmentLayout::default();
    let store = SegmentStore::create(&name, layout).unwrap();
    assert!(Segment::open(&name, layout, 0).is_ok());

    store.close().unwrap();
    assert!(matches!(
        Segment::open(&name, layout, 0),
        Err(ShmError::NotFound { .. })
    ));
}

#[test]
fn create_replaces_stale_region() {
    let name = unique_name("stale");
    let layout = SegmentLayout::new(16, 2);
    let first = SegmentStore::create(&name, layout).unwrap();
    first.segment(1).unwrap().write(&[5; 16]).unwrap();
    std::mem::forget(first);

    let second = SegmentStore::create(&name, layout).unwrap();
    assert_eq!(second.segment(1).unwrap().snapshot(), vec![0; 16]);
}

#[test]
fn create_replaces_stale_queue() {
    let key = unique_key();
    let mut first = QueueChannel::create(key, CHANNEL_BUTTON, 64).unwrap();
    first.send(&[6, 2]).unwrap();
    std::mem::forget(first);

    let _data = QueueChannel::create(key, CHANNEL_DATA, 64).unwrap();
    let mut button = QueueChannel::open(key, CHANNEL_BUTTON, 64).unwrap();
    let mut buf = [0u8; 64];
    assert_eq!(button.recv(&mut buf).unwrap(), 0);
}

#[test]
fn channels_are_isolated() {
    let key = unique_key();
    let mut data = QueueChannel::create(key, CHANNEL_DATA, 64).unwrap();
    let mut gui = QueueChannel::open(key, CHANNEL_GUI, 64).unwrap();
    let mut button = QueueChannel::open(key, CHANNEL_BUTTON, 64).unwrap();

    data.send(b"frame").unwrap();

    let mut buf = [0u8; 64];
    assert_eq!(gui.recv(&mut buf).unwrap(), 0);
    assert_eq!(button.recv(&mut buf).unwrap(), 0);

    let n = data.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"frame");
}

#[test]
fn channel_is_fifo() {
    let key = unique_key();
    let mut tx = QueueChannel::create(key, CHANNEL_DATA, 64).unwrap();
    let mut rx = QueueChannel::open(key, CHANNEL_DATA, 64).unwrap();

    for i in 0u8..5 {
        tx.send(&[i; 3]).unwrap();
    }
    let mut buf = [0u8; 64];
    for i in 0u8..5 {
        let n = rx.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[i; 3]);
    }
    assert_eq!(rx.recv(&mut buf).unwrap(), 0);
}

#[test]
fn owner_close_removes_queue() {
    let key = unique_key();
    let owner = QueueChannel::create(key, CHANNEL_GUI, 16).unwrap();
    let mut peer = QueueChannel::open(key, CHANNEL_GUI, 16).unwrap();
    assert!(!peer.is_owner());

    owner.close().unwrap();

    let mut buf = [0u8; 16];
    assert!(matches!(
        peer.recv(&mut buf),
        Err(QueueError::RecvFailed { .. })
    ));
    assert!(matches!(
        QueueChannel::open(key, CHANNEL_GUI, 16),
        Err(QueueError::NotFound { .. })
    ));
}
