use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vsp_common::consts::{CHANNEL_DATA, DATA_MSG_MAX, SEGMENT_SIZE};
use vsp_ipc::{QueueChannel, SegmentLayout, SegmentStore};

fn segment_benchmark(c: &mut Criterion) {
    let name = format!("bench_{}", std::process::id());
    let store = SegmentStore::create(&name, SegmentLayout::default()).unwrap();
    let mut writer = store.segment(2).unwrap();
    let reader = store.segment(2).unwrap();
    let payload = [0x5Au8; SEGMENT_SIZE];

    c.bench_function("segment_write", |b| {
        b.iter(|| writer.write(black_box(&payload)).unwrap())
    });
    c.bench_function("segment_snapshot", |b| b.iter(|| black_box(reader.snapshot())));
}

fn queue_benchmark(c: &mut Criterion) {
    let key = 0x7652_0000 | ((std::process::id() & 0xffff) as i32);
    let mut q = QueueChannel::create(key, CHANNEL_DATA, DATA_MSG_MAX).unwrap();
    let frame = [0x11u8; 512];
    let mut buf = vec![0u8; DATA_MSG_MAX];

    c.bench_function("queue_send_recv", |b| {
        b.iter(|| {
            q.send(black_box(&frame)).unwrap();
            black_box(q.recv(&mut buf).unwrap())
        })
    });
}

criterion_group!(benches, segment_benchmark, queue_benchmark);
criterion_main!(benches);
