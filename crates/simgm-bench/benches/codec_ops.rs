//! Criterion micro-benchmarks for the wire, DIS and message log codecs.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use simgm_core::builtin::INFO_ACTOR_UPDATED;
use simgm_core::Message;
use simgm_dis::pdu::{self, EntityStatePdu, HeaderStamp, Marking};
use simgm_dis::{Endian, EntityId, Pdu};
use simgm_net::codec::{from_bytes, to_bytes};
use simgm_replay::{LogReader, LogWriter};
use simgm_test_utils::running_gm;

/// An `INFO_ACTOR_UPDATED` carrying the full property group of an actor.
fn make_update() -> (simgm_engine::GameManager, Message) {
    let mut gm = simgm_bench::reference_gm(7).unwrap();
    let id = gm.actors().ids().next().unwrap();
    let msg = gm
        .actor(id)
        .unwrap()
        .core()
        .build_update_message(gm.core().factory(), INFO_ACTOR_UPDATED, None)
        .unwrap();
    gm.step(0.0, 0.0).unwrap();
    (gm, msg)
}

fn make_entity_state() -> Pdu {
    Pdu::EntityState(EntityStatePdu {
        entity_id: EntityId::new(1, 1, 42),
        force_id: 1,
        linear_velocity: [3.0, 0.5, 0.0],
        location: [4_000_000.0, 120_000.0, 4_800_000.0],
        orientation: [1.2, 0.0, 0.1],
        marking: Marking::ascii("BENCH-42"),
        ..Default::default()
    })
}

/// Benchmark: encode an actor update in the game manager wire format.
fn bench_wire_encode_update(c: &mut Criterion) {
    let (_gm, msg) = make_update();

    c.bench_function("wire_encode_update", |b| {
        b.iter(|| {
            let bytes = to_bytes(&msg).unwrap();
            black_box(&bytes);
        });
    });
}

/// Benchmark: decode the same update.
fn bench_wire_decode_update(c: &mut Criterion) {
    let (gm, msg) = make_update();
    let bytes = to_bytes(&msg).unwrap();

    c.bench_function("wire_decode_update", |b| {
        b.iter(|| {
            let decoded = from_bytes(&bytes, gm.core().factory()).unwrap();
            black_box(&decoded);
        });
    });
}

/// Benchmark: encode and decode an Entity State PDU.
fn bench_dis_entity_state(c: &mut Criterion) {
    let pdu = make_entity_state();
    let stamp = HeaderStamp {
        protocol_version: 6,
        exercise_id: 1,
        timestamp: pdu::timestamp_from_seconds(12.5),
    };

    c.bench_function("dis_entity_state_encode", |b| {
        b.iter(|| {
            let bytes = pdu::encode(&pdu, &stamp, Endian::Big).unwrap();
            black_box(&bytes);
        });
    });

    let bytes = pdu::encode(&pdu, &stamp, Endian::Big).unwrap();
    c.bench_function("dis_entity_state_decode", |b| {
        b.iter(|| {
            let decoded = pdu::decode(&bytes, Endian::Big).unwrap();
            black_box(&decoded);
        });
    });
}

/// Benchmark: write then index a 1000-message log.
fn bench_log_1000_messages(c: &mut Criterion) {
    let gm = running_gm("bench-log", 3);
    let mut event = gm
        .create_message(simgm_core::builtin::INFO_GAME_EVENT)
        .unwrap();
    event.set("EventName", "tick").unwrap();

    c.bench_function("log_write_1000_messages", |b| {
        b.iter(|| {
            let mut w = LogWriter::new(Vec::with_capacity(64 * 1024)).unwrap();
            for i in 0..1000 {
                w.write_message(&event, f64::from(i) * 0.01).unwrap();
            }
            black_box(w.finish(10.0).unwrap());
        });
    });

    let mut w = LogWriter::new(Vec::new()).unwrap();
    for i in 0..1000 {
        w.write_message(&event, f64::from(i) * 0.01).unwrap();
    }
    let log = w.finish(10.0).unwrap();
    c.bench_function("log_index_1000_messages", |b| {
        b.iter(|| {
            let index = LogReader::open(log.as_slice()).unwrap().index().unwrap();
            black_box(&index);
        });
    });
}

criterion_group!(
    benches,
    bench_wire_encode_update,
    bench_wire_decode_update,
    bench_dis_entity_state,
    bench_log_1000_messages
);
criterion_main!(benches);
