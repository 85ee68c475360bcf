//! Integration test: two game managers sharing a DIS exercise.
//!
//! Each manager runs a [`DisComponent`] and a [`DefaultMessageProcessor`];
//! their sinks are the two ends of a [`ChannelSink`] pair, so every PDU one
//! side flushes is received by the other at its next `pre_frame`.

use std::sync::{Arc, Mutex};

use simgm_core::builtin::{INFO_ACTOR_UPDATED, INFO_GAME_EVENT};
use simgm_core::{ActorId, Message, ParamValue};
use simgm_dis::adapters::{ROTATION, TRANSLATION, VELOCITY};
use simgm_dis::{
    entity_actor_type, AdapterContext, ChannelSink, DisComponent, DisConfig, DisError, Endian,
    EntityMap, EntityType, EntityTypeMap, OutgoingAdapter, OutgoingMessage, Pdu,
    DEFAULT_REMOTE_ACTOR_TYPE, DIS_COMPONENT_NAME,
};
use simgm_engine::{DefaultMessageProcessor, GameManager};
use simgm_test_utils::running_gm;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn tank_type() -> EntityType {
    EntityType {
        kind: 1,
        domain: 1,
        country: 225,
        category: 1,
        subcategory: 1,
        specific: 3,
        extra: 0,
    }
}

fn dis_gm(name: &str, seed: u64, config: DisConfig, sink: ChannelSink) -> GameManager {
    let mut gm = running_gm(name, seed);
    gm.register_actor_type(entity_actor_type(DEFAULT_REMOTE_ACTOR_TYPE))
        .unwrap();
    gm.register_actor_type(entity_actor_type("vehicle.Tank"))
        .unwrap();
    let mut dis = DisComponent::new(config, sink).unwrap();
    dis.map_entity_type(tank_type(), "vehicle.Tank");
    gm.add_component(Box::new(DefaultMessageProcessor::new()))
        .unwrap();
    gm.add_component(Box::new(dis)).unwrap();
    gm
}

/// Managers `a` (site 1) and `b` (site 2) on exercise 1.
fn pair(endian: Endian) -> (GameManager, GameManager) {
    init_logging();
    let (sa, sb) = ChannelSink::pair();
    let a = dis_gm(
        "a",
        1,
        DisConfig {
            site_id: 1,
            endian,
            ..Default::default()
        },
        sa,
    );
    let b = dis_gm(
        "b",
        2,
        DisConfig {
            site_id: 2,
            endian,
            ..Default::default()
        },
        sb,
    );
    (a, b)
}

fn step_both(a: &mut GameManager, b: &mut GameManager) {
    a.step(0.1, 0.1).unwrap();
    b.step(0.1, 0.1).unwrap();
}

fn mirror_of(b: &GameManager, site: u16, entity: u16) -> Option<ActorId> {
    let dis = b.component_as::<DisComponent>(DIS_COMPONENT_NAME)?;
    dis.entities()
        .actor(simgm_dis::EntityId::new(site, 1, entity))
}

fn vec3(gm: &GameManager, id: ActorId, name: &str) -> [f32; 3] {
    gm.actor(id)
        .unwrap()
        .core()
        .property(name)
        .unwrap()
        .as_vec3()
        .unwrap()
}

fn spawn_tank(a: &mut GameManager) -> ActorId {
    let mut actor = a.create_actor("vehicle.Tank").unwrap();
    actor.core_mut().set_name("T-1");
    actor
        .core_mut()
        .set_property(TRANSLATION, ParamValue::Vec3([100.0, 200.0, 5.0]))
        .unwrap();
    actor
        .core_mut()
        .set_property(ROTATION, ParamValue::Vec3([90.0, 0.0, 0.0]))
        .unwrap();
    a.add_actor(actor).unwrap()
}

// ── lifecycle ───────────────────────────────────────────────────────

#[test]
fn local_actor_is_mirrored_updated_and_removed() {
    let (mut a, mut b) = pair(Endian::Big);
    let tank = spawn_tank(&mut a);
    step_both(&mut a, &mut b);

    let mirror = mirror_of(&b, 1, 1).expect("mirror paired");
    let m = b.actor(mirror).unwrap();
    assert!(m.core().is_remote());
    assert_eq!(m.core().actor_type().name(), "vehicle.Tank");
    assert_eq!(m.core().name(), "T-1");
    assert_eq!(vec3(&b, mirror, TRANSLATION), [100.0, 200.0, 5.0]);
    let rot = vec3(&b, mirror, ROTATION);
    assert!((rot[0] - 90.0).abs() < 1e-3, "{rot:?}");

    // A partial update keeps the other fields.
    a.actor_mut(tank)
        .unwrap()
        .core_mut()
        .set_property(VELOCITY, ParamValue::Vec3([3.0, 0.0, 0.0]))
        .unwrap();
    let update: Message = a
        .actor(tank)
        .unwrap()
        .core()
        .build_update_message(a.core().factory(), INFO_ACTOR_UPDATED, Some(&[VELOCITY]))
        .unwrap();
    a.send_message(update).unwrap();
    step_both(&mut a, &mut b);
    assert_eq!(vec3(&b, mirror, VELOCITY), [3.0, 0.0, 0.0]);
    assert_eq!(vec3(&b, mirror, TRANSLATION), [100.0, 200.0, 5.0]);

    a.delete_actor(tank).unwrap();
    step_both(&mut a, &mut b);
    b.step(0.1, 0.1).unwrap();
    assert!(b.actor(mirror).is_none());
    assert!(mirror_of(&b, 1, 1).is_none());
}

#[test]
fn little_endian_exercises_interoperate() {
    let (mut a, mut b) = pair(Endian::Little);
    spawn_tank(&mut a);
    step_both(&mut a, &mut b);
    let mirror = mirror_of(&b, 1, 1).expect("mirror paired");
    assert_eq!(vec3(&b, mirror, TRANSLATION), [100.0, 200.0, 5.0]);
}

#[test]
fn mismatched_exercises_do_not_see_each_other() {
    init_logging();
    let (sa, sb) = ChannelSink::pair();
    let mut a = dis_gm("a", 1, DisConfig::default(), sa);
    let mut b = dis_gm(
        "b",
        2,
        DisConfig {
            exercise_id: 7,
            site_id: 2,
            ..Default::default()
        },
        sb,
    );
    spawn_tank(&mut a);
    step_both(&mut a, &mut b);
    let dis = b.component_as::<DisComponent>(DIS_COMPONENT_NAME).unwrap();
    assert!(dis.entities().is_empty());
    assert_eq!(dis.stats().incoming.foreign_exercise, 2);
    assert_eq!(b.actors().len(), 0);
}

// ── adapter fan-out ─────────────────────────────────────────────────

struct Probe {
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl OutgoingAdapter for Probe {
    fn name(&self) -> &str {
        self.label
    }

    fn to_pdu(
        &mut self,
        _msg: &Message,
        _cx: &mut AdapterContext<'_>,
    ) -> Result<Option<Pdu>, DisError> {
        self.order.lock().unwrap().push(self.label);
        if self.fail {
            return Err(DisError::NoTarget);
        }
        Ok(None)
    }
}

#[test]
fn every_adapter_runs_in_registration_order() {
    init_logging();
    let mut gm = running_gm("fanout", 3);
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut out = OutgoingMessage::new();
    for (label, fail) in [("first", false), ("broken", true), ("third", false)] {
        out.add_adapter(
            INFO_GAME_EVENT,
            Box::new(Probe {
                label,
                order: Arc::clone(&order),
                fail,
            }),
        );
    }
    assert_eq!(out.adapter_count(INFO_GAME_EVENT), 3);

    let msg = gm.create_message(INFO_GAME_EVENT).unwrap();
    let config = DisConfig::default();
    let mut entities = EntityMap::new(1, 1);
    let types = EntityTypeMap::new();
    let mut cx = AdapterContext {
        gm: gm.core_mut(),
        entities: &mut entities,
        types: &types,
        config: &config,
    };
    assert_eq!(out.handle(&msg, &mut cx), 0);
    assert_eq!(*order.lock().unwrap(), ["first", "broken", "third"]);
    assert_eq!(out.stats().adapter_errors, 1);
    assert_eq!(out.pending(), 0);
}
