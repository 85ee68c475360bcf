//! Integration test: actor lifecycle through the step loop.
//!
//! Deferred removal, actor handler failures, listener routing, remote
//! mirrors driven by the default processor and pause commands.

use std::sync::{Arc, Mutex};

use simgm_core::builtin::{
    COMMAND_PAUSE, INFO_ACTOR_CREATED, INFO_ACTOR_DELETED, INFO_ACTOR_UPDATED, INFO_GAME_EVENT,
    INFO_PAUSED, REQUEST_PAUSE, SERVER_REQUEST_REJECTED, TICK_END_OF_FRAME,
};
use simgm_core::{ActorId, MachineId, MachineInfo, Message, MessageTypeId, ParamValue};
use simgm_engine::default_processor::DEFAULT_PROCESSOR_NAME;
use simgm_engine::{
    ActorComponent, ActorCore, ActorType, ComponentPriority, ComponentResult,
    DefaultMessageProcessor, GameActor, GameManager, GmComponent, GmContext, GmCore, GmError,
    GmState, TickInfo,
};
use simgm_test_utils::{running_gm, RecordingComponent, SharedLog, CLEANUP, ENTITY_REMOVED};

type Inbox = Arc<Mutex<Vec<(ActorId, MessageTypeId, String)>>>;

/// Records every delivered message; fails on game events named "bad".
struct InboxComponent {
    inbox: Inbox,
}

impl ActorComponent for InboxComponent {
    fn key(&self) -> &'static str {
        "inbox"
    }

    fn on_removed_from_world(&mut self, actor: &mut ActorCore, _gm: &mut GmCore) {
        self.inbox
            .lock()
            .unwrap()
            .push((actor.id(), INFO_ACTOR_DELETED, "removed".into()));
    }

    fn process_message(
        &mut self,
        actor: &mut ActorCore,
        msg: &Message,
        _gm: &mut GmCore,
    ) -> ComponentResult {
        let event = msg
            .get("EventName")
            .and_then(ParamValue::as_str)
            .unwrap_or_default()
            .to_string();
        if event == "bad" {
            return Err("bad event".into());
        }
        self.inbox
            .lock()
            .unwrap()
            .push((actor.id(), msg.message_type(), event));
        Ok(())
    }
}

/// Deletes the about-actor of any game event named "kill".
struct Killer;

impl GmComponent for Killer {
    fn name(&self) -> &str {
        "killer"
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        if msg.message_type() == INFO_GAME_EVENT
            && msg.get("EventName").and_then(ParamValue::as_str) == Some("kill")
        {
            if let Some(id) = msg.about_actor() {
                gm.delete_actor(id)?;
            }
        }
        Ok(())
    }
}

/// Counts local and remote ticks in properties.
struct TickCounter;

impl TickCounter {
    fn bump(actor: &mut ActorCore, name: &str) -> ComponentResult {
        let n = actor.property(name)?.as_i32().unwrap_or_default();
        actor.set_property(name, n + 1)?;
        Ok(())
    }
}

impl ActorComponent for TickCounter {
    fn key(&self) -> &'static str {
        "ticks"
    }

    fn on_tick_local(&mut self, actor: &mut ActorCore, _: &TickInfo, _: &mut GmCore) -> ComponentResult {
        Self::bump(actor, "LocalTicks")
    }

    fn on_tick_remote(&mut self, actor: &mut ActorCore, _: &TickInfo, _: &mut GmCore) -> ComponentResult {
        Self::bump(actor, "RemoteTicks")
    }
}

fn tick_counter() -> Box<dyn ActorComponent> {
    Box::new(TickCounter)
}

fn crate_type() -> Arc<ActorType> {
    ActorType::builder("Crate", "props").build()
}

fn tank_type() -> Arc<ActorType> {
    ActorType::builder("Tank", "vehicles")
        .property("Fuel", 1.0f32)
        .property("LocalTicks", 0i32)
        .property("RemoteTicks", 0i32)
        .component(tick_counter)
        .build()
}

fn spawn_with_inbox(gm: &mut GameManager, inbox: &Inbox) -> ActorId {
    let id = gm.core_mut().next_actor_id();
    let mut actor = GameActor::new(id, crate_type(), false);
    actor
        .add_component(Box::new(InboxComponent {
            inbox: Arc::clone(inbox),
        }))
        .unwrap();
    gm.add_actor(actor).unwrap()
}

fn send_event(gm: &mut GameManager, name: &str, about: Option<ActorId>) {
    let mut msg = gm.create_message(INFO_GAME_EVENT).unwrap();
    msg.set("EventName", name).unwrap();
    msg.set_about_actor(about);
    gm.send_message(msg).unwrap();
}

fn events(inbox: &Inbox) -> Vec<String> {
    inbox
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, ty, _)| *ty == INFO_GAME_EVENT || *ty == INFO_ACTOR_DELETED)
        .map(|(_, _, e)| e.clone())
        .collect()
}

fn peer() -> Arc<MachineInfo> {
    Arc::new(MachineInfo::new(MachineId(0x77), "peer"))
}

// ── removal ─────────────────────────────────────────────────────────

/// Notes, for each INFO_ACTOR_DELETED it sees, whether the actor it is
/// about can still be looked up.
#[derive(Default)]
struct DeletionWatcher {
    seen: Vec<(ActorId, bool)>,
}

impl GmComponent for DeletionWatcher {
    fn name(&self) -> &str {
        "deletion-watcher"
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        if msg.message_type() == INFO_ACTOR_DELETED {
            if let Some(id) = msg.about_actor() {
                self.seen.push((id, gm.actor(id).is_some()));
            }
        }
        Ok(())
    }
}

fn inbox_entries(inbox: &Inbox) -> Vec<(MessageTypeId, String)> {
    inbox
        .lock()
        .unwrap()
        .iter()
        .map(|(_, ty, e)| (*ty, e.clone()))
        .collect()
}

#[test]
fn deleted_actor_sees_the_rest_of_the_step() {
    let mut gm = running_gm("removal", 10);
    gm.add_component(Box::new(Killer)).unwrap();
    gm.add_component(Box::new(DeletionWatcher::default()))
        .unwrap();
    let inbox = Inbox::default();
    let id = spawn_with_inbox(&mut gm, &inbox);
    gm.step(0.1, 0.1).unwrap();
    inbox.lock().unwrap().clear();

    send_event(&mut gm, "kill", Some(id));
    send_event(&mut gm, "after", Some(id));
    let report = gm.step(0.1, 0.1).unwrap();

    // Still in the world: the deletion notice is dispatched next step.
    assert!(report.removed_actors.is_empty());
    assert!(gm.actor(id).is_some());
    assert!(gm.core().is_actor_live(id));
    assert_eq!(events(&inbox), ["kill", "after"]);
    assert_eq!(gm.core().queued_messages(), 1);

    let report = gm.step(0.1, 0.1).unwrap();
    assert_eq!(report.removed_actors, vec![id]);
    assert_eq!(report.metrics.actors_removed, 1);
    assert!(gm.actor(id).is_none());
    assert!(!gm.core().is_actor_live(id));

    // The actor receives its own notice before it leaves the world.
    let entries = inbox_entries(&inbox);
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[2], (INFO_ACTOR_DELETED, String::new()));
    assert_eq!(entries[3], (INFO_ACTOR_DELETED, "removed".to_string()));

    let watcher = gm
        .component_as::<DeletionWatcher>("deletion-watcher")
        .unwrap();
    assert_eq!(watcher.seen, [(id, true)]);
}

#[test]
fn about_listeners_hear_the_deletion_notice() {
    let mut gm = running_gm("removal-listeners", 18);
    let inbox = Inbox::default();
    let doomed = spawn_with_inbox(&mut gm, &inbox);
    let watcher = spawn_with_inbox(&mut gm, &inbox);
    gm.core_mut()
        .register_for_messages_about_actor(INFO_ACTOR_DELETED, doomed, watcher)
        .unwrap();
    gm.step(0.1, 0.1).unwrap();
    inbox.lock().unwrap().clear();

    gm.delete_actor(doomed).unwrap();
    let report = gm.step(0.1, 0.1).unwrap();
    assert_eq!(report.removed_actors, vec![doomed]);

    let deleted: Vec<ActorId> = inbox
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, ty, e)| *ty == INFO_ACTOR_DELETED && e.is_empty())
        .map(|(who, _, _)| *who)
        .collect();
    assert_eq!(deleted, [doomed, watcher]);
    assert!(gm.actor(watcher).is_some());
}

#[test]
fn deleting_an_unknown_actor_fails() {
    let mut gm = running_gm("unknown", 11);
    let err = gm.delete_actor(ActorId(42)).unwrap_err();
    assert!(matches!(err, GmError::ActorNotFound { id } if id == ActorId(42)));
}

#[test]
fn actor_handler_failure_aborts_and_requeues_the_rest() {
    let mut gm = running_gm("abort", 12);
    let inbox = Inbox::default();
    let id = spawn_with_inbox(&mut gm, &inbox);

    send_event(&mut gm, "x", Some(id));
    send_event(&mut gm, "bad", Some(id));
    send_event(&mut gm, "y", Some(id));
    let err = gm.step(0.1, 0.1).unwrap_err();
    assert!(matches!(
        err,
        GmError::ActorHandler { actor, message_type, .. }
            if actor == id && message_type == INFO_GAME_EVENT
    ));
    assert_eq!(events(&inbox), ["x"]);
    assert_eq!(gm.core().queued_messages(), 1);
    assert_eq!(gm.state(), GmState::Running);

    gm.step(0.1, 0.1).unwrap();
    assert_eq!(events(&inbox), ["x", "y"]);
}

// ── listeners ───────────────────────────────────────────────────────

#[test]
fn listeners_receive_by_type_and_by_about_actor() {
    let mut gm = running_gm("listeners", 13);
    let inbox = Inbox::default();
    let a = spawn_with_inbox(&mut gm, &inbox);
    let b = spawn_with_inbox(&mut gm, &inbox);
    gm.core_mut().register_for_messages(ENTITY_REMOVED, b).unwrap();
    gm.core_mut()
        .register_for_messages_about_actor(CLEANUP, a, b)
        .unwrap();

    let removed = gm.create_message(ENTITY_REMOVED).unwrap();
    gm.send_message(removed).unwrap();
    let mut about_a = gm.create_message(CLEANUP).unwrap();
    about_a.set_about_actor(Some(a));
    gm.send_message(about_a).unwrap();
    let unrelated = gm.create_message(CLEANUP).unwrap();
    gm.send_message(unrelated).unwrap();
    gm.step(0.1, 0.1).unwrap();

    let got: Vec<(ActorId, MessageTypeId)> = inbox
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, ty, _)| *ty == ENTITY_REMOVED || *ty == CLEANUP)
        .map(|(id, ty, _)| (*id, *ty))
        .collect();
    assert_eq!(got, [(b, ENTITY_REMOVED), (a, CLEANUP), (b, CLEANUP)]);
}

#[test]
fn end_of_frame_is_not_subscribable() {
    let mut gm = running_gm("eof", 14);
    let err = gm
        .core_mut()
        .register_for_messages(TICK_END_OF_FRAME, ActorId(5))
        .unwrap_err();
    assert!(matches!(err, GmError::InvalidSubscription { .. }));
}

#[test]
fn removed_listener_stops_receiving() {
    let mut gm = running_gm("forget", 15);
    gm.add_component(Box::new(Killer)).unwrap();
    let inbox = Inbox::default();
    let listener = spawn_with_inbox(&mut gm, &inbox);
    gm.core_mut()
        .register_for_messages(ENTITY_REMOVED, listener)
        .unwrap();
    send_event(&mut gm, "kill", Some(listener));
    gm.step(0.1, 0.1).unwrap();

    let msg = gm.create_message(ENTITY_REMOVED).unwrap();
    gm.send_message(msg).unwrap();
    gm.step(0.1, 0.1).unwrap();
    assert!(inbox
        .lock()
        .unwrap()
        .iter()
        .all(|(_, ty, _)| *ty != ENTITY_REMOVED));
}

// ── remote mirrors ──────────────────────────────────────────────────

fn peer_update(gm: &GameManager, id: ActorId, ty: MessageTypeId, fuel: f32) -> Message {
    let mut owner = GameActor::new(id, tank_type(), false);
    owner.core_mut().set_name("tank-1");
    owner.core_mut().set_property("Fuel", fuel).unwrap();
    let only: Option<&[&str]> = if ty == INFO_ACTOR_UPDATED {
        Some(&["Fuel"])
    } else {
        None
    };
    let mut msg = owner
        .core()
        .build_update_message(gm.core().factory(), ty, only)
        .unwrap();
    msg.set_source(peer());
    msg
}

#[test]
fn remote_announcements_drive_a_mirror() {
    let mut gm = running_gm("mirror", 16);
    gm.register_actor_type(tank_type()).unwrap();
    gm.add_component(Box::new(DefaultMessageProcessor::new()))
        .unwrap();
    let id = ActorId(500);

    let created = peer_update(&gm, id, INFO_ACTOR_CREATED, 0.75);
    gm.send_message(created).unwrap();
    let report = gm.step(0.1, 0.1).unwrap();
    assert_eq!(report.metrics.actors_added, 1);

    let mirror = gm.actor(id).expect("mirror exists");
    assert!(mirror.core().is_remote());
    assert_eq!(mirror.core().name(), "tank-1");
    assert_eq!(mirror.core().property("Fuel").unwrap().as_f32(), Some(0.75));
    assert_eq!(mirror.core().property("RemoteTicks").unwrap().as_i32(), Some(1));
    assert_eq!(mirror.core().property("LocalTicks").unwrap().as_i32(), Some(0));
    let processor = gm
        .component_as::<DefaultMessageProcessor>(DEFAULT_PROCESSOR_NAME)
        .unwrap();
    assert_eq!(processor.mirrors_created(), 1);

    let updated = peer_update(&gm, id, INFO_ACTOR_UPDATED, 0.25);
    gm.send_message(updated).unwrap();
    gm.step(0.1, 0.1).unwrap();
    let mirror = gm.actor(id).unwrap();
    assert_eq!(mirror.core().property("Fuel").unwrap().as_f32(), Some(0.25));
    assert_eq!(mirror.core().property("RemoteTicks").unwrap().as_i32(), Some(2));

    let mut deleted = gm.create_message(INFO_ACTOR_DELETED).unwrap();
    deleted.set_about_actor(Some(id));
    deleted.set_source(peer());
    gm.send_message(deleted).unwrap();
    let report = gm.step(0.1, 0.1).unwrap();
    assert_eq!(report.removed_actors, vec![id]);
    assert!(gm.actor(id).is_none());
}

#[test]
fn remote_update_for_unknown_type_is_ignored() {
    let mut gm = running_gm("unknown-type", 17);
    gm.add_component(Box::new(DefaultMessageProcessor::new()))
        .unwrap();
    let created = peer_update(&gm, ActorId(501), INFO_ACTOR_CREATED, 0.5);
    gm.send_message(created).unwrap();
    gm.step(0.1, 0.1).unwrap();
    assert!(gm.actor(ActorId(501)).is_none());
}

#[test]
fn local_announcements_do_not_create_mirrors() {
    let mut gm = running_gm("local", 18);
    gm.register_actor_type(tank_type()).unwrap();
    gm.add_component(Box::new(DefaultMessageProcessor::new()))
        .unwrap();
    let mut created = peer_update(&gm, ActorId(502), INFO_ACTOR_CREATED, 0.5);
    created.set_source(Arc::clone(gm.machine_info()));
    gm.send_message(created).unwrap();
    gm.step(0.1, 0.1).unwrap();
    assert!(gm.actor(ActorId(502)).is_none());
}

// ── pause ───────────────────────────────────────────────────────────

fn recorder(gm: &mut GameManager, only: &[MessageTypeId]) -> SharedLog {
    let log = SharedLog::default();
    gm.add_component(Box::new(
        RecordingComponent::new("recorder", ComponentPriority::Lowest, Arc::clone(&log))
            .only(only),
    ))
    .unwrap();
    log
}

#[test]
fn pause_command_takes_effect_at_end_of_step() {
    let mut gm = running_gm("pause", 19);
    gm.add_component(Box::new(DefaultMessageProcessor::new()))
        .unwrap();
    let log = recorder(&mut gm, &[INFO_PAUSED]);

    let pause = gm.create_message(COMMAND_PAUSE).unwrap();
    gm.send_message(pause).unwrap();
    gm.step(0.5, 0.5).unwrap();
    assert_eq!(gm.state(), GmState::Paused);
    let frozen = gm.core().sim_time();

    gm.step(0.5, 0.5).unwrap();
    assert_eq!(gm.core().sim_time(), frozen);
    assert_eq!(gm.core().real_time(), 1.0);
    assert_eq!(RecordingComponent::seen_by(&log, "recorder", INFO_PAUSED).len(), 1);
}

#[test]
fn pause_requests_are_rejected_by_default() {
    let mut gm = running_gm("reject", 20);
    gm.add_component(Box::new(DefaultMessageProcessor::new()))
        .unwrap();
    let log = recorder(&mut gm, &[SERVER_REQUEST_REJECTED]);

    let request = gm.create_message(REQUEST_PAUSE).unwrap();
    gm.send_message(request).unwrap();
    gm.step(0.1, 0.1).unwrap();
    assert_eq!(gm.state(), GmState::Running);

    gm.step(0.1, 0.1).unwrap();
    let rejections = RecordingComponent::seen_by(&log, "recorder", SERVER_REQUEST_REJECTED);
    assert_eq!(rejections.len(), 1);
    let rejection = &rejections[0];
    assert!(rejection.get("Cause").and_then(ParamValue::as_str).is_some());
    assert_eq!(
        rejection.causing_message().map(Message::message_type),
        Some(REQUEST_PAUSE)
    );
}

#[test]
fn accepted_pause_request_pauses() {
    let mut gm = running_gm("accept", 21);
    gm.add_component(Box::new(
        DefaultMessageProcessor::new().accept_pause_requests(true),
    ))
    .unwrap();
    let request = gm.create_message(REQUEST_PAUSE).unwrap();
    gm.send_message(request).unwrap();
    gm.step(0.1, 0.1).unwrap();
    assert!(gm.is_paused());
}
