//! Services available to components and actors while a step runs.
//!
//! [`GmCore`] is the part of the game manager that hooks may touch: the
//! message factory, the outbound queues, timers, listener tables, the
//! clock and the actor bookkeeping. Structural changes requested through
//! it (actor adds, deletions, publishes, component adds and removals,
//! pause transitions) are recorded and applied by the game manager at
//! well-defined points of the step, never in the middle of a dispatch.
//!
//! [`GmContext`] is what a [`GmComponent`](crate::GmComponent) receives: a
//! `GmCore` plus a read-only view of the actor table.

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use smallvec::SmallVec;

use simgm_core::builtin::{
    INFO_ACTOR_CREATED, INFO_ACTOR_DELETED, INFO_TIME_CHANGED, SERVER_REQUEST_REJECTED,
    TICK_END_OF_FRAME,
};
use simgm_core::{
    ActorId, MachineInfo, Message, MessageFactory, MessageTypeId, TickId, UidGenerator,
};

use crate::actor::{ActorTable, GameActor};
use crate::component::{ComponentPriority, GmComponent};
use crate::config::validate_time_scale;
use crate::error::GmError;
use crate::property::ActorTypeRegistry;
use crate::queue::{MessageQueue, QueueFull};
use crate::timer::{TimerClock, TimerSet};

/// Actor ids interested in one message, in delivery order.
pub(crate) type Recipients = SmallVec<[ActorId; 8]>;

// ── Clock ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub(crate) struct Clock {
    pub(crate) sim_time: f64,
    pub(crate) real_time: f64,
    pub(crate) time_scale: f32,
    pub(crate) tick: TickId,
    pub(crate) last_delta_sim: f32,
    pub(crate) last_delta_real: f32,
}

impl Clock {
    fn new(start: f64, time_scale: f32) -> Self {
        Self {
            sim_time: start,
            real_time: 0.0,
            time_scale,
            tick: TickId(0),
            last_delta_sim: 0.0,
            last_delta_real: 0.0,
        }
    }

    /// Advance by one step. `delta_sim` is already scaled.
    pub(crate) fn advance(&mut self, delta_sim: f32, delta_real: f32) {
        self.sim_time += f64::from(delta_sim);
        self.real_time += f64::from(delta_real);
        self.last_delta_sim = delta_sim;
        self.last_delta_real = delta_real;
        self.tick = TickId(self.tick.0 + 1);
    }
}

// ── Listeners ───────────────────────────────────────────────────────

/// Actor subscriptions by message type, and by message type plus
/// about-actor.
#[derive(Debug, Default)]
pub(crate) struct Listeners {
    global: HashMap<MessageTypeId, SmallVec<[ActorId; 4]>>,
    about: HashMap<(MessageTypeId, ActorId), SmallVec<[ActorId; 4]>>,
}

fn push_unique(list: &mut SmallVec<[ActorId; 4]>, id: ActorId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

impl Listeners {
    fn register(&mut self, ty: MessageTypeId, listener: ActorId) {
        push_unique(self.global.entry(ty).or_default(), listener);
    }

    fn register_about(&mut self, ty: MessageTypeId, about: ActorId, listener: ActorId) {
        push_unique(self.about.entry((ty, about)).or_default(), listener);
    }

    fn unregister(&mut self, ty: MessageTypeId, listener: ActorId) -> bool {
        let Some(list) = self.global.get_mut(&ty) else {
            return false;
        };
        let before = list.len();
        list.retain(|id| *id != listener);
        before != list.len()
    }

    fn unregister_about(&mut self, ty: MessageTypeId, about: ActorId, listener: ActorId) -> bool {
        let Some(list) = self.about.get_mut(&(ty, about)) else {
            return false;
        };
        let before = list.len();
        list.retain(|id| *id != listener);
        before != list.len()
    }

    /// Drop every subscription held by, or about, `actor`.
    pub(crate) fn forget_actor(&mut self, actor: ActorId) {
        for list in self.global.values_mut() {
            list.retain(|id| *id != actor);
        }
        self.about.retain(|(_, about), list| {
            list.retain(|id| *id != actor);
            *about != actor && !list.is_empty()
        });
        self.global.retain(|_, list| !list.is_empty());
    }

    /// Global listeners for the type, then the about-actor, then listeners
    /// for the type about that actor. Each id appears once.
    pub(crate) fn recipients(&self, msg: &Message) -> Recipients {
        let ty = msg.message_type();
        let mut out = Recipients::new();
        let mut add = |id: ActorId| {
            if !out.contains(&id) {
                out.push(id);
            }
        };
        if let Some(list) = self.global.get(&ty) {
            list.iter().copied().for_each(&mut add);
        }
        if let Some(about) = msg.about_actor() {
            add(about);
            if let Some(list) = self.about.get(&(ty, about)) {
                list.iter().copied().for_each(&mut add);
            }
        }
        out
    }
}

// ── Pending operations ──────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
pub(crate) struct LiveActor {
    pub(crate) remote: bool,
    pub(crate) published: bool,
    pub(crate) pending_delete: bool,
}

#[derive(Default)]
pub(crate) struct PendingOps {
    pub(crate) actor_adds: Vec<GameActor>,
    pub(crate) actor_deletes: Vec<ActorId>,
    pub(crate) publishes: Vec<ActorId>,
    pub(crate) component_adds: Vec<(Box<dyn GmComponent>, ComponentPriority)>,
    pub(crate) component_removes: Vec<String>,
    pub(crate) pause: Option<bool>,
}

// ── GmCore ──────────────────────────────────────────────────────────

/// Game manager services reachable from component and actor hooks.
pub struct GmCore {
    pub(crate) factory: MessageFactory,
    pub(crate) actor_types: ActorTypeRegistry,
    pub(crate) queue: MessageQueue,
    pub(crate) network_queue: Vec<Message>,
    pub(crate) timers: TimerSet,
    pub(crate) listeners: Listeners,
    pub(crate) uids: UidGenerator,
    pub(crate) clock: Clock,
    pub(crate) live: HashMap<ActorId, LiveActor>,
    pub(crate) component_names: HashSet<String>,
    pub(crate) pending: PendingOps,
    pub(crate) paused: bool,
}

impl GmCore {
    pub(crate) fn new(
        local: MachineInfo,
        queue_capacity: usize,
        uids: UidGenerator,
        start_sim_time: f64,
        time_scale: f32,
    ) -> Self {
        Self {
            factory: MessageFactory::new(local),
            actor_types: ActorTypeRegistry::new(),
            queue: MessageQueue::new(queue_capacity),
            network_queue: Vec::new(),
            timers: TimerSet::new(),
            listeners: Listeners::default(),
            uids,
            clock: Clock::new(start_sim_time, time_scale),
            live: HashMap::new(),
            component_names: HashSet::new(),
            pending: PendingOps::default(),
            paused: false,
        }
    }

    // ── identity and registries ─────────────────────────────────

    /// Identity of the local machine.
    pub fn machine_info(&self) -> &Arc<MachineInfo> {
        self.factory.local_machine()
    }

    /// Whether `msg` was sent by this machine.
    pub fn is_local(&self, msg: &Message) -> bool {
        msg.source().id == self.machine_info().id
    }

    /// The message factory.
    pub fn factory(&self) -> &MessageFactory {
        &self.factory
    }

    /// Mutable message factory, for registering types.
    pub fn factory_mut(&mut self) -> &mut MessageFactory {
        &mut self.factory
    }

    /// The actor type registry.
    pub fn actor_types(&self) -> &ActorTypeRegistry {
        &self.actor_types
    }

    /// Mutable actor type registry.
    pub fn actor_types_mut(&mut self) -> &mut ActorTypeRegistry {
        &mut self.actor_types
    }

    /// Fresh actor GUID from the manager's id stream.
    pub fn next_actor_id(&mut self) -> ActorId {
        self.uids.next_actor_id()
    }

    /// Instantiate a local actor of a registered type under a fresh id.
    /// The actor is not added to the world.
    pub fn create_actor(&mut self, type_name: &str) -> Result<GameActor, GmError> {
        let id = self.uids.next_actor_id();
        self.actor_types.instantiate(type_name, id, false)
    }

    // ── clock ───────────────────────────────────────────────────

    /// Simulation time, in seconds.
    pub fn sim_time(&self) -> f64 {
        self.clock.sim_time
    }

    /// Accumulated real time, in seconds.
    pub fn real_time(&self) -> f64 {
        self.clock.real_time
    }

    /// Sim-time multiplier.
    pub fn time_scale(&self) -> f32 {
        self.clock.time_scale
    }

    /// Counter of the current (or last completed) step.
    pub fn current_tick(&self) -> TickId {
        self.clock.tick
    }

    /// Whether the manager is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Ask for the manager to pause or resume at the end of the step.
    pub fn request_pause(&mut self, paused: bool) {
        self.pending.pause = Some(paused);
    }

    /// Jump the sim clock and change the time scale. Announces
    /// `INFO_TIME_CHANGED`.
    pub fn change_time_settings(&mut self, sim_time: f64, time_scale: f32) -> Result<(), GmError> {
        validate_time_scale(time_scale)?;
        self.clock.sim_time = sim_time;
        self.clock.time_scale = time_scale;
        log::info!("time settings changed: sim_time={sim_time} scale={time_scale}");
        let mut msg = self.create_message(INFO_TIME_CHANGED)?;
        msg.set("RealTime", self.clock.real_time)?;
        msg.set("SimulationTime", sim_time)?;
        msg.set("TimeScale", time_scale)?;
        self.send_message(msg)
    }

    // ── messaging ───────────────────────────────────────────────

    /// New message of type `id`, time-stamped with the current sim time.
    pub fn create_message(&self, id: MessageTypeId) -> Result<Message, GmError> {
        let mut msg = self.factory.create(id)?;
        msg.set_timestamp(self.clock.sim_time);
        Ok(msg)
    }

    /// Queue a message for dispatch in the next step. Locally sourced
    /// messages are stamped with the current sim time.
    ///
    /// # Errors
    ///
    /// [`GmError::QueueFull`] when the queue is at capacity.
    pub fn send_message(&mut self, mut msg: Message) -> Result<(), GmError> {
        if self.is_local(&msg) {
            msg.set_timestamp(self.clock.sim_time);
        }
        match self.queue.push(msg) {
            Ok(_) => Ok(()),
            Err(QueueFull(msg)) => {
                log::warn!(
                    "message queue full, dropping {}",
                    self.factory.type_name(msg.message_type())
                );
                Err(GmError::QueueFull {
                    capacity: self.queue.capacity(),
                })
            }
        }
    }

    /// Queue a message for the network components. It is handed to every
    /// component's `dispatch_network_message` at the start of the next step.
    pub fn send_network_message(&mut self, mut msg: Message) {
        if self.is_local(&msg) {
            msg.set_timestamp(self.clock.sim_time);
        }
        self.network_queue.push(msg);
    }

    /// Answer `rejected` with `SERVER_REQUEST_REJECTED` addressed to its
    /// sender, carrying a copy of it as the causing message.
    pub fn reject_message(&mut self, rejected: &Message, reason: &str) -> Result<(), GmError> {
        let mut msg = self.create_message(SERVER_REQUEST_REJECTED)?;
        msg.set("Cause", reason)?;
        msg.set_destination(Some(Arc::clone(rejected.source())));
        msg.set_about_actor(rejected.about_actor());
        msg.set_causing_message(Some(self.factory.clone_message(rejected)?));
        log::debug!(
            "rejecting {} from {}: {reason}",
            self.factory.type_name(rejected.message_type()),
            rejected.source().name
        );
        if self.is_local(rejected) {
            self.send_message(msg)
        } else {
            self.send_network_message(msg);
            Ok(())
        }
    }

    /// Messages waiting for the next step.
    pub fn queued_messages(&self) -> usize {
        self.queue.len()
    }

    // ── actors ──────────────────────────────────────────────────

    /// Whether `id` names an actor in the world (including one added this
    /// step or pending deletion).
    pub fn is_actor_live(&self, id: ActorId) -> bool {
        self.live.contains_key(&id)
    }

    /// Whether `id` is a published local actor.
    pub fn is_published(&self, id: ActorId) -> bool {
        self.live.get(&id).is_some_and(|a| a.published)
    }

    /// Whether `id` is a remote mirror.
    pub fn is_remote_actor(&self, id: ActorId) -> bool {
        self.live.get(&id).is_some_and(|a| a.remote)
    }

    /// Add an actor to the world. It enters the world after the message
    /// currently being dispatched (immediately when called from outside a
    /// step). Local actors are announced with `INFO_ACTOR_CREATED`.
    ///
    /// # Errors
    ///
    /// [`GmError::NullActorId`] and [`GmError::DuplicateActor`].
    pub fn add_actor(&mut self, actor: GameActor) -> Result<ActorId, GmError> {
        let id = actor.id();
        if id.is_null() {
            return Err(GmError::NullActorId);
        }
        if self.live.contains_key(&id) {
            return Err(GmError::DuplicateActor { id });
        }
        let remote = actor.core().is_remote();
        if !remote {
            let msg = actor
                .core()
                .build_update_message(&self.factory, INFO_ACTOR_CREATED, None)?;
            self.send_message(msg)?;
        }
        self.live.insert(
            id,
            LiveActor {
                remote,
                published: false,
                pending_delete: false,
            },
        );
        log::debug!("actor {id} ({}) added", actor.core().actor_type().name());
        self.pending.actor_adds.push(actor);
        Ok(id)
    }

    /// Mark an actor for removal. Local actors are announced with
    /// `INFO_ACTOR_DELETED` and removed at the end of the step that
    /// dispatches that notice; remote mirrors are removed at the end of
    /// the current step. The actor stays addressable until then. Deleting
    /// an actor twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`GmError::ActorNotFound`], and [`GmError::QueueFull`] when the
    /// notice cannot be queued, in which case the actor is left untouched.
    pub fn delete_actor(&mut self, id: ActorId) -> Result<(), GmError> {
        let live = *self.live.get(&id).ok_or(GmError::ActorNotFound { id })?;
        if live.pending_delete {
            return Ok(());
        }
        if live.remote {
            self.pending.actor_deletes.push(id);
        } else {
            let mut msg = self.create_message(INFO_ACTOR_DELETED)?;
            msg.set_about_actor(Some(id));
            msg.set_sending_actor(Some(id));
            self.send_message(msg)?;
        }
        if let Some(live) = self.live.get_mut(&id) {
            live.pending_delete = true;
        }
        Ok(())
    }

    /// Schedule removal of a local actor once its own deletion notice has
    /// been dispatched.
    pub(crate) fn deletion_notice_dispatched(&mut self, msg: &Message) {
        if msg.message_type() != INFO_ACTOR_DELETED || !self.is_local(msg) {
            return;
        }
        let Some(id) = msg.about_actor() else {
            return;
        };
        if self
            .live
            .get(&id)
            .is_some_and(|a| a.pending_delete && !a.remote)
            && !self.pending.actor_deletes.contains(&id)
        {
            self.pending.actor_deletes.push(id);
        }
    }

    /// Make a local actor visible to remote peers. `INFO_ACTOR_PUBLISHED`
    /// is sent once the current dispatch finishes.
    ///
    /// # Errors
    ///
    /// [`GmError::ActorNotFound`] and [`GmError::ActorIsRemote`].
    pub fn publish_actor(&mut self, id: ActorId) -> Result<(), GmError> {
        let live = self
            .live
            .get_mut(&id)
            .ok_or(GmError::ActorNotFound { id })?;
        if live.remote {
            return Err(GmError::ActorIsRemote { id });
        }
        if !live.published {
            live.published = true;
            self.pending.publishes.push(id);
        }
        Ok(())
    }

    // ── listeners ───────────────────────────────────────────────

    /// Deliver every message of type `ty` to `listener`.
    ///
    /// # Errors
    ///
    /// [`GmError::InvalidSubscription`] for `TICK_END_OF_FRAME`, which is
    /// delivered to components only.
    pub fn register_for_messages(
        &mut self,
        ty: MessageTypeId,
        listener: ActorId,
    ) -> Result<(), GmError> {
        if ty == TICK_END_OF_FRAME {
            return Err(GmError::InvalidSubscription { type_id: ty });
        }
        self.listeners.register(ty, listener);
        Ok(())
    }

    /// Deliver messages of type `ty` about `about` to `listener`.
    pub fn register_for_messages_about_actor(
        &mut self,
        ty: MessageTypeId,
        about: ActorId,
        listener: ActorId,
    ) -> Result<(), GmError> {
        if ty == TICK_END_OF_FRAME {
            return Err(GmError::InvalidSubscription { type_id: ty });
        }
        self.listeners.register_about(ty, about, listener);
        Ok(())
    }

    /// Undo [`register_for_messages`](Self::register_for_messages).
    pub fn unregister_for_messages(&mut self, ty: MessageTypeId, listener: ActorId) -> bool {
        self.listeners.unregister(ty, listener)
    }

    /// Undo [`register_for_messages_about_actor`](Self::register_for_messages_about_actor).
    pub fn unregister_for_messages_about_actor(
        &mut self,
        ty: MessageTypeId,
        about: ActorId,
        listener: ActorId,
    ) -> bool {
        self.listeners.unregister_about(ty, about, listener)
    }

    // ── timers ──────────────────────────────────────────────────

    /// Arm a timer. When it fires, `INFO_TIMER_ELAPSED` is dispatched with
    /// `about` as its about-actor.
    pub fn set_timer(
        &mut self,
        name: &str,
        about: Option<ActorId>,
        seconds: f64,
        repeat: bool,
        clock: TimerClock,
    ) {
        let now = match clock {
            TimerClock::SimTime => self.clock.sim_time,
            TimerClock::RealTime => self.clock.real_time,
        };
        self.timers.set(name, about, seconds, repeat, clock, now);
    }

    /// Disarm a timer. Returns whether one was armed.
    pub fn clear_timer(&mut self, name: &str, about: Option<ActorId>) -> bool {
        self.timers.clear(name, about)
    }

    // ── components ──────────────────────────────────────────────

    /// Whether a component with `name` is registered or pending.
    pub fn has_component(&self, name: &str) -> bool {
        self.component_names.contains(name)
    }

    /// Register a component at the end of the step, at its declared
    /// priority.
    ///
    /// # Errors
    ///
    /// [`GmError::DuplicateComponent`] if the name is taken.
    pub fn queue_component_add(&mut self, component: Box<dyn GmComponent>) -> Result<(), GmError> {
        let name = component.name().to_string();
        if !self.component_names.insert(name.clone()) {
            return Err(GmError::DuplicateComponent { name });
        }
        let priority = component.priority();
        self.pending.component_adds.push((component, priority));
        Ok(())
    }

    /// Remove a component at the end of the step.
    ///
    /// # Errors
    ///
    /// [`GmError::ComponentNotFound`] if no component has that name.
    pub fn queue_component_remove(&mut self, name: &str) -> Result<(), GmError> {
        if !self.component_names.contains(name) {
            return Err(GmError::ComponentNotFound {
                name: name.to_string(),
            });
        }
        self.pending.component_removes.push(name.to_string());
        Ok(())
    }
}

impl std::fmt::Debug for GmCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmCore")
            .field("machine", &self.machine_info().name)
            .field("tick", &self.clock.tick)
            .field("sim_time", &self.clock.sim_time)
            .field("queued", &self.queue.len())
            .field("actors", &self.live.len())
            .finish()
    }
}

// ── GmContext ───────────────────────────────────────────────────────

/// What a component sees during a hook: the [`GmCore`] services plus a
/// read-only view of the actors in the world.
pub struct GmContext<'a> {
    core: &'a mut GmCore,
    actors: &'a ActorTable,
}

impl<'a> GmContext<'a> {
    pub(crate) fn new(core: &'a mut GmCore, actors: &'a ActorTable) -> Self {
        Self { core, actors }
    }

    /// Actors in the world, in entry order.
    pub fn actors(&self) -> &ActorTable {
        self.actors
    }

    /// Actor by id.
    pub fn actor(&self, id: ActorId) -> Option<&GameActor> {
        self.actors.get(id)
    }
}

impl Deref for GmContext<'_> {
    type Target = GmCore;

    fn deref(&self) -> &GmCore {
        self.core
    }
}

impl DerefMut for GmContext<'_> {
    fn deref_mut(&mut self) -> &mut GmCore {
        self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgm_core::builtin::{register_builtins, INFO_GAME_EVENT};
    use simgm_core::MachineId;

    fn core() -> GmCore {
        let mut c = GmCore::new(
            MachineInfo::new(MachineId(1), "local"),
            4,
            UidGenerator::seeded(7),
            0.0,
            1.0,
        );
        register_builtins(&mut c.factory).unwrap();
        c
    }

    // ── listener tests ──────────────────────────────────────────

    #[test]
    fn recipients_are_global_then_about_then_about_listeners() {
        let mut c = core();
        c.register_for_messages(INFO_GAME_EVENT, ActorId(1)).unwrap();
        c.register_for_messages(INFO_GAME_EVENT, ActorId(2)).unwrap();
        c.register_for_messages_about_actor(INFO_GAME_EVENT, ActorId(3), ActorId(4))
            .unwrap();
        c.register_for_messages_about_actor(INFO_GAME_EVENT, ActorId(3), ActorId(1))
            .unwrap();
        let mut msg = c.create_message(INFO_GAME_EVENT).unwrap();
        msg.set_about_actor(Some(ActorId(3)));
        let r = c.listeners.recipients(&msg);
        assert_eq!(r.as_slice(), [ActorId(1), ActorId(2), ActorId(3), ActorId(4)]);
    }

    #[test]
    fn end_of_frame_cannot_be_subscribed() {
        let mut c = core();
        assert!(matches!(
            c.register_for_messages(TICK_END_OF_FRAME, ActorId(1)),
            Err(GmError::InvalidSubscription { .. })
        ));
    }

    #[test]
    fn forget_actor_drops_its_subscriptions() {
        let mut c = core();
        c.register_for_messages(INFO_GAME_EVENT, ActorId(1)).unwrap();
        c.register_for_messages_about_actor(INFO_GAME_EVENT, ActorId(1), ActorId(2))
            .unwrap();
        c.listeners.forget_actor(ActorId(1));
        let mut msg = c.create_message(INFO_GAME_EVENT).unwrap();
        msg.set_about_actor(Some(ActorId(1)));
        assert_eq!(c.listeners.recipients(&msg).as_slice(), [ActorId(1)]);
    }

    // ── messaging tests ─────────────────────────────────────────

    #[test]
    fn send_message_reports_queue_full() {
        let mut c = core();
        for _ in 0..4 {
            let msg = c.create_message(INFO_GAME_EVENT).unwrap();
            c.send_message(msg).unwrap();
        }
        let msg = c.create_message(INFO_GAME_EVENT).unwrap();
        assert!(matches!(
            c.send_message(msg),
            Err(GmError::QueueFull { capacity: 4 })
        ));
    }

    // ── actor tests ─────────────────────────────────────────────

    fn with_local_actor(c: &mut GmCore, id: ActorId) {
        c.live.insert(
            id,
            LiveActor {
                remote: false,
                published: false,
                pending_delete: false,
            },
        );
    }

    #[test]
    fn delete_with_a_full_queue_leaves_the_actor() {
        let mut c = core();
        with_local_actor(&mut c, ActorId(8));
        for _ in 0..4 {
            let msg = c.create_message(INFO_GAME_EVENT).unwrap();
            c.send_message(msg).unwrap();
        }
        assert!(matches!(
            c.delete_actor(ActorId(8)),
            Err(GmError::QueueFull { .. })
        ));
        assert!(!c.live[&ActorId(8)].pending_delete);
        assert!(c.pending.actor_deletes.is_empty());

        c.queue.take_batch();
        c.delete_actor(ActorId(8)).unwrap();
        assert!(c.live[&ActorId(8)].pending_delete);
    }

    #[test]
    fn local_removal_waits_for_the_notice() {
        let mut c = core();
        with_local_actor(&mut c, ActorId(8));
        c.delete_actor(ActorId(8)).unwrap();
        assert!(c.pending.actor_deletes.is_empty());

        let batch = c.queue.take_batch();
        let notice = &batch[0].message;
        assert_eq!(notice.message_type(), INFO_ACTOR_DELETED);
        c.deletion_notice_dispatched(notice);
        c.deletion_notice_dispatched(notice);
        assert_eq!(c.pending.actor_deletes, [ActorId(8)]);
    }

    #[test]
    fn reject_message_attaches_the_cause() {
        let mut c = core();
        let req = c.create_message(INFO_GAME_EVENT).unwrap();
        c.reject_message(&req, "not allowed").unwrap();
        let batch = c.queue.take_batch();
        let reply = &batch[0].message;
        assert_eq!(reply.message_type(), SERVER_REQUEST_REJECTED);
        assert_eq!(reply.get("Cause").and_then(|v| v.as_str()), Some("not allowed"));
        assert_eq!(
            reply.causing_message().map(Message::message_type),
            Some(INFO_GAME_EVENT)
        );
        assert_eq!(reply.destination_id(), Some(MachineId(1)));
    }

    #[test]
    fn reject_of_remote_message_goes_to_the_network() {
        let mut c = core();
        let mut req = c.create_message(INFO_GAME_EVENT).unwrap();
        req.set_source(Arc::new(MachineInfo::new(MachineId(2), "peer")));
        c.reject_message(&req, "no").unwrap();
        assert!(c.queue.is_empty());
        assert_eq!(c.network_queue.len(), 1);
        assert_eq!(c.network_queue[0].destination_id(), Some(MachineId(2)));
    }

    #[test]
    fn bad_time_scale_is_rejected() {
        let mut c = core();
        assert!(matches!(
            c.change_time_settings(0.0, 0.0),
            Err(GmError::Config(_))
        ));
        c.change_time_settings(10.0, 2.0).unwrap();
        assert_eq!(c.sim_time(), 10.0);
        assert_eq!(c.time_scale(), 2.0);
    }
}
