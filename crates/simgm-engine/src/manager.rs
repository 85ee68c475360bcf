//! The game manager: lifecycle, component registry and the step loop.
//!
//! [`GameManager`] owns the actor table and the component list outright
//! and mutates them only from [`step`](GameManager::step) and its own
//! `&mut self` methods. Everything a hook can request is routed through
//! [`GmCore`] and applied at fixed points of the step:
//!
//! 1. Advance the clocks (the sim clock stays frozen while paused).
//! 2. Run every component's `pre_frame` hook.
//! 3. Hand the network queue to `dispatch_network_message`.
//! 4. Queue `INFO_TIMER_ELAPSED` for timers that came due, then take the
//!    whole message queue as this step's batch.
//! 5. Dispatch each message: components in priority order, then the
//!    interested actors. Actors added during a dispatch enter the world
//!    right after it.
//! 6. `TICK_LOCAL` and `TICK_REMOTE`: components, then actor ticks, then
//!    actor listeners. `TICK_END_OF_FRAME` goes to components only.
//! 7. Apply deferred actor removals, component adds and removals, and
//!    pause transitions.
//!
//! Anything sent during steps 5–7 is dispatched in the next step.

use std::fmt;
use std::mem;
use std::sync::Arc;
use std::time::Instant;

use simgm_core::builtin::{
    register_builtins, INFO_ACTOR_CREATED, INFO_ACTOR_PUBLISHED, INFO_PAUSED, INFO_RESUMED,
    INFO_TIMER_ELAPSED, TICK_END_OF_FRAME, TICK_LOCAL, TICK_REMOTE,
};
use simgm_core::{
    ActorId, MachineId, MachineInfo, Message, MessageType, MessageTypeId, PrototypeBuilder,
    TickId, UidGenerator,
};

use crate::actor::{ActorTable, GameActor, TickInfo};
use crate::component::{ComponentPriority, GmComponent};
use crate::config::GameManagerConfig;
use crate::context::{GmContext, GmCore};
use crate::error::GmError;
use crate::metrics::StepMetrics;
use crate::property::ActorType;
use crate::timer::TimerClock;

// ── GmState ─────────────────────────────────────────────────────────

/// Lifecycle state of a [`GameManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GmState {
    /// Not configured. Only `configure` is accepted.
    Stopped,
    /// Configured; components and actors may be added.
    Configured,
    /// Stepping.
    Running,
    /// Stepping with the sim clock frozen.
    Paused,
}

impl fmt::Display for GmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GmState::Stopped => "stopped",
            GmState::Configured => "configured",
            GmState::Running => "running",
            GmState::Paused => "paused",
        })
    }
}

/// Outcome of one successful [`GameManager::step`].
#[derive(Clone, Debug)]
pub struct StepReport {
    /// Counter of the step that ran.
    pub tick: TickId,
    /// Actors removed at the end of the step, in removal order.
    pub removed_actors: Vec<ActorId>,
    /// Timings and counters.
    pub metrics: StepMetrics,
}

struct ComponentSlot {
    component: Box<dyn GmComponent>,
    priority: ComponentPriority,
}

// ── GameManager ─────────────────────────────────────────────────────

/// The per-process simulation kernel.
pub struct GameManager {
    state: GmState,
    config: GameManagerConfig,
    core: GmCore,
    actors: ActorTable,
    components: Vec<ComponentSlot>,
}

impl GameManager {
    /// Build a stopped game manager. Message types may be registered
    /// before [`configure`](Self::configure).
    ///
    /// # Errors
    ///
    /// [`GmError::Config`] if the configuration does not validate.
    pub fn new(config: GameManagerConfig) -> Result<Self, GmError> {
        config.validate()?;
        let uids = match config.id_seed {
            Some(seed) => UidGenerator::seeded(seed),
            None => UidGenerator::from_os(),
        };
        let mut core = GmCore::new(
            MachineInfo::new(MachineId::NULL, config.machine_name.clone()),
            config.max_queued_messages,
            uids,
            config.start_sim_time,
            config.time_scale,
        );
        register_builtins(&mut core.factory)?;
        Ok(Self {
            state: GmState::Stopped,
            config,
            core,
            actors: ActorTable::default(),
            components: Vec::new(),
        })
    }

    /// Lifecycle state.
    pub fn state(&self) -> GmState {
        self.state
    }

    /// Startup configuration.
    pub fn config(&self) -> &GameManagerConfig {
        &self.config
    }

    /// The services shared with hooks.
    pub fn core(&self) -> &GmCore {
        &self.core
    }

    /// Mutable access to the services shared with hooks.
    pub fn core_mut(&mut self) -> &mut GmCore {
        &mut self.core
    }

    /// A component-style context, for driving [`GmCore`] operations and
    /// reading the actor table from outside a step.
    pub fn context(&mut self) -> GmContext<'_> {
        GmContext::new(&mut self.core, &self.actors)
    }

    /// Identity of the local machine.
    pub fn machine_info(&self) -> &Arc<MachineInfo> {
        self.core.machine_info()
    }

    fn require(&self, op: &'static str, ok: &[GmState]) -> Result<(), GmError> {
        if ok.contains(&self.state) {
            Ok(())
        } else {
            Err(GmError::InvalidState {
                op,
                state: self.state,
            })
        }
    }

    // ── lifecycle ───────────────────────────────────────────────

    /// Establish the local machine identity and start from empty actor and
    /// component tables.
    ///
    /// # Errors
    ///
    /// [`GmError::AlreadyConfigured`] unless the manager is stopped.
    pub fn configure(&mut self) -> Result<(), GmError> {
        if self.state != GmState::Stopped {
            return Err(GmError::AlreadyConfigured);
        }
        let mut local = MachineInfo::new(
            self.core.uids.next_machine_id(),
            self.config.machine_name.clone(),
        );
        local.host_name = self.config.host_name.clone();
        local.ip_address = self.config.ip_address.clone();
        local.port = self.config.port;
        self.core.factory.set_local_machine(local);
        register_builtins(&mut self.core.factory)?;
        self.reset_tables();
        self.state = GmState::Configured;
        log::info!(
            "game manager configured as {} ({})",
            self.config.machine_name,
            self.machine_info().id
        );
        Ok(())
    }

    /// Begin stepping.
    pub fn start(&mut self) -> Result<(), GmError> {
        self.require("start", &[GmState::Configured])?;
        self.state = GmState::Running;
        log::info!("game manager running");
        Ok(())
    }

    /// Pause or resume. The sim clock is frozen while paused; steps still
    /// run so that messages keep flowing. Announces `INFO_PAUSED` or
    /// `INFO_RESUMED` when the state changes.
    pub fn set_paused(&mut self, paused: bool) -> Result<(), GmError> {
        self.require("pause", &[GmState::Running, GmState::Paused])?;
        let next = if paused {
            GmState::Paused
        } else {
            GmState::Running
        };
        if next == self.state {
            return Ok(());
        }
        self.state = next;
        self.core.paused = paused;
        let msg = self
            .core
            .create_message(if paused { INFO_PAUSED } else { INFO_RESUMED })?;
        self.core.send_message(msg)?;
        log::info!("game manager {}", self.state);
        Ok(())
    }

    /// Whether the manager is paused.
    pub fn is_paused(&self) -> bool {
        self.state == GmState::Paused
    }

    /// Remove every component and actor and return to
    /// [`GmState::Stopped`]. Idempotent.
    pub fn shutdown(&mut self) {
        if self.state == GmState::Stopped {
            return;
        }
        for mut slot in mem::take(&mut self.components) {
            let mut ctx = GmContext::new(&mut self.core, &self.actors);
            slot.component.on_removed_from_gm(&mut ctx);
        }
        for mut actor in self.actors.drain() {
            actor.leave_world(&mut self.core);
        }
        self.reset_tables();
        self.state = GmState::Stopped;
        log::info!("game manager stopped");
    }

    fn reset_tables(&mut self) {
        self.components.clear();
        self.actors = ActorTable::default();
        self.core.live.clear();
        self.core.listeners = Default::default();
        self.core.timers = Default::default();
        self.core.pending = Default::default();
        self.core.component_names.clear();
        self.core.queue.clear();
        self.core.network_queue.clear();
        self.core.paused = false;
    }

    // ── registries ──────────────────────────────────────────────

    /// Register a message type with the factory.
    pub fn register_message_type(
        &mut self,
        ty: MessageType,
        builder: PrototypeBuilder,
    ) -> Result<(), GmError> {
        self.core.factory.register(ty, builder)?;
        Ok(())
    }

    /// Register an actor type.
    pub fn register_actor_type(&mut self, ty: Arc<ActorType>) -> Result<(), GmError> {
        self.core.actor_types.register(ty)
    }

    /// Instantiate a local actor of a registered type under a fresh id.
    pub fn create_actor(&mut self, type_name: &str) -> Result<GameActor, GmError> {
        self.core.create_actor(type_name)
    }

    // ── components ──────────────────────────────────────────────

    /// Register a component at its declared priority.
    pub fn add_component(&mut self, component: Box<dyn GmComponent>) -> Result<(), GmError> {
        let priority = component.priority();
        self.add_component_with_priority(component, priority)
    }

    /// Register a component at an explicit priority.
    ///
    /// # Errors
    ///
    /// [`GmError::DuplicateComponent`] if the name is taken (the existing
    /// registration is untouched), [`GmError::ComponentInit`] if its
    /// `on_added_to_gm` hook fails, and [`GmError::InvalidState`] while
    /// stopped.
    pub fn add_component_with_priority(
        &mut self,
        mut component: Box<dyn GmComponent>,
        priority: ComponentPriority,
    ) -> Result<(), GmError> {
        self.require(
            "add a component",
            &[GmState::Configured, GmState::Running, GmState::Paused],
        )?;
        let name = component.name().to_string();
        if self.core.component_names.contains(&name) {
            return Err(GmError::DuplicateComponent { name });
        }
        let mut ctx = GmContext::new(&mut self.core, &self.actors);
        component
            .on_added_to_gm(&mut ctx)
            .map_err(|source| GmError::ComponentInit {
                name: name.clone(),
                source,
            })?;
        self.core.component_names.insert(name.clone());
        self.insert_component(component, priority);
        log::info!("component {name:?} added at priority {}", priority.order_id());
        Ok(())
    }

    fn insert_component(&mut self, component: Box<dyn GmComponent>, priority: ComponentPriority) {
        let at = self
            .components
            .iter()
            .position(|s| s.priority.order_id() > priority.order_id())
            .unwrap_or(self.components.len());
        self.components.insert(
            at,
            ComponentSlot {
                component,
                priority,
            },
        );
    }

    /// Unregister a component and hand it back.
    ///
    /// # Errors
    ///
    /// [`GmError::ComponentNotFound`] if no component has that name.
    pub fn remove_component(&mut self, name: &str) -> Result<Box<dyn GmComponent>, GmError> {
        let idx = self
            .components
            .iter()
            .position(|s| s.component.name() == name)
            .ok_or_else(|| GmError::ComponentNotFound {
                name: name.to_string(),
            })?;
        let mut slot = self.components.remove(idx);
        self.core.component_names.remove(name);
        let mut ctx = GmContext::new(&mut self.core, &self.actors);
        slot.component.on_removed_from_gm(&mut ctx);
        log::info!("component {name:?} removed");
        Ok(slot.component)
    }

    /// Component by name.
    pub fn component(&self, name: &str) -> Option<&dyn GmComponent> {
        self.components
            .iter()
            .find(|s| s.component.name() == name)
            .map(|s| &*s.component)
    }

    /// Component by name, downcast to its concrete type.
    pub fn component_as<T: GmComponent>(&self, name: &str) -> Option<&T> {
        self.component(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
    }

    /// Mutable component by name, downcast to its concrete type.
    pub fn component_as_mut<T: GmComponent>(&mut self, name: &str) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find(|s| s.component.name() == name)
            .and_then(|s| (*s.component).as_any_mut().downcast_mut::<T>())
    }

    /// Registered component names in dispatch order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|s| s.component.name())
    }

    // ── actors ──────────────────────────────────────────────────

    /// Add an actor to the world immediately.
    pub fn add_actor(&mut self, actor: GameActor) -> Result<ActorId, GmError> {
        self.require(
            "add an actor",
            &[GmState::Configured, GmState::Running, GmState::Paused],
        )?;
        let id = self.core.add_actor(actor)?;
        self.apply_pending_actor_ops()?;
        Ok(id)
    }

    /// Mark an actor for removal at the end of the next step.
    pub fn delete_actor(&mut self, id: ActorId) -> Result<(), GmError> {
        self.core.delete_actor(id)
    }

    /// Publish a local actor to remote peers.
    pub fn publish_actor(&mut self, id: ActorId) -> Result<(), GmError> {
        self.core.publish_actor(id)?;
        self.apply_pending_actor_ops()?;
        Ok(())
    }

    /// Actor by id.
    pub fn actor(&self, id: ActorId) -> Option<&GameActor> {
        self.actors.get(id)
    }

    /// Mutable actor by id.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut GameActor> {
        self.actors.get_mut(id)
    }

    /// The actors in the world.
    pub fn actors(&self) -> &ActorTable {
        &self.actors
    }

    // ── messaging shortcuts ─────────────────────────────────────

    /// See [`GmCore::create_message`].
    pub fn create_message(&self, id: MessageTypeId) -> Result<Message, GmError> {
        self.core.create_message(id)
    }

    /// See [`GmCore::send_message`].
    pub fn send_message(&mut self, msg: Message) -> Result<(), GmError> {
        self.core.send_message(msg)
    }

    /// See [`GmCore::send_network_message`].
    pub fn send_network_message(&mut self, msg: Message) {
        self.core.send_network_message(msg)
    }

    /// See [`GmCore::set_timer`].
    pub fn set_timer(
        &mut self,
        name: &str,
        about: Option<ActorId>,
        seconds: f64,
        repeat: bool,
        clock: TimerClock,
    ) {
        self.core.set_timer(name, about, seconds, repeat, clock)
    }

    /// See [`GmCore::clear_timer`].
    pub fn clear_timer(&mut self, name: &str, about: Option<ActorId>) -> bool {
        self.core.clear_timer(name, about)
    }

    // ── step ────────────────────────────────────────────────────

    /// Run one step. `delta_sim` is scaled by the time scale and ignored
    /// while paused.
    ///
    /// Component failures are logged and counted. An actor handler failure
    /// aborts the step with [`GmError::ActorHandler`]; messages of the
    /// batch that were not yet dispatched are put back at the head of the
    /// queue.
    pub fn step(&mut self, delta_sim: f32, delta_real: f32) -> Result<StepReport, GmError> {
        self.require("step", &[GmState::Running, GmState::Paused])?;
        let start = Instant::now();
        let mut metrics = StepMetrics::default();

        let scaled = if self.is_paused() {
            0.0
        } else {
            delta_sim * self.core.clock.time_scale
        };
        self.core.clock.advance(scaled, delta_real);
        let info = TickInfo {
            tick: self.core.clock.tick,
            delta_sim: scaled,
            delta_real,
            sim_time: self.core.clock.sim_time,
            time_scale: self.core.clock.time_scale,
        };

        // Pre-frame hooks may still inject into this step.
        let pre_start = Instant::now();
        for slot in &mut self.components {
            let mut ctx = GmContext::new(&mut self.core, &self.actors);
            if let Err(e) = slot.component.pre_frame(&mut ctx) {
                log::warn!("component {:?} failed in pre_frame: {e}", slot.component.name());
                metrics.component_faults += 1;
            }
        }
        metrics.pre_frame_us = pre_start.elapsed().as_micros() as u64;

        let dispatch_start = Instant::now();
        for msg in mem::take(&mut self.core.network_queue) {
            for slot in &mut self.components {
                let mut ctx = GmContext::new(&mut self.core, &self.actors);
                if let Err(e) = slot.component.dispatch_network_message(&msg, &mut ctx) {
                    log::warn!(
                        "component {:?} failed sending {} to the network: {e}",
                        slot.component.name(),
                        self.core.factory.type_name(msg.message_type())
                    );
                    metrics.component_faults += 1;
                }
            }
            metrics.network_messages_dispatched += 1;
        }

        self.fire_timers(&mut metrics)?;

        let mut batch = self.core.queue.take_batch().into_iter();
        while let Some(queued) = batch.next() {
            let result = self
                .dispatch(&queued.message, &mut metrics)
                .and_then(|()| self.apply_pending_actor_ops());
            match result {
                Ok(added) => metrics.actors_added += added,
                Err(e) => {
                    self.core.queue.requeue_front(batch.collect());
                    return Err(e);
                }
            }
        }

        for ty in [TICK_LOCAL, TICK_REMOTE, TICK_END_OF_FRAME] {
            metrics.actors_added += self.dispatch_tick(ty, &info, &mut metrics)?;
        }
        metrics.dispatch_us = dispatch_start.elapsed().as_micros() as u64;

        let removal_start = Instant::now();
        let removed_actors = self.apply_removals();
        metrics.actors_added += self.apply_pending_actor_ops()?;
        metrics.actors_removed = removed_actors.len() as u32;
        metrics.removal_us = removal_start.elapsed().as_micros() as u64;

        self.apply_component_ops();
        if let Some(paused) = self.core.pending.pause.take() {
            self.set_paused(paused)?;
        }

        metrics.queue_depth = self.core.queue.len();
        metrics.queue_full_rejections = self.core.queue.rejected();
        metrics.total_us = start.elapsed().as_micros() as u64;
        Ok(StepReport {
            tick: info.tick,
            removed_actors,
            metrics,
        })
    }

    fn fire_timers(&mut self, metrics: &mut StepMetrics) -> Result<(), GmError> {
        let fired = self
            .core
            .timers
            .expire(self.core.clock.sim_time, self.core.clock.real_time);
        for timer in fired {
            let mut msg = self.core.create_message(INFO_TIMER_ELAPSED)?;
            msg.set("TimerName", timer.name.as_str())?;
            msg.set("LateTime", timer.late as f32)?;
            msg.set_about_actor(timer.about);
            match self.core.send_message(msg) {
                Ok(()) => metrics.timers_fired += 1,
                Err(e) => log::warn!("timer {:?} dropped: {e}", timer.name),
            }
        }
        Ok(())
    }

    fn dispatch_to_components(&mut self, msg: &Message, metrics: &mut StepMetrics) {
        for slot in &mut self.components {
            let mut ctx = GmContext::new(&mut self.core, &self.actors);
            if let Err(e) = slot.component.process_message(msg, &mut ctx) {
                log::warn!(
                    "component {:?} failed on {}: {e}",
                    slot.component.name(),
                    self.core.factory.type_name(msg.message_type())
                );
                metrics.component_faults += 1;
            }
        }
    }

    fn deliver_to_listeners(&mut self, msg: &Message) -> Result<(), GmError> {
        for id in self.core.listeners.recipients(msg) {
            let Some(actor) = self.actors.get_mut(id) else {
                continue;
            };
            actor
                .deliver(msg, &mut self.core)
                .map_err(|source| GmError::ActorHandler {
                    actor: id,
                    message_type: msg.message_type(),
                    source,
                })?;
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: &Message, metrics: &mut StepMetrics) -> Result<(), GmError> {
        log::trace!(
            "dispatching {} from {}",
            self.core.factory.type_name(msg.message_type()),
            msg.source().name
        );
        self.dispatch_to_components(msg, metrics);
        metrics.messages_dispatched += 1;
        let delivered = self.deliver_to_listeners(msg);
        self.core.deletion_notice_dispatched(msg);
        delivered
    }

    fn dispatch_tick(
        &mut self,
        ty: MessageTypeId,
        info: &TickInfo,
        metrics: &mut StepMetrics,
    ) -> Result<u32, GmError> {
        let mut msg = self.core.create_message(ty)?;
        msg.set("DeltaSimTime", info.delta_sim)?;
        msg.set("DeltaRealTime", info.delta_real)?;
        msg.set("SimTimeScale", info.time_scale)?;
        msg.set("SimulationTime", info.sim_time)?;
        self.dispatch_to_components(&msg, metrics);
        if ty == TICK_END_OF_FRAME {
            return Ok(0);
        }

        let remote = ty == TICK_REMOTE;
        let ids: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|a| a.core().is_remote() == remote)
            .map(GameActor::id)
            .collect();
        for id in ids {
            let Some(actor) = self.actors.get_mut(id) else {
                continue;
            };
            actor
                .tick(info, &mut self.core)
                .map_err(|source| GmError::ActorHandler {
                    actor: id,
                    message_type: ty,
                    source,
                })?;
        }
        self.deliver_to_listeners(&msg)?;
        self.apply_pending_actor_ops()
    }

    /// Bring pending actors into the world and announce pending publishes.
    /// Returns the number of actors added.
    fn apply_pending_actor_ops(&mut self) -> Result<u32, GmError> {
        let mut added = 0;
        while !self.core.pending.actor_adds.is_empty() {
            let mut adds = mem::take(&mut self.core.pending.actor_adds).into_iter();
            while let Some(mut actor) = adds.next() {
                let id = actor.id();
                let entered = actor.enter_world(&mut self.core);
                self.actors.insert(actor);
                added += 1;
                if let Err(source) = entered {
                    self.core.pending.actor_adds.extend(adds);
                    return Err(GmError::ActorHandler {
                        actor: id,
                        message_type: INFO_ACTOR_CREATED,
                        source,
                    });
                }
            }
        }
        for id in mem::take(&mut self.core.pending.publishes) {
            let Some(actor) = self.actors.get(id) else {
                continue;
            };
            let msg =
                actor
                    .core()
                    .build_update_message(&self.core.factory, INFO_ACTOR_PUBLISHED, None)?;
            self.core.send_message(msg)?;
            log::debug!("actor {id} published");
        }
        Ok(added)
    }

    /// Remove actors marked for deletion. Removal hooks may delete more
    /// actors; those are handled in further passes, up to the configured
    /// limit.
    fn apply_removals(&mut self) -> Vec<ActorId> {
        let mut removed = Vec::new();
        for _ in 0..self.config.max_removal_passes {
            let ids = mem::take(&mut self.core.pending.actor_deletes);
            if ids.is_empty() {
                break;
            }
            for id in ids {
                self.core.live.remove(&id);
                self.core.timers.clear_about(id);
                self.core.listeners.forget_actor(id);
                if let Some(mut actor) = self.actors.remove(id) {
                    actor.leave_world(&mut self.core);
                    removed.push(id);
                    log::debug!("actor {id} removed from the world");
                }
            }
        }
        let carried = self.core.pending.actor_deletes.len();
        if carried > 0 {
            log::warn!("{carried} actor removals carried over to the next step");
        }
        removed
    }

    fn apply_component_ops(&mut self) {
        for name in mem::take(&mut self.core.pending.component_removes) {
            if let Err(e) = self.remove_component(&name) {
                log::warn!("deferred removal of component {name:?} failed: {e}");
            }
        }
        for (mut component, priority) in mem::take(&mut self.core.pending.component_adds) {
            let name = component.name().to_string();
            let mut ctx = GmContext::new(&mut self.core, &self.actors);
            match component.on_added_to_gm(&mut ctx) {
                Ok(()) => {
                    self.insert_component(component, priority);
                    log::info!("component {name:?} added at priority {}", priority.order_id());
                }
                Err(e) => {
                    self.core.component_names.remove(&name);
                    log::warn!("component {name:?} failed to initialise: {e}");
                }
            }
        }
    }
}

impl fmt::Debug for GameManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameManager")
            .field("state", &self.state)
            .field("core", &self.core)
            .field(
                "components",
                &self.component_names().collect::<Vec<_>>(),
            )
            .finish()
    }
}
