//! Game actors, their property bags and attached actor components.
//!
//! A [`GameActor`] is owned by the game manager's actor table. Its
//! [`ActorCore`] carries identity and properties; its components carry
//! behaviour. Hooks on [`ActorComponent`] receive the actor core and the
//! [`GmCore`] services, never the game manager itself, so an actor cannot
//! reach into the actor table while it is being dispatched to.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use simgm_core::builtin::INFO_ACTOR_UPDATED;
use simgm_core::{
    ActorId, Message, MessageFactory, MessageParameter, MessageTypeId, ParamGroup, ParamValue,
    TickId,
};

use crate::component::{AsAny, ComponentResult};
use crate::context::GmCore;
use crate::error::{ActorError, BoxError, GmError};
use crate::property::ActorType;

/// Parameter carrying the property group of an actor update message.
pub const UPDATED_PROPERTIES: &str = "UpdatedProperties";

/// Timing of the step an actor is being ticked in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickInfo {
    /// Step counter.
    pub tick: TickId,
    /// Scaled sim-time delta, in seconds. Zero while paused.
    pub delta_sim: f32,
    /// Real-time delta, in seconds.
    pub delta_real: f32,
    /// Sim time after this step's advance.
    pub sim_time: f64,
    /// Current time scale.
    pub time_scale: f32,
}

/// Lifecycle state of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActorState {
    /// Constructed, not yet added to a game manager.
    Created,
    /// In the world: ticking and visible to lookups.
    InWorld,
    /// Removed from the world. Property access fails.
    Removed,
}

// ── ActorCore ───────────────────────────────────────────────────────

/// Identity and property bag of an actor.
pub struct ActorCore {
    id: ActorId,
    name: String,
    ty: Arc<ActorType>,
    remote: bool,
    state: ActorState,
    properties: IndexMap<String, MessageParameter>,
}

impl ActorCore {
    fn new(id: ActorId, ty: Arc<ActorType>, remote: bool) -> Self {
        let properties = ty
            .properties()
            .map(|def| {
                (
                    def.name.clone(),
                    MessageParameter::with_value(def.name.clone(), def.default.clone()),
                )
            })
            .collect();
        Self {
            id,
            name: ty.name().to_string(),
            ty,
            remote,
            state: ActorState::Created,
            properties,
        }
    }

    /// Actor id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Display name. Defaults to the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the actor.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Type descriptor.
    pub fn actor_type(&self) -> &Arc<ActorType> {
        &self.ty
    }

    /// Whether this is a mirror of an actor owned by another machine.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Lifecycle state.
    pub fn state(&self) -> ActorState {
        self.state
    }

    /// Whether the actor is in the world.
    pub fn is_in_world(&self) -> bool {
        self.state == ActorState::InWorld
    }

    fn check_live(&self) -> Result<(), ActorError> {
        if self.state == ActorState::Removed {
            return Err(ActorError::InvalidState { id: self.id });
        }
        Ok(())
    }

    /// Current value of a property.
    ///
    /// # Errors
    ///
    /// [`ActorError::InvalidState`] after removal and
    /// [`ActorError::UnknownProperty`] for undeclared names.
    pub fn property(&self, name: &str) -> Result<&ParamValue, ActorError> {
        self.check_live()?;
        self.properties
            .get(name)
            .map(MessageParameter::value)
            .ok_or_else(|| ActorError::UnknownProperty {
                name: name.to_string(),
            })
    }

    /// Assign a property, type-checked against the actor type's schema.
    ///
    /// # Errors
    ///
    /// [`ActorError::InvalidState`] after removal,
    /// [`ActorError::UnknownProperty`], [`ActorError::ReadOnlyProperty`],
    /// and [`ActorError::Param`] on a type mismatch.
    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<ParamValue>,
    ) -> Result<(), ActorError> {
        self.check_live()?;
        let def = self
            .ty
            .property(name)
            .ok_or_else(|| ActorError::UnknownProperty {
                name: name.to_string(),
            })?;
        if def.read_only {
            return Err(ActorError::ReadOnlyProperty {
                name: name.to_string(),
            });
        }
        let param = self
            .properties
            .get_mut(name)
            .ok_or_else(|| ActorError::UnknownProperty {
                name: name.to_string(),
            })?;
        param.set(value)?;
        Ok(())
    }

    /// All properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &MessageParameter> {
        self.properties.values()
    }

    /// Build an actor-update style message (`INFO_ACTOR_CREATED`,
    /// `INFO_ACTOR_UPDATED`, `INFO_ACTOR_PUBLISHED`) describing this actor.
    ///
    /// `only` restricts the property group to the listed names; `None`
    /// includes every property.
    pub fn build_update_message(
        &self,
        factory: &MessageFactory,
        type_id: MessageTypeId,
        only: Option<&[&str]>,
    ) -> Result<Message, GmError> {
        let mut msg = factory.create(type_id)?;
        msg.set("Name", self.name.as_str())?;
        msg.set("ActorTypeName", self.ty.name())?;
        msg.set("ActorTypeCategory", self.ty.category())?;
        let mut group = ParamGroup::new();
        for p in self.properties.values() {
            if only.is_some_and(|names| !names.contains(&p.name())) {
                continue;
            }
            group.insert(p.name().to_string(), p.clone());
        }
        msg.set(UPDATED_PROPERTIES, ParamValue::Group(group))?;
        msg.set_about_actor(Some(self.id));
        msg.set_sending_actor(Some(self.id));
        Ok(msg)
    }

    /// Write the property group of an update message into this actor.
    ///
    /// Read-only properties are written too: updates come from the owning
    /// machine. Undeclared names and values of the wrong type are skipped.
    /// Returns the number of properties written.
    pub fn apply_update(&mut self, msg: &Message) -> Result<usize, ActorError> {
        self.check_live()?;
        if let Some(name) = msg.get("Name").and_then(ParamValue::as_str) {
            if !name.is_empty() {
                self.name = name.to_string();
            }
        }
        let Some(group) = msg.get(UPDATED_PROPERTIES).and_then(ParamValue::as_group) else {
            return Ok(0);
        };
        let mut written = 0;
        for incoming in group.values() {
            match self.properties.get_mut(incoming.name()) {
                Some(p) => match p.set(incoming.value().clone()) {
                    Ok(()) => written += 1,
                    Err(e) => log::warn!("actor {}: skipping update: {e}", self.id),
                },
                None => log::trace!(
                    "actor {}: ignoring undeclared property {:?}",
                    self.id,
                    incoming.name()
                ),
            }
        }
        Ok(written)
    }
}

impl fmt::Debug for ActorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.ty.name())
            .field("remote", &self.remote)
            .field("state", &self.state)
            .finish()
    }
}

// ── ActorComponent ──────────────────────────────────────────────────

/// A behaviour unit attached to one actor, at most one per key.
///
/// All hooks default to doing nothing. Errors returned from hooks are actor
/// handler failures and abort the current step.
pub trait ActorComponent: AsAny + Send + 'static {
    /// Component-type key, unique per actor.
    fn key(&self) -> &'static str;

    /// The actor entered the world.
    fn on_enter_world(&mut self, _actor: &mut ActorCore, _gm: &mut GmCore) -> ComponentResult {
        Ok(())
    }

    /// The actor is leaving the world.
    fn on_removed_from_world(&mut self, _actor: &mut ActorCore, _gm: &mut GmCore) {}

    /// Per-step tick for a locally owned actor.
    fn on_tick_local(
        &mut self,
        _actor: &mut ActorCore,
        _tick: &TickInfo,
        _gm: &mut GmCore,
    ) -> ComponentResult {
        Ok(())
    }

    /// Per-step tick for a remote mirror.
    fn on_tick_remote(
        &mut self,
        _actor: &mut ActorCore,
        _tick: &TickInfo,
        _gm: &mut GmCore,
    ) -> ComponentResult {
        Ok(())
    }

    /// A message addressed to, or subscribed to by, the actor.
    fn process_message(
        &mut self,
        _actor: &mut ActorCore,
        _msg: &Message,
        _gm: &mut GmCore,
    ) -> ComponentResult {
        Ok(())
    }
}

// ── GameActor ───────────────────────────────────────────────────────

/// An actor: identity, properties and components.
pub struct GameActor {
    core: ActorCore,
    components: IndexMap<&'static str, Box<dyn ActorComponent>>,
}

impl GameActor {
    /// New actor of type `ty` with no components. Use
    /// [`ActorTypeRegistry::instantiate`](crate::ActorTypeRegistry::instantiate)
    /// to get the type's components attached.
    pub fn new(id: ActorId, ty: Arc<ActorType>, remote: bool) -> Self {
        Self {
            core: ActorCore::new(id, ty, remote),
            components: IndexMap::new(),
        }
    }

    /// Actor id.
    pub fn id(&self) -> ActorId {
        self.core.id
    }

    /// Identity and properties.
    pub fn core(&self) -> &ActorCore {
        &self.core
    }

    /// Mutable identity and properties.
    pub fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    /// Attach a component.
    ///
    /// # Errors
    ///
    /// [`ActorError::DuplicateActorComponent`] if a component with the same
    /// key is attached.
    pub fn add_component(&mut self, component: Box<dyn ActorComponent>) -> Result<(), ActorError> {
        let key = component.key();
        if self.components.contains_key(key) {
            return Err(ActorError::DuplicateActorComponent { key });
        }
        self.components.insert(key, component);
        Ok(())
    }

    /// Detach and return a component.
    pub fn remove_component(&mut self, key: &str) -> Option<Box<dyn ActorComponent>> {
        self.components.shift_remove(key)
    }

    /// Whether a component with `key` is attached.
    pub fn has_component(&self, key: &str) -> bool {
        self.components.contains_key(key)
    }

    /// Keys of attached components in attach order.
    pub fn component_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.components.keys().copied()
    }

    /// First attached component of concrete type `T`.
    pub fn component<T: ActorComponent>(&self) -> Option<&T> {
        self.components
            .values()
            .find_map(|c| (**c).as_any().downcast_ref::<T>())
    }

    /// Mutable access to the first attached component of type `T`.
    pub fn component_mut<T: ActorComponent>(&mut self) -> Option<&mut T> {
        self.components
            .values_mut()
            .find_map(|c| (**c).as_any_mut().downcast_mut::<T>())
    }

    pub(crate) fn enter_world(&mut self, gm: &mut GmCore) -> Result<(), BoxError> {
        self.core.state = ActorState::InWorld;
        for c in self.components.values_mut() {
            c.on_enter_world(&mut self.core, gm)?;
        }
        Ok(())
    }

    pub(crate) fn leave_world(&mut self, gm: &mut GmCore) {
        for c in self.components.values_mut() {
            c.on_removed_from_world(&mut self.core, gm);
        }
        self.core.state = ActorState::Removed;
    }

    pub(crate) fn tick(&mut self, info: &TickInfo, gm: &mut GmCore) -> Result<(), BoxError> {
        for c in self.components.values_mut() {
            if self.core.remote {
                c.on_tick_remote(&mut self.core, info, gm)?;
            } else {
                c.on_tick_local(&mut self.core, info, gm)?;
            }
        }
        Ok(())
    }

    /// Hand a message to the actor. Updates about a remote mirror that come
    /// from another machine are applied to the property bag first.
    pub(crate) fn deliver(&mut self, msg: &Message, gm: &mut GmCore) -> Result<(), BoxError> {
        if self.core.remote
            && msg.message_type() == INFO_ACTOR_UPDATED
            && msg.about_actor() == Some(self.core.id)
            && msg.source().id != gm.machine_info().id
        {
            self.core.apply_update(msg)?;
        }
        for c in self.components.values_mut() {
            c.process_message(&mut self.core, msg, gm)?;
        }
        Ok(())
    }
}

impl fmt::Debug for GameActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameActor")
            .field("core", &self.core)
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── ActorTable ──────────────────────────────────────────────────────

/// The actors in the world, in the order they entered it.
#[derive(Debug, Default)]
pub struct ActorTable {
    actors: IndexMap<ActorId, GameActor>,
}

impl ActorTable {
    /// Actor by id.
    pub fn get(&self, id: ActorId) -> Option<&GameActor> {
        self.actors.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ActorId) -> Option<&mut GameActor> {
        self.actors.get_mut(&id)
    }

    /// Whether an actor with `id` is in the table.
    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// All actors in entry order.
    pub fn iter(&self) -> impl Iterator<Item = &GameActor> {
        self.actors.values()
    }

    /// Ids in entry order.
    pub fn ids(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.actors.keys().copied()
    }

    /// Number of actors.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub(crate) fn insert(&mut self, actor: GameActor) {
        self.actors.insert(actor.id(), actor);
    }

    pub(crate) fn remove(&mut self, id: ActorId) -> Option<GameActor> {
        self.actors.shift_remove(&id)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = GameActor> + '_ {
        self.actors.drain(..).map(|(_, a)| a)
    }
}
