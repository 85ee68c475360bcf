//! Identity mapping between DIS and the game manager.
//!
//! [`EntityMap`] pairs DIS entity ids with actor ids in both directions and
//! hands out entity numbers for local actors. [`EntityTypeMap`] pairs DIS
//! entity type records with actor type names. The entity map also keeps
//! the last entity state sent for each local actor, so that partial
//! property updates still go out as complete entity states. Remote sites
//! appear to the game manager as machines; [`EntityMap::machine_for`]
//! keeps one [`MachineInfo`] per site/application pair.

use std::sync::Arc;

use indexmap::IndexMap;

use simgm_core::{ActorId, MachineId, MachineInfo};

use crate::error::DisError;
use crate::pdu::{EntityId, EntityStatePdu, EntityType};

/// High bits of the synthetic machine ids given to DIS applications
/// (`"DIS"` in ASCII).
const DIS_MACHINE_TAG: u128 = 0x0044_4953 << 96;

// ── EntityMap ──────────────────────────────────────────────────────

/// Bidirectional DIS entity id ↔ actor id table.
#[derive(Debug)]
pub struct EntityMap {
    site: u16,
    application: u16,
    next_entity: u16,
    by_entity: IndexMap<EntityId, ActorId>,
    by_actor: IndexMap<ActorId, EntityId>,
    states: IndexMap<ActorId, EntityStatePdu>,
    machines: IndexMap<(u16, u16), Arc<MachineInfo>>,
}

impl EntityMap {
    /// Empty map allocating local ids under `site`/`application`.
    pub fn new(site: u16, application: u16) -> Self {
        Self {
            site,
            application,
            next_entity: 1,
            by_entity: IndexMap::new(),
            by_actor: IndexMap::new(),
            states: IndexMap::new(),
            machines: IndexMap::new(),
        }
    }

    /// Pair `entity` with `actor`, dropping any earlier pairing of either.
    pub fn insert(&mut self, entity: EntityId, actor: ActorId) {
        if let Some(old_actor) = self.by_entity.insert(entity, actor) {
            if old_actor != actor {
                self.by_actor.swap_remove(&old_actor);
                self.states.swap_remove(&old_actor);
            }
        }
        if let Some(old_entity) = self.by_actor.insert(actor, entity) {
            if old_entity != entity {
                self.by_entity.swap_remove(&old_entity);
            }
        }
    }

    /// Actor paired with `entity`.
    pub fn actor(&self, entity: EntityId) -> Option<ActorId> {
        self.by_entity.get(&entity).copied()
    }

    /// Entity paired with `actor`.
    pub fn entity(&self, actor: ActorId) -> Option<EntityId> {
        self.by_actor.get(&actor).copied()
    }

    /// Drop the pairing of `actor`, returning its entity id.
    pub fn remove_actor(&mut self, actor: ActorId) -> Option<EntityId> {
        let entity = self.by_actor.swap_remove(&actor)?;
        self.by_entity.swap_remove(&entity);
        self.states.swap_remove(&actor);
        Some(entity)
    }

    /// Drop the pairing of `entity`, returning its actor id.
    pub fn remove_entity(&mut self, entity: EntityId) -> Option<ActorId> {
        let actor = self.by_entity.swap_remove(&entity)?;
        self.by_actor.swap_remove(&actor);
        self.states.swap_remove(&actor);
        Some(actor)
    }

    /// Last entity state sent for a paired actor, created with `init` on
    /// first use. Returns `None` for unpaired actors.
    pub fn state_mut(
        &mut self,
        actor: ActorId,
        init: impl FnOnce() -> EntityStatePdu,
    ) -> Option<&mut EntityStatePdu> {
        if !self.by_actor.contains_key(&actor) {
            return None;
        }
        Some(self.states.entry(actor).or_insert_with(init))
    }

    /// Entity id of a local actor, allocating the next free entity number
    /// on first use.
    ///
    /// # Errors
    ///
    /// [`DisError::EntityIdsExhausted`] when every number from 1 to 0xFFFE
    /// is taken.
    pub fn local_entity_for(&mut self, actor: ActorId) -> Result<EntityId, DisError> {
        if let Some(entity) = self.entity(actor) {
            return Ok(entity);
        }
        for _ in 0..u16::MAX - 1 {
            let candidate = EntityId::new(self.site, self.application, self.next_entity);
            self.next_entity = if self.next_entity >= u16::MAX - 1 {
                1
            } else {
                self.next_entity + 1
            };
            if !self.by_entity.contains_key(&candidate) {
                self.insert(candidate, actor);
                return Ok(candidate);
            }
        }
        Err(DisError::EntityIdsExhausted {
            site: self.site,
            application: self.application,
        })
    }

    /// Whether `entity` was allocated by this application.
    pub fn is_local(&self, entity: EntityId) -> bool {
        entity.is_from(self.site, self.application)
    }

    /// Synthetic machine record standing for a remote DIS application.
    pub fn machine_for(&mut self, site: u16, application: u16) -> Arc<MachineInfo> {
        Arc::clone(self.machines.entry((site, application)).or_insert_with(|| {
            let id = MachineId(DIS_MACHINE_TAG | u128::from(site) << 16 | u128::from(application));
            Arc::new(MachineInfo::new(id, format!("dis-{site}-{application}")))
        }))
    }

    /// Number of paired entities.
    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    /// Whether no entity is paired.
    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }

    /// Pairs in insertion order, with removals compacted.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, ActorId)> + '_ {
        self.by_entity.iter().map(|(e, a)| (*e, *a))
    }
}

// ── EntityTypeMap ──────────────────────────────────────────────────

/// DIS entity type ↔ actor type name table.
#[derive(Debug, Default)]
pub struct EntityTypeMap {
    to_actor: IndexMap<EntityType, String>,
    to_entity: IndexMap<String, EntityType>,
}

impl EntityTypeMap {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `entity_type` with the actor type `actor_type`. A later pairing
    /// of either side replaces the earlier one.
    pub fn insert(&mut self, entity_type: EntityType, actor_type: impl Into<String>) {
        let actor_type = actor_type.into();
        if let Some(old) = self.to_actor.insert(entity_type, actor_type.clone()) {
            self.to_entity.swap_remove(&old);
        }
        if let Some(old) = self.to_entity.insert(actor_type, entity_type) {
            if old != entity_type {
                self.to_actor.swap_remove(&old);
            }
        }
    }

    /// Actor type name for a DIS entity type.
    pub fn actor_type(&self, entity_type: &EntityType) -> Option<&str> {
        self.to_actor.get(entity_type).map(String::as_str)
    }

    /// DIS entity type for an actor type name.
    pub fn entity_type(&self, actor_type: &str) -> Option<EntityType> {
        self.to_entity.get(actor_type).copied()
    }
}
