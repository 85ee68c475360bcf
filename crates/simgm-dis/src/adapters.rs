//! Built-in adapters for actor lifecycle messages.
//!
//! | message              | PDU            |
//! |----------------------|----------------|
//! | `INFO_ACTOR_CREATED` | Entity State, then Create Entity |
//! | `INFO_ACTOR_UPDATED` | Entity State   |
//! | `INFO_ACTOR_DELETED` | Remove Entity  |
//!
//! Entity state is taken from the `Translation`, `Rotation` and `Velocity`
//! properties of the update group. `Rotation` is heading, pitch and roll in
//! degrees; DIS orientation is psi, theta and phi in radians. The actor
//! name becomes the marking. Entity State goes out ahead of Create Entity
//! so that receivers mirror the entity with its mapped actor type.
//!
//! Incoming PDUs become messages about remote mirror actors sourced from a
//! synthetic machine per DIS site and application, so that
//! [`DefaultMessageProcessor`](simgm_engine::DefaultMessageProcessor)
//! creates, updates and deletes the mirrors.

use std::sync::Arc;

use simgm_core::builtin::{INFO_ACTOR_CREATED, INFO_ACTOR_DELETED, INFO_ACTOR_UPDATED};
use simgm_core::{ActorId, Message, MessageParameter, MessageTypeId, ParamGroup, ParamValue};
use simgm_engine::actor::UPDATED_PROPERTIES;
use simgm_engine::ActorType;

use crate::adapter::{
    AdapterContext, IncomingMessage, OutgoingAdapter, OutgoingMessage, PduProcessor,
};
use crate::error::DisError;
use crate::pdu::{EntityId, EntityRequestPdu, EntityStatePdu, Marking, Pdu, PduHeader, PduType};

/// Actor property mapped to the entity location.
pub const TRANSLATION: &str = "Translation";
/// Actor property mapped to the entity orientation.
pub const ROTATION: &str = "Rotation";
/// Actor property mapped to the entity linear velocity.
pub const VELOCITY: &str = "Velocity";

/// Category of actor types created for DIS entities.
pub const DIS_CATEGORY: &str = "dis";

/// Actor type with the three mapped properties, suitable for mirroring
/// remote DIS entities.
pub fn entity_actor_type(name: &str) -> Arc<ActorType> {
    ActorType::builder(name, DIS_CATEGORY)
        .property(TRANSLATION, ParamValue::Vec3([0.0; 3]))
        .property(ROTATION, ParamValue::Vec3([0.0; 3]))
        .property(VELOCITY, ParamValue::Vec3([0.0; 3]))
        .build()
}

/// Register the built-in adapters with `outgoing`.
pub fn register_default_adapters(outgoing: &mut OutgoingMessage) {
    outgoing.add_adapter(INFO_ACTOR_CREATED, Box::new(EntityStateWriter));
    outgoing.add_adapter(INFO_ACTOR_CREATED, Box::new(CreateEntityWriter::default()));
    outgoing.add_adapter(INFO_ACTOR_UPDATED, Box::new(EntityStateWriter));
    outgoing.add_adapter(INFO_ACTOR_DELETED, Box::new(RemoveEntityWriter::default()));
}

/// Register the built-in processors with `incoming`.
pub fn register_default_processors(incoming: &mut IncomingMessage) {
    incoming.add_processor(PduType::EntityState, Box::new(EntityStateReader));
    incoming.add_processor(PduType::CreateEntity, Box::new(CreateEntityReader));
    incoming.add_processor(PduType::RemoveEntity, Box::new(RemoveEntityReader));
}

fn vec3(group: &ParamGroup, name: &str) -> Option<[f32; 3]> {
    group.get(name).and_then(|p| p.value().as_vec3())
}

// ── Outgoing ────────────────────────────────────────────────────────

/// Actor update → Entity State. Properties missing from a partial update
/// keep the value last sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityStateWriter;

impl OutgoingAdapter for EntityStateWriter {
    fn name(&self) -> &str {
        "EntityStateWriter"
    }

    fn to_pdu(
        &mut self,
        msg: &Message,
        cx: &mut AdapterContext<'_>,
    ) -> Result<Option<Pdu>, DisError> {
        let Some(actor) = msg.about_actor() else {
            return Ok(None);
        };
        let entity_id = cx.entities.local_entity_for(actor)?;
        let force_id = cx.config.force_id;
        let entity_type = msg
            .get("ActorTypeName")
            .and_then(ParamValue::as_str)
            .and_then(|name| cx.types.entity_type(name));
        let Some(state) = cx.entities.state_mut(actor, || EntityStatePdu {
            force_id,
            ..Default::default()
        }) else {
            return Ok(None);
        };
        state.entity_id = entity_id;
        if let Some(t) = entity_type {
            state.entity_type = t;
            state.alternative_type = t;
        }
        if let Some(name) = msg.get("Name").and_then(ParamValue::as_str) {
            if !name.is_empty() {
                state.marking = Marking::ascii(name);
            }
        }
        if let Some(group) = msg.get(UPDATED_PROPERTIES).and_then(ParamValue::as_group) {
            if let Some(v) = vec3(group, TRANSLATION) {
                state.location = v.map(f64::from);
            }
            if let Some(v) = vec3(group, ROTATION) {
                state.orientation = v.map(f32::to_radians);
            }
            if let Some(v) = vec3(group, VELOCITY) {
                state.linear_velocity = v;
            }
        }
        Ok(Some(Pdu::EntityState(state.clone())))
    }
}

/// Actor created → Create Entity, allocating the entity id.
#[derive(Debug, Default)]
pub struct CreateEntityWriter {
    next_request: u32,
}

impl OutgoingAdapter for CreateEntityWriter {
    fn name(&self) -> &str {
        "CreateEntityWriter"
    }

    fn to_pdu(
        &mut self,
        msg: &Message,
        cx: &mut AdapterContext<'_>,
    ) -> Result<Option<Pdu>, DisError> {
        let Some(actor) = msg.about_actor() else {
            return Ok(None);
        };
        let entity = cx.entities.local_entity_for(actor)?;
        self.next_request = self.next_request.wrapping_add(1);
        Ok(Some(Pdu::CreateEntity(EntityRequestPdu {
            originating_id: entity,
            receiving_id: EntityId::ALL,
            request_id: self.next_request,
        })))
    }
}

/// Actor deleted → Remove Entity, releasing the entity id. Actors that
/// were never announced produce nothing.
#[derive(Debug, Default)]
pub struct RemoveEntityWriter {
    next_request: u32,
}

impl OutgoingAdapter for RemoveEntityWriter {
    fn name(&self) -> &str {
        "RemoveEntityWriter"
    }

    fn to_pdu(
        &mut self,
        msg: &Message,
        cx: &mut AdapterContext<'_>,
    ) -> Result<Option<Pdu>, DisError> {
        let Some(entity) = msg.about_actor().and_then(|a| cx.entities.remove_actor(a)) else {
            return Ok(None);
        };
        self.next_request = self.next_request.wrapping_add(1);
        Ok(Some(Pdu::RemoveEntity(EntityRequestPdu {
            originating_id: entity,
            receiving_id: EntityId::ALL,
            request_id: self.next_request,
        })))
    }
}

// ── Incoming ────────────────────────────────────────────────────────

/// Actor id of a remote entity, assigning a fresh one on first sight.
fn remote_actor(cx: &mut AdapterContext<'_>, entity: EntityId) -> ActorId {
    if let Some(actor) = cx.entities.actor(entity) {
        return actor;
    }
    let actor = cx.gm.next_actor_id();
    cx.entities.insert(entity, actor);
    log::debug!("DIS entity {entity} mirrored as actor {actor}");
    actor
}

/// Message of type `ty` about `actor`, sourced from the entity's site.
fn remote_message(
    cx: &mut AdapterContext<'_>,
    ty: MessageTypeId,
    entity: EntityId,
    actor: ActorId,
) -> Result<Message, DisError> {
    let mut msg = cx.gm.create_message(ty)?;
    msg.set_source(cx.entities.machine_for(entity.site, entity.application));
    msg.set_about_actor(Some(actor));
    msg.set_sending_actor(Some(actor));
    Ok(msg)
}

/// Entity State → `INFO_ACTOR_UPDATED`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityStateReader;

impl PduProcessor for EntityStateReader {
    fn name(&self) -> &str {
        "EntityStateReader"
    }

    fn process(
        &mut self,
        _header: &PduHeader,
        pdu: &Pdu,
        cx: &mut AdapterContext<'_>,
        out: &mut Vec<Message>,
    ) -> Result<(), DisError> {
        let Pdu::EntityState(state) = pdu else {
            return Ok(());
        };
        if cx.entities.is_local(state.entity_id) {
            log::trace!("ignoring echo of local entity {}", state.entity_id);
            return Ok(());
        }
        let actor = remote_actor(cx, state.entity_id);
        let mut msg = remote_message(cx, INFO_ACTOR_UPDATED, state.entity_id, actor)?;
        let type_name = cx
            .types
            .actor_type(&state.entity_type)
            .unwrap_or(cx.config.remote_actor_type.as_str());
        msg.set("ActorTypeName", type_name)?;
        msg.set("ActorTypeCategory", DIS_CATEGORY)?;
        msg.set("Name", state.marking.text.as_str())?;
        let mut group = ParamGroup::new();
        let fields = [
            (TRANSLATION, state.location.map(|c| c as f32)),
            (ROTATION, state.orientation.map(f32::to_degrees)),
            (VELOCITY, state.linear_velocity),
        ];
        for (name, v) in fields {
            group.insert(
                name.to_string(),
                MessageParameter::with_value(name, ParamValue::Vec3(v)),
            );
        }
        msg.set(UPDATED_PROPERTIES, ParamValue::Group(group))?;
        out.push(msg);
        Ok(())
    }
}

/// Create Entity → `INFO_ACTOR_CREATED` of the configured remote type.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateEntityReader;

impl PduProcessor for CreateEntityReader {
    fn name(&self) -> &str {
        "CreateEntityReader"
    }

    fn process(
        &mut self,
        _header: &PduHeader,
        pdu: &Pdu,
        cx: &mut AdapterContext<'_>,
        out: &mut Vec<Message>,
    ) -> Result<(), DisError> {
        let Pdu::CreateEntity(req) = pdu else {
            return Ok(());
        };
        let entity = req.originating_id;
        if cx.entities.is_local(entity) {
            return Ok(());
        }
        let actor = remote_actor(cx, entity);
        let mut msg = remote_message(cx, INFO_ACTOR_CREATED, entity, actor)?;
        msg.set("ActorTypeName", cx.config.remote_actor_type.as_str())?;
        msg.set("ActorTypeCategory", DIS_CATEGORY)?;
        out.push(msg);
        Ok(())
    }
}

/// Remove Entity → `INFO_ACTOR_DELETED`, releasing the pairing. Unknown
/// entities are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoveEntityReader;

impl PduProcessor for RemoveEntityReader {
    fn name(&self) -> &str {
        "RemoveEntityReader"
    }

    fn process(
        &mut self,
        _header: &PduHeader,
        pdu: &Pdu,
        cx: &mut AdapterContext<'_>,
        out: &mut Vec<Message>,
    ) -> Result<(), DisError> {
        let Pdu::RemoveEntity(req) = pdu else {
            return Ok(());
        };
        let entity = req.originating_id;
        if cx.entities.is_local(entity) {
            return Ok(());
        }
        let Some(actor) = cx.entities.remove_entity(entity) else {
            log::debug!("remove request for unknown DIS entity {entity}");
            return Ok(());
        };
        out.push(remote_message(cx, INFO_ACTOR_DELETED, entity, actor)?);
        Ok(())
    }
}
