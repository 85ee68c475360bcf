//! The message envelope: a typed set of named parameters plus routing
//! metadata.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::ParamError;
use crate::hash::schema_fingerprint;
use crate::id::{ActorId, MachineId, MessageTypeId};
use crate::machine::MachineInfo;
use crate::param::{MessageParameter, ParamType, ParamValue};

/// A typed, named-parameter envelope representing an event or command.
///
/// Messages are created by a [`MessageFactory`](crate::factory::MessageFactory)
/// from the prototype registered for their type. The parameter set is fixed
/// at that point: callers can read and assign parameter values but cannot add
/// or remove parameters. Parameter order is declaration order and is
/// significant for wire encoders.
///
/// # Examples
///
/// ```
/// use simgm_core::{MessageFactory, MessageParameter, MessageType, ParamType};
/// use simgm_core::id::{MachineId, MessageTypeId};
/// use simgm_core::MachineInfo;
///
/// fn ping_schema() -> Vec<MessageParameter> {
///     vec![
///         MessageParameter::new("senderId", ParamType::ActorId),
///         MessageParameter::new("timestamp", ParamType::Double),
///     ]
/// }
///
/// let mut factory = MessageFactory::new(MachineInfo::new(MachineId(1), "local"));
/// let ping = MessageType::new(MessageTypeId(1000), "PING");
/// factory.register(ping, ping_schema).unwrap();
///
/// let mut msg = factory.create(MessageTypeId(1000)).unwrap();
/// msg.set("timestamp", 12.5f64).unwrap();
/// assert_eq!(msg.get("timestamp").and_then(|v| v.as_f64()), Some(12.5));
/// assert!(msg.set("timestamp", 3i32).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Message {
    type_id: MessageTypeId,
    params: IndexMap<String, MessageParameter>,
    source: Arc<MachineInfo>,
    destination: Option<Arc<MachineInfo>>,
    timestamp: f64,
    sending_actor: Option<ActorId>,
    about_actor: Option<ActorId>,
    causing: Option<Box<Message>>,
}

impl Message {
    pub(crate) fn from_prototype(
        type_id: MessageTypeId,
        params: IndexMap<String, MessageParameter>,
        source: Arc<MachineInfo>,
    ) -> Self {
        Self {
            type_id,
            params,
            source,
            destination: None,
            timestamp: 0.0,
            sending_actor: None,
            about_actor: None,
            causing: None,
        }
    }

    /// Message type id.
    pub fn message_type(&self) -> MessageTypeId {
        self.type_id
    }

    // ── Parameters ──────────────────────────────────────────────

    /// Parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &MessageParameter> {
        self.params.values()
    }

    /// Number of declared parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Parameter by name.
    pub fn param(&self, name: &str) -> Option<&MessageParameter> {
        self.params.get(name)
    }

    /// Mutable parameter by name. The declared type still guards writes.
    pub fn param_mut(&mut self, name: &str) -> Option<&mut MessageParameter> {
        self.params.get_mut(name)
    }

    /// Parameter by declaration index.
    pub fn param_at(&self, index: usize) -> Option<&MessageParameter> {
        self.params.get_index(index).map(|(_, p)| p)
    }

    /// Mutable parameter by declaration index.
    pub fn param_at_mut(&mut self, index: usize) -> Option<&mut MessageParameter> {
        self.params.get_index_mut(index).map(|(_, p)| p)
    }

    /// Value of the named parameter.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name).map(MessageParameter::value)
    }

    /// Assign the named parameter.
    ///
    /// # Errors
    ///
    /// [`ParamError::UnknownParameter`] if the type declares no such
    /// parameter, [`ParamError::TypeMismatch`] if `value` has the wrong type.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        match self.params.get_mut(name) {
            Some(p) => p.set(value),
            None => Err(ParamError::UnknownParameter {
                name: name.to_string(),
            }),
        }
    }

    /// `(name, type)` pairs in declaration order.
    pub fn schema(&self) -> impl Iterator<Item = (&str, ParamType)> {
        self.params.values().map(|p| (p.name(), p.param_type()))
    }

    /// FNV-1a fingerprint of [`schema`](Self::schema).
    pub fn schema_fingerprint(&self) -> u32 {
        schema_fingerprint(self.schema())
    }

    /// Copy every parameter value from `other` whose name and type match.
    /// Returns the number of parameters copied.
    pub fn copy_params_from(&mut self, other: &Message) -> usize {
        let mut copied = 0;
        for p in other.params() {
            if let Some(mine) = self.params.get_mut(p.name()) {
                if mine.set(p.value().clone()).is_ok() {
                    copied += 1;
                }
            }
        }
        copied
    }

    // ── Envelope ────────────────────────────────────────────────

    /// Machine that sent the message.
    pub fn source(&self) -> &Arc<MachineInfo> {
        &self.source
    }

    /// Replace the sending machine.
    pub fn set_source(&mut self, source: Arc<MachineInfo>) {
        self.source = source;
    }

    /// Target machine, or `None` for a broadcast.
    pub fn destination(&self) -> Option<&Arc<MachineInfo>> {
        self.destination.as_ref()
    }

    /// Target machine id, or `None` for a broadcast.
    pub fn destination_id(&self) -> Option<MachineId> {
        self.destination.as_ref().map(|m| m.id)
    }

    /// Set or clear the target machine.
    pub fn set_destination(&mut self, destination: Option<Arc<MachineInfo>>) {
        self.destination = destination;
    }

    /// Sim time at which the message was sent.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Set the send timestamp.
    pub fn set_timestamp(&mut self, timestamp: f64) {
        self.timestamp = timestamp;
    }

    /// Actor that sent the message, if any.
    pub fn sending_actor(&self) -> Option<ActorId> {
        self.sending_actor
    }

    /// Set or clear the sending actor.
    pub fn set_sending_actor(&mut self, actor: Option<ActorId>) {
        self.sending_actor = actor;
    }

    /// Actor this message is about, if any.
    pub fn about_actor(&self) -> Option<ActorId> {
        self.about_actor
    }

    /// Set or clear the about-actor.
    pub fn set_about_actor(&mut self, actor: Option<ActorId>) {
        self.about_actor = actor;
    }

    /// The message that caused this one (request/response chains).
    pub fn causing_message(&self) -> Option<&Message> {
        self.causing.as_deref()
    }

    /// Set or clear the causing message.
    pub fn set_causing_message(&mut self, causing: Option<Message>) {
        self.causing = causing.map(Box::new);
    }
}

/// Equality compares type, parameter values, source and destination ids,
/// timestamp, actor ids and the causing chain.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
            && self.params.len() == other.params.len()
            && self
                .params
                .values()
                .zip(other.params.values())
                .all(|(a, b)| a == b)
            && self.source.id == other.source.id
            && self.destination_id() == other.destination_id()
            && self.timestamp == other.timestamp
            && self.sending_actor == other.sending_actor
            && self.about_actor == other.about_actor
            && self.causing == other.causing
    }
}
