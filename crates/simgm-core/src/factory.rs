//! Runtime registry of message types and their parameter prototypes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{FactoryError, ParamError};
use crate::id::MessageTypeId;
use crate::machine::MachineInfo;
use crate::message::Message;
use crate::param::MessageParameter;

/// Zero-argument constructor producing the declared parameters of a type,
/// in wire order, holding their default values.
pub type PrototypeBuilder = fn() -> Vec<MessageParameter>;

/// Descriptor of a registered message type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageType {
    /// Numeric id, unique within a factory.
    pub id: MessageTypeId,
    /// Name, unique within a factory.
    pub name: String,
}

impl MessageType {
    /// New descriptor.
    pub fn new(id: MessageTypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}

#[derive(Clone)]
struct Registration {
    ty: MessageType,
    prototype: IndexMap<String, MessageParameter>,
}

fn build_prototype(
    builder: PrototypeBuilder,
) -> Result<IndexMap<String, MessageParameter>, ParamError> {
    let mut prototype = IndexMap::new();
    for p in builder() {
        if prototype.contains_key(p.name()) {
            return Err(ParamError::DuplicateParameter {
                name: p.name().to_string(),
            });
        }
        prototype.insert(p.name().to_string(), p);
    }
    Ok(prototype)
}

/// Maps message types to prototypes and stamps out fresh messages.
///
/// Every message created here carries the factory's local
/// [`MachineInfo`] as its source and no destination.
#[derive(Clone)]
pub struct MessageFactory {
    local: Arc<MachineInfo>,
    types: IndexMap<MessageTypeId, Registration>,
    by_name: HashMap<String, MessageTypeId>,
}

impl MessageFactory {
    /// Empty factory whose messages originate from `local`.
    pub fn new(local: MachineInfo) -> Self {
        Self {
            local: Arc::new(local),
            types: IndexMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// The machine stamped as source on created messages.
    pub fn local_machine(&self) -> &Arc<MachineInfo> {
        &self.local
    }

    /// Replace the local machine identity.
    pub fn set_local_machine(&mut self, local: MachineInfo) {
        self.local = Arc::new(local);
    }

    /// Associate `ty` with the prototype produced by `builder`.
    ///
    /// Registering the same type again with a builder that yields the same
    /// schema and defaults is a no-op.
    ///
    /// # Errors
    ///
    /// [`FactoryError::DuplicateRegistration`] if the id or the name is
    /// already bound to a different definition, and
    /// [`FactoryError::Prototype`] if the builder declares a parameter name
    /// twice.
    pub fn register(
        &mut self,
        ty: MessageType,
        builder: PrototypeBuilder,
    ) -> Result<(), FactoryError> {
        let prototype = build_prototype(builder)?;

        if let Some(existing) = self.types.get(&ty.id) {
            if existing.ty == ty && existing.prototype == prototype {
                return Ok(());
            }
            return Err(FactoryError::DuplicateRegistration {
                id: ty.id,
                name: ty.name,
            });
        }
        if self.by_name.contains_key(&ty.name) {
            return Err(FactoryError::DuplicateRegistration {
                id: ty.id,
                name: ty.name,
            });
        }

        log::debug!("registered message type {ty}");
        self.by_name.insert(ty.name.clone(), ty.id);
        self.types.insert(ty.id, Registration { ty, prototype });
        Ok(())
    }

    /// New message of type `id` with every parameter at its default value.
    ///
    /// # Errors
    ///
    /// [`FactoryError::UnknownMessageType`] if `id` is not registered.
    pub fn create(&self, id: MessageTypeId) -> Result<Message, FactoryError> {
        let reg = self
            .types
            .get(&id)
            .ok_or(FactoryError::UnknownMessageType { id })?;
        Ok(Message::from_prototype(
            id,
            reg.prototype.clone(),
            Arc::clone(&self.local),
        ))
    }

    /// New message of the type registered under `name`.
    pub fn create_by_name(&self, name: &str) -> Result<Message, FactoryError> {
        let id = self
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| FactoryError::UnknownMessageName {
                name: name.to_string(),
            })?;
        self.create(id)
    }

    /// Deep copy of `msg`, including its causing chain.
    ///
    /// # Errors
    ///
    /// [`FactoryError::UnknownMessageType`] if the message's type is not
    /// registered with this factory.
    pub fn clone_message(&self, msg: &Message) -> Result<Message, FactoryError> {
        if !self.is_registered(msg.message_type()) {
            return Err(FactoryError::UnknownMessageType {
                id: msg.message_type(),
            });
        }
        Ok(msg.clone())
    }

    /// Whether `id` is registered.
    pub fn is_registered(&self, id: MessageTypeId) -> bool {
        self.types.contains_key(&id)
    }

    /// Descriptor for `id`.
    pub fn message_type(&self, id: MessageTypeId) -> Option<&MessageType> {
        self.types.get(&id).map(|r| &r.ty)
    }

    /// Descriptor registered under `name`.
    pub fn message_type_by_name(&self, name: &str) -> Option<&MessageType> {
        self.by_name.get(name).and_then(|id| self.message_type(*id))
    }

    /// Name of `id`, or `"<unregistered>"`.
    pub fn type_name(&self, id: MessageTypeId) -> &str {
        self.message_type(id)
            .map(|t| t.name.as_str())
            .unwrap_or("<unregistered>")
    }

    /// All registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &MessageType> {
        self.types.values().map(|r| &r.ty)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFactory")
            .field("local", &self.local.id)
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::MachineId;
    use crate::param::ParamType;

    fn ping_schema() -> Vec<MessageParameter> {
        vec![
            MessageParameter::new("senderId", ParamType::ActorId),
            MessageParameter::new("timestamp", ParamType::Double),
        ]
    }

    fn other_schema() -> Vec<MessageParameter> {
        vec![MessageParameter::new("n", ParamType::Int)]
    }

    fn dup_schema() -> Vec<MessageParameter> {
        vec![
            MessageParameter::new("n", ParamType::Int),
            MessageParameter::new("n", ParamType::Float),
        ]
    }

    fn factory() -> MessageFactory {
        MessageFactory::new(MachineInfo::new(MachineId(42), "local"))
    }

    const PING: MessageTypeId = MessageTypeId(1000);

    #[test]
    fn create_stamps_local_source_and_no_destination() {
        let mut f = factory();
        f.register(MessageType::new(PING, "PING"), ping_schema).unwrap();
        let m = f.create(PING).unwrap();
        assert_eq!(m.message_type(), PING);
        assert_eq!(m.source().id, MachineId(42));
        assert!(m.destination().is_none());
        assert_eq!(m.param_count(), 2);
        assert_eq!(m.get("timestamp").and_then(|v| v.as_f64()), Some(0.0));
    }

    #[test]
    fn unknown_type_fails() {
        let f = factory();
        assert_eq!(
            f.create(PING).unwrap_err(),
            FactoryError::UnknownMessageType { id: PING }
        );
        assert!(matches!(
            f.create_by_name("PING"),
            Err(FactoryError::UnknownMessageName { .. })
        ));
    }

    #[test]
    fn identical_registration_is_idempotent() {
        let mut f = factory();
        f.register(MessageType::new(PING, "PING"), ping_schema).unwrap();
        f.register(MessageType::new(PING, "PING"), ping_schema).unwrap();
        assert_eq!(f.len(), 1);
    }

    #[test]
    fn conflicting_registration_fails() {
        let mut f = factory();
        f.register(MessageType::new(PING, "PING"), ping_schema).unwrap();
        assert!(matches!(
            f.register(MessageType::new(PING, "PING"), other_schema),
            Err(FactoryError::DuplicateRegistration { .. })
        ));
        assert!(matches!(
            f.register(MessageType::new(PING, "PONG"), ping_schema),
            Err(FactoryError::DuplicateRegistration { .. })
        ));
        assert!(matches!(
            f.register(MessageType::new(MessageTypeId(1001), "PING"), ping_schema),
            Err(FactoryError::DuplicateRegistration { .. })
        ));
        // The original registration is intact.
        assert_eq!(f.create(PING).unwrap().param_count(), 2);
    }

    #[test]
    fn duplicate_parameter_in_prototype_is_rejected() {
        let mut f = factory();
        assert!(matches!(
            f.register(MessageType::new(PING, "BAD"), dup_schema),
            Err(FactoryError::Prototype(ParamError::DuplicateParameter { .. }))
        ));
        assert!(f.is_empty());
    }

    #[test]
    fn lookups_by_id_and_name() {
        let mut f = factory();
        f.register(MessageType::new(PING, "PING"), ping_schema).unwrap();
        assert_eq!(f.message_type_by_name("PING").map(|t| t.id), Some(PING));
        assert_eq!(f.type_name(PING), "PING");
        assert_eq!(f.type_name(MessageTypeId(5)), "<unregistered>");
    }

    #[test]
    fn created_messages_are_independent() {
        let mut f = factory();
        f.register(MessageType::new(PING, "PING"), ping_schema).unwrap();
        let mut a = f.create(PING).unwrap();
        a.set("timestamp", 1.0f64).unwrap();
        let b = f.create(PING).unwrap();
        assert_eq!(b.get("timestamp").and_then(|v| v.as_f64()), Some(0.0));
        let c = f.clone_message(&a).unwrap();
        assert_eq!(a, c);
    }
}
