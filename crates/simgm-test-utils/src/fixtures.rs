//! Fixture message types.
//!
//! - [`PING`]: `{senderId: ActorId, timestamp: Double}`.
//! - [`ENTITY_REMOVED`]: `{entity: ActorId}`.
//! - [`CLEANUP`]: `{reason: String}`.

use simgm_core::{
    ActorId, Message, MessageFactory, MessageParameter, MessageType, MessageTypeId, ParamType,
};

pub const PING: MessageTypeId = MessageTypeId(1000);
pub const ENTITY_REMOVED: MessageTypeId = MessageTypeId(1001);
pub const CLEANUP: MessageTypeId = MessageTypeId(1002);

fn ping_schema() -> Vec<MessageParameter> {
    vec![
        MessageParameter::new("senderId", ParamType::ActorId),
        MessageParameter::new("timestamp", ParamType::Double),
    ]
}

fn entity_removed_schema() -> Vec<MessageParameter> {
    vec![MessageParameter::new("entity", ParamType::ActorId)]
}

fn cleanup_schema() -> Vec<MessageParameter> {
    vec![MessageParameter::new("reason", ParamType::String)]
}

/// Register the fixture types. Safe to call repeatedly.
pub fn register_fixture_types(factory: &mut MessageFactory) {
    let types: [(MessageTypeId, &str, simgm_core::PrototypeBuilder); 3] = [
        (PING, "PING", ping_schema),
        (ENTITY_REMOVED, "ENTITY_REMOVED", entity_removed_schema),
        (CLEANUP, "CLEANUP", cleanup_schema),
    ];
    for (id, name, builder) in types {
        factory
            .register(MessageType::new(id, name), builder)
            .expect("fixture types do not clash");
    }
}

/// A `PING` from `sender` stamped `timestamp`.
pub fn ping(factory: &MessageFactory, sender: ActorId, timestamp: f64) -> Message {
    let mut msg = factory.create(PING).expect("PING is registered");
    msg.set("senderId", sender).expect("senderId is an ActorId");
    msg.set("timestamp", timestamp).expect("timestamp is a Double");
    msg
}
