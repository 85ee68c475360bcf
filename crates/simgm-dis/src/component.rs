//! The DIS game manager component.
//!
//! Locally sourced messages are offered to the [`OutgoingMessage`]
//! adapters as they are dispatched; the resulting datagrams are buffered
//! and sent when the step's `TICK_END_OF_FRAME` arrives. Received
//! datagrams are decoded in `pre_frame` and the resulting messages are
//! sent into the same step.

use simgm_core::builtin::{is_tick, TICK_END_OF_FRAME};
use simgm_core::Message;
use simgm_engine::{ComponentPriority, ComponentResult, GmComponent, GmContext};

use crate::adapter::{
    AdapterContext, IncomingMessage, IncomingStats, OutgoingMessage, OutgoingStats,
};
use crate::adapters::{register_default_adapters, register_default_processors};
use crate::config::DisConfig;
use crate::entity_map::{EntityMap, EntityTypeMap};
use crate::error::DisError;
use crate::pdu::EntityType;
use crate::sink::PduSink;

/// Name under which [`DisComponent`] registers unless renamed.
pub const DIS_COMPONENT_NAME: &str = "DisComponent";

/// Counters of a [`DisComponent`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisStats {
    /// Outbound side.
    pub outgoing: OutgoingStats,
    /// Inbound side.
    pub incoming: IncomingStats,
    /// Datagrams handed to the sink.
    pub datagrams_sent: u64,
    /// Sink send failures.
    pub send_errors: u64,
    /// Messages injected into the game manager.
    pub messages_injected: u64,
}

/// Bridges a game manager to a DIS exercise.
pub struct DisComponent {
    name: String,
    config: DisConfig,
    sink: Box<dyn PduSink>,
    outgoing: OutgoingMessage,
    incoming: IncomingMessage,
    entities: EntityMap,
    types: EntityTypeMap,
    inbox: Vec<Vec<u8>>,
    datagrams_sent: u64,
    send_errors: u64,
    messages_injected: u64,
}

impl DisComponent {
    /// Component with the built-in adapters and processors.
    ///
    /// # Errors
    ///
    /// [`DisError::Config`] when `config` does not validate.
    pub fn new(config: DisConfig, sink: impl PduSink + 'static) -> Result<Self, DisError> {
        let mut c = Self::bare(config, sink)?;
        register_default_adapters(&mut c.outgoing);
        register_default_processors(&mut c.incoming);
        Ok(c)
    }

    /// Component with empty adapter and processor registries.
    pub fn bare(config: DisConfig, sink: impl PduSink + 'static) -> Result<Self, DisError> {
        config.validate()?;
        Ok(Self {
            name: DIS_COMPONENT_NAME.to_string(),
            entities: EntityMap::new(config.site_id, config.application_id),
            config,
            sink: Box::new(sink),
            outgoing: OutgoingMessage::new(),
            incoming: IncomingMessage::new(),
            types: EntityTypeMap::new(),
            inbox: Vec::new(),
            datagrams_sent: 0,
            send_errors: 0,
            messages_injected: 0,
        })
    }

    /// Register under `name` instead of [`DIS_COMPONENT_NAME`].
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pair a DIS entity type with an actor type name, in both directions.
    pub fn map_entity_type(&mut self, entity_type: EntityType, actor_type: impl Into<String>) {
        self.types.insert(entity_type, actor_type);
    }

    /// Exercise configuration.
    pub fn config(&self) -> &DisConfig {
        &self.config
    }

    /// Outbound adapter registry.
    pub fn outgoing_mut(&mut self) -> &mut OutgoingMessage {
        &mut self.outgoing
    }

    /// Inbound processor registry.
    pub fn incoming_mut(&mut self) -> &mut IncomingMessage {
        &mut self.incoming
    }

    /// Entity id pairings.
    pub fn entities(&self) -> &EntityMap {
        &self.entities
    }

    /// Counters.
    pub fn stats(&self) -> DisStats {
        DisStats {
            outgoing: self.outgoing.stats(),
            incoming: self.incoming.stats(),
            datagrams_sent: self.datagrams_sent,
            send_errors: self.send_errors,
            messages_injected: self.messages_injected,
        }
    }

    /// Send every buffered datagram now.
    pub fn flush(&mut self) {
        for datagram in self.outgoing.take_datagrams() {
            match self.sink.send(&datagram) {
                Ok(()) => self.datagrams_sent += 1,
                Err(e) => {
                    log::warn!("DIS send failed: {e}");
                    self.send_errors += 1;
                }
            }
        }
    }
}

impl GmComponent for DisComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Lower
    }

    fn on_added_to_gm(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        if gm.actor_types().get(&self.config.remote_actor_type).is_none() {
            log::warn!(
                "actor type {:?} is not registered; remote DIS entities will not be mirrored",
                self.config.remote_actor_type
            );
        }
        log::info!(
            "DIS exercise {} as site {} application {}",
            self.config.exercise_id,
            self.config.site_id,
            self.config.application_id
        );
        Ok(())
    }

    fn on_removed_from_gm(&mut self, _gm: &mut GmContext<'_>) {
        self.flush();
    }

    fn pre_frame(&mut self, gm: &mut GmContext<'_>) -> ComponentResult {
        self.sink.poll(&mut self.inbox);
        if self.inbox.is_empty() {
            return Ok(());
        }
        let mut messages = Vec::new();
        let mut cx = AdapterContext {
            gm: &mut **gm,
            entities: &mut self.entities,
            types: &self.types,
            config: &self.config,
        };
        for datagram in self.inbox.drain(..) {
            self.incoming.handle_datagram(&datagram, &mut cx, &mut messages);
        }
        for msg in messages {
            gm.send_message(msg)?;
            self.messages_injected += 1;
        }
        Ok(())
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let ty = msg.message_type();
        if ty == TICK_END_OF_FRAME {
            self.flush();
            return Ok(());
        }
        if is_tick(ty) || !gm.is_local(msg) {
            return Ok(());
        }
        let mut cx = AdapterContext {
            gm: &mut **gm,
            entities: &mut self.entities,
            types: &self.types,
            config: &self.config,
        };
        self.outgoing.handle(msg, &mut cx);
        Ok(())
    }
}

impl std::fmt::Debug for DisComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisComponent")
            .field("name", &self.name)
            .field("exercise", &self.config.exercise_id)
            .field("entities", &self.entities.len())
            .field("outgoing", &self.outgoing)
            .field("incoming", &self.incoming)
            .finish()
    }
}
