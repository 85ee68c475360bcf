//! Adapter registries between messages and PDUs.
//!
//! [`OutgoingMessage`] maps message types to [`OutgoingAdapter`]s. Several
//! adapters may be registered for one type; all of them run, in
//! registration order, and each PDU they produce is stamped and appended to
//! the outbound buffer. Types without an adapter stay local.
//!
//! [`IncomingMessage`] maps PDU types to [`PduProcessor`]s that turn
//! decoded PDUs back into messages. Datagrams of other exercises are
//! dropped before decoding.

use indexmap::IndexMap;

use simgm_core::{Message, MessageTypeId};
use simgm_engine::GmCore;

use crate::config::DisConfig;
use crate::entity_map::{EntityMap, EntityTypeMap};
use crate::error::{DisError, PduError};
use crate::pdu::{self, HeaderStamp, Pdu, PduHeader, PduType};

/// Everything an adapter may consult or update while converting.
pub struct AdapterContext<'a> {
    /// Game manager services: factory, clocks, id generation.
    pub gm: &'a mut GmCore,
    /// Entity id pairings.
    pub entities: &'a mut EntityMap,
    /// Entity type pairings.
    pub types: &'a EntityTypeMap,
    /// Exercise configuration.
    pub config: &'a DisConfig,
}

/// Converts one message type into PDUs.
pub trait OutgoingAdapter: Send {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// PDU for `msg`, or `None` when there is nothing to send.
    fn to_pdu(&mut self, msg: &Message, cx: &mut AdapterContext<'_>)
        -> Result<Option<Pdu>, DisError>;
}

/// Converts one PDU type into messages.
pub trait PduProcessor: Send {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Append the messages `pdu` stands for to `out`.
    fn process(
        &mut self,
        header: &PduHeader,
        pdu: &Pdu,
        cx: &mut AdapterContext<'_>,
        out: &mut Vec<Message>,
    ) -> Result<(), DisError>;
}

// ── OutgoingMessage ─────────────────────────────────────────────────

/// Counters kept by [`OutgoingMessage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutgoingStats {
    /// PDUs appended to the buffer.
    pub pdus_encoded: u64,
    /// Messages with no adapter for their type.
    pub unadapted: u64,
    /// Adapter or encoder failures.
    pub adapter_errors: u64,
}

/// Message → PDU adapter multimap with an outbound datagram buffer.
#[derive(Default)]
pub struct OutgoingMessage {
    adapters: IndexMap<MessageTypeId, Vec<Box<dyn OutgoingAdapter>>>,
    buffer: Vec<Vec<u8>>,
    stats: OutgoingStats,
}

impl OutgoingMessage {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` for `ty` after any already registered.
    pub fn add_adapter(&mut self, ty: MessageTypeId, adapter: Box<dyn OutgoingAdapter>) {
        self.adapters.entry(ty).or_default().push(adapter);
    }

    /// Remove every adapter for `ty`, returning how many there were.
    pub fn remove_adapters(&mut self, ty: MessageTypeId) -> usize {
        self.adapters.shift_remove(&ty).map_or(0, |v| v.len())
    }

    /// Number of adapters registered for `ty`.
    pub fn adapter_count(&self, ty: MessageTypeId) -> usize {
        self.adapters.get(&ty).map_or(0, Vec::len)
    }

    /// Run every adapter for the type of `msg`, buffering the encoded PDUs.
    /// Returns the number of PDUs buffered.
    ///
    /// A failing adapter is logged and skipped; the remaining adapters
    /// still run.
    pub fn handle(&mut self, msg: &Message, cx: &mut AdapterContext<'_>) -> usize {
        let ty = msg.message_type();
        let Some(adapters) = self.adapters.get_mut(&ty) else {
            log::debug!(
                "no DIS adapter for {}, not sent",
                cx.gm.factory().type_name(ty)
            );
            self.stats.unadapted += 1;
            return 0;
        };
        let stamp = HeaderStamp {
            protocol_version: cx.config.protocol_version,
            exercise_id: cx.config.exercise_id,
            timestamp: pdu::timestamp_from_seconds(cx.gm.sim_time()),
        };
        let mut encoded = 0;
        for adapter in adapters.iter_mut() {
            let result = adapter
                .to_pdu(msg, cx)
                .and_then(|built| match built {
                    Some(p) => Ok(Some(pdu::encode(&p, &stamp, cx.config.endian)?)),
                    None => Ok(None),
                });
            match result {
                Ok(Some(bytes)) => {
                    self.buffer.push(bytes);
                    encoded += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("DIS adapter {:?} failed: {e}", adapter.name());
                    self.stats.adapter_errors += 1;
                }
            }
        }
        self.stats.pdus_encoded += encoded as u64;
        encoded
    }

    /// Datagrams waiting to be sent.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the buffered datagrams, oldest first.
    pub fn take_datagrams(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.buffer)
    }

    /// Counters.
    pub fn stats(&self) -> OutgoingStats {
        self.stats
    }
}

impl std::fmt::Debug for OutgoingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingMessage")
            .field("types", &self.adapters.keys().collect::<Vec<_>>())
            .field("pending", &self.buffer.len())
            .finish()
    }
}

// ── IncomingMessage ─────────────────────────────────────────────────

/// Counters kept by [`IncomingMessage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IncomingStats {
    /// Datagrams decoded and handed to processors.
    pub pdus_decoded: u64,
    /// Datagrams of another exercise.
    pub foreign_exercise: u64,
    /// Datagrams of PDU types the codec does not support.
    pub unknown_types: u64,
    /// Datagrams that failed to decode.
    pub malformed: u64,
    /// Decoded PDUs with no processor registered.
    pub unprocessed: u64,
    /// Processor failures.
    pub processor_errors: u64,
}

/// PDU → message processor registry.
#[derive(Default)]
pub struct IncomingMessage {
    processors: IndexMap<PduType, Vec<Box<dyn PduProcessor>>>,
    stats: IncomingStats,
}

impl IncomingMessage {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` for `ty` after any already registered.
    pub fn add_processor(&mut self, ty: PduType, processor: Box<dyn PduProcessor>) {
        self.processors.entry(ty).or_default().push(processor);
    }

    /// Remove every processor for `ty`, returning how many there were.
    pub fn remove_processors(&mut self, ty: PduType) -> usize {
        self.processors.shift_remove(&ty).map_or(0, |v| v.len())
    }

    /// Number of processors registered for `ty`.
    pub fn processor_count(&self, ty: PduType) -> usize {
        self.processors.get(&ty).map_or(0, Vec::len)
    }

    /// Decode one datagram and append the resulting messages to `out`.
    /// Returns the number of messages appended.
    ///
    /// Foreign exercises and unknown PDU types are dropped at debug level;
    /// malformed datagrams and failing processors are logged and counted.
    /// Nothing here stops the caller from handling the next datagram.
    pub fn handle_datagram(
        &mut self,
        bytes: &[u8],
        cx: &mut AdapterContext<'_>,
        out: &mut Vec<Message>,
    ) -> usize {
        if let Some(exercise) = pdu::peek_exercise_id(bytes) {
            if exercise != cx.config.exercise_id {
                log::debug!(
                    "dropping PDU of exercise {exercise}, ours is {}",
                    cx.config.exercise_id
                );
                self.stats.foreign_exercise += 1;
                return 0;
            }
        }
        let (header, pdu) = match pdu::decode(bytes, cx.config.endian) {
            Ok(decoded) => decoded,
            Err(PduError::UnknownPduType { ty }) => {
                log::debug!("ignoring unsupported PDU type {ty}");
                self.stats.unknown_types += 1;
                return 0;
            }
            Err(e) => {
                log::warn!("dropping malformed PDU: {e}");
                self.stats.malformed += 1;
                return 0;
            }
        };
        self.stats.pdus_decoded += 1;
        let Some(processors) = self.processors.get_mut(&header.pdu_type) else {
            log::debug!("no processor for {:?} PDU", header.pdu_type);
            self.stats.unprocessed += 1;
            return 0;
        };
        let before = out.len();
        for processor in processors.iter_mut() {
            if let Err(e) = processor.process(&header, &pdu, cx, out) {
                log::warn!("DIS processor {:?} failed: {e}", processor.name());
                self.stats.processor_errors += 1;
            }
        }
        out.len() - before
    }

    /// Counters.
    pub fn stats(&self) -> IncomingStats {
        self.stats
    }
}

impl std::fmt::Debug for IncomingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingMessage")
            .field("types", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}
