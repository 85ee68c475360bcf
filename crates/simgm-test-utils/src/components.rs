//! Reusable components for dispatch tests.
//!
//! - [`RecordingComponent`]: appends every message it sees to a log that
//!   can be shared between components to observe global order.
//! - [`FaultingComponent`]: fails on selected message types.
//! - [`EchoComponent`]: answers a trigger type by sending another type.

use std::sync::{Arc, Mutex};

use simgm_core::builtin::is_tick;
use simgm_core::{Message, MessageTypeId, TickId};
use simgm_engine::{ComponentPriority, ComponentResult, GmComponent, GmContext};

/// One message as seen by one component.
#[derive(Clone, Debug)]
pub struct Observation {
    pub component: String,
    pub tick: TickId,
    pub message: Message,
}

/// Observation log shared between components and the test body.
pub type SharedLog = Arc<Mutex<Vec<Observation>>>;

/// Records every dispatched message.
pub struct RecordingComponent {
    name: String,
    priority: ComponentPriority,
    log: SharedLog,
    only: Option<Vec<MessageTypeId>>,
    skip_ticks: bool,
    network: Vec<Message>,
}

impl RecordingComponent {
    pub fn new(name: impl Into<String>, priority: ComponentPriority, log: SharedLog) -> Self {
        Self {
            name: name.into(),
            priority,
            log,
            only: None,
            skip_ticks: false,
            network: Vec::new(),
        }
    }

    /// Record only the listed types.
    pub fn only(mut self, types: &[MessageTypeId]) -> Self {
        self.only = Some(types.to_vec());
        self
    }

    /// Do not record `TICK_*` messages.
    pub fn skip_ticks(mut self) -> Self {
        self.skip_ticks = true;
        self
    }

    /// Messages handed to `dispatch_network_message`, oldest first.
    pub fn network_messages(&self) -> &[Message] {
        &self.network
    }

    /// Messages of `ty` recorded by the component named `component`.
    pub fn seen_by(log: &SharedLog, component: &str, ty: MessageTypeId) -> Vec<Message> {
        log.lock()
            .expect("log lock")
            .iter()
            .filter(|o| o.component == component && o.message.message_type() == ty)
            .map(|o| o.message.clone())
            .collect()
    }
}

impl GmComponent for RecordingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ComponentPriority {
        self.priority
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let ty = msg.message_type();
        if self.skip_ticks && is_tick(ty) {
            return Ok(());
        }
        if self.only.as_ref().is_some_and(|only| !only.contains(&ty)) {
            return Ok(());
        }
        self.log.lock().expect("log lock").push(Observation {
            component: self.name.clone(),
            tick: gm.current_tick(),
            message: msg.clone(),
        });
        Ok(())
    }

    fn dispatch_network_message(&mut self, msg: &Message, _gm: &mut GmContext<'_>) -> ComponentResult {
        self.network.push(msg.clone());
        Ok(())
    }
}

/// Returns an error for every message of the listed types.
pub struct FaultingComponent {
    name: String,
    fail_on: Vec<MessageTypeId>,
    pub faults: u32,
}

impl FaultingComponent {
    pub fn new(name: impl Into<String>, fail_on: &[MessageTypeId]) -> Self {
        Self {
            name: name.into(),
            fail_on: fail_on.to_vec(),
            faults: 0,
        }
    }
}

impl GmComponent for FaultingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Highest
    }

    fn process_message(&mut self, msg: &Message, _gm: &mut GmContext<'_>) -> ComponentResult {
        if self.fail_on.contains(&msg.message_type()) {
            self.faults += 1;
            return Err(format!("{} refuses type {}", self.name, msg.message_type()).into());
        }
        Ok(())
    }
}

/// Sends a fresh `reply` message whenever it sees `trigger`.
pub struct EchoComponent {
    name: String,
    priority: ComponentPriority,
    trigger: MessageTypeId,
    reply: MessageTypeId,
}

impl EchoComponent {
    pub fn new(
        name: impl Into<String>,
        priority: ComponentPriority,
        trigger: MessageTypeId,
        reply: MessageTypeId,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            trigger,
            reply,
        }
    }
}

impl GmComponent for EchoComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ComponentPriority {
        self.priority
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        if msg.message_type() == self.trigger {
            let reply = gm.create_message(self.reply)?;
            gm.send_message(reply)?;
        }
        Ok(())
    }
}
