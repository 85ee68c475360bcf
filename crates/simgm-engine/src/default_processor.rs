//! Built-in handling of actor lifecycle and pause messages.

use simgm_core::builtin::{
    COMMAND_PAUSE, COMMAND_RESUME, INFO_ACTOR_CREATED, INFO_ACTOR_DELETED, INFO_ACTOR_PUBLISHED,
    INFO_ACTOR_UPDATED, REQUEST_PAUSE, REQUEST_RESUME,
};
use simgm_core::{Message, ParamValue};

use crate::component::{ComponentPriority, ComponentResult, GmComponent};
use crate::context::GmContext;

/// Name under which [`DefaultMessageProcessor`] registers.
pub const DEFAULT_PROCESSOR_NAME: &str = "DefaultMessageProcessor";

/// Keeps remote mirror actors in step with their owners and applies pause
/// commands.
///
/// * Remote `INFO_ACTOR_CREATED`, `INFO_ACTOR_PUBLISHED` or
///   `INFO_ACTOR_UPDATED` about an unknown actor instantiates a remote
///   mirror of the named actor type. Updates to known mirrors are applied
///   by the mirror itself when the message is delivered to it.
/// * Remote `INFO_ACTOR_DELETED` deletes the mirror.
/// * `COMMAND_PAUSE` / `COMMAND_RESUME` pause and resume the manager.
/// * `REQUEST_PAUSE` / `REQUEST_RESUME` are honoured when
///   [`accept_pause_requests`](Self::accept_pause_requests) is set and
///   answered with `SERVER_REQUEST_REJECTED` otherwise.
#[derive(Debug, Default)]
pub struct DefaultMessageProcessor {
    accept_requests: bool,
    mirrors_created: u64,
}

impl DefaultMessageProcessor {
    /// Processor that rejects pause requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether `REQUEST_PAUSE` / `REQUEST_RESUME` are honoured.
    pub fn accept_pause_requests(mut self, accept: bool) -> Self {
        self.accept_requests = accept;
        self
    }

    /// Number of remote mirrors this processor has created.
    pub fn mirrors_created(&self) -> u64 {
        self.mirrors_created
    }

    fn create_mirror(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let Some(id) = msg.about_actor() else {
            return Ok(());
        };
        if gm.is_actor_live(id) {
            return Ok(());
        }
        let type_name = msg
            .get("ActorTypeName")
            .and_then(ParamValue::as_str)
            .unwrap_or_default();
        let mut actor = match gm.actor_types().instantiate(type_name, id, true) {
            Ok(actor) => actor,
            Err(e) => {
                log::warn!("cannot mirror remote actor {id}: {e}");
                return Ok(());
            }
        };
        actor.core_mut().apply_update(msg)?;
        gm.add_actor(actor)?;
        self.mirrors_created += 1;
        log::debug!("mirroring remote actor {id} ({type_name})");
        Ok(())
    }

    fn delete_mirror(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let Some(id) = msg.about_actor() else {
            return Ok(());
        };
        if gm.is_remote_actor(id) {
            gm.delete_actor(id)?;
        } else if gm.is_actor_live(id) {
            log::warn!(
                "ignoring remote delete of local actor {id} from {}",
                msg.source().name
            );
        }
        Ok(())
    }
}

impl GmComponent for DefaultMessageProcessor {
    fn name(&self) -> &str {
        DEFAULT_PROCESSOR_NAME
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Highest
    }

    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult {
        let ty = msg.message_type();
        let remote = !gm.is_local(msg);
        match ty {
            INFO_ACTOR_CREATED | INFO_ACTOR_PUBLISHED | INFO_ACTOR_UPDATED if remote => {
                self.create_mirror(msg, gm)
            }
            INFO_ACTOR_DELETED if remote => self.delete_mirror(msg, gm),
            COMMAND_PAUSE | COMMAND_RESUME => {
                gm.request_pause(ty == COMMAND_PAUSE);
                Ok(())
            }
            REQUEST_PAUSE | REQUEST_RESUME => {
                if self.accept_requests {
                    gm.request_pause(ty == REQUEST_PAUSE);
                } else {
                    gm.reject_message(msg, "pause requests are not accepted")?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
