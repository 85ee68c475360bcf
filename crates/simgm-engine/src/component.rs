//! The [`GmComponent`] trait and component priority ordering.
//!
//! Components are process-wide subscribers. Every dispatched message is
//! offered to every component in priority order, before any actor sees it.
//! A component that returns an error is logged and skipped; delivery to the
//! remaining components continues.

use std::any::Any;

use simgm_core::Message;

use crate::context::GmContext;
use crate::error::BoxError;

/// Result of a component hook.
pub type ComponentResult = Result<(), BoxError>;

/// Position of a component in the dispatch order.
///
/// Lower [`order_id`](Self::order_id) runs first. Components with equal
/// order ids run in registration order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComponentPriority {
    /// Order id 1.
    Highest,
    /// Order id 2.
    Higher,
    /// Order id 3.
    #[default]
    Normal,
    /// Order id 4.
    Lower,
    /// Order id 5.
    Lowest,
    /// An explicit order id.
    Custom(u32),
}

impl ComponentPriority {
    /// Numeric sort key.
    pub fn order_id(self) -> u32 {
        match self {
            ComponentPriority::Highest => 1,
            ComponentPriority::Higher => 2,
            ComponentPriority::Normal => 3,
            ComponentPriority::Lower => 4,
            ComponentPriority::Lowest => 5,
            ComponentPriority::Custom(n) => n,
        }
    }
}

/// Upcast to [`Any`], implemented for every `'static` type so that trait
/// objects can be downcast to their concrete component type.
pub trait AsAny {
    /// `&self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `&mut self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A process-wide message subscriber plugged into a
/// [`GameManager`](crate::GameManager).
///
/// Only [`name`](Self::name) and [`process_message`](Self::process_message)
/// are required. Hooks receive a [`GmContext`] through which they may send
/// messages, manage actors and timers, and read the actor table. Effects
/// of sent messages are never visible within the same step.
pub trait GmComponent: AsAny + Send + 'static {
    /// Unique component name.
    fn name(&self) -> &str;

    /// Declared priority, used unless overridden at registration.
    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Normal
    }

    /// Called once when the component is registered.
    fn on_added_to_gm(&mut self, _gm: &mut GmContext<'_>) -> ComponentResult {
        Ok(())
    }

    /// Called once when the component is removed or the manager shuts down.
    fn on_removed_from_gm(&mut self, _gm: &mut GmContext<'_>) {}

    /// Called at the start of every step, before any message is
    /// dispatched. Messages sent from here are dispatched in the same step.
    fn pre_frame(&mut self, _gm: &mut GmContext<'_>) -> ComponentResult {
        Ok(())
    }

    /// Handle one dispatched message.
    fn process_message(&mut self, msg: &Message, gm: &mut GmContext<'_>) -> ComponentResult;

    /// Handle one message sent with `send_network_message`. Only network
    /// bridges need to override this.
    fn dispatch_network_message(
        &mut self,
        _msg: &Message,
        _gm: &mut GmContext<'_>,
    ) -> ComponentResult {
        Ok(())
    }
}
