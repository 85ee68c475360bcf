//! Per-step counters and timings for the game manager.
//!
//! [`StepMetrics`] is filled in by [`GameManager::step`](crate::GameManager::step)
//! and returned in its [`StepReport`](crate::StepReport).

/// Timing and throughput metrics collected during a single step.
///
/// Durations are in microseconds. Counters are per step unless noted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepMetrics {
    /// Wall-clock time for the entire step, in microseconds.
    pub total_us: u64,
    /// Time spent in component `pre_frame` hooks, in microseconds.
    pub pre_frame_us: u64,
    /// Time spent dispatching queued, network and tick messages, in microseconds.
    pub dispatch_us: u64,
    /// Time spent applying deferred removals, in microseconds.
    pub removal_us: u64,
    /// Messages taken from the queue and dispatched, excluding tick messages.
    pub messages_dispatched: u32,
    /// Messages handed to `dispatch_network_message`.
    pub network_messages_dispatched: u32,
    /// Component hook failures caught at the dispatch boundary.
    pub component_faults: u32,
    /// Timers that fired.
    pub timers_fired: u32,
    /// Actors that entered the world during the step.
    pub actors_added: u32,
    /// Actors removed at the end of the step.
    pub actors_removed: u32,
    /// Messages left in the queue for the next step.
    pub queue_depth: usize,
    /// Cumulative number of sends refused because the queue was full.
    pub queue_full_rejections: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = StepMetrics::default();
        assert_eq!(m.total_us, 0);
        assert_eq!(m.messages_dispatched, 0);
        assert_eq!(m.component_faults, 0);
        assert_eq!(m.queue_full_rejections, 0);
    }
}
