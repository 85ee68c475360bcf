//! Named one-shot and repeating timers.
//!
//! A timer is keyed by `(name, about_actor)`. Setting a timer under an
//! existing key replaces it. Elapsed timers are turned into
//! `INFO_TIMER_ELAPSED` messages by the game manager and dispatched in the
//! step in which they fire.

use simgm_core::ActorId;

/// Clock a timer measures against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimerClock {
    /// Simulation time. Frozen while the game manager is paused.
    #[default]
    SimTime,
    /// Accumulated real time. Keeps running while paused.
    RealTime,
}

#[derive(Clone, Debug)]
struct Timer {
    name: String,
    about: Option<ActorId>,
    interval: f64,
    repeat: bool,
    clock: TimerClock,
    due: f64,
}

/// A timer that came due.
#[derive(Clone, Debug, PartialEq)]
pub struct ElapsedTimer {
    /// Timer name.
    pub name: String,
    /// Actor the timer is about, if any.
    pub about: Option<ActorId>,
    /// Seconds between the due time and the time it was noticed.
    pub late: f64,
}

/// The set of pending timers.
#[derive(Debug, Default)]
pub struct TimerSet {
    timers: Vec<Timer>,
}

impl TimerSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer `interval` seconds after `now` on its clock. Replaces any
    /// timer with the same name and actor.
    pub fn set(
        &mut self,
        name: &str,
        about: Option<ActorId>,
        interval: f64,
        repeat: bool,
        clock: TimerClock,
        now: f64,
    ) {
        self.clear(name, about);
        self.timers.push(Timer {
            name: name.to_string(),
            about,
            interval: interval.max(0.0),
            repeat,
            clock,
            due: now + interval.max(0.0),
        });
    }

    /// Disarm a timer. Returns whether one was armed.
    pub fn clear(&mut self, name: &str, about: Option<ActorId>) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| !(t.name == name && t.about == about));
        self.timers.len() != before
    }

    /// Disarm every timer about `actor`.
    pub fn clear_about(&mut self, actor: ActorId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.about != Some(actor));
        before - self.timers.len()
    }

    /// Collect timers due at the given clock readings, ordered by due time.
    ///
    /// One-shot timers are removed. A repeating timer fires at most once per
    /// call; if it fell more than one interval behind, its next due time is
    /// rebased on `now` instead of catching up.
    pub fn expire(&mut self, sim_now: f64, real_now: f64) -> Vec<ElapsedTimer> {
        let mut fired: Vec<(f64, ElapsedTimer)> = Vec::new();
        self.timers.retain_mut(|t| {
            let now = match t.clock {
                TimerClock::SimTime => sim_now,
                TimerClock::RealTime => real_now,
            };
            if t.due > now {
                return true;
            }
            fired.push((
                t.due,
                ElapsedTimer {
                    name: t.name.clone(),
                    about: t.about,
                    late: now - t.due,
                },
            ));
            if !t.repeat || t.interval <= 0.0 {
                return false;
            }
            t.due += t.interval;
            if t.due <= now {
                t.due = now + t.interval;
            }
            true
        });
        fired.sort_by(|a, b| a.0.total_cmp(&b.0));
        fired.into_iter().map(|(_, e)| e).collect()
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fires_once() {
        let mut t = TimerSet::new();
        t.set("a", None, 1.0, false, TimerClock::SimTime, 0.0);
        assert!(t.expire(0.5, 0.5).is_empty());
        let fired = t.expire(1.25, 1.25);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].name, "a");
        assert!((fired[0].late - 0.25).abs() < 1e-9);
        assert!(t.is_empty());
    }

    #[test]
    fn repeating_timer_does_not_catch_up() {
        let mut t = TimerSet::new();
        t.set("r", None, 1.0, true, TimerClock::SimTime, 0.0);
        assert_eq!(t.expire(5.5, 0.0).len(), 1);
        assert!(t.expire(6.0, 0.0).is_empty());
        assert_eq!(t.expire(6.5, 0.0).len(), 1);
    }

    #[test]
    fn set_replaces_same_key() {
        let mut t = TimerSet::new();
        t.set("a", Some(ActorId(7)), 1.0, false, TimerClock::SimTime, 0.0);
        t.set("a", Some(ActorId(7)), 3.0, false, TimerClock::SimTime, 0.0);
        t.set("a", None, 1.0, false, TimerClock::SimTime, 0.0);
        assert_eq!(t.len(), 2);
        let fired = t.expire(2.0, 0.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].about, None);
    }

    #[test]
    fn clocks_are_independent() {
        let mut t = TimerSet::new();
        t.set("sim", None, 1.0, false, TimerClock::SimTime, 0.0);
        t.set("real", None, 1.0, false, TimerClock::RealTime, 0.0);
        let fired = t.expire(0.0, 2.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].name, "real");
    }

    #[test]
    fn clear_about_drops_only_that_actor() {
        let mut t = TimerSet::new();
        t.set("a", Some(ActorId(1)), 1.0, true, TimerClock::SimTime, 0.0);
        t.set("b", Some(ActorId(1)), 1.0, true, TimerClock::SimTime, 0.0);
        t.set("c", Some(ActorId(2)), 1.0, true, TimerClock::SimTime, 0.0);
        assert_eq!(t.clear_about(ActorId(1)), 2);
        assert_eq!(t.len(), 1);
        assert!(t.clear("c", Some(ActorId(2))));
        assert!(!t.clear("c", Some(ActorId(2))));
    }

    #[test]
    fn fired_timers_are_ordered_by_due_time() {
        let mut t = TimerSet::new();
        t.set("late", None, 2.0, false, TimerClock::SimTime, 0.0);
        t.set("early", None, 1.0, false, TimerClock::SimTime, 0.0);
        let names: Vec<_> = t.expire(3.0, 0.0).into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["early", "late"]);
    }
}
