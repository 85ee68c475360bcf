//! Running a game manager on a dedicated tick thread.
//!
//! The tick thread owns the [`GameManager`] exclusively (moved in at
//! spawn). Other threads hand it messages through a bounded crossbeam
//! channel; the thread drains the channel with `try_recv` at the top of
//! each frame, so submitted messages are dispatched in the step that
//! follows. [`GmThread::shutdown`] joins the thread and returns the
//! manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;

use simgm_core::{Message, MessageFactory};

use crate::error::GmError;
use crate::manager::{GameManager, GmState};

/// Why a message could not be handed to the tick thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The tick thread has stopped.
    #[error("tick thread has shut down")]
    Shutdown,
    /// The submit channel is at capacity.
    #[error("submit channel is full")]
    ChannelFull,
}

/// What the tick thread hands back when it stops.
#[derive(Debug)]
pub struct StoppedGm {
    /// The game manager, in the state the last step left it.
    pub gm: GameManager,
    /// The actor fault that stopped the loop, if it did not stop on request.
    pub fault: Option<GmError>,
    /// Number of steps completed on the thread.
    pub steps: u64,
}

/// A game manager stepping on its own thread at a fixed frame period.
pub struct GmThread {
    tx: Option<Sender<Message>>,
    factory: MessageFactory,
    shutdown: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<StoppedGm>>,
}

struct TickLoop {
    gm: GameManager,
    rx: Receiver<Message>,
    shutdown: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    frame: Duration,
}

impl TickLoop {
    fn run(mut self) -> StoppedGm {
        let mut last = Instant::now();
        let mut steps = 0u64;
        let mut fault = None;
        while !self.shutdown.load(Ordering::Acquire) {
            let frame_start = Instant::now();
            self.drain_submissions();

            let delta = frame_start.duration_since(last).as_secs_f32();
            last = frame_start;
            match self.gm.step(delta, delta) {
                Ok(_) => steps += 1,
                Err(e) => {
                    log::error!("tick thread stopping after step failure: {e}");
                    fault = Some(e);
                    break;
                }
            }

            if let Some(remaining) = self.frame.checked_sub(frame_start.elapsed()) {
                thread::sleep(remaining);
            }
        }
        self.stopped.store(true, Ordering::Release);
        StoppedGm {
            gm: self.gm,
            fault,
            steps,
        }
    }

    fn drain_submissions(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            if let Err(e) = self.gm.send_message(msg) {
                log::warn!("submitted message dropped: {e}");
            }
        }
    }
}

impl GmThread {
    /// Move `gm` onto a new thread named `simgm-tick` stepping every
    /// `frame`. `capacity` bounds the submit channel.
    ///
    /// # Errors
    ///
    /// [`GmError::InvalidState`] unless the manager is running or paused,
    /// and [`GmError::ThreadSpawn`] if the OS refuses the thread.
    pub fn spawn(gm: GameManager, frame: Duration, capacity: usize) -> Result<Self, GmError> {
        if !matches!(gm.state(), GmState::Running | GmState::Paused) {
            return Err(GmError::InvalidState {
                op: "spawn a tick thread",
                state: gm.state(),
            });
        }
        let factory = gm.core().factory().clone();
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let stopped = Arc::new(AtomicBool::new(false));
        let state = TickLoop {
            gm,
            rx,
            shutdown: Arc::clone(&shutdown),
            stopped: Arc::clone(&stopped),
            frame,
        };
        let handle = thread::Builder::new()
            .name("simgm-tick".into())
            .spawn(move || state.run())
            .map_err(|e| GmError::ThreadSpawn {
                reason: e.to_string(),
            })?;
        Ok(Self {
            tx: Some(tx),
            factory,
            shutdown,
            stopped,
            handle: Some(handle),
        })
    }

    /// Copy of the manager's message factory taken at spawn, for building
    /// messages to submit.
    pub fn factory(&self) -> &MessageFactory {
        &self.factory
    }

    /// Hand a message to the tick thread without blocking.
    pub fn submit(&self, msg: Message) -> Result<(), SubmitError> {
        let tx = self.tx.as_ref().ok_or(SubmitError::Shutdown)?;
        tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SubmitError::ChannelFull,
            TrySendError::Disconnected(_) => SubmitError::Shutdown,
        })
    }

    /// Whether the tick loop is still running.
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Stop the loop, join the thread and return the manager.
    ///
    /// # Errors
    ///
    /// [`GmError::TickThreadPanicked`] if the thread panicked; the manager
    /// is lost in that case.
    pub fn shutdown(mut self) -> Result<StoppedGm, GmError> {
        self.stop_and_join().ok_or(GmError::TickThreadPanicked)
    }

    fn stop_and_join(&mut self) -> Option<StoppedGm> {
        self.shutdown.store(true, Ordering::Release);
        self.tx = None;
        let handle = self.handle.take()?;
        handle.join().ok()
    }
}

impl Drop for GmThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_and_join();
        }
    }
}

impl std::fmt::Debug for GmThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmThread")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentResult, GmComponent};
    use crate::config::GameManagerConfig;
    use crate::context::GmContext;
    use simgm_core::builtin::INFO_GAME_EVENT;

    #[derive(Default)]
    struct Events(Vec<String>);

    impl GmComponent for Events {
        fn name(&self) -> &str {
            "events"
        }
        fn process_message(&mut self, msg: &Message, _gm: &mut GmContext<'_>) -> ComponentResult {
            if msg.message_type() == INFO_GAME_EVENT {
                if let Some(name) = msg.get("EventName").and_then(|v| v.as_str()) {
                    self.0.push(name.to_string());
                }
            }
            Ok(())
        }
    }

    fn running_gm() -> GameManager {
        let mut gm = GameManager::new(GameManagerConfig {
            id_seed: Some(1),
            ..Default::default()
        })
        .unwrap();
        gm.configure().unwrap();
        gm.add_component(Box::new(Events::default())).unwrap();
        gm.start().unwrap();
        gm
    }

    #[test]
    fn spawn_requires_a_running_manager() {
        let gm = GameManager::new(GameManagerConfig::default()).unwrap();
        assert!(matches!(
            GmThread::spawn(gm, Duration::from_millis(1), 8),
            Err(GmError::InvalidState { .. })
        ));
    }

    #[test]
    fn submitted_messages_are_dispatched_in_order() {
        let thread = GmThread::spawn(running_gm(), Duration::from_millis(1), 64).unwrap();
        for name in ["a", "b", "c"] {
            let mut msg = thread.factory().create(INFO_GAME_EVENT).unwrap();
            msg.set("EventName", name).unwrap();
            thread.submit(msg).unwrap();
        }
        // Plenty of 1 ms frames for the submissions to be drained.
        thread::sleep(Duration::from_millis(100));
        assert!(thread.is_running());
        let result = thread.shutdown().unwrap();
        assert!(result.fault.is_none());
        assert!(result.steps > 0);
        let events = result.gm.component_as::<Events>("events").unwrap();
        assert_eq!(events.0, ["a", "b", "c"]);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let mut thread = GmThread::spawn(running_gm(), Duration::from_millis(1), 4).unwrap();
        let msg = thread.factory().create(INFO_GAME_EVENT).unwrap();
        thread.stop_and_join().unwrap();
        assert_eq!(thread.submit(msg), Err(SubmitError::Shutdown));
    }
}
