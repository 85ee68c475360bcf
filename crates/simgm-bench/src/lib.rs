//! Benchmark profiles for the simgm runtime.
//!
//! Provides pre-built game managers for benchmarking:
//!
//! - [`reference_gm`]: 100 actors and four counting components
//! - [`stress_gm`]: 1000 actors and sixteen counting components
//! - [`queue_game_events`]: fill the message queue for the next step

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use simgm_core::builtin::INFO_GAME_EVENT;
use simgm_core::Message;
use simgm_engine::{
    ActorType, ComponentPriority, ComponentResult, GameManager, GameManagerConfig, GmComponent,
    GmContext, GmError,
};

/// Actor type registered by every profile.
pub const BENCH_ACTOR_TYPE: &str = "bench.Entity";

/// Component that counts the messages offered to it.
#[derive(Debug)]
pub struct CountingComponent {
    name: String,
    priority: ComponentPriority,
    /// Messages seen so far.
    pub seen: u64,
}

impl CountingComponent {
    /// Counter named `name`.
    pub fn new(name: impl Into<String>, priority: ComponentPriority) -> Self {
        Self {
            name: name.into(),
            priority,
            seen: 0,
        }
    }
}

impl GmComponent for CountingComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> ComponentPriority {
        self.priority
    }

    fn process_message(&mut self, _msg: &Message, _gm: &mut GmContext<'_>) -> ComponentResult {
        self.seen += 1;
        Ok(())
    }
}

/// Build a running game manager with `actors` local actors and
/// `components` counting components spread over the five priorities.
pub fn profile_gm(seed: u64, actors: usize, components: usize) -> Result<GameManager, GmError> {
    let mut gm = GameManager::new(GameManagerConfig {
        machine_name: "bench".to_string(),
        id_seed: Some(seed),
        ..Default::default()
    })?;
    gm.configure()?;
    gm.register_actor_type(
        ActorType::builder(BENCH_ACTOR_TYPE, "bench")
            .property("Position", [0.0f32; 3])
            .property("Health", 100i32)
            .build(),
    )?;
    gm.start()?;
    let priorities = [
        ComponentPriority::Highest,
        ComponentPriority::Higher,
        ComponentPriority::Normal,
        ComponentPriority::Lower,
        ComponentPriority::Lowest,
    ];
    for i in 0..components {
        gm.add_component(Box::new(CountingComponent::new(
            format!("counter-{i}"),
            priorities[i % priorities.len()],
        )))?;
    }
    for _ in 0..actors {
        let actor = gm.create_actor(BENCH_ACTOR_TYPE)?;
        gm.add_actor(actor)?;
    }
    // Dispatch the creation announcements.
    gm.step(0.0, 0.0)?;
    Ok(gm)
}

/// Reference profile: 100 actors, 4 components.
pub fn reference_gm(seed: u64) -> Result<GameManager, GmError> {
    profile_gm(seed, 100, 4)
}

/// Stress profile: 1000 actors, 16 components.
pub fn stress_gm(seed: u64) -> Result<GameManager, GmError> {
    profile_gm(seed, 1000, 16)
}

/// Queue `n` `INFO_GAME_EVENT` messages for the next step.
pub fn queue_game_events(gm: &mut GameManager, n: usize) -> Result<(), GmError> {
    for i in 0..n {
        let mut msg = gm.create_message(INFO_GAME_EVENT)?;
        msg.set("EventName", format!("event-{i}"))?;
        gm.send_message(msg)?;
    }
    Ok(())
}
