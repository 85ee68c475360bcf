//! Test utilities for simgm development.
//!
//! Provides fixture message types ([`fixtures`]), recording and faulting
//! components ([`components`]) and a helper for building a running
//! [`GameManager`] with a deterministic id stream.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod components;
pub mod fixtures;

use simgm_engine::{GameManager, GameManagerConfig};

pub use components::{
    EchoComponent, FaultingComponent, Observation, RecordingComponent, SharedLog,
};
pub use fixtures::{ping, register_fixture_types, CLEANUP, ENTITY_REMOVED, PING};

/// A configured, started game manager named `name` whose GUIDs come from
/// `seed`, with the fixture message types registered.
pub fn running_gm(name: &str, seed: u64) -> GameManager {
    let mut gm = GameManager::new(GameManagerConfig {
        machine_name: name.to_string(),
        id_seed: Some(seed),
        ..Default::default()
    })
    .expect("default config is valid");
    gm.configure().expect("fresh manager configures");
    register_fixture_types(gm.core_mut().factory_mut());
    gm.start().expect("configured manager starts");
    gm
}
