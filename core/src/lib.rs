//! floe-core: the deterministic simulation core of Floe Market.
//!
//! Everything a match knows lives in one `GameState` owned by the
//! `GameEngine`. Outside code drives it through two calls only:
//! `tick(delta_ms)` and `apply_action(raw, source)`.

pub mod action;
pub mod bot_subsystem;
pub mod config;
pub mod economy_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod factory_subsystem;
pub mod init;
pub mod map;
pub mod pond_subsystem;
pub mod result;
pub mod rng;
pub mod season_subsystem;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod structure_subsystem;
pub mod subsystem;
pub mod types;
pub mod win_subsystem;

pub use action::{ActionSource, GameAction};
pub use config::GameConfig;
pub use engine::GameEngine;
pub use error::{SimError, SimResult};
pub use event::SimEvent;
pub use init::PlayerSpec;
pub use result::{ActionCode, ActionResult};
pub use state::GameState;
