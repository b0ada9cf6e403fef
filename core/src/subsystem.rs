//! Subsystem trait and registry.
//!
//! RULE: Every time-driven subsystem implements TickSubsystem.
//! The engine calls update() on each registered subsystem in
//! registration order at every time boundary of a tick.
//! Execution order is fixed and documented in engine.rs.
//!
//! Subsystems are stateless: everything they know lives in GameState,
//! which they borrow for the duration of the call only.

use crate::{config::GameConfig, error::SimResult, event::SimEvent, state::GameState, types::TimeMs};

/// The contract every time-driven subsystem must fulfill.
pub trait TickSubsystem: Send {
    /// Unique stable name for this subsystem.
    fn name(&self) -> &'static str;

    /// Called by the engine at `state.now_ms`.
    ///
    /// - `events_in`: events emitted by earlier subsystems in this pass
    ///
    /// Returns new events to append to the pass. Must be idempotent when
    /// called twice at the same `now_ms` with no new events.
    fn update(
        &self,
        state: &mut GameState,
        config: &GameConfig,
        events_in: &[SimEvent],
    ) -> SimResult<Vec<SimEvent>>;

    /// Earliest future time (> now) at which this subsystem has work.
    /// The engine stops there during catch-up so effects stay in order.
    fn next_deadline(&self, _state: &GameState, _config: &GameConfig) -> Option<TimeMs> {
        None
    }
}
