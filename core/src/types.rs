//! Shared primitive types used across the entire simulation.

/// Simulation time in milliseconds. Only `tick` advances it.
pub type TimeMs = u64;

/// Stable identifier of a player, as supplied by the caller.
pub type PlayerId = String;

/// Team identifier. An unteamed player is its own team.
pub type TeamId = String;

/// Identifier of a pond harvest or factory craft job.
pub type JobId = String;

/// The canonical run identifier used by the run recorder.
pub type RunId = String;

/// Whole-dollar amounts and resource counts.
pub type Amount = u64;
