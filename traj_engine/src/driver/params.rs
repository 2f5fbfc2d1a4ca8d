//! Waypoint driver parameters, loaded from TOML with [`util::params::load`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::computer::{SwitchMode, DEFAULT_MAX_TURN_ANGLE_RAD};
use crate::constraints::PathConstraints;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverParams {
    /// Seed for route variance scatter.
    pub seed: u64,

    /// How often to re-plan while flying approximate segments, zero
    /// disables re-planning.
    pub path_compute_timestep_s: f64,

    /// Default waypoint switching behaviour.
    pub switch_mode: SwitchMode,

    /// Radius of the disc within which waypoint positions are scattered.
    pub position_variance_m: f64,

    /// Fractional scatter applied to waypoint speed goals.
    pub speed_variance_frac: f64,

    /// Largest turn flown before snapping onto the target bearing.
    pub max_turn_angle_rad: f64,

    /// Baseline constraints, restored by `use_default` waypoint overrides.
    pub default_constraints: PathConstraints,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self {
            seed: 0,
            path_compute_timestep_s: 0.0,
            switch_mode: SwitchMode::OnPassing,
            position_variance_m: 0.0,
            speed_variance_frac: 0.0,
            max_turn_angle_rad: DEFAULT_MAX_TURN_ANGLE_RAD,
            default_constraints: PathConstraints::default(),
        }
    }
}
