//! # Kinematic trajectory engine
//!
//! Plans and samples analytic trajectories over a spherical earth. The
//! building blocks are:
//!
//! - [`state`]: the instantaneous kinematic state of the craft.
//! - [`geo`]: spherical earth conversions and great circle geometry.
//! - [`constraints`]: kinematic limits applied during planning.
//! - [`target`]: goal descriptions for a single leg.
//! - [`traj`]: trajectories as lists of analytic segments.
//! - [`computer`]: turns targets into trajectories.
//! - [`route`]: waypoints and routes.
//! - [`events`]: timed alarms with cancellation.
//! - [`driver`]: flies routes by planning and sampling legs.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod computer;
pub mod constraints;
pub mod driver;
pub mod events;
pub mod geo;
pub mod route;
pub mod state;
pub mod target;
pub mod traj;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use computer::{PathComputer, SwitchMode};
pub use constraints::PathConstraints;
pub use driver::{DriverError, DriverEvent, DriverMode, WaypointDriver};
pub use route::{Route, Waypoint};
pub use state::KinematicState;
pub use target::{PathTarget, TargetFlags, TurnDirection};
pub use traj::{Segment, Trajectory};
