//! # Waypoint driver
//!
//! Flies a [`Route`] by planning one leg at a time with the path computer and
//! sampling the resulting trajectory as simulation time advances. Waypoint
//! arrivals are scheduled as alarms rather than detected by proximity, a leg
//! ends exactly when its trajectory does.
//!
//! The driver is a mode machine:
//!
//! - `Idle`: no route set.
//! - `Planning`: route set, waiting for `start`.
//! - `Executing`: following the route (or a commanded goal).
//! - `Paused`: held in place, velocity saved for resume.
//! - `Completed`: route exhausted, extrapolating on the final heading.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};
use nalgebra::Vector3;
use serde::Serialize;
use std::f64::consts::TAU;
use thiserror::Error;

use crate::computer::PathComputer;
use crate::constraints::{is_limited, PathConstraints, GROUND_RADIAL_ACCEL};
use crate::events::{EventQueue, EventToken};
use crate::route::Route;
use crate::state::KinematicState;
use crate::target::{PathTarget, TargetFlags, TurnDirection};
use crate::traj::Trajectory;

use params::DriverParams;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Current mode of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriverMode {
    Idle,
    Planning,
    Executing,
    Paused,
    Completed,
}

/// Things that happened during an update, drained with
/// [`WaypointDriver::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    WaypointReached { index: usize, label: Option<String> },
    RouteCompleted,
    Paused,
    Resumed,
}

/// Errors produced by the driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Cannot follow an empty route")]
    EmptyRoute,

    #[error("No route has been set")]
    NoRoute,

    #[error("The driver has not been started")]
    NotStarted,

    #[error("Simulation time moved backwards ({0} s after {1} s)")]
    TimeRegression(f64, f64),
}

/// Internal alarm kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlarmKind {
    /// The current leg's trajectory has run to its end.
    PathComplete,
    /// A timed hold at a waypoint has expired.
    ResumeFromHold,
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Height of the ground at a geodetic position, metres above the sphere.
pub type GroundHeightFn = Box<dyn Fn(f64, f64) -> f64>;

/// Snapshot of the driver for telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    pub mode: DriverMode,
    pub target_index: usize,
    pub leg_duration_s: f64,
    pub leg_elapsed_s: f64,
    /// True while the current leg contains approximate segments.
    pub approximate: bool,
    pub state: KinematicState,
}

/// Flies routes by sampling analytically planned trajectories.
pub struct WaypointDriver {
    computer: PathComputer,
    trajectory: Trajectory,
    target: PathTarget,
    route: Option<Route>,
    target_index: usize,
    mode: DriverMode,
    state: KinematicState,

    default_constraints: PathConstraints,
    path_compute_timestep_s: f64,

    path_start_time_s: f64,
    last_update_time_s: f64,
    last_replan_time_s: f64,

    events: EventQueue<AlarmKind>,
    complete_token: Option<EventToken>,
    resume_token: Option<EventToken>,

    pre_pause_velocity: Option<Vector3<f64>>,
    paused_at_s: f64,

    ground_height: Option<GroundHeightFn>,

    /// False once a commanded goal has taken over from the route.
    route_following: bool,

    pending: Vec<DriverEvent>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl WaypointDriver {
    pub fn new(params: DriverParams) -> Self {
        let mut computer = PathComputer::with_seed(params.seed);
        computer.constraints = params.default_constraints;
        computer.switch_mode = params.switch_mode;
        computer.position_variance_m = params.position_variance_m;
        computer.speed_variance_frac = params.speed_variance_frac;
        computer.set_max_turn_angle(params.max_turn_angle_rad);

        Self {
            computer,
            trajectory: Trajectory::new(),
            target: PathTarget::default(),
            route: None,
            target_index: 0,
            mode: DriverMode::Idle,
            state: KinematicState::level_flight(0.0, 0.0, 0.0, 0.0, 0.0),
            default_constraints: params.default_constraints,
            path_compute_timestep_s: params.path_compute_timestep_s,
            path_start_time_s: 0.0,
            last_update_time_s: 0.0,
            last_replan_time_s: 0.0,
            events: EventQueue::new(),
            complete_token: None,
            resume_token: None,
            pre_pause_velocity: None,
            paused_at_s: 0.0,
            ground_height: None,
            route_following: true,
            pending: Vec::new(),
        }
    }

    /// Use a terrain height lookup, the craft is clamped to it while its
    /// constraints mark it as on the ground.
    pub fn set_ground_height(&mut self, lookup: GroundHeightFn) {
        self.ground_height = Some(lookup);
    }

    pub fn mode(&self) -> DriverMode {
        self.mode
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<DriverEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn report(&self) -> DriverReport {
        DriverReport {
            mode: self.mode,
            target_index: self.target_index,
            leg_duration_s: self.trajectory.duration_s(),
            leg_elapsed_s: self.last_update_time_s - self.path_start_time_s,
            approximate: self.trajectory.any_approximation(),
            state: self.state,
        }
    }

    // -----------------------------------------------------------------------
    // ROUTE CONTROL
    // -----------------------------------------------------------------------

    /// Set the route to follow. The driver moves to `Planning` and waits for
    /// [`Self::start`].
    pub fn set_route(&mut self, route: Route) -> Result<(), DriverError> {
        if route.is_empty() {
            return Err(DriverError::EmptyRoute);
        }

        info!("route set with {} waypoints", route.len());
        self.route = Some(route);
        self.computer.clear_retained_goals();
        self.target_index = 0;
        self.route_following = true;
        self.mode = DriverMode::Planning;
        Ok(())
    }

    /// Begin flying the route from `initial` at the given simulation time.
    pub fn start(
        &mut self,
        sim_time_s: f64,
        initial: KinematicState,
    ) -> Result<(), DriverError> {
        if self.route.is_none() {
            return Err(DriverError::NoRoute);
        }

        self.state = initial;
        self.last_update_time_s = sim_time_s;
        self.events.clear();
        self.plan_leg(sim_time_s);
        Ok(())
    }

    /// Advance the simulation to `sim_time_s` and return the craft state.
    pub fn update(&mut self, sim_time_s: f64) -> Result<KinematicState, DriverError> {
        if self.mode == DriverMode::Idle || self.mode == DriverMode::Planning {
            return Err(DriverError::NotStarted);
        }
        if sim_time_s < self.last_update_time_s {
            return Err(DriverError::TimeRegression(
                sim_time_s,
                self.last_update_time_s,
            ));
        }

        while let Some((alarm_time, kind)) = self.events.pop_due(sim_time_s) {
            match kind {
                AlarmKind::PathComplete => self.hit_waypoint(alarm_time),
                AlarmKind::ResumeFromHold => {
                    self.resume_token = None;
                    self.unpause(alarm_time);
                    self.advance(alarm_time);
                }
            }
        }

        if self.mode != DriverMode::Paused {
            self.update_position(sim_time_s);
        }

        self.last_update_time_s = sim_time_s;
        Ok(self.state)
    }

    fn update_position(&mut self, sim_time_s: f64) {
        let rel_time = sim_time_s - self.path_start_time_s;
        if let Some(state) = self.trajectory.get_state(rel_time) {
            self.state = state;
        }
        self.clamp_to_ground();

        // Approximate segments accumulate error, re-plan from the sampled
        // state at the configured cadence
        if self.path_compute_timestep_s > 0.0
            && self.trajectory.any_approximation()
            && sim_time_s - self.last_replan_time_s >= self.path_compute_timestep_s
        {
            debug!("re-planning approximate path at t={:.2} s", sim_time_s);
            self.replan_from_current(sim_time_s);
        }
    }

    // -----------------------------------------------------------------------
    // WAYPOINT PROGRESSION
    // -----------------------------------------------------------------------

    /// The current leg has ended: land exactly on its end state and move on.
    fn hit_waypoint(&mut self, sim_time_s: f64) {
        self.complete_token = None;
        if let Some(end) = self.trajectory.end_state() {
            self.state = end;
        }
        self.clamp_to_ground();

        let label = self
            .route
            .as_ref()
            .and_then(|r| r.get(self.target_index))
            .and_then(|w| w.label.clone());
        debug!(
            "waypoint {} reached at t={:.2} s",
            self.target_index, sim_time_s
        );
        self.pending.push(DriverEvent::WaypointReached {
            index: self.target_index,
            label,
        });

        let pause = self
            .route
            .as_ref()
            .and_then(|r| r.get(self.target_index))
            .and_then(|w| w.pause_time_s);
        if let Some(hold) = pause {
            self.pause(sim_time_s);
            self.resume_token = self
                .events
                .schedule(sim_time_s + hold, AlarmKind::ResumeFromHold);
            return;
        }

        self.advance(sim_time_s);
    }

    /// Move to the next waypoint, or finish the route.
    fn advance(&mut self, sim_time_s: f64) {
        let next = match &self.route {
            Some(route) => route.next_index(self.target_index),
            None => None,
        };

        match next {
            Some(index) => {
                // A goto loop which consumed no time would spin forever,
                // hold instead
                if index <= self.target_index
                    && (sim_time_s - self.path_start_time_s).abs() < 1.0e-9
                {
                    warn!(
                        "route loops to waypoint {} without advancing time, pausing",
                        index
                    );
                    self.pause(sim_time_s);
                    return;
                }
                self.target_index = index;
                self.plan_leg(sim_time_s);
            }
            None => {
                info!("route completed at t={:.2} s", sim_time_s);
                self.extrapolate(sim_time_s);
                self.mode = DriverMode::Completed;
                self.pending.push(DriverEvent::RouteCompleted);
            }
        }
    }

    /// Plan the trajectory for the leg to the current target waypoint.
    fn plan_leg(&mut self, sim_time_s: f64) {
        let route = match &self.route {
            Some(route) => route.clone(),
            None => return,
        };
        let waypoint = match route.get(self.target_index) {
            Some(waypoint) => waypoint,
            None => return,
        };

        self.computer.constraints = self.default_constraints;
        waypoint
            .constraints
            .apply(&mut self.computer.constraints, &self.default_constraints);
        if self.computer.constraints.is_on_ground {
            // Ground craft turn in place
            self.computer.constraints.max_radial_accel_ms2 = GROUND_RADIAL_ACCEL;
        }

        // A route which jumps back to its only point is flown as full
        // circles over it, once the craft is actually there
        let at_waypoint = match waypoint.position {
            Some((lat, lon)) => {
                let dlat = lat - self.state.latitude_deg;
                let dlon = lon - self.state.longitude_deg;
                dlat * dlat + dlon * dlon < 1.0e-4
            }
            None => true,
        };
        let target = if route.next_index(self.target_index) == Some(self.target_index)
            && at_waypoint
        {
            let mut target = PathTarget::default();
            target
                .flags
                .insert(TargetFlags::HEADING | TargetFlags::RELATIVE_TURN);
            target.heading_rad = match waypoint.turn_direction {
                TurnDirection::Left => -TAU,
                _ => TAU,
            };
            target
        } else {
            let next = route
                .next_index(self.target_index)
                .and_then(|i| route.get(i));
            let mut target = self.computer.create_target(&self.state, waypoint, next);
            self.computer.constrain_target(&mut target);
            target
        };

        self.target = target;
        self.trajectory.clear();
        self.computer
            .compute_path(&self.state, &self.target, &mut self.trajectory);

        self.path_start_time_s = sim_time_s;
        self.last_replan_time_s = sim_time_s;
        self.schedule_completion(sim_time_s);
        self.mode = DriverMode::Executing;
    }

    /// Continue indefinitely on the current heading.
    fn extrapolate(&mut self, sim_time_s: f64) {
        let mut target = PathTarget::default();
        target.flags.insert(TargetFlags::EXTRAPOLATE);

        self.target = target;
        self.trajectory.clear();
        self.computer
            .compute_path(&self.state, &self.target, &mut self.trajectory);
        self.path_start_time_s = sim_time_s;
        self.last_replan_time_s = sim_time_s;

        if let Some(token) = self.complete_token.take() {
            token.cancel();
        }
    }

    fn schedule_completion(&mut self, sim_time_s: f64) {
        if let Some(token) = self.complete_token.take() {
            token.cancel();
        }
        let duration = self.trajectory.duration_s();
        if is_limited(duration) {
            self.complete_token = self
                .events
                .schedule(sim_time_s + duration, AlarmKind::PathComplete);
        }
    }

    /// Re-plan the current target from the state sampled now.
    fn replan_from_current(&mut self, sim_time_s: f64) {
        let target = self.target;
        self.trajectory.clear();
        self.computer
            .compute_path(&self.state, &target, &mut self.trajectory);
        self.path_start_time_s = sim_time_s;
        self.last_replan_time_s = sim_time_s;
        self.schedule_completion(sim_time_s);
    }

    // -----------------------------------------------------------------------
    // PAUSE AND RESUME
    // -----------------------------------------------------------------------

    /// Hold the craft in place, saving its velocity for resume.
    pub fn pause(&mut self, sim_time_s: f64) {
        if self.mode == DriverMode::Paused {
            return;
        }

        self.pre_pause_velocity = Some(self.state.velocity_ned_ms);
        self.state.velocity_ned_ms = Vector3::zeros();
        self.state.acceleration_ned_ms2 = Vector3::zeros();

        if let Some(token) = self.complete_token.take() {
            token.cancel();
        }

        self.paused_at_s = sim_time_s;
        self.mode = DriverMode::Paused;
        self.pending.push(DriverEvent::Paused);
    }

    /// Resume from a pause, shifting the leg clock by the held time.
    pub fn unpause(&mut self, sim_time_s: f64) {
        if self.mode != DriverMode::Paused {
            return;
        }

        if let Some(velocity) = self.pre_pause_velocity.take() {
            self.state.velocity_ned_ms = velocity;
        }
        if let Some(token) = self.resume_token.take() {
            token.cancel();
        }

        self.path_start_time_s += sim_time_s - self.paused_at_s;
        self.schedule_completion(self.path_start_time_s);
        self.mode = DriverMode::Executing;
        self.pending.push(DriverEvent::Resumed);
    }

    // -----------------------------------------------------------------------
    // COMMANDED GOALS
    // -----------------------------------------------------------------------

    /// Leave the route and climb or descend to an altitude, then extrapolate.
    pub fn go_to_altitude(
        &mut self,
        sim_time_s: f64,
        altitude_m: f64,
        climb_rate_ms: Option<f64>,
    ) -> Result<(), DriverError> {
        let mut target = PathTarget::default();
        target
            .flags
            .insert(TargetFlags::ALTITUDE | TargetFlags::EXTRAPOLATE);
        target.altitude_m = altitude_m;

        self.command(sim_time_s, target, |constraints| {
            if let Some(rate) = climb_rate_ms {
                constraints.max_climb_rate_ms = constraints.max_climb_rate_ms.min(rate);
            }
        })
    }

    /// Leave the route and change speed, then extrapolate.
    pub fn go_to_speed(
        &mut self,
        sim_time_s: f64,
        speed_ms: f64,
        linear_accel_ms2: Option<f64>,
    ) -> Result<(), DriverError> {
        let mut target = PathTarget::default();
        target
            .flags
            .insert(TargetFlags::SPEED | TargetFlags::EXTRAPOLATE);
        target.speed_ms = speed_ms;

        self.command(sim_time_s, target, |constraints| {
            if let Some(accel) = linear_accel_ms2 {
                constraints.max_linear_accel_ms2 = constraints.max_linear_accel_ms2.min(accel);
            }
        })
    }

    /// Leave the route and turn onto an absolute heading, then extrapolate.
    pub fn turn_to_heading(
        &mut self,
        sim_time_s: f64,
        heading_rad: f64,
        direction: TurnDirection,
    ) -> Result<(), DriverError> {
        let mut target = PathTarget::default();
        target
            .flags
            .insert(TargetFlags::HEADING | TargetFlags::EXTRAPOLATE);
        target.heading_rad = heading_rad;
        target.turn_direction = direction;

        self.command(sim_time_s, target, |_| ())
    }

    /// Leave the route and turn through a relative angle (positive right),
    /// then extrapolate.
    pub fn turn_to_relative_heading(
        &mut self,
        sim_time_s: f64,
        angle_rad: f64,
    ) -> Result<(), DriverError> {
        let mut target = PathTarget::default();
        target
            .flags
            .insert(TargetFlags::HEADING | TargetFlags::RELATIVE_TURN | TargetFlags::EXTRAPOLATE);
        target.heading_rad = angle_rad;

        self.command(sim_time_s, target, |_| ())
    }

    fn command<F>(
        &mut self,
        sim_time_s: f64,
        mut target: PathTarget,
        restrict: F,
    ) -> Result<(), DriverError>
    where
        F: FnOnce(&mut PathConstraints),
    {
        if self.mode == DriverMode::Idle {
            return Err(DriverError::NotStarted);
        }
        if self.mode == DriverMode::Paused {
            self.unpause(sim_time_s);
        }

        // Bring the state up to the command time before re-planning
        self.update_position(sim_time_s);

        self.computer.constraints = self.default_constraints;
        restrict(&mut self.computer.constraints);
        self.computer.constrain_target(&mut target);

        self.route_following = false;
        if let Some(token) = self.complete_token.take() {
            token.cancel();
        }

        self.target = target;
        self.trajectory.clear();
        self.computer
            .compute_path(&self.state, &self.target, &mut self.trajectory);
        self.path_start_time_s = sim_time_s;
        self.last_replan_time_s = sim_time_s;
        self.last_update_time_s = sim_time_s;
        self.mode = DriverMode::Executing;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // QUERIES
    // -----------------------------------------------------------------------

    /// Predicted position `lookahead_s` seconds from the last update, flying
    /// the remaining route. `(lat_deg, lon_deg, alt_m)`.
    pub fn future_location(&self, lookahead_s: f64) -> Option<(f64, f64, f64)> {
        let mut rel_time = self.last_update_time_s - self.path_start_time_s + lookahead_s;

        if rel_time <= self.trajectory.duration_s() {
            let state = self.trajectory.get_state(rel_time)?;
            return Some((state.latitude_deg, state.longitude_deg, state.altitude_m));
        }

        // Fly the remaining waypoints on a scratch computer
        let mut computer = self.computer.clone();
        let mut state = self.trajectory.end_state()?;
        rel_time -= self.trajectory.duration_s();

        let route = self.route.as_ref().filter(|_| self.route_following);
        let mut index = self.target_index;

        for _ in 0..128 {
            let next = route.and_then(|r| r.next_index(index));
            let target = match next.and_then(|i| route.and_then(|r| r.get(i))) {
                Some(waypoint) => {
                    index = next.unwrap_or(index);
                    let after = route
                        .and_then(|r| r.next_index(index))
                        .and_then(|i| route.and_then(|r| r.get(i)));
                    let mut target = computer.create_target(&state, waypoint, after);
                    computer.constrain_target(&mut target);
                    target
                }
                None => {
                    let mut target = PathTarget::default();
                    target.flags.insert(TargetFlags::EXTRAPOLATE);
                    target
                }
            };

            let mut traj = Trajectory::new();
            computer.compute_path(&state, &target, &mut traj);
            if rel_time <= traj.duration_s() {
                let sampled = traj.get_state(rel_time)?;
                return Some((
                    sampled.latitude_deg,
                    sampled.longitude_deg,
                    sampled.altitude_m,
                ));
            }
            rel_time -= traj.duration_s();
            state = traj.end_state()?;
        }

        Some((state.latitude_deg, state.longitude_deg, state.altitude_m))
    }

    // -----------------------------------------------------------------------
    // GROUND HANDLING
    // -----------------------------------------------------------------------

    /// Clamp a ground craft onto the terrain surface with level attitude.
    fn clamp_to_ground(&mut self) {
        if !self.computer.constraints.is_on_ground {
            return;
        }
        if let Some(lookup) = &self.ground_height {
            self.state.altitude_m = lookup(self.state.latitude_deg, self.state.longitude_deg);
            self.state.velocity_ned_ms.z = 0.0;
            self.state.orientation_ned_rad.y = 0.0;
            self.state.orientation_ned_rad.z = 0.0;
        }
    }
}

impl std::fmt::Debug for WaypointDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("WaypointDriver")
            .field("mode", &self.mode)
            .field("target_index", &self.target_index)
            .field("path_start_time_s", &self.path_start_time_s)
            .field("last_update_time_s", &self.last_update_time_s)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::route::Waypoint;
    use std::f64::consts::PI;

    fn params_with_radial(accel: f64) -> DriverParams {
        let mut params = DriverParams::default();
        params.default_constraints.max_radial_accel_ms2 = accel;
        params
    }

    fn eastbound(speed: f64) -> KinematicState {
        KinematicState::level_flight(0.0, 0.0, 1000.0, PI / 2.0, speed)
    }

    #[test]
    fn test_lifecycle_modes() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        assert_eq!(driver.mode(), DriverMode::Idle);
        assert!(matches!(driver.update(0.0), Err(DriverError::NotStarted)));

        driver
            .set_route(Route::new(vec![Waypoint::at(0.0, 1.0)]))
            .unwrap();
        assert_eq!(driver.mode(), DriverMode::Planning);

        driver.start(0.0, eastbound(100.0)).unwrap();
        assert_eq!(driver.mode(), DriverMode::Executing);
    }

    #[test]
    fn test_empty_route_rejected() {
        let mut driver = WaypointDriver::new(DriverParams::default());
        assert!(matches!(
            driver.set_route(Route::new(vec![])),
            Err(DriverError::EmptyRoute)
        ));
    }

    #[test]
    fn test_flies_route_and_completes() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![
                Waypoint::at(0.0, 0.5),
                Waypoint::at(0.0, 1.0),
            ]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();

        // 0.5 degrees is about 55.6 km, so each leg is under 600 s
        let mut reached = Vec::new();
        let mut completed = false;
        for step in 1..=2400 {
            let t = step as f64;
            driver.update(t).unwrap();
            for event in driver.take_events() {
                match event {
                    DriverEvent::WaypointReached { index, .. } => reached.push(index),
                    DriverEvent::RouteCompleted => completed = true,
                    _ => (),
                }
            }
            if completed {
                break;
            }
        }

        assert_eq!(reached, vec![0, 1]);
        assert!(completed);
        assert_eq!(driver.mode(), DriverMode::Completed);

        // Completed means extrapolating, not frozen
        let before = *driver.state();
        let after = driver.update(3000.0).unwrap();
        assert!(before.distance_to_m(&after) > 1000.0);
    }

    #[test]
    fn test_time_regression_rejected() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![Waypoint::at(0.0, 1.0)]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();
        driver.update(10.0).unwrap();
        assert!(matches!(
            driver.update(5.0),
            Err(DriverError::TimeRegression(_, _))
        ));
    }

    #[test]
    fn test_pause_holds_and_resume_continues() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![Waypoint::at(0.0, 1.0)]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();

        driver.update(10.0).unwrap();
        let at_pause = *driver.state();
        driver.pause(10.0);
        assert_eq!(driver.mode(), DriverMode::Paused);

        // Held in place with zero velocity
        let held = driver.update(100.0).unwrap();
        assert_eq!(held.speed_ms(), 0.0);
        assert!(at_pause.distance_to_m(&held) < 1.0);

        driver.unpause(100.0);
        assert_eq!(driver.mode(), DriverMode::Executing);

        // Ten seconds of flight after resume matches ten seconds before the
        // pause would have
        let resumed = driver.update(110.0).unwrap();
        assert!((resumed.speed_ms() - 100.0).abs() < 1e-9);
        assert!((at_pause.distance_to_m(&resumed) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_timed_hold_at_waypoint() {
        let mut first = Waypoint::at(0.0, 0.1);
        first.pause_time_s = Some(50.0);

        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![first, Waypoint::at(0.0, 0.2)]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();

        // 0.1 deg is 11.1 km, reached at about 111 s
        let mut hold_seen = false;
        let mut resume_seen = false;
        for step in 1..=400 {
            driver.update(step as f64).unwrap();
            for event in driver.take_events() {
                match event {
                    DriverEvent::Paused => hold_seen = true,
                    DriverEvent::Resumed => resume_seen = true,
                    _ => (),
                }
            }
        }
        assert!(hold_seen);
        assert!(resume_seen);
        assert_eq!(driver.target_index(), 1);
    }

    #[test]
    fn test_zero_time_loop_pauses() {
        // A single waypoint which jumps to itself, already at the craft's
        // position, would loop without consuming time
        let mut only = Waypoint::at(0.0, 0.0);
        only.label = Some("here".to_string());
        only.goto = Some("here".to_string());
        only.position = Some((0.0, 0.0));

        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver.set_route(Route::new(vec![only])).unwrap();

        // Start exactly on the point with no speed, the leg is zero length
        driver
            .start(0.0, KinematicState::level_flight(0.0, 0.0, 1000.0, 0.0, 0.0))
            .unwrap();
        driver.update(1.0).unwrap();
        assert_eq!(driver.mode(), DriverMode::Paused);
    }

    #[test]
    fn test_distant_loop_waypoint_is_flown_to_first() {
        // A self-goto waypoint far away is a normal leg first, the craft
        // only circles over it once it gets there
        let mut only = Waypoint::at(0.0, 0.5);
        only.label = Some("orbit".to_string());
        only.goto = Some("orbit".to_string());

        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver.set_route(Route::new(vec![only])).unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();

        // 0.5 degrees east is about 55.6 km, reached in roughly 556 s
        let mut reached = false;
        for step in 1..=800 {
            driver.update(step as f64).unwrap();
            if driver
                .take_events()
                .iter()
                .any(|e| matches!(e, DriverEvent::WaypointReached { .. }))
            {
                reached = true;
                break;
            }
        }
        assert!(reached);

        let (_, dist) = crate::geo::great_circle_heading_distance(
            driver.state().latitude_deg,
            driver.state().longitude_deg,
            0.0,
            0.5,
        );
        assert!(dist < 5000.0, "still {} m from the waypoint", dist);
    }

    #[test]
    fn test_go_to_altitude_command() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![Waypoint::at(0.0, 5.0)]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();
        driver.update(10.0).unwrap();

        driver.go_to_altitude(10.0, 3000.0, Some(10.0)).unwrap();
        // 2000 m at 10 m/s takes 200 s
        let state = driver.update(250.0).unwrap();
        assert!((state.altitude_m - 3000.0).abs() < 1.0);

        // The route has been abandoned, the craft extrapolates instead of
        // re-targeting waypoint 0
        let mut reached = false;
        driver.update(400.0).unwrap();
        for event in driver.take_events() {
            if matches!(event, DriverEvent::WaypointReached { .. }) {
                reached = true;
            }
        }
        assert!(!reached);
    }

    #[test]
    fn test_turn_to_heading_command() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![Waypoint::at(0.0, 5.0)]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();
        driver.update(1.0).unwrap();

        driver
            .turn_to_heading(1.0, 0.0, TurnDirection::Shortest)
            .unwrap();

        // Quarter turn at r = 100^2/9.8 m takes about 16 s
        let state = driver.update(100.0).unwrap();
        assert!(state.heading_rad().abs() < 0.01);
    }

    #[test]
    fn test_future_location_beyond_current_leg() {
        let mut driver = WaypointDriver::new(params_with_radial(9.8));
        driver
            .set_route(Route::new(vec![
                Waypoint::at(0.0, 0.1),
                Waypoint::at(0.0, 0.2),
            ]))
            .unwrap();
        driver.start(0.0, eastbound(100.0)).unwrap();
        driver.update(1.0).unwrap();

        // The first leg lasts about 111 s, look 150 s ahead into the second
        let (lat, lon, _) = driver.future_location(150.0).unwrap();
        assert!(lat.abs() < 0.01);
        assert!(lon > 0.1 && lon < 0.2);
    }

    #[test]
    fn test_ground_clamp() {
        let mut params = params_with_radial(9.8);
        params.default_constraints.is_on_ground = true;

        let mut driver = WaypointDriver::new(params);
        driver.set_ground_height(Box::new(|lat, _lon| 100.0 + lat));
        driver
            .set_route(Route::new(vec![Waypoint::at(0.5, 0.0)]))
            .unwrap();
        driver
            .start(0.0, KinematicState::level_flight(0.0, 0.0, 0.0, 0.0, 10.0))
            .unwrap();

        let state = driver.update(100.0).unwrap();
        assert!((state.altitude_m - (100.0 + state.latitude_deg)).abs() < 1e-9);
        assert_eq!(state.velocity_ned_ms.z, 0.0);
        assert_eq!(state.orientation_ned_rad.z, 0.0);
    }
}
