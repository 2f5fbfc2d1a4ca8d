//! # Path computer
//!
//! Turns a [`PathTarget`] into a [`Trajectory`] from a given starting state,
//! honouring the kinematic limits in [`PathConstraints`]. Location targets go
//! through a tangent circle turn followed by a great circle leg, heading
//! targets through a commanded turn, and extrapolation targets produce an
//! unlimited straight leg. Speed and altitude goals are planned as
//! breakpoints which the straight leg builder consumes in order.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod turn;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use util::maths::{normalize_pi, normalize_two_pi, solve_quadric_min_pos};

use crate::constraints::{
    is_limited, PathConstraints, LARGE_DOUBLE, MAXIMUM_TURN_RADIUS, MIN_ACCELERATION, MIN_SPEED,
};
use crate::geo::{self, STANDARD_GRAVITY_MS2};
use crate::route::Waypoint;
use crate::state::KinematicState;
use crate::target::{PathTarget, TargetFlags, TurnDirection};
use crate::traj::{Segment, Trajectory};

use turn::{resolve_turn_direction, TurnSolution};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Turns smaller than this are flown as straight legs.
const MAX_TURN_ERROR_RAD: f64 = 0.005;

/// Beyond this range a location target is approached in stages, the tangent
/// construction degrades over very long baselines.
const MAX_TURN_TO_POINT_DISTANCE_M: f64 = 2.0e6;

/// Longest single great circle leg, just under a quarter of the
/// circumference.
const MAX_STRAIGHT_ARC_RAD: f64 = 0.2475 * TAU;

/// Default cap on a single commanded turn.
pub const DEFAULT_MAX_TURN_ANGLE_RAD: f64 = 1.8 * PI;

/// Recursion cap for staged long distance approaches.
const MAX_APPROACH_STAGES: usize = 3;

/// Breakpoint phases shorter than this are dropped.
const MIN_PHASE_DURATION_S: f64 = 0.01;

/// Leg remainders shorter than this are not worth a segment.
const MIN_PHASE_DISTANCE_M: f64 = 0.01;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// When to leave the current waypoint for the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchMode {
    /// Fly all the way to the point before turning onto the next leg.
    OnPassing,
    /// Begin the turn onto the next leg early so the track cuts the corner.
    OnApproach,
}

impl Default for SwitchMode {
    fn default() -> Self {
        SwitchMode::OnPassing
    }
}

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// One phase of planned speed or altitude change along a leg.
#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    duration_s: f64,
    linear_accel_ms2: f64,
    climb_rate_ms: f64,
    flight_angle_rad: f64,
}

/// Builds trajectories from targets under kinematic constraints.
#[derive(Debug, Clone)]
pub struct PathComputer {
    /// Constraints applied to the legs currently being generated.
    pub constraints: PathConstraints,

    /// Largest turn flown before the craft simply orients at the target.
    pub max_turn_angle_rad: f64,

    /// Default waypoint switching behaviour, a waypoint can override it.
    pub switch_mode: SwitchMode,

    /// Radius of the disc within which location targets are scattered.
    pub position_variance_m: f64,

    /// Fractional scatter applied to speed goals.
    pub speed_variance_frac: f64,

    rng: rand::rngs::StdRng,
    breakpoints: Vec<Breakpoint>,

    // Implied rates and the constraint values they displaced, restored on
    // the next target if still in force
    implied_flight_angle: Option<(f64, f64)>,
    implied_linear_accel: Option<(f64, f64)>,

    // Unfinished altitude and speed goals carried from the previous target
    retained_altitude_m: Option<f64>,
    retained_speed_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl PathComputer {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            constraints: PathConstraints::default(),
            max_turn_angle_rad: DEFAULT_MAX_TURN_ANGLE_RAD,
            switch_mode: SwitchMode::OnPassing,
            position_variance_m: 0.0,
            speed_variance_frac: 0.0,
            rng: rand::rngs::StdRng::seed_from_u64(seed),
            breakpoints: Vec::new(),
            implied_flight_angle: None,
            implied_linear_accel: None,
            retained_altitude_m: None,
            retained_speed_ms: None,
        }
    }

    /// Set the maximum commanded turn, clamped into `[pi, 2 pi]`.
    pub fn set_max_turn_angle(&mut self, angle_rad: f64) {
        self.max_turn_angle_rad = angle_rad.max(PI).min(TAU);
    }

    // -----------------------------------------------------------------------
    // TARGET PREPARATION
    // -----------------------------------------------------------------------

    /// Build the target for the leg towards `waypoint`, seen from `state`.
    ///
    /// `next` is the waypoint after it, needed for turn on approach. This may
    /// tighten `self.constraints` when a goal has no explicit rate limit and
    /// one can be computed so the goal completes exactly at the waypoint.
    /// Altitude and speed goals continue through waypoints silent on them.
    pub fn create_target(
        &mut self,
        state: &KinematicState,
        waypoint: &Waypoint,
        next: Option<&Waypoint>,
    ) -> PathTarget {
        // Rates implied for the previous leg do not constrain this one
        if let Some((implied, prior)) = self.implied_flight_angle.take() {
            if self.constraints.max_flight_path_angle_rad == implied {
                self.constraints.max_flight_path_angle_rad = prior;
            }
        }
        if let Some((implied, prior)) = self.implied_linear_accel.take() {
            if self.constraints.max_linear_accel_ms2 == implied {
                self.constraints.max_linear_accel_ms2 = prior;
            }
        }

        let mut target = PathTarget::default();
        target.turn_direction = waypoint.turn_direction;

        if let Some((lat, lon)) = waypoint.position {
            target.flags.insert(TargetFlags::LOCATION);
            target.latitude_deg = lat;
            target.longitude_deg = lon;

            if self.position_variance_m > 0.0 {
                let bearing = self.rng.gen::<f64>() * TAU;
                let offset = self.rng.gen::<f64>() * self.position_variance_m;
                let (vlat, vlon) = geo::extrapolate_great_circle(lat, lon, bearing, offset);
                target.latitude_deg = vlat;
                target.longitude_deg = vlon;
            }
        } else if let Some(heading) = waypoint.heading_rad {
            target.flags.insert(TargetFlags::HEADING | TargetFlags::EXTRAPOLATE);
            if waypoint.relative_heading {
                target.flags.insert(TargetFlags::RELATIVE_TURN);
            }
            target.heading_rad = heading;
        } else {
            target.flags.insert(TargetFlags::EXTRAPOLATE);
        }

        if waypoint.position.is_none() {
            if let Some(dist) = waypoint.distance_m {
                target.flags.insert(TargetFlags::EXTRAPOLATE);
                target.distance_m = dist;
            }
        }

        if let Some(alt) = waypoint.altitude_m.or(self.retained_altitude_m) {
            target.flags.insert(TargetFlags::ALTITUDE);
            target.altitude_m = alt;
        }
        if let Some(speed) = waypoint.speed_ms {
            target.flags.insert(TargetFlags::SPEED);
            let scatter = if self.speed_variance_frac > 0.0 {
                1.0 + self.speed_variance_frac * (self.rng.gen::<f64>() * 2.0 - 1.0)
            } else {
                1.0
            };
            target.speed_ms = (speed * scatter).max(0.0);
        } else if let Some(speed) = self.retained_speed_ms {
            target.flags.insert(TargetFlags::SPEED);
            target.speed_ms = speed;
        }

        match waypoint.required {
            Some(true) => target.flags.insert(TargetFlags::REQUIRED_POINT),
            Some(false) => target.flags.insert(TargetFlags::OPTIONAL_POINT),
            None => (),
        }

        if let Some(time) = waypoint.time_to_point_s {
            target.flags.insert(TargetFlags::TIME_TO_POINT);
            target.time_s = time;
            // A stationary craft can never arrive, give it a nominal speed
            if !target.flags.contains(TargetFlags::SPEED) && state.speed_ms() < MIN_SPEED {
                target.flags.insert(TargetFlags::SPEED);
                target.speed_ms = 1.0;
            }
        }

        let switch = waypoint.switch_mode.unwrap_or(self.switch_mode);
        if switch == SwitchMode::OnApproach && target.flags.contains(TargetFlags::LOCATION) {
            if let Some((nlat, nlon)) = next.and_then(|n| n.position) {
                target.flags.insert(TargetFlags::TURN_ON_APPROACH);
                target.next_latitude_deg = nlat;
                target.next_longitude_deg = nlon;
                target.next_radial_accel_ms2 = next
                    .and_then(|n| n.radial_accel_ms2)
                    .unwrap_or(self.constraints.max_radial_accel_ms2);
            }
        }

        self.retained_altitude_m = if target.flags.contains(TargetFlags::ALTITUDE) {
            Some(target.altitude_m)
        } else {
            None
        };
        self.retained_speed_ms = if target.flags.contains(TargetFlags::SPEED) {
            Some(target.speed_ms)
        } else {
            None
        };

        self.compute_implied_rates(state, &target);

        target
    }

    /// Forget altitude and speed goals carried from previous targets.
    pub fn clear_retained_goals(&mut self) {
        self.retained_altitude_m = None;
        self.retained_speed_ms = None;
    }

    /// When a goal has no explicit rate limit, derive one so the goal
    /// completes over the length of the leg rather than instantaneously.
    fn compute_implied_rates(&mut self, state: &KinematicState, target: &PathTarget) {
        if !target.flags.contains(TargetFlags::LOCATION) {
            return;
        }

        let (_, dist) = geo::great_circle_heading_distance(
            state.latitude_deg,
            state.longitude_deg,
            target.latitude_deg,
            target.longitude_deg,
        );
        if dist < 1.0 {
            return;
        }

        if target.flags.contains(TargetFlags::ALTITUDE)
            && !is_limited(self.constraints.max_climb_rate_ms)
            && !is_limited(self.constraints.max_flight_path_angle_rad)
        {
            let dalt = target.altitude_m - state.altitude_m;
            if dalt.abs() > 0.01 {
                let angle = dalt.abs().atan2(dist);
                debug!("climb unconstrained, using implied flight angle {:.4} rad", angle);
                self.implied_flight_angle =
                    Some((angle, self.constraints.max_flight_path_angle_rad));
                self.constraints.max_flight_path_angle_rad = angle;
            }
        }

        if target.flags.contains(TargetFlags::SPEED)
            && !is_limited(self.constraints.max_linear_accel_ms2)
        {
            let v0 = state.speed_ms();
            let dv = target.speed_ms - v0;
            let avg = 0.5 * (v0 + target.speed_ms);
            if dv.abs() > MIN_SPEED && avg > MIN_SPEED {
                let time_est = (dist / avg).max(MIN_PHASE_DURATION_S);
                let accel = dv.abs() / time_est;
                debug!("accel unconstrained, using implied accel {:.4} m/s^2", accel);
                self.implied_linear_accel = Some((accel, self.constraints.max_linear_accel_ms2));
                self.constraints.max_linear_accel_ms2 = accel;
            }
        }
    }

    /// Force the target's goals inside the current constraints.
    pub fn constrain_target(&self, target: &mut PathTarget) {
        if self.constraints.is_on_ground {
            target.flags.remove(TargetFlags::ALTITUDE);
        }
        if target.flags.contains(TargetFlags::ALTITUDE) {
            target.altitude_m = target
                .altitude_m
                .min(self.constraints.max_altitude_m)
                .max(self.constraints.min_altitude_m);
        }
        if target.flags.contains(TargetFlags::SPEED) {
            target.speed_ms = target
                .speed_ms
                .min(self.constraints.max_speed_ms)
                .max(self.constraints.min_speed_ms.max(0.0));
        }
    }

    // -----------------------------------------------------------------------
    // PATH GENERATION
    // -----------------------------------------------------------------------

    /// Extend `traj` from `initial` so that it achieves `target`.
    pub fn compute_path(
        &mut self,
        initial: &KinematicState,
        target: &PathTarget,
        traj: &mut Trajectory,
    ) {
        self.breakpoints = self.plan_breakpoints(initial, target);

        if target.flags.contains(TargetFlags::LOCATION) {
            self.turn_to_point(initial, target, traj, 0);
        } else if target.flags.contains(TargetFlags::HEADING) {
            let delta = if target.flags.contains(TargetFlags::RELATIVE_TURN) {
                target.heading_rad
            } else {
                heading_change(initial.heading_rad(), target.heading_rad, target.turn_direction)
            };
            self.turn_by_angle(initial, delta, target, traj);
        } else if target.flags.contains(TargetFlags::EXTRAPOLATE)
            || !self.breakpoints.is_empty()
        {
            self.straight_on_heading(initial, target, traj);
        } else {
            // No goals at all, a zero length path
            traj.append(Segment::Pause { duration_s: 0.0 }, *initial);
        }

        if target.flags.contains(TargetFlags::TIME_TO_POINT) {
            self.revise_arrival_time(target, traj);
        }
    }

    /// Fly to a location target: tangent turn then great circle leg.
    fn turn_to_point(
        &mut self,
        state: &KinematicState,
        target: &PathTarget,
        traj: &mut Trajectory,
        stage: usize,
    ) {
        let speed = state.speed_ms().max(MIN_SPEED);
        let radius = self.constraints.turn_radius_m(speed);
        let target_wcs = geo::lla_to_wcs(target.latitude_deg, target.longitude_deg, state.altitude_m);

        let (bearing, dist) = geo::great_circle_heading_distance(
            state.latitude_deg,
            state.longitude_deg,
            target.latitude_deg,
            target.longitude_deg,
        );

        // Already effectively at the point
        if dist < (0.1 * radius).max(1.0) {
            if traj.is_empty() {
                traj.append(Segment::Pause { duration_s: 0.0 }, *state);
            }
            return;
        }

        // Stage very long approaches, the tangent construction assumes the
        // target is reasonably local
        if dist > MAX_TURN_TO_POINT_DISTANCE_M && stage < MAX_APPROACH_STAGES {
            let delta = heading_change(state.heading_rad(), bearing, target.turn_direction);

            // Hold the planned speed and altitude phases back for the leg
            // itself
            let saved = std::mem::take(&mut self.breakpoints);
            self.turn_by_angle(state, delta, &PathTarget::default(), traj);
            self.breakpoints = saved;
            let mid = traj.end_state().unwrap_or(*state);

            let leg = dist - 0.5 * MAX_TURN_TO_POINT_DISTANCE_M;
            self.fly_straight(&mid, bearing, leg, LARGE_DOUBLE, target, traj);
            let arrived = traj.end_state().unwrap_or(mid);

            self.turn_to_point(&arrived, target, traj, stage + 1);
            return;
        }

        let clockwise = match target.turn_direction {
            TurnDirection::Right => true,
            TurnDirection::Left => false,
            TurnDirection::Shortest => match resolve_turn_direction(state, &target_wcs) {
                Some(cw) => cw,
                None => {
                    let ahead = normalize_pi(bearing - state.heading_rad()).abs() < 0.5 * PI;
                    if ahead {
                        self.straight_to_point(state, target, traj, true);
                        return;
                    }
                    // Dead astern, either side works
                    true
                }
            },
        };

        let mut solution = TurnSolution::new(state, radius, clockwise);
        let threshold = (radius * target.turn_failure_threshold).max(0.1);
        let mut angle = solution.turn_angle_to_point(&target_wcs);

        if angle.is_none()
            && (target.flags.contains(TargetFlags::REQUIRED_POINT)
                || solution.miss_distance_m(&target_wcs) > threshold)
        {
            // The target is buried inside this turn circle, a turn the other
            // way opens it up
            solution.reverse();
            angle = solution.turn_angle_to_point(&target_wcs);
        }

        let mut angle = match angle {
            Some(a) => a,
            None => {
                if target.flags.contains(TargetFlags::OPTIONAL_POINT) {
                    debug!(
                        "optional point ({:.4}, {:.4}) unreachable, skipping",
                        target.latitude_deg, target.longitude_deg
                    );
                    if traj.is_empty() {
                        traj.append(Segment::Pause { duration_s: 0.0 }, *state);
                    }
                    return;
                }
                // Best we can do is the closest point of approach
                solution.cpa_turn_angle(&target_wcs)
            }
        };

        // Under shortest-direction a tangent solve past a half turn usually
        // means the other side is cheaper
        if target.turn_direction == TurnDirection::Shortest && angle.abs() > PI {
            let mut mirrored = solution.clone();
            mirrored.reverse();
            if let Some(other) = mirrored.turn_angle_to_point(&target_wcs) {
                if other.abs() < angle.abs() {
                    solution = mirrored;
                    angle = other;
                }
            }
        }

        // A heading already almost on target can solve as a full circle,
        // suppress it
        let full_circle_threshold = (0.01 * dist / radius.max(1.0)).min(0.5);
        if angle.abs() > TAU - full_circle_threshold {
            angle = 0.0;
        }

        if angle.abs() > self.max_turn_angle_rad {
            let to_target = target_wcs - state.position_wcs();
            let ahead = state.velocity_wcs().dot(&to_target) > 0.0;
            if ahead {
                // Snap onto the bearing instead of flying a near full circle
                let oriented = oriented_state(state, bearing);
                traj.append_with_end(Segment::Pause { duration_s: 0.0 }, *state, oriented);
                self.straight_to_point(&oriented, target, traj, false);
                return;
            }
        }

        if angle.abs() < MAX_TURN_ERROR_RAD {
            self.straight_to_point(state, target, traj, true);
            return;
        }

        let after_turn = self.append_turn(state, &solution, angle, traj);
        self.straight_to_point(&after_turn, target, traj, false);
    }

    /// Append the turn arc described by `solution` and return the state at
    /// its end.
    fn append_turn(
        &self,
        state: &KinematicState,
        solution: &TurnSolution,
        angle: f64,
        traj: &mut Trajectory,
    ) -> KinematicState {
        let speed = state.speed_ms().max(MIN_SPEED);
        let radius = solution.surface_radius_m;

        let target_roll = if radius > 0.1 {
            angle.signum() * (speed * speed / (STANDARD_GRAVITY_MS2 * radius)).atan()
        } else {
            0.0
        };

        let duration = angle.abs() * solution.planar_radius_m / speed;
        let segment = Segment::Arc {
            duration_s: duration,
            axis_wcs: solution.segment_axis_wcs(),
            rotation_radius_m: solution.planar_radius_m,
            speed_ms: speed,
            target_roll_rad: target_roll,
            roll_rate_rads: self.constraints.roll_rate_limit_rads,
        };
        let end = segment.compute_state(state, duration);
        traj.append(segment, *state);
        end
    }

    /// Straight leg from `state` to the target location.
    ///
    /// With `along_current_heading` the craft keeps its present track and
    /// flies the projected distance, used when the residual heading error is
    /// too small to bother turning for.
    fn straight_to_point(
        &mut self,
        state: &KinematicState,
        target: &PathTarget,
        traj: &mut Trajectory,
        along_current_heading: bool,
    ) {
        let (bearing, dist) = geo::great_circle_heading_distance(
            state.latitude_deg,
            state.longitude_deg,
            target.latitude_deg,
            target.longitude_deg,
        );

        let (leg_bearing, mut arc_length) = if along_current_heading {
            let error = normalize_pi(bearing - state.heading_rad());
            (state.heading_rad(), (dist * error.cos()).max(1.0))
        } else {
            (bearing, dist)
        };

        arc_length = arc_length.min(MAX_STRAIGHT_ARC_RAD * geo::EARTH_RADIUS_M);

        // Cut the corner onto the next leg when switching on approach
        if target.flags.contains(TargetFlags::TURN_ON_APPROACH) {
            let (next_bearing, next_dist) = geo::great_circle_heading_distance(
                target.latitude_deg,
                target.longitude_deg,
                target.next_latitude_deg,
                target.next_longitude_deg,
            );
            let angle_to_next = normalize_pi(next_bearing - bearing).abs();
            if angle_to_next < 0.95 * PI {
                let speed = state.speed_ms().max(MIN_SPEED);
                let accel = target.next_radial_accel_ms2.max(MIN_ACCELERATION);
                let next_radius = (speed * speed / accel).min(MAXIMUM_TURN_RADIUS);
                let early = (next_radius * (0.5 * angle_to_next).tan()).min(2.0 * next_dist);
                arc_length = (arc_length - early).max(1.0);
            }
        }

        self.fly_straight(state, leg_bearing, arc_length, LARGE_DOUBLE, target, traj);
    }

    /// Unlimited (or distance/time bounded) leg along the current heading.
    fn straight_on_heading(
        &mut self,
        state: &KinematicState,
        target: &PathTarget,
        traj: &mut Trajectory,
    ) {
        let distance = if target.distance_m > 0.0 {
            target.distance_m
        } else {
            LARGE_DOUBLE
        };
        let time = if target.time_s > 0.0 && !target.flags.contains(TargetFlags::TIME_TO_POINT) {
            target.time_s
        } else if target.flags.contains(TargetFlags::EXTRAPOLATE) || target.distance_m > 0.0 {
            LARGE_DOUBLE
        } else {
            // Only the planned speed and altitude phases, no open ended leg
            self.breakpoints.iter().map(|bp| bp.duration_s).sum()
        };

        self.fly_straight(state, state.heading_rad(), distance, time, target, traj);
    }

    /// Build the segments of a great circle leg, consuming the planned
    /// breakpoints then continuing at constant speed.
    fn fly_straight(
        &mut self,
        state: &KinematicState,
        bearing_rad: f64,
        distance_m: f64,
        time_budget_s: f64,
        target: &PathTarget,
        traj: &mut Trajectory,
    ) {
        // Motion follows the great circle through the position along the
        // bearing
        let mut s = oriented_state(state, bearing_rad);
        let pos = s.position_wcs();
        let vel_dir = if s.speed_ms() > 1.0e-12 {
            s.velocity_wcs().normalize()
        } else {
            geo::ned_to_wcs_at(
                s.latitude_deg,
                s.longitude_deg,
                &Vector3::new(bearing_rad.cos(), bearing_rad.sin(), 0.0),
            )
        };
        let axis = pos.cross(&vel_dir);
        let rotation_radius = geo::earth_radius_at_altitude(s.altitude_m);
        let roll_rate = self.constraints.roll_rate_limit_rads;

        let mut dist_remaining = distance_m;
        let mut time_remaining = time_budget_s;

        let breakpoints = std::mem::take(&mut self.breakpoints);
        for bp in breakpoints {
            if dist_remaining <= MIN_PHASE_DISTANCE_M || time_remaining <= 0.0 {
                break;
            }

            let v0 = s.speed_ms();
            let mut duration = bp.duration_s.min(time_remaining);

            // End the phase early if the leg runs out first
            let phase_dist = v0 * duration + 0.5 * bp.linear_accel_ms2 * duration * duration;
            if phase_dist > dist_remaining {
                if let Some(t) =
                    solve_quadric_min_pos(&[-dist_remaining, v0, 0.5 * bp.linear_accel_ms2])
                {
                    duration = t.min(duration);
                }
            }
            if duration < MIN_PHASE_DURATION_S {
                continue;
            }

            let is_approximation =
                s.roll_rad().abs() > 1.0e-6 && bp.linear_accel_ms2.abs() > MIN_ACCELERATION;
            let segment = Segment::Dynamics {
                duration_s: duration,
                axis_wcs: axis,
                rotation_radius_m: rotation_radius,
                linear_accel_ms2: bp.linear_accel_ms2,
                climb_rate_ms: bp.climb_rate_ms,
                flight_angle_rad: bp.flight_angle_rad,
                roll_rate_rads: roll_rate,
                is_approximation,
            };
            let end = segment.compute_state(&s, duration);
            traj.append(segment, s);

            dist_remaining -= v0 * duration + 0.5 * bp.linear_accel_ms2 * duration * duration;
            time_remaining -= duration;
            s = end;
        }

        if dist_remaining <= MIN_PHASE_DISTANCE_M || time_remaining <= 0.0 {
            return;
        }

        // Constant speed remainder
        if target.flags.contains(TargetFlags::ALTITUDE) {
            let unconstrained = !is_limited(self.constraints.max_climb_rate_ms)
                && !is_limited(self.constraints.max_flight_path_angle_rad);
            if unconstrained || (s.altitude_m - target.altitude_m).abs() < 1.0 {
                // Unconstrained climbs happen instantly, otherwise this just
                // absorbs phase rounding
                s.altitude_m = target.altitude_m;
            }
        }

        let mut speed = s.speed_ms();
        if target.flags.contains(TargetFlags::SPEED)
            && (!is_limited(self.constraints.max_linear_accel_ms2)
                || (speed - target.speed_ms).abs() < 0.1)
        {
            // Unconstrained acceleration changes speed instantly, otherwise
            // just absorb breakpoint rounding
            speed = target.speed_ms;
            s.velocity_ned_ms = Vector3::new(
                speed * s.heading_rad().cos(),
                speed * s.heading_rad().sin(),
                0.0,
            );
        }

        if speed < 1.0e-9 {
            // The craft cannot move, hold it here forever
            traj.append_with_end(
                Segment::Pause {
                    duration_s: LARGE_DOUBLE,
                },
                s,
                s,
            );
            return;
        }

        let duration = if is_limited(dist_remaining) {
            (dist_remaining / speed).min(time_remaining)
        } else {
            time_remaining
        };

        traj.append(
            Segment::Arc {
                duration_s: duration,
                axis_wcs: axis,
                rotation_radius_m: rotation_radius,
                speed_ms: speed,
                target_roll_rad: 0.0,
                roll_rate_rads: roll_rate,
            },
            s,
        );
    }

    /// Commanded turn through `angle` radians (positive right), then any
    /// ordered straight continuation.
    fn turn_by_angle(
        &mut self,
        state: &KinematicState,
        angle: f64,
        target: &PathTarget,
        traj: &mut Trajectory,
    ) {
        let speed = state.speed_ms();
        let radius = self.constraints.turn_radius_m(speed);

        if speed < 0.01 || angle.abs() < 0.01 || radius < 0.1 {
            // Effectively instantaneous
            let turned = oriented_state(state, normalize_pi(state.heading_rad() + angle));
            traj.append_with_end(Segment::Pause { duration_s: 0.0 }, *state, turned);
            if target.flags.contains(TargetFlags::EXTRAPOLATE) || !self.breakpoints.is_empty() {
                self.straight_on_heading(&turned, target, traj);
            }
            return;
        }

        if radius >= MAXIMUM_TURN_RADIUS {
            warn!(
                "turn radius {:.0} m unattainable at {:.1} m/s, flying straight",
                radius, speed
            );
            self.straight_on_heading(state, target, traj);
            return;
        }

        let solution = TurnSolution::new(state, radius, angle > 0.0);
        let after_turn = self.append_turn(state, &solution, angle, traj);

        if target.flags.contains(TargetFlags::EXTRAPOLATE)
            || target.distance_m > 0.0
            || target.time_s > 0.0
            || !self.breakpoints.is_empty()
        {
            let mut leftover = *target;
            if leftover.time_s > 0.0 {
                let turn_time = angle.abs() * solution.planar_radius_m / speed.max(MIN_SPEED);
                leftover.time_s = (leftover.time_s - turn_time).max(0.0);
            }
            self.straight_on_heading(&after_turn, &leftover, traj);
        }
    }

    // -----------------------------------------------------------------------
    // SPEED AND ALTITUDE PLANNING
    // -----------------------------------------------------------------------

    /// Plan the acceleration and climb phases needed to meet the target's
    /// speed and altitude goals, as breakpoints consumed by straight legs.
    fn plan_breakpoints(&self, state: &KinematicState, target: &PathTarget) -> Vec<Breakpoint> {
        let mut breakpoints = Vec::new();

        let v0 = state.speed_ms();
        let dv = target.speed_ms - v0;
        let speed_goal = target.flags.contains(TargetFlags::SPEED)
            && dv.abs() > MIN_SPEED
            && is_limited(self.constraints.max_linear_accel_ms2)
            && self.constraints.max_linear_accel_ms2 > MIN_ACCELERATION;

        let dalt = target.altitude_m - state.altitude_m;
        let alt_goal = target.flags.contains(TargetFlags::ALTITUDE)
            && dalt.abs() > 0.01
            && !self.constraints.is_on_ground;

        let accel = if speed_goal {
            dv.signum() * self.constraints.max_linear_accel_ms2
        } else {
            0.0
        };
        let t_speed = if speed_goal {
            dv.abs() / accel.abs()
        } else {
            0.0
        };
        let v_end = if speed_goal { target.speed_ms } else { v0 };

        if !alt_goal {
            if t_speed >= MIN_PHASE_DURATION_S {
                breakpoints.push(Breakpoint {
                    duration_s: t_speed,
                    linear_accel_ms2: accel,
                    climb_rate_ms: 0.0,
                    flight_angle_rad: 0.0,
                });
            }
            return breakpoints;
        }

        // Climb either at the rate limit or along the flight path angle
        // limit, whichever binds at the slower end of the leg
        let v_ref = if speed_goal {
            v0.min(target.speed_ms)
        } else {
            v0
        }
        .max(MIN_SPEED);

        let rate_limit = self.constraints.max_climb_rate_ms;
        let angle_limit = self.constraints.max_flight_path_angle_rad.min(0.5 * PI);
        let angle_rate = if is_limited(self.constraints.max_flight_path_angle_rad) {
            v_ref * angle_limit.sin()
        } else {
            LARGE_DOUBLE
        };

        if is_limited(rate_limit) && rate_limit <= angle_rate {
            // A rate limited climb gains altitude independently of speed, the
            // phases split cleanly on time
            let rate = dalt.signum() * rate_limit;
            let t_climb = dalt.abs() / rate_limit.max(MIN_SPEED);
            let overlap = t_speed.min(t_climb);
            if overlap >= MIN_PHASE_DURATION_S {
                breakpoints.push(Breakpoint {
                    duration_s: overlap,
                    linear_accel_ms2: accel,
                    climb_rate_ms: rate,
                    flight_angle_rad: 0.0,
                });
            }
            if t_speed - overlap >= MIN_PHASE_DURATION_S {
                breakpoints.push(Breakpoint {
                    duration_s: t_speed - overlap,
                    linear_accel_ms2: accel,
                    climb_rate_ms: 0.0,
                    flight_angle_rad: 0.0,
                });
            }
            if t_climb - overlap >= MIN_PHASE_DURATION_S {
                breakpoints.push(Breakpoint {
                    duration_s: t_climb - overlap,
                    linear_accel_ms2: 0.0,
                    climb_rate_ms: rate,
                    flight_angle_rad: 0.0,
                });
            }
        } else if is_limited(angle_rate) {
            // Along a fixed flight path angle altitude tracks the distance
            // flown, size each phase by the distance it covers
            let angle = dalt.signum() * angle_limit;
            let needed_dist = dalt.abs() / angle_limit.sin().max(1.0e-12);
            let ramp_dist = v0 * t_speed + 0.5 * accel * t_speed * t_speed;

            if needed_dist <= ramp_dist {
                // The climb tops out during the speed ramp
                let t_climb = solve_quadric_min_pos(&[-needed_dist, v0, 0.5 * accel])
                    .unwrap_or(t_speed)
                    .min(t_speed);
                if t_climb >= MIN_PHASE_DURATION_S {
                    breakpoints.push(Breakpoint {
                        duration_s: t_climb,
                        linear_accel_ms2: accel,
                        climb_rate_ms: 0.0,
                        flight_angle_rad: angle,
                    });
                }
                if t_speed - t_climb >= MIN_PHASE_DURATION_S {
                    breakpoints.push(Breakpoint {
                        duration_s: t_speed - t_climb,
                        linear_accel_ms2: accel,
                        climb_rate_ms: 0.0,
                        flight_angle_rad: 0.0,
                    });
                }
            } else {
                if t_speed >= MIN_PHASE_DURATION_S {
                    breakpoints.push(Breakpoint {
                        duration_s: t_speed,
                        linear_accel_ms2: accel,
                        climb_rate_ms: 0.0,
                        flight_angle_rad: angle,
                    });
                }
                if v_end > MIN_SPEED {
                    let t_rest = (needed_dist - ramp_dist) / v_end;
                    if t_rest >= MIN_PHASE_DURATION_S {
                        breakpoints.push(Breakpoint {
                            duration_s: t_rest,
                            linear_accel_ms2: 0.0,
                            climb_rate_ms: 0.0,
                            flight_angle_rad: angle,
                        });
                    }
                }
            }
        } else if t_speed >= MIN_PHASE_DURATION_S {
            // Unconstrained climbs are applied instantly by the leg builder
            breakpoints.push(Breakpoint {
                duration_s: t_speed,
                linear_accel_ms2: accel,
                climb_rate_ms: 0.0,
                flight_angle_rad: 0.0,
            });
        }

        breakpoints
    }

    // -----------------------------------------------------------------------
    // ARRIVAL TIME REVISION
    // -----------------------------------------------------------------------

    /// Re-speed the final leg so the path ends at the target's required
    /// arrival time.
    fn revise_arrival_time(&mut self, target: &PathTarget, traj: &mut Trajectory) {
        let duration = traj.duration_s();
        if !is_limited(duration) || (duration - target.time_s).abs() < 0.01 {
            return;
        }

        let (segment, entry) = match traj.pop_back() {
            Some(pair) => pair,
            None => return,
        };

        let (leg_length, axis, rotation_radius, roll_rate) = match &segment {
            Segment::Arc {
                duration_s,
                axis_wcs,
                rotation_radius_m,
                speed_ms,
                roll_rate_rads,
                ..
            } => (
                speed_ms * duration_s,
                *axis_wcs,
                *rotation_radius_m,
                *roll_rate_rads,
            ),
            _ => {
                traj.append(segment, entry);
                return;
            }
        };

        let remaining = target.time_s - traj.duration_s();
        if remaining <= MIN_PHASE_DURATION_S {
            traj.append(segment, entry);
            return;
        }

        let v0 = entry.speed_ms();
        let excess = leg_length - v0 * remaining;
        if excess.abs() < 0.01 {
            traj.append(segment, entry);
            return;
        }

        // Accelerate (or brake) for t, then hold: the along-leg distance is
        // v0*T + a*T*t - (a/2)*t^2 = D
        let accel_limit = if is_limited(self.constraints.max_linear_accel_ms2) {
            self.constraints.max_linear_accel_ms2
        } else {
            // Pick the gentlest accel which solves it over the whole leg
            2.0 * excess.abs() / (remaining * remaining)
        };
        let accel = excess.signum() * accel_limit;

        let t = match solve_quadric_min_pos(&[-excess, accel * remaining, -0.5 * accel]) {
            Some(t) if t <= remaining => t,
            _ => {
                warn!("cannot meet arrival time {:.2} s, flying unrevised leg", target.time_s);
                traj.append(segment, entry);
                return;
            }
        };

        let dynamics = Segment::Dynamics {
            duration_s: t,
            axis_wcs: axis,
            rotation_radius_m: rotation_radius,
            linear_accel_ms2: accel,
            climb_rate_ms: 0.0,
            flight_angle_rad: 0.0,
            roll_rate_rads: roll_rate,
            is_approximation: false,
        };
        let mid = dynamics.compute_state(&entry, t);
        traj.append(dynamics, entry);

        traj.append(
            Segment::Arc {
                duration_s: remaining - t,
                axis_wcs: axis,
                rotation_radius_m: rotation_radius,
                speed_ms: mid.speed_ms(),
                target_roll_rad: 0.0,
                roll_rate_rads: roll_rate,
            },
            mid,
        );
    }
}

impl Default for PathComputer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Signed heading change from `current` to `desired` honouring the direction
/// preference.
pub fn heading_change(current_rad: f64, desired_rad: f64, direction: TurnDirection) -> f64 {
    let raw = desired_rad - current_rad;
    match direction {
        TurnDirection::Shortest => normalize_pi(raw),
        TurnDirection::Right => normalize_two_pi(raw),
        TurnDirection::Left => -normalize_two_pi(-raw),
    }
}

/// Copy of `state` with the horizontal velocity snapped onto `heading`.
fn oriented_state(state: &KinematicState, heading_rad: f64) -> KinematicState {
    let mut oriented = *state;
    let h_speed = state.ground_speed_ms();
    oriented.velocity_ned_ms = Vector3::new(
        h_speed * heading_rad.cos(),
        h_speed * heading_rad.sin(),
        state.velocity_ned_ms.z,
    );
    oriented.orientation_ned_rad.x = heading_rad;
    oriented
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
