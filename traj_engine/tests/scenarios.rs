//! End to end scenarios exercising the computer and driver together.

use std::f64::consts::PI;

use traj_engine::constraints::{is_limited, MAXIMUM_TURN_RADIUS};
use traj_engine::driver::params::DriverParams;
use traj_engine::geo;
use traj_engine::traj::Segment;
use traj_engine::{
    DriverEvent, DriverMode, KinematicState, PathComputer, PathTarget, Route, TargetFlags,
    Trajectory, TurnDirection, Waypoint, WaypointDriver,
};

fn computer_with_radial(accel: f64) -> PathComputer {
    let mut computer = PathComputer::new();
    computer.constraints.max_radial_accel_ms2 = accel;
    computer
}

/// Northbound craft turning onto a point one degree east must produce a
/// finite trajectory ending close to the point.
#[test]
fn scenario_turn_and_fly_to_point() {
    let mut computer = computer_with_radial(9.8);
    let state = KinematicState::level_flight(0.0, 0.0, 1000.0, 0.0, 100.0);
    let target = PathTarget::to_location(0.0, 1.0);

    let mut traj = Trajectory::new();
    computer.compute_path(&state, &target, &mut traj);

    assert!(!traj.is_empty());
    assert!(is_limited(traj.duration_s()));

    let end = traj.end_state().unwrap();
    let (_, miss) =
        geo::great_circle_heading_distance(end.latitude_deg, end.longitude_deg, 0.0, 1.0);
    let radius = 100.0f64 * 100.0 / 9.8;
    assert!(miss < 2.0 * radius, "missed the point by {} m", miss);

    // Arriving roughly eastbound
    assert!((end.heading_rad() - PI / 2.0).abs() < 0.1);
}

/// A location goal at the craft's own position collapses to a zero duration
/// path.
#[test]
fn scenario_goal_at_current_state() {
    let mut computer = computer_with_radial(9.8);
    let state = KinematicState::level_flight(45.0, -30.0, 2000.0, 1.0, 80.0);
    let target = PathTarget::to_location(45.0, -30.0);

    let mut traj = Trajectory::new();
    computer.compute_path(&state, &target, &mut traj);

    assert_eq!(traj.duration_s(), 0.0);
    assert!(!traj.is_empty());
}

/// Sampling anywhere inside a pause returns exactly the held state.
#[test]
fn scenario_pause_is_exact() {
    let state = KinematicState::level_flight(10.0, 20.0, 500.0, 0.3, 0.0);
    let mut traj = Trajectory::new();
    traj.append(Segment::Pause { duration_s: 5.0 }, state);

    let at_start = traj.get_state(0.0).unwrap();
    let midway = traj.get_state(2.5).unwrap();

    assert_eq!(at_start.latitude_deg, midway.latitude_deg);
    assert_eq!(at_start.longitude_deg, midway.longitude_deg);
    assert_eq!(at_start.altitude_m, midway.altitude_m);
    assert_eq!(at_start.velocity_ned_ms, midway.velocity_ned_ms);
}

/// Re-planning from a sampled mid-trajectory state must not move the craft.
#[test]
fn scenario_replan_is_continuous() {
    let mut computer = computer_with_radial(9.8);
    let state = KinematicState::level_flight(0.0, 0.0, 1000.0, 0.0, 100.0);
    let target = PathTarget::to_location(0.0, 1.0);

    let mut traj = Trajectory::new();
    computer.compute_path(&state, &target, &mut traj);

    let mid = traj.get_state(120.0).unwrap();

    let mut replanned = Trajectory::new();
    computer.compute_path(&mid, &target, &mut replanned);
    let restart = replanned.get_state(0.0).unwrap();

    assert!(mid.distance_to_m(&restart) < 1.0e-6);
    assert!((mid.speed_ms() - restart.speed_ms()).abs() < 1.0e-9);

    // Both plans end at the same place
    let end_a = traj.end_state().unwrap();
    let end_b = replanned.end_state().unwrap();
    assert!(end_a.distance_to_m(&end_b) < 100.0);
}

/// States across every segment boundary must agree from both sides.
#[test]
fn scenario_boundary_continuity() {
    let mut computer = computer_with_radial(9.8);
    computer.constraints.max_linear_accel_ms2 = 3.0;
    computer.constraints.max_climb_rate_ms = 10.0;

    let state = KinematicState::level_flight(0.0, 0.0, 1000.0, 0.0, 100.0);
    let mut target = PathTarget::to_location(0.0, 1.0);
    target.flags.insert(TargetFlags::SPEED | TargetFlags::ALTITUDE);
    target.speed_ms = 150.0;
    target.altitude_m = 2000.0;

    let mut traj = Trajectory::new();
    computer.compute_path(&state, &target, &mut traj);
    assert!(traj.len() >= 3);

    let mut boundary = 0.0;
    for segment in traj.segments() {
        if boundary > 0.0 {
            let before = traj.get_state(boundary - 1.0e-6).unwrap();
            let after = traj.get_state(boundary + 1.0e-6).unwrap();
            // Compare positions as vectors, the spherical distance formula
            // quantizes at about a decimetre near zero
            let jump = (before.position_wcs() - after.position_wcs()).norm();
            assert!(jump < 0.01, "position jump of {} m at t={}", jump, boundary);
            assert!((before.altitude_m - after.altitude_m).abs() < 0.01);
            assert!((before.speed_ms() - after.speed_ms()).abs() < 0.01);
        }
        boundary += segment.duration_s();
    }
}

/// The turn radius never exceeds its global clamp however loose the limits.
#[test]
fn scenario_turn_radius_clamp() {
    let computer = PathComputer::new();
    // Absurd speed with a tiny turn rate limit
    let mut constraints = computer.constraints;
    constraints.turn_rate_limit_rads = 1.0e-6;
    assert!(constraints.turn_radius_m(10_000.0) <= MAXIMUM_TURN_RADIUS);
}

/// Forced turn directions go the way they were told.
#[test]
fn scenario_turn_direction() {
    let state = KinematicState::level_flight(0.0, 0.0, 1000.0, 0.0, 100.0);

    // Shortest to a target behind-right turns right
    let mut target = PathTarget::to_location(-0.5, 0.3);
    target.turn_direction = TurnDirection::Shortest;
    let mut traj = Trajectory::new();
    computer_with_radial(9.8).compute_path(&state, &target, &mut traj);
    let early = traj.get_state(5.0).unwrap();
    // Turning right means drifting east immediately
    assert!(early.longitude_deg > 0.0);

    // The same target with a forced left turn drifts west first
    target.turn_direction = TurnDirection::Left;
    let mut traj = Trajectory::new();
    computer_with_radial(9.8).compute_path(&state, &target, &mut traj);
    let early = traj.get_state(5.0).unwrap();
    assert!(early.longitude_deg < 0.0);
}

/// A full route flown through the driver visits every waypoint in order and
/// tracks the commanded altitudes.
#[test]
fn scenario_route_following() {
    let mut params = DriverParams::default();
    params.default_constraints.max_radial_accel_ms2 = 9.8;
    params.default_constraints.max_climb_rate_ms = 20.0;
    params.default_constraints.max_linear_accel_ms2 = 5.0;

    let route = Route::new(vec![
        Waypoint::at_with(0.0, 0.3, 2000.0, 120.0),
        Waypoint::at_with(0.3, 0.3, 3000.0, 120.0),
        Waypoint::at_with(0.3, 0.0, 1000.0, 80.0),
    ]);

    let mut driver = WaypointDriver::new(params);
    driver.set_route(route).unwrap();
    driver
        .start(0.0, KinematicState::level_flight(0.0, 0.0, 1000.0, PI / 2.0, 100.0))
        .unwrap();

    let mut reached = Vec::new();
    let mut completed = false;
    let mut max_alt: f64 = 0.0;
    for step in 1..=4000 {
        let state = driver.update(step as f64).unwrap();
        max_alt = max_alt.max(state.altitude_m);
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

    assert_eq!(reached, vec![0, 1, 2]);
    assert!(completed);
    assert_eq!(driver.mode(), DriverMode::Completed);
    assert!(max_alt > 2900.0);

    let end = driver.state();
    assert!((end.speed_ms() - 80.0).abs() < 0.5);
}

/// After the route is done the driver keeps extrapolating on the final
/// heading.
#[test]
fn scenario_completion_extrapolates() {
    let mut params = DriverParams::default();
    params.default_constraints.max_radial_accel_ms2 = 9.8;

    let mut driver = WaypointDriver::new(params);
    driver
        .set_route(Route::new(vec![Waypoint::at(0.0, 0.1)]))
        .unwrap();
    driver
        .start(0.0, KinematicState::level_flight(0.0, 0.0, 1000.0, PI / 2.0, 100.0))
        .unwrap();

    // The leg is about 111 s
    let at_end = driver.update(150.0).unwrap();
    assert_eq!(driver.mode(), DriverMode::Completed);

    let later = driver.update(250.0).unwrap();
    let dist = at_end.distance_to_m(&later);
    assert!((dist - 100.0 * 100.0).abs() < 100.0);
}
