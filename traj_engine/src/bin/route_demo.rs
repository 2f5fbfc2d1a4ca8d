//! # Route demo executable
//!
//! Flies a route from a TOML parameter file and writes the sampled track to
//! a JSON file for plotting.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use color_eyre::{eyre::WrapErr, Report};
use log::{info, LevelFilter};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use traj_engine::driver::params::DriverParams;
use traj_engine::driver::DriverReport;
use traj_engine::{DriverEvent, DriverMode, KinematicState, Route, WaypointDriver};
use util::logger::logger_init;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default parameter file path, relative to the working directory.
const DEFAULT_PARAMS_PATH: &str = "params/route_demo.toml";

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Everything the demo needs: driver parameters, the route and the initial
/// state.
#[derive(Debug, Clone, Deserialize)]
struct DemoParams {
    /// Simulation timestep in seconds.
    pub timestep_s: f64,

    /// Give up after this much simulated time.
    pub max_sim_time_s: f64,

    /// Where to write the sampled track.
    pub track_file_path: String,

    pub initial: InitialState,

    pub driver: DriverParams,

    pub route: Route,
}

#[derive(Debug, Clone, Deserialize)]
struct InitialState {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub heading_deg: f64,
    pub speed_ms: f64,
}

/// One sampled point of the flown track.
#[derive(Debug, Clone, Serialize)]
struct TrackPoint {
    pub sim_time_s: f64,
    pub report: DriverReport,
}

// ---------------------------------------------------------------------------
// MAIN
// ---------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    logger_init(LevelFilter::Info, None).wrap_err("Failed to initialise the logger")?;

    let params_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PARAMS_PATH.to_string());
    let params: DemoParams =
        util::params::load(&params_path).wrap_err("Failed to load demo parameters")?;

    info!("Flying a route of {} waypoints", params.route.len());

    let mut driver = WaypointDriver::new(params.driver.clone());
    driver.set_route(params.route.clone())?;

    let initial = KinematicState::level_flight(
        params.initial.latitude_deg,
        params.initial.longitude_deg,
        params.initial.altitude_m,
        params.initial.heading_deg * PI / 180.0,
        params.initial.speed_ms,
    );
    driver.start(0.0, initial)?;

    let mut track = Vec::new();
    let mut sim_time_s = 0.0;

    while sim_time_s < params.max_sim_time_s {
        sim_time_s += params.timestep_s;
        let state = driver.update(sim_time_s)?;

        for event in driver.take_events() {
            match event {
                DriverEvent::WaypointReached { index, label } => {
                    info!(
                        "Reached waypoint {} ({:?}) at t={:.1} s, ({:.4} N, {:.4} E, {:.0} m)",
                        index,
                        label,
                        sim_time_s,
                        state.latitude_deg,
                        state.longitude_deg,
                        state.altitude_m
                    );
                }
                DriverEvent::RouteCompleted => {
                    info!("Route completed at t={:.1} s", sim_time_s);
                }
                DriverEvent::Paused => info!("Holding at t={:.1} s", sim_time_s),
                DriverEvent::Resumed => info!("Resumed at t={:.1} s", sim_time_s),
            }
        }

        track.push(TrackPoint {
            sim_time_s,
            report: driver.report(),
        });

        if driver.mode() == DriverMode::Completed {
            break;
        }
    }

    let json = serde_json::to_string_pretty(&track).wrap_err("Failed to serialise the track")?;
    std::fs::write(&params.track_file_path, json)
        .wrap_err("Failed to write the track file")?;
    info!(
        "Wrote {} track points to {}",
        track.len(),
        params.track_file_path
    );

    Ok(())
}
