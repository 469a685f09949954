//! Main tracker executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Drain navigation inputs (paths, odometry, transforms, speed
//!           overrides), running odometry-driven control ticks as they
//!           arrive
//!         - In timed mode run one control tick at the configured rate
//!         - Publish the velocity command, status and tracking diagnostic
//!         - Sleep out the remainder of the cycle
//!
//! On shutdown a final stop command is published so the base is never left
//! running the last demand.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use track_exec::{
    cmd_server::CmdServer, data_store::DataStore, nav_client::NavClient, tm_server::TmServer,
    tracker::{TickOutput, Tracker, TrackerParams},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use structopt::StructOpt;

// Internal
use nav_if::msg::TwistCmd;
use nav_if::net::NetParams;
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options for the tracker executable.
#[derive(StructOpt)]
#[structopt(name = "track_exec", about = "Trajectory tracking executable")]
struct Opt {
    /// Directory containing the parameter files
    #[structopt(long, default_value = "params")]
    params_dir: PathBuf,

    /// Directory in which session directories are created
    #[structopt(long, default_value = "sessions")]
    sessions_dir: PathBuf,

    /// Minimum log level
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;
    let opt = Opt::from_args();

    let session = Session::new("track_exec", &opt.sessions_dir)
        .wrap_err("Failed to create the session")?;

    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Trajectory Tracker Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let net_params: NetParams = util::params::load(opt.params_dir.join("net.toml"))
        .wrap_err("Could not load net params")?;

    let tracker_params: TrackerParams = util::params::load(opt.params_dir.join("tracker.toml"))
        .wrap_err("Could not load tracker params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    ds.traj_ctrl
        .init(opt.params_dir.join("traj_ctrl.toml"), &session)
        .wrap_err("Failed to initialise TrajCtrl")?;
    info!("TrajCtrl init complete");

    let mut tracker = Tracker::new(tracker_params);
    info!("Tracker init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = nav_if::net::zmq::Context::new();

    let mut nav_client =
        NavClient::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the NavClient")?;
    info!("NavClient initialised");

    let cmd_server =
        CmdServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the CmdServer")?;
    info!("CmdServer initialised");

    let tm_server =
        TmServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer initialised");

    info!("Network initialisation complete");

    // ---- SHUTDOWN HANDLER ----

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .wrap_err("Failed to install the shutdown handler")?;
    }

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let cycle_period = tracker.cycle_period();

    while running.load(Ordering::SeqCst) {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- INPUT PROCESSING ----

        // Drain navigation inputs. In odometry mode the odometry messages
        // drive control ticks directly.
        for msg in nav_client.recv_all() {
            if let Some(output) = tracker.handle_msg(&msg, &mut ds.traj_ctrl) {
                publish_output(output, &cmd_server, &tm_server, &mut ds);
            }
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        if !tracker.odom_driven() {
            let output = tracker.timed_tick(&mut ds.traj_ctrl);
            publish_output(output, &cmd_server, &tm_server, &mut ds);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    (cycle_dur - cycle_period).as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("Shutdown requested, publishing stop command");

    if let Err(e) = cmd_server.publish(&TwistCmd::zero()) {
        warn!("Could not publish the stop command: {}", e);
    }

    info!("End of execution");

    Ok(())
}

/// Publish the outputs of one control tick.
fn publish_output(
    output: TickOutput,
    cmd_server: &CmdServer,
    tm_server: &TmServer,
    ds: &mut DataStore,
) {
    if let Some(cmd) = output.cmd {
        if let Err(e) = cmd_server.publish(&cmd) {
            warn!("CmdServer error: {}", e);
        }
    }

    ds.record_status(output.status.status);
    if let Err(e) = tm_server.send_status(&output.status) {
        warn!("TmServer error: {}", e);
    }

    if let Some(tracking) = output.tracking {
        if let Err(e) = tm_server.send_tracking(&tracking) {
            warn!("TmServer error: {}", e);
        }
    }
}
