//! Basic control elements: the time-optimal braking profile and the
//! velocity/acceleration limiter for a single command channel.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Instantaneous target velocity of a double integrator braking to rest over
/// the signed residual `delta` with acceleration bound `acc`.
///
/// The sign opposes the residual so that feeding a positive remaining error
/// produces the velocity that closes it.
pub fn time_optimal_control(delta: f64, acc: f64) -> f64 {
    -delta.signum() * (2.0 * acc * delta.abs()).sqrt()
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Saturates a scalar command by symmetric velocity and acceleration bounds
/// over a time step, holding its output between ticks.
///
/// One instance serves one channel, the same semantics apply to the linear
/// and the angular axis. Centralising the slew logic here is what keeps the
/// published commands free of jumps regardless of which control branch
/// produced the target.
#[derive(Debug, Default, Clone, Serialize)]
pub struct VelAccLimiter {
    val: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelAccLimiter {
    /// Drive the output toward `target`, moving at most `acc * dt` from the
    /// previous output and staying within `[-vel, vel]`. Returns the new
    /// output.
    ///
    /// A non-finite result collapses to 0 so that upstream numerical faults
    /// cannot latch into the command stream.
    pub fn set(&mut self, target: f64, vel: f64, acc: f64, dt: f64) -> f64 {
        let step = acc * dt;
        let mut v = target.clamp(self.val - step, self.val + step);
        v = v.clamp(-vel, vel);
        if !v.is_finite() {
            v = 0.0;
        }
        self.val = v;
        v
    }

    /// Add `delta` to the output, limited to the acceleration step, then
    /// saturate to `[-vel, vel]`. Returns the new output.
    pub fn increment(&mut self, delta: f64, vel: f64, acc: f64, dt: f64) -> f64 {
        let step = acc * dt;
        let mut v = self.val + delta.clamp(-step, step);
        v = v.clamp(-vel, vel);
        if !v.is_finite() {
            v = 0.0;
        }
        self.val = v;
        v
    }

    /// Read the current output.
    pub fn get(&self) -> f64 {
        self.val
    }

    /// Reset the output to 0.
    pub fn clear(&mut self) {
        self.val = 0.0;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
