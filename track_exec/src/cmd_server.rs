//! # Command server
//!
//! Publishes the velocity command stream to the base controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use nav_if::msg::{topic, TwistCmd};
use nav_if::net::{zmq, NetError, NetParams, Publisher, SocketOptions};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publishes velocity commands.
pub struct CmdServer {
    publisher: Publisher,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdServer {
    /// Create a new instance of the command server.
    ///
    /// This function will not block waiting for subscribers.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, NetError> {
        let socket_options = SocketOptions {
            bind: params.cmd_bind,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let publisher = Publisher::new(ctx, socket_options, &params.cmd_endpoint)?;

        Ok(Self { publisher })
    }

    /// Publish a velocity command.
    pub fn publish(&self, cmd: &TwistCmd) -> Result<(), NetError> {
        self.publisher.send(topic::CMD_VEL, cmd)
    }
}

impl Drop for CmdServer {
    /// A final stop command is published on shutdown so the base is never
    /// left running the last demand.
    fn drop(&mut self) {
        if let Err(e) = self.publisher.send(topic::CMD_VEL, &TwistCmd::zero()) {
            warn!("Could not publish the final stop command: {}", e);
        }
    }
}
