//! # Navigation client
//!
//! Subscribes to the navigation input stream: paths, odometry, transforms
//! and speed overrides, all wrapped in [`NavMsg`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use std::time::Duration;

use nav_if::msg::NavMsg;
use nav_if::net::{zmq, NetError, NetParams, SocketOptions, Subscriber};
use util::logger::Throttle;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Receives navigation input messages.
pub struct NavClient {
    sub: Subscriber,

    parse_log: Throttle,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavClient {
    /// Create a new instance of the navigation client.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, NetError> {
        let socket_options = SocketOptions {
            bind: params.nav_bind,
            linger: 1,
            recv_timeout: 0,
            ..Default::default()
        };

        let sub = Subscriber::new(ctx, socket_options, &params.nav_endpoint, &[])?;

        Ok(Self {
            sub,
            parse_log: Throttle::new(Duration::from_secs(1)),
        })
    }

    /// Drain all pending messages from the socket.
    ///
    /// Messages which fail to parse are dropped with a throttled warning,
    /// a socket error ends the drain for this cycle.
    pub fn recv_all(&mut self) -> Vec<NavMsg> {
        let mut msgs = Vec::new();

        loop {
            match self.sub.try_recv::<NavMsg>() {
                Ok(Some(msg)) => msgs.push(msg),
                Ok(None) => break,
                Err(NetError::DeserialiseError(e)) => {
                    if self.parse_log.ok() {
                        warn!("Could not parse received message: {}", e);
                    }
                }
                Err(e) => {
                    warn!("Error receiving navigation messages: {}", e);
                    break;
                }
            }
        }

        msgs
    }
}
