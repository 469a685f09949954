//! # Telemetry server
//!
//! Publishes the tracking status and the operating point diagnostic under
//! their own topics.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nav_if::msg::{topic, StatusMsg, TrackingMsg};
use nav_if::net::{zmq, NetError, NetParams, Publisher, SocketOptions};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Publishes tracker telemetry.
pub struct TmServer {
    publisher: Publisher,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the telemetry server.
    ///
    /// This function will not block waiting for subscribers.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, NetError> {
        let socket_options = SocketOptions {
            bind: params.telem_bind,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let publisher = Publisher::new(ctx, socket_options, &params.telem_endpoint)?;

        Ok(Self { publisher })
    }

    /// Publish a status report.
    pub fn send_status(&self, status: &StatusMsg) -> Result<(), NetError> {
        self.publisher.send(topic::STATUS, status)
    }

    /// Publish an operating point diagnostic.
    pub fn send_tracking(&self, tracking: &TrackingMsg) -> Result<(), NetError> {
        self.publisher.send(topic::TRACKING, tracking)
    }
}
