//! # Network Module
//!
//! This module provides networking abstractions over ZMQ, the networking
//! library chosen for the software. Messages travel over PUB/SUB sockets as
//! JSON, with an optional topic frame in front of the payload.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zmq::{Context, Socket, SocketType};

// Export zmq
pub use zmq;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters for the tracker executable.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint on which navigation inputs (paths, odometry, transforms,
    /// speed overrides) are received.
    pub nav_endpoint: String,

    /// If true the navigation input socket binds rather than connects.
    pub nav_bind: bool,

    /// Endpoint on which velocity commands are published.
    pub cmd_endpoint: String,

    /// If true the velocity command socket binds rather than connects.
    pub cmd_bind: bool,

    /// Endpoint on which telemetry (status and tracking) is published.
    pub telem_endpoint: String,

    /// If true the telemetry socket binds rather than connects.
    pub telem_bind: bool,
}

/// Represents options which can be set on a socket.
///
/// Most options here correspond to those found in the
/// [`zmq_setsockopt`](http://api.zeromq.org/master:zmq-setsockopt)
/// documentation.
pub struct SocketOptions {
    /// Indicates if the socket should bind itself to the endpoint. Servers
    /// should have this value set as `true`, clients should have it set as
    /// `false`.
    ///
    /// The default value is `false`.
    pub bind: bool,

    /// `ZMQ_LINGER`: Set linger period for socket shutdown
    pub linger: i32,

    /// `ZMQ_RCVTIMEO`: Maximum time before a recv operation returns with
    /// `EAGAIN`
    pub recv_timeout: i32,

    /// `ZMQ_SNDTIMEO`: Maximum time before a send operation returns with
    /// `EAGAIN`
    pub send_timeout: i32,

    /// `ZMQ_RECONNECT_IVL`: Set reconnection interval
    pub reconnect_ivl: i32,
}

/// A publishing socket sending serialised messages under a topic.
pub struct Publisher {
    socket: Socket,
}

/// A subscribing socket receiving serialised messages.
pub struct Subscriber {
    socket: Socket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum NetError {
    #[error("Error creating the socket: {0}")]
    CreateSocketError(zmq::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, zmq::Error),

    #[error("Could not connect the socket: {0}")]
    CouldNotConnect(zmq::Error),

    #[error("Could not send the message: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a message: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialise the message: {0}")]
    SerialiseError(serde_json::Error),

    #[error("Could not deserialise the message: {0}")]
    DeserialiseError(serde_json::Error),

    #[error("Received an empty multipart message")]
    EmptyMessage,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SocketOptions {
    /// Set these options on the given socket.
    pub fn set(&self, socket: &Socket) -> Result<(), NetError> {
        socket
            .set_linger(self.linger)
            .map_err(|e| NetError::SocketOptionError("set_linger", e))?;
        socket
            .set_rcvtimeo(self.recv_timeout)
            .map_err(|e| NetError::SocketOptionError("set_rcvtimeo", e))?;
        socket
            .set_sndtimeo(self.send_timeout)
            .map_err(|e| NetError::SocketOptionError("set_sndtimeo", e))?;
        socket
            .set_reconnect_ivl(self.reconnect_ivl)
            .map_err(|e| NetError::SocketOptionError("set_reconnect_ivl", e))?;

        Ok(())
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        // Defaults for sockopts taken from http://api.zeromq.org/master:zmq-setsockopt
        Self {
            bind: false,
            linger: 30_000,
            recv_timeout: -1,
            send_timeout: 0,
            reconnect_ivl: 100,
        }
    }
}

impl Publisher {
    /// Create a new publisher on the given endpoint.
    pub fn new(ctx: &Context, options: SocketOptions, endpoint: &str) -> Result<Self, NetError> {
        let socket = create_socket(ctx, SocketType::PUB, &options, endpoint)?;

        Ok(Self { socket })
    }

    /// Publish a message under the given topic.
    pub fn send<M: Serialize>(&self, topic: &str, msg: &M) -> Result<(), NetError> {
        let payload = serde_json::to_string(msg).map_err(NetError::SerialiseError)?;

        self.socket
            .send_multipart(vec![topic.as_bytes().to_vec(), payload.into_bytes()], 0)
            .map_err(NetError::SendError)
    }
}

impl Subscriber {
    /// Create a new subscriber on the given endpoint.
    ///
    /// `topics` gives the topic prefixes to subscribe to, an empty slice
    /// subscribes to everything.
    pub fn new(
        ctx: &Context,
        options: SocketOptions,
        endpoint: &str,
        topics: &[&str],
    ) -> Result<Self, NetError> {
        let socket = create_socket(ctx, SocketType::SUB, &options, endpoint)?;

        if topics.is_empty() {
            socket
                .set_subscribe(b"")
                .map_err(|e| NetError::SocketOptionError("set_subscribe", e))?;
        } else {
            for topic in topics {
                socket
                    .set_subscribe(topic.as_bytes())
                    .map_err(|e| NetError::SocketOptionError("set_subscribe", e))?;
            }
        }

        Ok(Self { socket })
    }

    /// Receive the next pending message, without blocking.
    ///
    /// The payload is taken from the last frame of the message, so both bare
    /// payloads and `[topic, payload]` multiparts are accepted. Returns
    /// `Ok(None)` when no message is pending.
    pub fn try_recv<M: DeserializeOwned>(&self) -> Result<Option<M>, NetError> {
        let frames = match self.socket.recv_multipart(zmq::DONTWAIT) {
            Ok(f) => f,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(NetError::RecvError(e)),
        };

        let payload = frames.last().ok_or(NetError::EmptyMessage)?;

        serde_json::from_slice(payload)
            .map(Some)
            .map_err(NetError::DeserialiseError)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a socket of the given type and connect or bind it to its endpoint.
fn create_socket(
    ctx: &Context,
    socket_type: SocketType,
    options: &SocketOptions,
    endpoint: &str,
) -> Result<Socket, NetError> {
    let socket = ctx
        .socket(socket_type)
        .map_err(NetError::CreateSocketError)?;

    options.set(&socket)?;

    match options.bind {
        false => socket.connect(endpoint),
        true => socket.bind(endpoint),
    }
    .map_err(NetError::CouldNotConnect)?;

    Ok(socket)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::msg::{NavMsg, SpeedMsg};

    #[test]
    fn test_pub_sub_round_trip() {
        let ctx = Context::new();

        let publisher = Publisher::new(
            &ctx,
            SocketOptions {
                bind: true,
                ..Default::default()
            },
            "inproc://net_test",
        )
        .unwrap();

        let subscriber = Subscriber::new(
            &ctx,
            SocketOptions::default(),
            "inproc://net_test",
            &[],
        )
        .unwrap();

        // Subscription propagation is asynchronous even over inproc, so
        // retry the publish until the message comes through.
        let mut received = None;
        for _ in 0..100 {
            publisher
                .send("nav", &NavMsg::Speed(SpeedMsg { speed: 0.4 }))
                .unwrap();

            if let Some(msg) = subscriber.try_recv::<NavMsg>().unwrap() {
                received = Some(msg);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        match received {
            Some(NavMsg::Speed(s)) => assert_eq!(s.speed, 0.4),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
