//! # Navigation interface library
//!
//! This crate defines the interface between the tracker executable and its
//! peers: the message types exchanged over the network and the networking
//! abstractions used to exchange them.
//!
//! All messages are serialised as JSON and published over ZMQ PUB/SUB
//! sockets, with the message topic as the first frame of a multipart
//! message.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions - paths, odometry, transforms, commands and status.
pub mod msg;

/// Networking abstractions over ZMQ.
pub mod net;
