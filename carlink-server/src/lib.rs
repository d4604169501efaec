//! # carlink Server
//!
//! Coordination server for a small fleet of field devices.
//!
//! This crate provides:
//! - [`Server`] and [`ServerBuilder`], the composition root and the
//!   connection loop lifecycle
//! - [`ClientRegistry`], the fixed table of client slots and aliases
//! - [`RequestDispatcher`], which applies device requests and queues replies
//! - [`ControlSurface`], for starting rounds and broadcasting from any thread
//! - Collaborator traits in [`handler`] with in-memory defaults
//!
//! # Example
//! ```no_run
//! use carlink_server::Server;
//!
//! let mut server = Server::builder().port(5000).build();
//! let addr = server.start()?;
//! println!("listening on {addr}");
//! server.control().start_round();
//! server.stop()?;
//! # Ok::<(), carlink_server::ServerError>(())
//! ```

pub mod builder;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod log;
mod multiplexer;
pub mod parking;
pub mod registry;
pub mod round;
pub mod tags;

pub use builder::{DEFAULT_POLL_INTERVAL, Server, ServerBuilder};
pub use control::{ControlSurface, LoopSignal};
pub use dispatcher::RequestDispatcher;
pub use error::ServerError;
pub use handler::{
    Collaborators, EmptyMap, LogSink, ParkingTracker, RoundControl, TagLookup, TreasureNotifier,
};
pub use log::{MessageLog, TracingLogSink};
pub use parking::ParkRecorder;
pub use registry::{ClientRegistry, ClientSlot, MAX_CLIENTS};
pub use round::{RoundState, RoundTimer};
pub use tags::TagMap;
