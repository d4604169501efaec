//! Prelude module for convenient imports.
//!
//! ```ignore
//! use carlink::prelude::*;
//! ```

// Core types
pub use carlink_core::{Message, MessageType, TagRecord, TagSerial, alias, tag_kind};

// Transport types
pub use carlink_transport::tcp::WireFraming;

// Server types
pub use carlink_server::{
    ClientSlot, ControlSurface, LogSink, MessageLog, ParkRecorder, ParkingTracker, RoundControl,
    RoundTimer, Server, ServerBuilder, ServerError, TagLookup, TagMap, TracingLogSink,
    TreasureNotifier,
};

// Client types
pub use carlink_client::{ClientError, DeviceBuilder, DeviceClient, RetryPolicy};
