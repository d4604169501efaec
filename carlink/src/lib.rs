//! # carlink
//!
//! Coordination server for up to five networked field devices ("cars") and
//! the matching device client.
//!
//! Devices register a one-byte alias, look up RFID tags on the field map,
//! message each other through the server and report when they have parked.
//! The operator starts and stops rounds and broadcasts text from the
//! [`ControlSurface`](server::ControlSurface).
//!
//! ## Quick Start
//!
//! ```no_run
//! use carlink::prelude::*;
//! use std::sync::Arc;
//!
//! let map: TagMap = [TagRecord::new([0xDE, 0xAD, 0xBE, 0xEF], 4, 12, tag_kind::PARK_1)]
//!     .into_iter()
//!     .collect();
//! let map = Arc::new(map);
//!
//! let mut server = Server::builder()
//!     .port(5000)
//!     .tag_lookup(Arc::clone(&map))
//!     .treasure_notifier(map)
//!     .build();
//! server.start()?;
//! server.control().start_round();
//! # Ok::<(), ServerError>(())
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Message types and the binary codec
//! - [`channel`] - Outbound frame queue
//! - [`transport`] - Listener setup and wire framing
//! - [`server`] - Connection loop, registry, dispatcher and control surface
//! - [`client`] - Async device client

pub mod prelude;

/// Message types and the binary codec.
pub mod core {
    pub use carlink_core::*;
}

/// Outbound frame queue.
pub mod channel {
    pub use carlink_channel::*;
}

/// Listener setup and wire framing.
pub mod transport {
    pub use carlink_transport::*;
}

/// Coordination server.
pub mod server {
    pub use carlink_server::*;
}

/// Field-device client.
pub mod client {
    pub use carlink_client::*;
}
