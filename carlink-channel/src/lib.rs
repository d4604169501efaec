//! # carlink Channel
//!
//! Queues that decouple message dispatch from socket writes.
//!
//! This crate provides:
//! - [`outbound`] - Mutex-protected FIFO of frames addressed to client slots

pub mod outbound;

pub use outbound::{OutboundItem, OutboundQueue};
