//! Application layer for print-bridge.
//!
//! Knows *what* to do with each client message; delegates the TCP work to
//! the infrastructure layer through the [`PrinterTransport`] trait.
//!
//! Opening sockets, spawning tasks and WebSocket framing do not belong here.

pub mod router;

pub use router::{
    DeliveryReport, MessageRouter, PrinterTransport, ServiceError, TransportError,
};
