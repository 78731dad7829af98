//! Domain layer for print-bridge.
//!
//! Pure types with no dependencies on I/O, networking, or async runtimes:
//!
//! - Configuration structures
//! - Message types (the JSON "language" between client and bridge)
//! - Print job requests and their validation
//!
//! No `tokio`, `TcpStream` or `WebSocket` types belong here.

pub mod config;
pub mod job;
pub mod messages;

pub use config::{BridgeConfig, DeliveryPolicy, PrinterDefaults};
pub use job::{validate, PrintJobRequest, ResolvedPrintJob, ValidationError};
pub use messages::{ClientMsg, ServiceReply};
