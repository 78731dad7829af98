//! print-bridge library crate.
//!
//! A local bridge that lets browsers print to network printers: clients send
//! JSON print jobs over WebSocket and the bridge forwards the decoded bytes
//! over a raw TCP connection (RAW/JetDirect, usually port 9100).
//!
//! # Architecture
//!
//! ```text
//! Browser / local app (JSON over WebSocket)
//!         ↕
//! [print-bridge]
//!   ├── domain/           Pure types: BridgeConfig, JSON messages, job validation
//!   ├── application/      MessageRouter, error → reply mapping, PrinterTransport trait
//!   └── infrastructure/
//!         ├── ws_server/    WebSocket accept loop and sessions (tokio-tungstenite)
//!         ├── printer_conn/ Raw TCP delivery state machine
//!         └── config_file/  config.json discovery
//!         ↕
//! Network printer (raw bytes over TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` only; the printer is behind a trait.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: pure business-logic types (no I/O).
pub mod domain;

/// Application layer: message routing and error mapping.
pub mod application;

/// Infrastructure layer: WebSocket server, printer TCP transport, config file.
pub mod infrastructure;
