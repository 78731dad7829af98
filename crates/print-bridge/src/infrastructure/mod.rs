//! Infrastructure layer for print-bridge.
//!
//! Handles all I/O:
//!
//! - Binding the WebSocket listener and running client sessions
//! - Opening, writing and closing raw TCP connections to printers
//! - Finding and reading `config.json`
//!
//! Protocol dispatch lives in the application layer and message types in the
//! domain layer; CLI parsing is done in `main.rs`.

pub mod config_file;
pub mod printer_conn;
pub mod ws_server;

pub use printer_conn::TcpPrinterTransport;
pub use ws_server::{run_server, serve_listener};
