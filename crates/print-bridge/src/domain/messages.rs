//! JSON message types for the client-facing WebSocket protocol.
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant; all other fields live in the same object:
//!
//! ```json
//! {"type":"print","printerIp":"192.168.1.50","printerPort":9100,"printData":"SGVsbG8="}
//! {"type":"success","message":"Print successful"}
//! ```
//!
//! Serde's `#[serde(tag = "type")]` attribute handles the discriminant.
//! Inbound and outbound directions use separate enums so a reply can never be
//! mistaken for a request.

use serde::{Deserialize, Serialize};

use crate::domain::job::PrintJobRequest;

/// Greeting sent once per connection, before any client message is handled.
pub const CONNECTED_MESSAGE: &str = "Connected to Local Print Service";

/// Message carried by every `success` reply.
pub const PRINT_SUCCESS_MESSAGE: &str = "Print successful";

// ── Client → Bridge messages ──────────────────────────────────────────────────

/// All messages a client can send to the bridge.
///
/// An unknown `type`, a missing `type` or a badly shaped body fails
/// deserialization and is answered with the malformed-message error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Application-level heartbeat.
    Ping,

    /// Forward a raw payload to a network printer.
    Print(PrintJobRequest),

    /// Ask for known printers.  Always answered with an empty list.
    GetPrinters,
}

impl ClientMsg {
    /// Short variant name for log lines (never includes the payload).
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientMsg::Ping => "ping",
            ClientMsg::Print(_) => "print",
            ClientMsg::GetPrinters => "getPrinters",
        }
    }
}

// ── Bridge → Client replies ───────────────────────────────────────────────────

/// All replies the bridge sends.  Replies are fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServiceReply {
    /// Sent immediately after the WebSocket handshake.
    Connected { message: String },

    /// Answer to `ping`.
    Pong,

    /// The print job reached the printer.
    Success { message: String },

    /// Validation, delivery or parse failure.
    Error { message: String },

    /// Answer to `getPrinters`.
    Printers { printers: Vec<String> },
}

impl ServiceReply {
    pub fn connected() -> Self {
        ServiceReply::Connected {
            message: CONNECTED_MESSAGE.to_string(),
        }
    }

    pub fn print_success() -> Self {
        ServiceReply::Success {
            message: PRINT_SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServiceReply::Error {
            message: message.into(),
        }
    }

    /// Printer discovery is not implemented; the list is always empty.
    pub fn printers() -> Self {
        ServiceReply::Printers {
            printers: Vec::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
