//! Message routing: one inbound frame in, one reply out.
//!
//! [`MessageRouter`] parses a client frame, dispatches on its `type`, runs the
//! validator and the printer transport for `print`, and turns every outcome
//! into a [`ServiceReply`].  It never fails: every error becomes an `error`
//! reply through the table in [`ServiceError::reply_message`].
//!
//! The router only sees the printer through the [`PrinterTransport`] trait, so
//! it can be tested without opening sockets.
//!
//! ```text
//! frame ─▶ parse ─▶ ClientMsg ─┬─ ping ─────────▶ pong
//!                              ├─ getPrinters ──▶ printers []
//!                              └─ print ─▶ validate ─▶ deliver ─▶ success | error
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::config::PrinterDefaults;
use crate::domain::job::{validate, PrintJobRequest, ResolvedPrintJob, ValidationError};
use crate::domain::messages::{ClientMsg, ServiceReply};

/// Reply text for frames that are not a well-formed client message.
pub const MALFORMED_MESSAGE: &str = "Invalid message format";

/// Reply text when a delivery failed without any usable reason.
pub const GENERIC_PRINT_FAILURE: &str = "Failed to print";

// ── Printer transport seam ────────────────────────────────────────────────────

/// Summary of a successful delivery, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub bytes_written: usize,
    pub elapsed: Duration,
}

/// Why a delivery did not complete.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The TCP connection could not be established.
    #[error("failed to connect to printer at {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// The connection was established but writing the payload failed.
    #[error("failed to write to printer at {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Connect + write did not finish inside the delivery deadline.
    #[error("connection to printer at {target} timed out")]
    Timeout { target: String },
}

/// Delivers one resolved job to its printer.
///
/// Infrastructure implements this over TCP; tests implement it with
/// recording doubles.
#[async_trait]
pub trait PrinterTransport: Send + Sync {
    /// Makes exactly one delivery attempt for `job`.
    async fn deliver(&self, job: ResolvedPrintJob) -> Result<DeliveryReport, TransportError>;
}

// ── Error → reply mapping ─────────────────────────────────────────────────────

/// Every failure a single client message can produce.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Not JSON, unknown `type`, wrong field types, or non-UTF-8 binary frame.
    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// The user-visible text for this error.
    ///
    /// | kind              | message                                       |
    /// |-------------------|-----------------------------------------------|
    /// | missing IP        | `Printer IP is required`                      |
    /// | bad IP shape      | `Invalid IP address format`                   |
    /// | connect failure   | `Failed to connect to printer: <io error>`    |
    /// | write failure     | `Failed to send data to printer: <io error>`  |
    /// | timeout           | `Connection timeout`                          |
    /// | malformed message | `Invalid message format`                      |
    pub fn reply_message(&self) -> String {
        match self {
            ServiceError::Validation(ValidationError::MissingIp) => {
                "Printer IP is required".to_string()
            }
            ServiceError::Validation(ValidationError::InvalidIpFormat(_)) => {
                "Invalid IP address format".to_string()
            }
            // Undecodable printData is reported exactly like unparseable JSON.
            ServiceError::Validation(ValidationError::MalformedPayload(_))
            | ServiceError::Malformed(_) => MALFORMED_MESSAGE.to_string(),
            ServiceError::Transport(TransportError::Connect { source, .. }) => {
                with_io_detail("Failed to connect to printer", source)
            }
            ServiceError::Transport(TransportError::Write { source, .. }) => {
                with_io_detail("Failed to send data to printer", source)
            }
            ServiceError::Transport(TransportError::Timeout { .. }) => {
                "Connection timeout".to_string()
            }
        }
    }

    pub fn into_reply(self) -> ServiceReply {
        ServiceReply::error(self.reply_message())
    }
}

fn with_io_detail(prefix: &str, source: &io::Error) -> String {
    let detail = source.to_string();
    if detail.is_empty() {
        GENERIC_PRINT_FAILURE.to_string()
    } else {
        format!("{prefix}: {detail}")
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Stateless per-message dispatcher.
///
/// Cloning is cheap (two `Arc`s), so each inbound frame can be handled on its
/// own task with its own router handle.
#[derive(Clone)]
pub struct MessageRouter {
    defaults: Arc<PrinterDefaults>,
    transport: Arc<dyn PrinterTransport>,
}

impl MessageRouter {
    pub fn new(defaults: PrinterDefaults, transport: Arc<dyn PrinterTransport>) -> Self {
        Self {
            defaults: Arc::new(defaults),
            transport,
        }
    }

    /// Handles a binary frame.  The payload must be UTF-8 JSON, exactly like
    /// a text frame.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> ServiceReply {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_text(text).await,
            Err(e) => {
                warn!("binary frame is not UTF-8: {e}");
                ServiceError::Malformed(e.to_string()).into_reply()
            }
        }
    }

    /// Parses and handles a text frame.
    pub async fn handle_text(&self, text: &str) -> ServiceReply {
        match serde_json::from_str::<ClientMsg>(text) {
            Ok(msg) => self.dispatch(msg).await,
            Err(e) => {
                warn!("rejecting malformed message: {e}");
                ServiceError::Malformed(e.to_string()).into_reply()
            }
        }
    }

    /// Handles an already parsed message.
    pub async fn dispatch(&self, msg: ClientMsg) -> ServiceReply {
        debug!("dispatching {} message", msg.type_name());
        match msg {
            ClientMsg::Ping => ServiceReply::Pong,
            ClientMsg::GetPrinters => ServiceReply::printers(),
            ClientMsg::Print(request) => match self.print(&request).await {
                Ok(()) => ServiceReply::print_success(),
                Err(e) => {
                    warn!("print failed: {e}");
                    e.into_reply()
                }
            },
        }
    }

    async fn print(&self, request: &PrintJobRequest) -> Result<(), ServiceError> {
        let job = validate(request, &self.defaults)?;
        let job_id = job.job_id;
        info!(
            "job {job_id}: sending {} bytes to printer {}",
            job.payload.len(),
            job.target()
        );

        let report = self.transport.deliver(job).await?;
        info!(
            "job {job_id}: delivered {} bytes in {} ms",
            report.bytes_written,
            report.elapsed.as_millis()
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
