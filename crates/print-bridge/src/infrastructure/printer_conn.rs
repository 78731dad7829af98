//! Raw TCP delivery to a network printer (RAW/JetDirect, usually port 9100).
//!
//! Every print job gets its own [`PrinterSession`]: one TCP connection that is
//! opened, written, drained and closed exactly once.  The session moves
//! through an explicit state machine:
//!
//! ```text
//!  Connecting ──ok──▶ Writing ──ok──▶ Draining ──(grace period, half-close)──▶ Closed
//!      │                 │
//!      └──err/deadline───┴──────────────▶ Closed (abortive reset)
//! ```
//!
//! One absolute deadline covers Connecting and Writing.  When it fires the
//! connection is reset (SO_LINGER 0) rather than closed gracefully, so the
//! printer does not mistake a truncated job for a complete one.
//!
//! Uses only `tokio::net::TcpStream`, which behaves the same on Windows,
//! Linux and macOS.

use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::{DeliveryReport, PrinterTransport, TransportError};
use crate::domain::config::DeliveryPolicy;
use crate::domain::job::ResolvedPrintJob;

/// Lifecycle of a single printer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Writing,
    Draining,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Writing => "writing",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One outbound printer connection, owned by exactly one delivery.
pub struct PrinterSession {
    job_id: Uuid,
    target: String,
    state: SessionState,
    deadline: Instant,
    stream: Option<TcpStream>,
}

impl PrinterSession {
    /// Creates a session in [`SessionState::Connecting`] whose connect + write
    /// phases must finish before `deadline`.
    pub fn new(job_id: Uuid, target: String, deadline: Instant) -> Self {
        Self {
            job_id,
            target,
            state: SessionState::Connecting,
            deadline,
            stream: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Connecting → Writing.
    async fn connect(&mut self, ip: &str, port: u16) -> Result<(), TransportError> {
        debug_assert_eq!(self.state, SessionState::Connecting);
        let stream = TcpStream::connect((ip, port))
            .await
            .map_err(|source| TransportError::Connect {
                target: self.target.clone(),
                source,
            })?;
        info!("job {}: connected to printer {}", self.job_id, self.target);

        self.stream = Some(stream);
        self.state = SessionState::Writing;
        Ok(())
    }

    /// Writing → Draining.  Writes the whole payload and flushes.
    async fn write(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        debug_assert_eq!(self.state, SessionState::Writing);
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::Write {
                target: self.target.clone(),
                source: io::Error::new(
                    io::ErrorKind::NotConnected,
                    "printer connection is not open",
                ),
            });
        };

        let written = async {
            stream.write_all(payload).await?;
            stream.flush().await
        }
        .await;
        written.map_err(|source| TransportError::Write {
            target: self.target.clone(),
            source,
        })?;
        debug!("job {}: wrote {} bytes", self.job_id, payload.len());

        self.state = SessionState::Draining;
        Ok(())
    }

    /// Draining → Closed.  Waits the grace period, then half-closes.
    ///
    /// A failing half-close is only logged: the payload has already been
    /// handed to the OS and the job counts as delivered.
    async fn drain(&mut self, grace: Duration) {
        debug_assert_eq!(self.state, SessionState::Draining);
        sleep(grace).await;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("job {}: half-close of {} failed: {e}", self.job_id, self.target);
            }
        }
        self.state = SessionState::Closed;
        debug!("job {}: connection to {} closed", self.job_id, self.target);
    }

    /// Any state → Closed, resetting the connection instead of closing it.
    fn abort(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Zero linger turns the close into an RST.
            #[allow(deprecated)]
            let linger = stream.set_linger(Some(Duration::ZERO));
            if let Err(e) = linger {
                debug!("job {}: could not set zero linger: {e}", self.job_id);
            }
            drop(stream);
            debug!("job {}: connection to {} reset", self.job_id, self.target);
        }
        self.state = SessionState::Closed;
    }
}

// Dropping a session mid-flight (e.g. the runtime shutting down) must not
// leave a half-written job looking complete to the printer.
impl Drop for PrinterSession {
    fn drop(&mut self) {
        if self.stream.is_some() {
            self.abort();
        }
    }
}

/// Runs one complete delivery of `job` under `policy`.
///
/// Exactly one TCP connection is opened and exactly one outcome is returned;
/// there are no retries.
///
/// # Errors
///
/// - [`TransportError::Connect`] if the connection is refused or unreachable.
/// - [`TransportError::Write`] if writing the payload fails; the connection
///   is reset.
/// - [`TransportError::Timeout`] if connect + write outlast
///   `policy.timeout`; the connection is reset.
pub async fn deliver(
    job: &ResolvedPrintJob,
    policy: &DeliveryPolicy,
) -> Result<DeliveryReport, TransportError> {
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut session = PrinterSession::new(job.job_id, job.target(), deadline);

    let outcome = timeout_at(deadline, async {
        session.connect(&job.ip, job.port).await?;
        session.write(&job.payload).await
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!("job {}: {e}", job.job_id);
            session.abort();
            return Err(e);
        }
        Err(_elapsed) => {
            warn!(
                "job {}: timed out after {} ms while {}",
                job.job_id,
                policy.timeout.as_millis(),
                session.state()
            );
            session.abort();
            return Err(TransportError::Timeout {
                target: job.target(),
            });
        }
    }

    session.drain(policy.post_write_delay).await;

    Ok(DeliveryReport {
        bytes_written: job.payload.len(),
        elapsed: started.elapsed(),
    })
}

/// [`PrinterTransport`] backed by real TCP connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPrinterTransport {
    policy: DeliveryPolicy,
}

impl TcpPrinterTransport {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl PrinterTransport for TcpPrinterTransport {
    async fn deliver(&self, job: ResolvedPrintJob) -> Result<DeliveryReport, TransportError> {
        deliver(&job, &self.policy).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
