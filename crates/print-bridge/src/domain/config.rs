//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It is assembled once at startup from CLI arguments, environment variables
//! and an optional `config.json` (see `main.rs` and
//! [`crate::infrastructure::config_file`]), then shared read-only across all
//! sessions.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the bridge easy to embed in tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the WebSocket server listens on when nothing else is configured.
pub const DEFAULT_WS_PORT: u16 = 8181;

/// Raw/JetDirect printing port.
pub const DEFAULT_PRINTER_PORT: u16 = 9100;

/// Absolute window for connecting to the printer and writing the payload.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Grace period between the last written byte and the half-close.
pub const POST_WRITE_DELAY: Duration = Duration::from_millis(500);

/// Printer address used when a `print` request omits `printerIp` or
/// `printerPort`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterDefaults {
    /// Fallback printer IP.  `None` means every request must name its printer.
    pub ip: Option<String>,
    /// Fallback printer TCP port.
    pub port: u16,
}

impl Default for PrinterDefaults {
    fn default() -> Self {
        Self {
            ip: None,
            port: DEFAULT_PRINTER_PORT,
        }
    }
}

/// Timing contract of a single printer delivery.
///
/// The running service always uses [`DeliveryPolicy::default`]; the fields are
/// public so tests can shrink the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Deadline covering connect + write, measured from the start of delivery.
    pub timeout: Duration,
    /// Sleep between a successful write and the half-close.
    pub post_write_delay: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            timeout: DELIVERY_TIMEOUT,
            post_write_delay: POST_WRITE_DELAY,
        }
    }
}

/// All runtime configuration for the print bridge.
///
/// Build this struct once at startup and wrap it in an `Arc` so it can be
/// shared cheaply across all session tasks.
///
/// # Example
///
/// ```rust
/// use print_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8181);
/// assert_eq!(cfg.printer_defaults.port, 9100);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket server binds to.
    pub ws_bind_addr: SocketAddr,

    /// Fallback printer address for requests that do not carry one.
    pub printer_defaults: PrinterDefaults,

    /// Connect/write deadline and post-write grace period.
    pub delivery: DeliveryPolicy,
}

impl Default for BridgeConfig {
    /// | Field            | Default          |
    /// |------------------|------------------|
    /// | ws_bind_addr     | `0.0.0.0:8181`   |
    /// | printer_defaults | no IP, port 9100 |
    /// | delivery         | 10 s / 500 ms    |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_WS_PORT)),
            printer_defaults: PrinterDefaults::default(),
            delivery: DeliveryPolicy::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
