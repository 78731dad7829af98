//! Local Print Bridge — entry point.
//!
//! Accepts WebSocket connections from browsers and local applications and
//! forwards their print jobs to network printers over raw TCP.
//!
//! # Why a separate bridge process?
//!
//! Browsers can only speak HTTP/WebSocket; they cannot open the raw TCP
//! socket that RAW/JetDirect printing (port 9100) needs.  This bridge runs as
//! a trusted local process and does that on the page's behalf.
//!
//! # Usage
//!
//! ```text
//! print-bridge [OPTIONS]
//!
//! Options:
//!   --port <PORT>                  WebSocket listener port [default: 8181]
//!   --bind <IP>                    WebSocket bind address [default: 0.0.0.0]
//!   --default-printer-ip <IP>      Printer used when a job names none
//!   --default-printer-port <PORT>  Printer port used when a job names none [default: 9100]
//!   --config <PATH>                Explicit config.json to load
//! ```
//!
//! # Configuration precedence
//!
//! CLI flag > `config.json` > environment variable > built-in default.
//!
//! | Variable               | Default   | Description                 |
//! |------------------------|-----------|-----------------------------|
//! | `PRINT_SERVICE_PORT`   | `8181`    | WebSocket listener port     |
//! | `PRINT_SERVICE_BIND`   | `0.0.0.0` | WebSocket bind address      |
//! | `DEFAULT_PRINTER_IP`   | (none)    | Fallback printer IP         |
//! | `DEFAULT_PRINTER_PORT` | `9100`    | Fallback printer port       |
//! | `PRINT_SERVICE_CONFIG` | (none)    | Explicit config file path   |
//!
//! Without `--config`, `config.json` is looked up next to the executable and
//! then in the working directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use print_bridge::domain::config::{DEFAULT_PRINTER_PORT, DEFAULT_WS_PORT};
use print_bridge::domain::{BridgeConfig, DeliveryPolicy, PrinterDefaults};
use print_bridge::infrastructure::config_file::{self, FileConfig};
use print_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Local print bridge: WebSocket in, raw TCP to the printer out.
#[derive(Debug, Parser)]
#[command(
    name = "print-bridge",
    about = "Forwards print jobs from WebSocket clients to raw TCP network printers",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server to listen on.
    ///
    /// Without the flag, `port` in config.json wins over the environment;
    /// the default is 8181.
    #[arg(long, env = "PRINT_SERVICE_PORT")]
    port: Option<u16>,

    /// IP address to bind the WebSocket server to.
    ///
    /// Use `127.0.0.1` to accept only connections from this machine.
    #[arg(long, default_value = "0.0.0.0", env = "PRINT_SERVICE_BIND")]
    bind: String,

    /// Printer IP used when a print request does not name one.
    #[arg(long, env = "DEFAULT_PRINTER_IP")]
    default_printer_ip: Option<String>,

    /// Printer port used when a print request does not name one.
    ///
    /// Without the flag, `defaultPrinterPort` in config.json wins over the
    /// environment; the default is 9100.
    #[arg(long, env = "DEFAULT_PRINTER_PORT")]
    default_printer_port: Option<u16>,

    /// Load this config file instead of searching for config.json.
    #[arg(long, env = "PRINT_SERVICE_CONFIG")]
    config: Option<PathBuf>,
}

/// Which file-overridable settings were read from environment variables
/// rather than given as flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EnvSourced {
    port: bool,
    default_printer_ip: bool,
    default_printer_port: bool,
}

impl EnvSourced {
    fn from_matches(matches: &ArgMatches) -> Self {
        let from_env = |id: &str| matches.value_source(id) == Some(ValueSource::EnvVariable);
        Self {
            port: from_env("port"),
            default_printer_ip: from_env("default_printer_ip"),
            default_printer_port: from_env("default_printer_port"),
        }
    }
}

/// A flag beats the file; the file beats an environment variable.
fn layered<T>(arg: Option<T>, from_env: bool, file: Option<T>) -> Option<T> {
    if from_env {
        file.or(arg)
    } else {
        arg.or(file)
    }
}

impl Cli {
    /// Parses `args` and records which values came from the environment.
    fn parse_layers_from<I, T>(args: I) -> Result<(Self, EnvSourced), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let sourced = EnvSourced::from_matches(&matches);
        let cli = Self::from_arg_matches(&matches)?;
        Ok((cli, sourced))
    }

    /// Merges flags, the file layer and environment values into a
    /// [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not a valid IP address.
    fn into_bridge_config(
        self,
        sourced: EnvSourced,
        file: FileConfig,
    ) -> anyhow::Result<BridgeConfig> {
        let port = layered(self.port, sourced.port, file.port).unwrap_or(DEFAULT_WS_PORT);

        let ws_bind_addr: SocketAddr = format!("{}:{}", self.bind, port)
            .parse()
            .with_context(|| format!("invalid WebSocket bind address: '{}:{}'", self.bind, port))?;

        let printer_defaults = PrinterDefaults {
            ip: layered(
                self.default_printer_ip,
                sourced.default_printer_ip,
                file.default_printer_ip,
            )
            .filter(|ip| !ip.is_empty()),
            port: layered(
                self.default_printer_port,
                sourced.default_printer_port,
                file.default_printer_port,
            )
            .unwrap_or(DEFAULT_PRINTER_PORT),
        };

        Ok(BridgeConfig {
            ws_bind_addr,
            printer_defaults,
            delivery: DeliveryPolicy::default(),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// 1. Logging: `RUST_LOG` selects the level, `info` when unset.
/// 2. CLI/env parsing, config file resolution, merge into [`BridgeConfig`].
/// 3. Ctrl+C clears a shared `AtomicBool`.
/// 4. [`run_server`] serves clients until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (cli, sourced) =
        Cli::parse_layers_from(std::env::args_os()).unwrap_or_else(|e| e.exit());
    let file = config_file::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    let config = cli.into_bridge_config(sourced, file)?;

    info!(
        "local print bridge starting — ws={}, default printer={}:{}",
        config.ws_bind_addr,
        config.printer_defaults.ip.as_deref().unwrap_or("(none)"),
        config.printer_defaults.port
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("local print bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_cli() -> Cli {
        Cli {
            port: None,
            bind: "0.0.0.0".to_string(),
            default_printer_ip: None,
            default_printer_port: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["print-bridge", "--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_cli_default_printer_overrides() {
        let cli = Cli::parse_from([
            "print-bridge",
            "--default-printer-ip",
            "10.0.0.5",
            "--default-printer-port",
            "9101",
        ]);
        assert_eq!(cli.default_printer_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(cli.default_printer_port, Some(9101));
    }

    #[test]
    fn test_cli_config_path() {
        let cli = Cli::parse_from(["print-bridge", "--config", "/etc/print-bridge/config.json"]);
        assert_eq!(
            cli.config,
            Some(PathBuf::from("/etc/print-bridge/config.json"))
        );
    }

    #[test]
    fn test_cli_rejects_non_numeric_port() {
        let result = Cli::try_parse_from(["print-bridge", "--port", "eighty"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_bridge_config_builtin_defaults() {
        // Arrange: no CLI values, empty file layer
        let config = bare_cli()
            .into_bridge_config(EnvSourced::default(), FileConfig::default())
            .unwrap();

        // Assert
        assert_eq!(config.ws_bind_addr.to_string(), "0.0.0.0:8181");
        assert_eq!(config.printer_defaults.ip, None);
        assert_eq!(config.printer_defaults.port, 9100);
        assert_eq!(config.delivery, DeliveryPolicy::default());
    }

    #[test]
    fn test_into_bridge_config_file_fills_gaps() {
        let file = FileConfig {
            port: Some(8282),
            default_printer_ip: Some("192.168.1.50".to_string()),
            default_printer_port: Some(9101),
        };

        let config = bare_cli().into_bridge_config(EnvSourced::default(), file).unwrap();

        assert_eq!(config.ws_bind_addr.port(), 8282);
        assert_eq!(config.printer_defaults.ip.as_deref(), Some("192.168.1.50"));
        assert_eq!(config.printer_defaults.port, 9101);
    }

    #[test]
    fn test_into_bridge_config_cli_beats_file() {
        let cli = Cli {
            port: Some(9000),
            default_printer_ip: Some("10.0.0.1".to_string()),
            default_printer_port: Some(9200),
            ..bare_cli()
        };
        let file = FileConfig {
            port: Some(8282),
            default_printer_ip: Some("192.168.1.50".to_string()),
            default_printer_port: Some(9101),
        };

        let config = cli.into_bridge_config(EnvSourced::default(), file).unwrap();

        assert_eq!(config.ws_bind_addr.port(), 9000);
        assert_eq!(config.printer_defaults.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(config.printer_defaults.port, 9200);
    }

    #[test]
    fn test_into_bridge_config_file_beats_environment() {
        // Arrange: every value came from the environment
        let cli = Cli {
            port: Some(9000),
            default_printer_ip: Some("10.0.0.1".to_string()),
            default_printer_port: Some(9200),
            ..bare_cli()
        };
        let sourced = EnvSourced {
            port: true,
            default_printer_ip: true,
            default_printer_port: true,
        };
        let file = FileConfig {
            port: Some(8282),
            default_printer_ip: Some("192.168.1.50".to_string()),
            default_printer_port: None,
        };

        // Act
        let config = cli.into_bridge_config(sourced, file).unwrap();

        // Assert: the file wins where it has a value, the environment fills the rest
        assert_eq!(config.ws_bind_addr.port(), 8282);
        assert_eq!(config.printer_defaults.ip.as_deref(), Some("192.168.1.50"));
        assert_eq!(config.printer_defaults.port, 9200);
    }

    #[test]
    fn test_layered_order() {
        assert_eq!(layered(Some(1), false, Some(2)), Some(1));
        assert_eq!(layered(Some(1), true, Some(2)), Some(2));
        assert_eq!(layered(Some(1), true, None), Some(1));
        assert_eq!(layered(None, false, Some(2)), Some(2));
        assert_eq!(layered::<u16>(None, false, None), None);
    }

    #[test]
    fn test_flags_are_not_marked_as_environment() {
        let (cli, sourced) =
            Cli::parse_layers_from([
                "print-bridge",
                "--port",
                "9001",
                "--default-printer-ip",
                "10.0.0.2",
                "--default-printer-port",
                "9102",
            ])
            .unwrap();
        assert_eq!(cli.port, Some(9001));
        assert_eq!(sourced, EnvSourced::default());
    }

    /// End to end through clap: environment values lose to the file layer.
    #[test]
    fn test_environment_values_yield_to_config_file() {
        // Arrange
        std::env::set_var("PRINT_SERVICE_PORT", "9000");
        std::env::set_var("DEFAULT_PRINTER_IP", "10.0.0.1");
        let parsed = Cli::parse_layers_from(["print-bridge"]);
        std::env::remove_var("PRINT_SERVICE_PORT");
        std::env::remove_var("DEFAULT_PRINTER_IP");
        let (cli, sourced) = parsed.unwrap();
        let file = FileConfig {
            port: Some(8282),
            default_printer_ip: Some("192.168.1.50".to_string()),
            default_printer_port: None,
        };

        // Act
        let config = cli.into_bridge_config(sourced, file).unwrap();

        // Assert
        assert!(sourced.port);
        assert!(sourced.default_printer_ip);
        assert_eq!(config.ws_bind_addr.port(), 8282);
        assert_eq!(config.printer_defaults.ip.as_deref(), Some("192.168.1.50"));
    }

    #[test]
    fn test_into_bridge_config_empty_printer_ip_means_none() {
        let cli = Cli {
            default_printer_ip: Some(String::new()),
            ..bare_cli()
        };
        let config = cli
            .into_bridge_config(EnvSourced::default(), FileConfig::default())
            .unwrap();
        assert_eq!(config.printer_defaults.ip, None);
    }

    #[test]
    fn test_into_bridge_config_loopback_bind() {
        let cli = Cli {
            bind: "127.0.0.1".to_string(),
            ..bare_cli()
        };
        let config = cli
            .into_bridge_config(EnvSourced::default(), FileConfig::default())
            .unwrap();
        assert!(config.ws_bind_addr.ip().is_loopback());
    }

    #[test]
    fn test_into_bridge_config_invalid_bind_returns_error() {
        let cli = Cli {
            bind: "not.an.ip".to_string(),
            ..bare_cli()
        };
        let result = cli.into_bridge_config(EnvSourced::default(), FileConfig::default());
        assert!(result.is_err());
    }
}
