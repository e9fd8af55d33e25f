//! Command-line argument parsing

use clap::Parser;
use depot_common::DEFAULT_PORT;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use depot_server::constants::{DEFAULT_LIST_CAPACITY, DEFAULT_TRANSFER_CAPACITY};
use depot_server::server::ServerConfig;
use depot_server::service::ServiceConfig;

/// Get default file root help text for current platform
fn default_file_root_help() -> String {
    #[cfg(target_os = "linux")]
    return "Store root directory (default: ~/.local/share/depotd/files/)".to_string();

    #[cfg(target_os = "macos")]
    return "Store root directory (default: ~/Library/Application Support/depotd/files/)"
        .to_string();

    #[cfg(target_os = "windows")]
    return "Store root directory (default: %APPDATA%\\depotd\\files\\)".to_string();

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    return "Store root directory (overrides platform default)".to_string();
}

/// Parse a pool capacity, which must be at least 1
fn parse_capacity(value: &str) -> Result<usize, String> {
    let capacity: usize = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if capacity == 0 {
        return Err("capacity must be at least 1".to_string());
    }
    Ok(capacity)
}

/// Depot file server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to bind to (IPv4 or IPv6)
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Store root directory (overrides platform default)
    #[arg(short = 'f', long = "file-root", help = default_file_root_help())]
    pub file_root: Option<PathBuf>,

    /// Maximum concurrent uploads and downloads
    #[arg(long, default_value_t = DEFAULT_TRANSFER_CAPACITY, value_parser = parse_capacity)]
    pub transfer_capacity: usize,

    /// Maximum concurrent list requests
    #[arg(long, default_value_t = DEFAULT_LIST_CAPACITY, value_parser = parse_capacity)]
    pub list_capacity: usize,

    /// Per-call deadline in seconds (0 for none)
    #[arg(long, default_value_t = 0)]
    pub call_timeout: u64,

    /// Enable debug logging
    #[arg(long, default_value = "false")]
    pub debug: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Verbosity after folding `--debug` into `-v`
    #[must_use]
    pub fn verbosity(&self) -> u8 {
        if self.debug {
            self.verbose.max(1)
        } else {
            self.verbose
        }
    }

    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            transfer_capacity: self.transfer_capacity,
            list_capacity: self.list_capacity,
        }
    }

    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            call_timeout: (self.call_timeout > 0).then(|| Duration::from_secs(self.call_timeout)),
            ..ServerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["depotd"]);
        assert_eq!(args.bind.to_string(), "0.0.0.0");
        assert_eq!(args.port, 7600);
        assert_eq!(args.file_root, None);
        assert_eq!(args.service_config(), ServiceConfig::default());
        assert_eq!(args.server_config().call_timeout, None);
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_capacities() {
        let args = Args::parse_from([
            "depotd",
            "--transfer-capacity",
            "2",
            "--list-capacity",
            "5",
        ]);
        assert_eq!(args.service_config().transfer_capacity, 2);
        assert_eq!(args.service_config().list_capacity, 5);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(Args::try_parse_from(["depotd", "--transfer-capacity", "0"]).is_err());
        assert!(Args::try_parse_from(["depotd", "--list-capacity", "x"]).is_err());
    }

    #[test]
    fn test_call_timeout() {
        let args = Args::parse_from(["depotd", "--call-timeout", "30"]);
        assert_eq!(
            args.server_config().call_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(Args::parse_from(["depotd", "--debug"]).verbosity(), 1);
        assert_eq!(Args::parse_from(["depotd", "-vv"]).verbosity(), 2);
        assert_eq!(Args::parse_from(["depotd", "--debug", "-vv"]).verbosity(), 2);
    }
}
