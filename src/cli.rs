//! Command-line / environment configuration of the `linkvisor` binary.
//!
//! Every flag falls back to an environment variable, so the usual deployment
//! is a `.env` file (loaded by `dotenvy`) and no arguments at all.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::{Config, ReconnectMode};
use crate::gateway::DEFAULT_GATEWAY_URL;

/// Who drives reconnection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Handles reconnect themselves with backoff.
    Internal,
    /// Every probe of `/` triggers a staggered reconnect sweep.
    External,
}

impl From<ModeArg> for ReconnectMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Internal => ReconnectMode::Internal,
            ModeArg::External => ReconnectMode::External,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "linkvisor",
    about = "Keeps gateway websocket sessions of several accounts alive",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Account tokens: JSON array, bracketed list or comma-separated.
    #[arg(long, env = "TOKENS", hide_env_values = true)]
    pub tokens: Option<String>,

    /// Single account token (used when TOKENS is empty).
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Webhook for critical notifications.
    #[arg(long, env = "WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Webhook for low-priority notifications.
    #[arg(long, env = "WEBHOOK_URL_LOW", hide_env_values = true)]
    pub webhook_url_low: Option<String>,

    /// Status server port.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Status server bind address.
    #[arg(long, env = "BIND", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Reconnection driver.
    #[arg(long, env = "RECONNECT_MODE", value_enum, default_value_t = ModeArg::Internal)]
    pub reconnect_mode: ModeArg,

    /// Gateway websocket URL.
    #[arg(long, env = "GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    pub gateway_url: String,

    /// Seconds an attempt may take to reach Ready.
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 60)]
    pub connect_timeout_secs: u64,
}

impl Cli {
    /// Runtime configuration derived from the flags.
    pub fn config(&self) -> Config {
        Config {
            mode: self.reconnect_mode.into(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..Config::default()
        }
    }

    /// Address the status server listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "linkvisor",
            "--tokens",
            "a1,b2",
            "--port",
            "8080",
            "--reconnect-mode",
            "external",
            "--connect-timeout-secs",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.tokens.as_deref(), Some("a1,b2"));
        assert_eq!(cli.listen_addr().port(), 8080);

        let cfg = cli.config();
        assert_eq!(cfg.mode, ReconnectMode::External);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["linkvisor", "--reconnect-mode", "cron"]).is_err());
    }
}
