// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_DISTRO_ROOT: &str = "./html";
pub const DEFAULT_VARS_CONFIG: &str = "./html/vars.yaml";
pub const DEFAULT_HTTP_SERVER: &str = "http://localhost:8080";
pub const DEFAULT_NTP_SERVER: &str = "0.pool.ntp.org";
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 60 * 60 * 1000;
pub const DEFAULT_FATAL_ERROR_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(pub String);

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub distro_root: PathBuf,
    pub vars_config_path: PathBuf,
    /// Menu template override; the bundled template is used when unset.
    pub ipxe_template_path: Option<PathBuf>,
    pub http_server: String,
    pub ntp_server: String,
    pub scan_interval: Duration,
    pub fatal_error_capacity: usize,
    pub log_json: bool,
    pub shutdown_drain: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            distro_root: PathBuf::from(DEFAULT_DISTRO_ROOT),
            vars_config_path: PathBuf::from(DEFAULT_VARS_CONFIG),
            ipxe_template_path: None,
            http_server: DEFAULT_HTTP_SERVER.to_string(),
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            scan_interval: Duration::from_millis(DEFAULT_SCAN_INTERVAL_MS),
            fatal_error_capacity: DEFAULT_FATAL_ERROR_CAPACITY,
            log_json: true,
            shutdown_drain: Duration::ZERO,
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str, default: &str) -> String {
        (self.0)(name)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn bool(&self, name: &str, default: bool) -> bool {
        (self.0)(name)
            .and_then(|v| match v.as_str() {
                "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
                "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
                _ => None,
            })
            .unwrap_or(default)
    }

    fn u64(&self, name: &str, default: u64) -> u64 {
        (self.0)(name)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default)
    }

    fn usize(&self, name: &str, default: usize) -> usize {
        (self.0)(name)
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default)
    }

    fn duration_ms(&self, name: &str, default_ms: u64) -> Duration {
        Duration::from_millis(self.u64(name, default_ms))
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads `NETBOOT_*` variables through `lookup`. Unparseable values fall
    /// back to their defaults; the result is then validated.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);
        let cfg = Self {
            bind_addr: env.string("NETBOOT_BIND", DEFAULT_BIND),
            distro_root: PathBuf::from(env.string("NETBOOT_DISTRO_ROOT", DEFAULT_DISTRO_ROOT)),
            vars_config_path: PathBuf::from(env.string("NETBOOT_VARS_CONFIG", DEFAULT_VARS_CONFIG)),
            ipxe_template_path: (env.0)("NETBOOT_IPXE_TEMPLATE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            http_server: env
                .string("NETBOOT_HTTP_SERVER", DEFAULT_HTTP_SERVER)
                .trim_end_matches('/')
                .to_string(),
            ntp_server: env.string("NETBOOT_NTP_SERVER", DEFAULT_NTP_SERVER),
            scan_interval: env.duration_ms("NETBOOT_SCAN_INTERVAL_MS", DEFAULT_SCAN_INTERVAL_MS),
            fatal_error_capacity: env.usize(
                "NETBOOT_FATAL_ERROR_CAPACITY",
                DEFAULT_FATAL_ERROR_CAPACITY,
            ),
            log_json: env.bool("NETBOOT_LOG_JSON", true),
            shutdown_drain: env.duration_ms("NETBOOT_SHUTDOWN_DRAIN_MS", 0),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError(format!(
                "NETBOOT_BIND must be host:port, got {:?}",
                self.bind_addr
            )));
        }
        if self.scan_interval.is_zero() {
            return Err(ConfigError("scan interval must be > 0".to_string()));
        }
        if self.fatal_error_capacity == 0 {
            return Err(ConfigError("fatal error capacity must be > 0".to_string()));
        }
        if !(self.http_server.starts_with("http://") || self.http_server.starts_with("https://")) {
            return Err(ConfigError(format!(
                "NETBOOT_HTTP_SERVER must be an http(s) URL, got {:?}",
                self.http_server
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, ServerConfig::default());
        assert_eq!(cfg.scan_interval, Duration::from_secs(3600));
    }

    #[test]
    fn overrides_are_read_and_malformed_numbers_fall_back() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("NETBOOT_BIND", "127.0.0.1:9090"),
            ("NETBOOT_HTTP_SERVER", "http://10.0.0.1:9090/"),
            ("NETBOOT_IPXE_TEMPLATE", "/etc/netboot/menu.j2"),
            ("NETBOOT_SCAN_INTERVAL_MS", "not-a-number"),
            ("NETBOOT_LOG_JSON", "no"),
        ]))
        .expect("config");
        assert_eq!(cfg.bind_addr, "127.0.0.1:9090");
        assert_eq!(cfg.http_server, "http://10.0.0.1:9090");
        assert_eq!(
            cfg.ipxe_template_path,
            Some(PathBuf::from("/etc/netboot/menu.j2"))
        );
        assert_eq!(cfg.scan_interval, Duration::from_secs(3600));
        assert!(!cfg.log_json);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ServerConfig::from_lookup(lookup(&[("NETBOOT_FATAL_ERROR_CAPACITY", "0")]))
            .expect_err("zero capacity");
        assert!(err.0.contains("capacity"));
        let err = ServerConfig::from_lookup(lookup(&[("NETBOOT_SCAN_INTERVAL_MS", "0")]))
            .expect_err("zero interval");
        assert!(err.0.contains("interval"));
        let err = ServerConfig::from_lookup(lookup(&[("NETBOOT_BIND", "localhost")]))
            .expect_err("bad bind");
        assert!(err.0.contains("NETBOOT_BIND"));
        let err = ServerConfig::from_lookup(lookup(&[("NETBOOT_HTTP_SERVER", "boot.example")]))
            .expect_err("bad url");
        assert!(err.0.contains("NETBOOT_HTTP_SERVER"));
    }
}
