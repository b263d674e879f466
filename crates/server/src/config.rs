//! Server configuration.
//!
//! Every option is a command-line flag with an environment-variable
//! fallback, so the viewer can be launched either from a shell or from a
//! hook script that only sets env vars.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use hooks_viewer_core::{RateLimitConfig, WatcherConfig};

/// Default port for the viewer.
pub const DEFAULT_PORT: u16 = 3456;

#[derive(Debug, Clone, Parser)]
#[command(name = "hooks-viewer", version, about = "Realtime viewer for assistant hook logs")]
pub struct ServerConfig {
    /// Interface to bind. Keep this on loopback unless you know why not.
    #[arg(long, env = "HOOKS_VIEWER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    #[arg(long, env = "HOOKS_VIEWER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Newline-delimited JSON log written by the hook handlers.
    #[arg(long, env = "HOOKS_VIEWER_LOG_FILE", default_value = "hooks-log.txt")]
    pub log_file: PathBuf,

    /// Directory holding the built dashboard (`index.html` + assets).
    /// Defaults to `./dist` when it exists.
    #[arg(long, env = "HOOKS_VIEWER_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Bearer token required by `POST /shutdown`. Generated when absent.
    #[arg(long, env = "HOOKS_VIEWER_SHUTDOWN_TOKEN", hide_env_values = true)]
    pub shutdown_token: Option<String>,

    /// Stream connections admitted per client within the window.
    #[arg(long, env = "HOOKS_VIEWER_RATE_LIMIT_MAX", default_value_t = 10)]
    pub rate_limit_max: usize,

    #[arg(long, env = "HOOKS_VIEWER_RATE_LIMIT_WINDOW_MS", default_value_t = 60_000)]
    pub rate_limit_window_ms: u64,

    #[arg(long, env = "HOOKS_VIEWER_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Disable OS file notifications and rely on polling alone.
    #[arg(long, env = "HOOKS_VIEWER_NO_FS_EVENTS")]
    pub no_fs_events: bool,

    /// Emit logs as JSON lines instead of compact text.
    #[arg(long, env = "HOOKS_VIEWER_LOG_JSON")]
    pub log_json: bool,
}

impl ServerConfig {
    /// Defaults for everything except the log file. Used by tests and
    /// embedders that do not go through the CLI.
    pub fn for_log_file(log_file: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            log_file: log_file.into(),
            static_dir: None,
            shutdown_token: None,
            rate_limit_max: 10,
            rate_limit_window_ms: 60_000,
            poll_interval_ms: 500,
            no_fs_events: false,
            log_json: false,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Resolve the static directory.
    ///
    /// Priority:
    /// 1. `--static-dir` / `HOOKS_VIEWER_STATIC_DIR`
    /// 2. `./dist` (if it exists)
    /// 3. None (API-only mode)
    pub fn resolved_static_dir(&self) -> Option<PathBuf> {
        self.static_dir.clone().or_else(|| {
            let dist = PathBuf::from("dist");
            dist.is_dir().then_some(dist)
        })
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::new(
            self.rate_limit_max,
            Duration::from_millis(self.rate_limit_window_ms),
        )
    }

    pub fn watcher(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            fs_events: !self.no_fs_events,
        }
    }
}
