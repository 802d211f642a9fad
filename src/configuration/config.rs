use clap::Parser;
use std::path::PathBuf;

use crate::error_handling::types::ConfigError;

/// Orchestrator configuration.
///
/// Parsed from the command line with `clap`; every field can also be set
/// through the environment variable named in its attribute. Defaults keep a
/// single-process development setup working with no flags at all.
///
/// # Fields Overview
///
/// - server: `port`, `base_path`
/// - record store: `store_path` (unset = in-memory store)
/// - cluster: `namespace`, `workload_command`, `workload_port`, resource hints
/// - sessions: `session_timeout_default`, `session_timeout_max`, `max_sessions`
/// - readiness: `readiness_poll_secs`, `readiness_timeout_secs`
/// - background tasks: `janitor_interval_secs`, `stale_workload_secs`,
///   `prewarm_pool_size`, `prewarm_interval_secs`
#[derive(Parser, Debug, Clone)]
#[command(name = "ruche")]
#[command(about = "Ephemeral browser-session orchestrator")]
pub struct Config {
    /// TCP port for the orchestrator's own HTTP API.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Optional path prefix used when composing redirect URLs
    /// (normalized: "/" becomes empty, trailing slashes are trimmed).
    #[arg(long, env = "BASE_PATH", default_value = "")]
    pub base_path: String,

    /// SQLite file backing the durable record store. When unset, sessions
    /// are tracked in an in-memory store that dies with the process.
    #[arg(long, env = "STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Logical namespace for cluster objects; part of naming and logging.
    #[arg(long, env = "NAMESPACE", default_value = "browser-sessions")]
    pub namespace: String,

    /// Command launched for each session workload. Run through `sh -c`;
    /// receives PORT, BASE_PATH and SESSION_OPTIONS in its environment.
    #[arg(long, env = "WORKLOAD_COMMAND", default_value = "browser-workload")]
    pub workload_command: String,

    /// Port the workload's HTTP surface listens on inside its environment.
    #[arg(long, env = "WORKLOAD_PORT", default_value_t = 3000)]
    pub workload_port: u16,

    /// Resource hints handed to each workload.
    #[arg(long, env = "WORKLOAD_MEMORY_REQUEST", default_value = "256Mi")]
    pub memory_request: String,

    #[arg(long, env = "WORKLOAD_CPU_REQUEST", default_value = "200m")]
    pub cpu_request: String,

    #[arg(long, env = "WORKLOAD_MEMORY_LIMIT", default_value = "512Mi")]
    pub memory_limit: String,

    #[arg(long, env = "WORKLOAD_CPU_LIMIT", default_value = "500m")]
    pub cpu_limit: String,

    /// Session TTL (seconds) applied when the caller does not supply one.
    #[arg(long, env = "SESSION_TIMEOUT", default_value_t = 1800)]
    pub session_timeout_default: u64,

    /// Upper bound for caller-supplied session TTLs (seconds).
    #[arg(long, env = "SESSION_TIMEOUT_MAX", default_value_t = 7200)]
    pub session_timeout_max: u64,

    /// Concurrency ceiling: sessions beyond this are rejected at admission.
    #[arg(long, env = "MAX_SESSIONS", default_value_t = 100)]
    pub max_sessions: usize,

    /// Cadence of the readiness poll loop (seconds).
    #[arg(long, env = "READINESS_POLL_SECS", default_value_t = 1)]
    pub readiness_poll_secs: u64,

    /// Deadline for a workload to become ready during provisioning (seconds).
    #[arg(long, env = "READINESS_TIMEOUT_SECONDS", default_value_t = 60)]
    pub readiness_timeout_secs: u64,

    /// Interval between janitor reconciliation sweeps (seconds).
    #[arg(long, env = "JANITOR_INTERVAL_SECS", default_value_t = 15)]
    pub janitor_interval_secs: u64,

    /// Age past which a never-ready workload is reclaimed (seconds).
    /// Must be materially larger than the readiness timeout.
    #[arg(long, env = "STALE_WORKLOAD_SECS", default_value_t = 600)]
    pub stale_workload_secs: u64,

    /// Target number of prewarmed spare workloads. Zero disables the pool.
    #[arg(long, env = "PREWARM_POOL_SIZE", default_value_t = 0)]
    pub prewarm_pool_size: usize,

    /// Interval between prewarm pool sizing passes (seconds).
    #[arg(long, env = "PREWARM_CHECK_INTERVAL_SECS", default_value_t = 20)]
    pub prewarm_interval_secs: u64,
}

impl Config {
    /// Parses configuration from the process arguments and environment,
    /// then validates cross-field constraints.
    pub fn from_args() -> Result<Self, ConfigError> {
        let mut config = Config::parse();
        config.base_path = normalize_base_path(&config.base_path);
        config.validate()?;
        Ok(config)
    }

    /// Checks constraints that clap's per-field parsing cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::BadPort("port must be non-zero".to_string()));
        }
        if self.workload_port == 0 {
            return Err(ConfigError::BadPort(
                "workload-port must be non-zero".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::NotInRange(
                "max-sessions must be at least 1".to_string(),
            ));
        }
        if self.session_timeout_default == 0 {
            return Err(ConfigError::BadTimeout(
                "session-timeout-default must be at least 1 second".to_string(),
            ));
        }
        if self.session_timeout_default > self.session_timeout_max {
            return Err(ConfigError::BadTimeout(format!(
                "session-timeout-default ({}) exceeds session-timeout-max ({})",
                self.session_timeout_default, self.session_timeout_max
            )));
        }
        if self.readiness_poll_secs == 0 || self.readiness_timeout_secs == 0 {
            return Err(ConfigError::BadTimeout(
                "readiness poll and timeout must be at least 1 second".to_string(),
            ));
        }
        if self.janitor_interval_secs == 0 {
            return Err(ConfigError::BadTimeout(
                "janitor-interval-secs must be at least 1 second".to_string(),
            ));
        }
        if self.stale_workload_secs <= self.readiness_timeout_secs {
            return Err(ConfigError::BadTimeout(format!(
                "stale-workload-secs ({}) must exceed readiness-timeout-seconds ({})",
                self.stale_workload_secs, self.readiness_timeout_secs
            )));
        }
        Ok(())
    }

    /// Clamps a caller-supplied timeout to the configured bounds, falling
    /// back to the default when absent or zero.
    pub fn effective_timeout(&self, requested: Option<u64>) -> u64 {
        match requested {
            Some(t) if t > 0 => t.min(self.session_timeout_max),
            _ => self.session_timeout_default,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        // Mirrors the clap defaults; used by tests and embedding callers.
        Config::try_parse_from(["ruche"]).expect("default configuration must parse")
    }
}

/// Empty or "/" means no base path; otherwise a single leading slash and no
/// trailing slashes.
pub fn normalize_base_path(raw: &str) -> String {
    let v = raw.trim();
    if v.is_empty() || v == "/" {
        return String::new();
    }
    let with_leading = if v.starts_with('/') {
        v.to_string()
    } else {
        format!("/{}", v)
    };
    with_leading.trim_end_matches('/').to_string()
}
