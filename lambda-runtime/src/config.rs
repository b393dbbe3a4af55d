use std::{env, fmt, str::FromStr, time::Duration};

use crate::error::ConfigError;

/// Signal numbers the runtime knows how to translate into a [`tokio::signal::unix::SignalKind`].
///
/// Only the signals that make sense as a cooperative shutdown trigger are accepted; anything
/// else is a [`ConfigError::InvalidStopSignal`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct StopSignal(pub(crate) i32);

impl StopSignal {
    /// `SIGTERM`, the default.
    pub const SIGTERM: StopSignal = StopSignal(15);
    /// `SIGINT`.
    pub const SIGINT: StopSignal = StopSignal(2);
    /// `SIGALRM`, mainly useful in tests that need a deterministic, self-inflicted stop signal.
    pub const SIGALRM: StopSignal = StopSignal(14);
    /// `SIGUSR1`.
    pub const SIGUSR1: StopSignal = StopSignal(10);
    /// `SIGUSR2`.
    pub const SIGUSR2: StopSignal = StopSignal(12);

    /// The raw signal number.
    pub fn as_raw(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StopSignal {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: i32 = s.parse().map_err(|_| ConfigError::InvalidStopSignal(s.to_string()))?;
        match n {
            1..=31 => Ok(StopSignal(n)),
            _ => Err(ConfigError::InvalidStopSignal(s.to_string())),
        }
    }
}

/// Configuration read once at process startup; immutable for the life of the runtime.
///
/// See the environment variables documented on each field for how values are sourced.
/// Every field other than [`Config::runtime_endpoint`] falls back to a default when its
/// environment variable is absent or unparseable; a bad runtime endpoint is the only
/// configuration error the runtime treats as fatal at startup, matching
/// [`ConfigError::InvalidEndpoint`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Host and port of the Runtime API, read from `AWS_LAMBDA_RUNTIME_API` (`host:port`,
    /// no scheme, no path). Defaults to `127.0.0.1:7000` when the variable is unset.
    pub runtime_endpoint: http::Uri,
    /// Minimum log level to emit, from `LOG_LEVEL`. Defaults to `info`.
    pub log_level: tracing::Level,
    /// Maximum number of invocations to serve before exiting successfully, from
    /// `MAX_REQUESTS`. `0` (the default) means unbounded.
    pub max_invocations: u64,
    /// Signal that triggers cooperative shutdown, from `STOP_SIGNAL`. Defaults to `SIGTERM`.
    pub stop_signal: StopSignal,
    /// Whether the transport connection to the Runtime API should be kept alive between
    /// invocations, from `KEEP_ALIVE`. Defaults to `true`.
    pub keep_alive: bool,
    /// Per-request timeout against the Runtime API, from `REQUEST_TIMEOUT` (milliseconds).
    /// Absent by default, meaning operations never time out locally.
    pub request_timeout: Option<Duration>,
    /// Process-unique identifier attached to every log record emitted by this runtime
    /// instance, so that multiple lifecycles running in the same process (as in tests) can
    /// be told apart in the logs.
    pub lifecycle_id: String,
}

impl Config {
    /// Read configuration from the environment, applying the defaults and fallbacks
    /// documented on each field.
    pub fn from_env() -> Result<Self, ConfigError> {
        let runtime_endpoint = parse_endpoint(env::var("AWS_LAMBDA_RUNTIME_API").ok())?;

        let log_level = env_or_default("LOG_LEVEL", tracing::Level::INFO, parse_log_level);
        let max_invocations = env_or_default("MAX_REQUESTS", 0, |v| v.parse::<u64>().ok());
        let stop_signal = env_or_default("STOP_SIGNAL", StopSignal::SIGTERM, |v| v.parse::<StopSignal>().ok());
        let keep_alive = env_or_default("KEEP_ALIVE", true, parse_bool);
        let request_timeout = env::var("REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis);

        Ok(Config {
            runtime_endpoint,
            log_level,
            max_invocations,
            stop_signal,
            keep_alive,
            request_timeout,
            lifecycle_id: new_lifecycle_id(),
        })
    }
}

/// Reads `name` from the environment, applies `parse`, and falls back to `default` whenever the
/// variable is unset *or* fails to parse -- logging a warning in the latter case only, since an
/// operator who set the variable to something we can't use should hear about it.
fn env_or_default<T: Copy>(name: &str, default: T, parse: impl FnOnce(&str) -> Option<T>) -> T {
    match env::var(name) {
        Err(_) => default,
        Ok(raw) => parse(&raw).unwrap_or_else(|| {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment variable, using default");
            default
        }),
    }
}

fn parse_endpoint(raw: Option<String>) -> Result<http::Uri, ConfigError> {
    let authority = raw.unwrap_or_else(|| "127.0.0.1:7000".to_string());
    let uri = format!("http://{authority}")
        .parse::<http::Uri>()
        .map_err(|_| ConfigError::InvalidEndpoint(authority.clone()))?;
    if uri.authority().is_none() {
        return Err(ConfigError::InvalidEndpoint(authority));
    }
    Ok(uri)
}

fn parse_log_level(raw: &str) -> Option<tracing::Level> {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => Some(tracing::Level::TRACE),
        "debug" => Some(tracing::Level::DEBUG),
        "info" => Some(tracing::Level::INFO),
        "warning" | "warn" => Some(tracing::Level::WARN),
        "error" => Some(tracing::Level::ERROR),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn new_lifecycle_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{pid:x}-{nanos:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_absent() {
        let endpoint = parse_endpoint(None).unwrap();
        assert_eq!(endpoint.authority().unwrap().as_str(), "127.0.0.1:7000");
    }

    #[test]
    fn bad_endpoint_is_a_config_error() {
        assert!(parse_endpoint(Some(String::new())).is_err());
    }

    #[test]
    fn stop_signal_parses_known_numbers() {
        assert_eq!("15".parse::<StopSignal>().unwrap(), StopSignal::SIGTERM);
        assert_eq!("14".parse::<StopSignal>().unwrap(), StopSignal::SIGALRM);
        assert!("9999".parse::<StopSignal>().is_err());
    }

    #[test]
    fn log_level_defaults_to_info_on_garbage() {
        assert_eq!(parse_log_level("bogus"), None);
        assert_eq!(parse_log_level("WARNING"), Some(tracing::Level::WARN));
    }

    #[test]
    fn env_or_default_falls_back_on_unparseable_value() {
        assert_eq!(env_or_default("__NOT_A_REAL_VAR__", 42u64, |v| v.parse().ok()), 42);
    }
}
