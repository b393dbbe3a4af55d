//! Structured logging setup for a Lambda function process.
//!
//! Installs a [`tracing_subscriber`] formatter on first use, matching the behavior of the
//! AWS-managed Node.js and Python runtimes: JSON lines when `AWS_LAMBDA_LOG_FORMAT=JSON`
//! (CloudWatch Logs' native ingestion format), plain compact text otherwise.

use std::sync::Once;

use crate::config::Config;

static INIT: Once = Once::new();

/// Installs the global [`tracing`] subscriber for this process, if one hasn't been installed
/// yet. Safe to call more than once -- only the first call takes effect, matching the
/// lower-level [`lambda_runtime_api_client::tracing::init_default_subscriber`] this builds on.
///
/// The minimum level comes from [`Config::log_level`], which already applied the `LOG_LEVEL`
/// / `AWS_LAMBDA_LOG_LEVEL` precedence documented there.
pub fn init_default_subscriber(config: &Config) {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::builder()
            .with_default_directive(level_to_filter(config.log_level).into())
            .from_env_lossy();

        let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

        let json = std::env::var("AWS_LAMBDA_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if json {
            builder.json().flatten_event(true).init();
        } else {
            builder.without_time().init();
        }
    });
}

fn level_to_filter(level: tracing::Level) -> tracing_subscriber::filter::LevelFilter {
    tracing_subscriber::filter::LevelFilter::from_level(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_to_filter_round_trips() {
        assert_eq!(level_to_filter(tracing::Level::WARN), tracing_subscriber::filter::LevelFilter::WARN);
    }
}
