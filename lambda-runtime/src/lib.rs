#![deny(clippy::all, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]
#![warn(missing_docs, nonstandard_style, rust_2018_idioms)]

//! A function-as-a-service runtime adapter: it speaks the Lambda Runtime API's HTTP protocol so
//! a handler only has to implement [`tower::Service<LambdaEvent<In>>`].
//!
//! ```no_run
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     lambda_runtime::run(service_fn(func)).await
//! }
//!
//! async fn func(event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(event.payload)
//! }
//! ```
//!
//! Handlers that need one-time setup (a database pool, a secret fetched once) can attach a
//! [`Bootstrap`] hook and reach for [`run_with`] instead of [`run`]. See [`handler`] and
//! [`codec`] for how the input/output types and wire encoding are chosen.

mod client;
mod codec;
mod config;
mod diagnostic;
mod error;
mod handler;
mod lifecycle;
mod logging;
mod requests;
mod runner;
mod signal;
mod types;

pub use codec::{Codec, JsonCodec, RawCodec, StringCodec};
pub use config::{Config, StopSignal};
pub use diagnostic::Diagnostic;
pub use error::{ClientError, ConfigError, Error, LifecycleError, RunnerError};
pub use handler::{bootstrap_fn, Bootstrap, BootstrapFn, HandlerConfig, NoOpBootstrap};
pub use lifecycle::{Lifecycle, StopHandle};
pub use logging::init_default_subscriber;
pub use types::{ClientApplication, ClientContext, CognitoIdentity, Context, LambdaEvent};

pub use tower::{self, service_fn, Service};

/// Runs a handler with the default configuration, codec, and no bootstrap hook.
///
/// This is the entry point almost every Lambda function in Rust uses: read [`Config`] from the
/// environment, decode and encode with [`JsonCodec`], and run until the process is asked to
/// stop. See [`run_with`] if you need a [`Bootstrap`] hook, a non-default [`Codec`], or a
/// non-default offload policy.
pub async fn run<S, In, Out>(handler: S) -> Result<(), Error>
where
    S: Service<LambdaEvent<In>, Response = Out>,
    S::Error: Into<Diagnostic> + std::fmt::Debug + Send + 'static,
    S::Future: Send + 'static,
    Out: Send + 'static,
    In: for<'de> serde::Deserialize<'de>,
    Out: serde::Serialize,
{
    run_with(Config::from_env()?, HandlerConfig::new(handler), JsonCodec).await
}

/// Runs a handler built from a [`HandlerConfig`] (bootstrap hook, offload policy) against a
/// given [`Config`] and [`Codec`].
///
/// Installs the default [`tracing`] subscriber via [`init_default_subscriber`] before entering
/// the lifecycle, matching what [`run`] does implicitly.
pub async fn run_with<S, B, C, In, Out>(config: Config, handler: HandlerConfig<S, B>, codec: C) -> Result<(), Error>
where
    S: Service<LambdaEvent<In>, Response = Out>,
    S::Error: Into<Diagnostic> + std::fmt::Debug + Send + 'static,
    S::Future: Send + 'static,
    Out: Send + 'static,
    B: Bootstrap,
    C: Codec<In, Out>,
{
    init_default_subscriber(&config);
    let lifecycle = Lifecycle::new(config, handler, codec)?;
    lifecycle.run().await?;
    Ok(())
}
