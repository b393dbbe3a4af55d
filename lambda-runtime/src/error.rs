use thiserror::Error;

/// Type-erased error, re-exported for handlers that don't need to match on a specific kind.
pub type Error = lambda_runtime_api_client::BoxError;

/// Configuration could not be derived from the environment.
///
/// Fatal at startup; the lifecycle never reaches `initializing` when this is returned from
/// [`crate::Config::from_env`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `AWS_LAMBDA_RUNTIME_API` is missing a scheme-less `host:port` authority.
    #[error("invalid runtime API endpoint: {0}")]
    InvalidEndpoint(String),
    /// `STOP_SIGNAL` did not parse to a supported signal number.
    #[error("invalid stop signal: {0}")]
    InvalidStopSignal(String),
}

/// Stable error kinds raised by the Runtime HTTP client.
///
/// All of these propagate out of the steady-state loop and terminate the lifecycle: by design,
/// there is no recovery available in-process once the control plane can no longer be reached
/// or misbehaves.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The control plane replied with an unexpected HTTP status code.
    #[error("unexpected status code from Runtime API: {0}")]
    BadStatusCode(http::StatusCode),
    /// A `/next` response carried no body.
    #[error("Runtime API response carried no body")]
    NoBody,
    /// A `/next` response was missing the `Lambda-Runtime-Aws-Request-Id` header, or another
    /// required header failed to parse.
    #[error("Runtime API response missing or malformed context headers: {0}")]
    NoContext(String),
    /// The connection was closed by the peer while a request was outstanding.
    #[error("connection reset by peer")]
    ConnectionResetByPeer,
    /// A request exceeded the configured `requestTimeout`.
    #[error("Runtime API request timed out")]
    Timeout,
    /// Serializing a request body (typically an [`crate::Diagnostic`]) failed.
    #[error("failed to encode request body as JSON: {0}")]
    JsonEncoding(#[source] serde_json::Error),
    /// Any other transport-level failure (DNS, connect, I/O) not classified above.
    #[error("transport error: {0}")]
    Transport(#[source] lambda_runtime_api_client::BoxError),
}

/// Stable error kinds raised while running one invocation through the [`crate::Runner`].
///
/// Unlike [`ClientError`], these are per-invocation: the runner reports them to the Runtime
/// API's invocation-error endpoint and the steady-state loop continues to the next iteration.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The codec could not decode the invocation payload into the handler's input type.
    #[error("request decoding failed: {0}")]
    RequestDecoding(#[source] lambda_runtime_api_client::BoxError),
    /// The codec could not encode the handler's output into a response body.
    #[error("response encoding failed: {0}")]
    ResponseEncoding(#[source] lambda_runtime_api_client::BoxError),
    /// The handler returned an error, or panicked.
    #[error("handler error: {0}")]
    HandlerError(#[source] lambda_runtime_api_client::BoxError),
}

/// Failures that terminate the lifecycle, as opposed to being reported per-invocation.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The handler's `bootstrap` hook failed; reported to `/init/error`, process exits non-zero.
    #[error("bootstrap failed: {0}")]
    BootstrapError(#[source] lambda_runtime_api_client::BoxError),
    /// A transport or protocol-level failure while talking to the Runtime API during the
    /// steady-state loop.
    #[error("transport error: {0}")]
    TransportError(#[source] ClientError),
    /// Configuration could not be derived from the environment.
    #[error("configuration error: {0}")]
    ConfigurationError(#[source] ConfigError),
}
