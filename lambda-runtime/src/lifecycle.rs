//! Bootstrap-then-steady-state lifecycle: `idle -> initializing -> active -> stopping ->
//! shutdown`, with cooperative shutdown via a signal trap and an optional invocation cap.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use tower::Service;
use tracing::{info, Instrument};

use crate::{
    client::RuntimeClient,
    codec::Codec,
    config::Config,
    diagnostic::Diagnostic,
    error::{Error, LifecycleError},
    handler::{Bootstrap, HandlerConfig},
    runner::Runner,
    signal::{self, StopSignalFuture},
    types::LambdaEvent,
};

/// Where the lifecycle currently sits in its strictly monotonic state progression.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum State {
    Idle,
    Initializing,
    Active,
    Stopping,
    Shutdown,
}

/// Bootstraps a handler once, then runs it against the Runtime API until a stop signal, the
/// `maxInvocations` cap, or a transport failure ends the steady-state loop.
///
/// Owns the one TCP connection to the control plane and the handler for its full duration.
/// `run()` consumes the lifecycle and may be called at most once.
pub struct Lifecycle<S, B, C> {
    config: Config,
    runner: Runner<S, B, C>,
    state: Arc<Mutex<State>>,
    stop_requested: Arc<AtomicBool>,
}

impl<S, B, C, In, Out> Lifecycle<S, B, C>
where
    S: Service<LambdaEvent<In>, Response = Out>,
    S::Error: Into<Diagnostic> + std::fmt::Debug + Send + 'static,
    S::Future: Send + 'static,
    Out: Send + 'static,
    B: Bootstrap,
    C: Codec<In, Out>,
{
    /// Builds a lifecycle from a [`Config`], a configured handler, and a codec. Constructs the
    /// (lazily connecting, pooled) transport client bound to [`Config::runtime_endpoint`]; no
    /// connection is actually made until the first request is sent from `run()`.
    pub fn new(config: Config, handler: HandlerConfig<S, B>, codec: C) -> Result<Self, Error> {
        let transport = lambda_runtime_api_client::Client::builder()
            .with_endpoint(config.runtime_endpoint.clone())
            .build()?;
        let client = Arc::new(RuntimeClient::new(Arc::new(transport), config.request_timeout, config.keep_alive));
        Ok(Self {
            config,
            runner: Runner::new(client, handler, codec),
            state: Arc::new(Mutex::new(State::Idle)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    /// A cloneable handle that external code (tests, an extension, a separate task) can use to
    /// request a cooperative stop without owning the lifecycle itself.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: self.state.clone(),
            stop_requested: self.stop_requested.clone(),
        }
    }

    /// Runs the lifecycle to completion: bootstrap, then the steady-state loop.
    ///
    /// Returns the number of completed invocations on a clean shutdown -- signal-driven or
    /// `maxInvocations` reached. A bootstrap or transport failure returns an error instead; the
    /// caller is expected to translate that into a non-zero process exit.
    pub async fn run(mut self) -> Result<u64, LifecycleError> {
        self.set_state(State::Initializing);
        if let Err(cause) = self.runner.bootstrap().await {
            self.set_state(State::Shutdown);
            return Err(LifecycleError::BootstrapError(cause));
        }
        // A stop requested before we got here (e.g. via a `StopHandle` held since before `run()`
        // was called) would otherwise be lost: `set_state_if_active` only ever transitions out
        // of `Active`, and the lifecycle has not reached `Active` yet. `stop_requested` latches
        // that request independently of `state` so it is honored here instead.
        if self.stop_requested.load(Ordering::SeqCst) {
            self.set_state(State::Stopping);
        } else {
            self.set_state(State::Active);
        }

        let trap = signal::trap(self.config.stop_signal)?;
        let signal_task = self.spawn_signal_trap(trap);

        let result = self.steady_state().await;

        // Cancelable on normal completion, so tests can run multiple lifecycles in one process.
        signal_task.abort();
        self.set_state(State::Shutdown);
        result
    }

    fn spawn_signal_trap(&self, mut trap: StopSignalFuture) -> tokio::task::JoinHandle<()> {
        let state = self.state.clone();
        tokio::spawn(async move {
            trap.wait().await;
            info!("stop signal received, finishing the in-flight invocation before exiting");
            set_state_if_active(&state, State::Stopping);
        })
    }

    async fn steady_state(&mut self) -> Result<u64, LifecycleError> {
        let mut completed: u64 = 0;
        loop {
            if self.state() != State::Active {
                return Ok(completed);
            }
            if self.config.max_invocations > 0 && completed >= self.config.max_invocations {
                self.set_state(State::Stopping);
                return Ok(completed);
            }

            // A signal observed here does not abort an in-flight `next()`: the Lambda protocol
            // gives us no way to cancel an invocation mid-flight without leaving it in an
            // undefined state at the control plane, so the current iteration always finishes.
            let iteration_span = tracing::info_span!(
                "lambda lifecycle iteration",
                lifecycleId = %self.config.lifecycle_id,
                lifecycleIteration = completed,
            );
            self.runner
                .run_once()
                .instrument(iteration_span)
                .await
                .map_err(LifecycleError::TransportError)?;
            completed += 1;
        }
    }

    fn state(&self) -> State {
        *self.state.lock().expect("lifecycle state mutex poisoned")
    }

    fn set_state(&self, state: State) {
        *self.state.lock().expect("lifecycle state mutex poisoned") = state;
    }
}

fn set_state_if_active(state: &Mutex<State>, next: State) {
    let mut guard = state.lock().expect("lifecycle state mutex poisoned");
    if *guard == State::Active {
        *guard = next;
    }
}

/// A handle that can request a lifecycle's cooperative stop from outside the task running it.
///
/// Calling [`StopHandle::stop`] more than once, or after the lifecycle has already left the
/// `active` state, has no additional observable effect. Calling it before `run()` is even
/// called is also honored: the request is latched and consulted once the lifecycle would
/// otherwise transition into `active`, so the steady-state loop never runs a single iteration.
#[derive(Clone)]
pub struct StopHandle {
    state: Arc<Mutex<State>>,
    stop_requested: Arc<AtomicBool>,
}

impl StopHandle {
    /// Requests a cooperative stop. Idempotent, and safe to call before `run()` has started.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        set_state_if_active(&self.state, State::Stopping);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::RawCodec, handler::HandlerConfig};
    use bytes::Bytes;
    use httpmock::prelude::*;
    use tower::service_fn;

    fn config_for(base_url: &str, max_invocations: u64) -> Config {
        let mut config = Config::from_env().unwrap_or_else(|_| Config {
            runtime_endpoint: "http://127.0.0.1:7000".parse().unwrap(),
            log_level: tracing::Level::INFO,
            max_invocations: 0,
            stop_signal: crate::config::StopSignal::SIGTERM,
            keep_alive: true,
            request_timeout: None,
            lifecycle_id: "test".into(),
        });
        config.runtime_endpoint = base_url.parse().unwrap();
        config.max_invocations = max_invocations;
        config.stop_signal = crate::config::StopSignal::SIGALRM;
        config
    }

    #[tokio::test]
    async fn stops_after_max_invocations_with_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200)
                .header("lambda-runtime-aws-request-id", "r")
                .header("lambda-runtime-deadline-ms", "99999999999999")
                .body("hi");
        });
        server.mock(|when, then| {
            when.method(POST).path_contains("/response");
            then.status(202);
        });

        let config = config_for(&server.base_url(), 5);
        let handler = HandlerConfig::new(service_fn(|event: LambdaEvent<Bytes>| async move {
            Ok::<_, Diagnostic>(event.payload)
        }));
        let lifecycle = Lifecycle::new(config, handler, RawCodec).unwrap();

        let completed = lifecycle.run().await.unwrap();
        assert_eq!(completed, 5);
    }

    #[tokio::test]
    async fn bootstrap_failure_reports_and_fails_before_any_next() {
        let server = MockServer::start();
        let init_error = server.mock(|when, then| {
            when.method(POST).path("/2018-06-01/runtime/init/error");
            then.status(202);
        });
        let next = server.mock(|when, then| {
            when.method(GET);
            then.status(200)
                .header("lambda-runtime-aws-request-id", "r")
                .header("lambda-runtime-deadline-ms", "1")
                .body("hi");
        });

        let config = config_for(&server.base_url(), 0);
        let handler = HandlerConfig::new(service_fn(|event: LambdaEvent<Bytes>| async move {
            Ok::<_, Diagnostic>(event.payload)
        }))
        .with_bootstrap(crate::handler::bootstrap_fn(|| async { Err("kaboom".into()) }));
        let lifecycle = Lifecycle::new(config, handler, RawCodec).unwrap();

        let err = lifecycle.run().await.unwrap_err();
        assert!(matches!(err, LifecycleError::BootstrapError(_)));
        init_error.assert();
        next.assert_hits(0);
    }

    #[tokio::test]
    async fn stop_handle_halts_the_loop_between_iterations() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200)
                .header("lambda-runtime-aws-request-id", "r")
                .header("lambda-runtime-deadline-ms", "99999999999999")
                .body("hi");
        });
        server.mock(|when, then| {
            when.method(POST).path_contains("/response");
            then.status(202);
        });

        let config = config_for(&server.base_url(), 0);
        let handler = HandlerConfig::new(service_fn(|event: LambdaEvent<Bytes>| async move {
            Ok::<_, Diagnostic>(event.payload)
        }));
        let lifecycle = Lifecycle::new(config, handler, RawCodec).unwrap();
        let stop_handle = lifecycle.stop_handle();

        stop_handle.stop();
        stop_handle.stop(); // idempotent

        let completed = lifecycle.run().await.unwrap();
        assert_eq!(completed, 0);
    }
}
