//! Glues a [`Context`], a [`Codec`], and a handler together to run one invocation at a time.
//!
//! A [`Runner`] is created once by the [`crate::Lifecycle`] and lives for the life of the
//! container: [`Runner::bootstrap`] runs the handler's construction hook exactly once, and
//! [`Runner::run_once`] drives the decode -> invoke -> encode/report pipeline for each
//! invocation the steady-state loop fetches.

use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use tower::{Service, ServiceExt};
use tracing::{debug, warn, Instrument};

use crate::{
    client::RuntimeClient,
    codec::Codec,
    diagnostic::{type_name_of_val, Diagnostic},
    error::{ClientError, RunnerError},
    handler::{Bootstrap, HandlerConfig},
    types::{Context, Invocation, LambdaEvent},
};

pub(crate) struct Runner<S, B, C> {
    client: Arc<RuntimeClient>,
    handler: HandlerConfig<S, B>,
    codec: C,
}

impl<S, B, C, In, Out> Runner<S, B, C>
where
    S: Service<LambdaEvent<In>, Response = Out>,
    S::Error: Into<Diagnostic> + std::fmt::Debug + Send + 'static,
    S::Future: Send + 'static,
    Out: Send + 'static,
    B: Bootstrap,
    C: Codec<In, Out>,
{
    pub(crate) fn new(client: Arc<RuntimeClient>, handler: HandlerConfig<S, B>, codec: C) -> Self {
        Self { client, handler, codec }
    }

    /// Runs the handler's `bootstrap` hook exactly once. On failure the cause is reported to
    /// `/init/error` and returned so the lifecycle can terminate the process non-zero.
    ///
    /// Unlike per-invocation handling, this always runs on the task driving the lifecycle: the
    /// hook completes before the steady-state loop starts polling, so there is no control loop
    /// yet for a blocking hook to stall, and offloading it would buy nothing.
    pub(crate) async fn bootstrap(&mut self) -> Result<(), lambda_runtime_api_client::BoxError> {
        match self.handler.bootstrap.bootstrap().await {
            Ok(()) => Ok(()),
            Err(cause) => {
                let diagnostic = Diagnostic {
                    error_type: "bootstrapError".to_string(),
                    error_message: cause.to_string(),
                };
                if let Err(report_err) = self.client.report_bootstrap_error(diagnostic).await {
                    warn!(error = ?report_err, "failed to report bootstrap error to the Runtime API");
                }
                Err(cause)
            }
        }
    }

    /// Fetches, decodes, invokes, and reports one invocation.
    ///
    /// Returns `Ok(())` for any completed iteration, including one that ended in a reported
    /// decode, encode, or handler error -- the control plane treats the invocation as completed
    /// either way. Only a failure to talk to the Runtime API itself -- fetching the next
    /// invocation, or reporting this one's outcome -- propagates and is expected to terminate
    /// the lifecycle.
    pub(crate) async fn run_once(&mut self) -> Result<(), ClientError> {
        let invocation = self.client.next().await?;
        let ctx = Context::new(&invocation);
        let span = ctx.request_span();
        self.process(invocation, ctx).instrument(span).await
    }

    async fn process(&mut self, invocation: Invocation, ctx: Context) -> Result<(), ClientError> {
        let request_id = invocation.request_id.clone();

        let outcome: Result<Option<Bytes>, Diagnostic> = match self.codec.decode(invocation.payload) {
            Err(cause) => {
                warn!(error = %cause, "failed to decode invocation payload");
                Err(Diagnostic::from(RunnerError::RequestDecoding(cause)))
            }
            Ok(input) => match self.invoke(LambdaEvent::new(input, ctx)).await {
                Ok(output) => match self.codec.encode(output) {
                    Ok(body) => Ok(body),
                    Err(cause) => {
                        warn!(error = %cause, "failed to encode handler output");
                        Err(Diagnostic::from(RunnerError::ResponseEncoding(cause)))
                    }
                },
                Err(diagnostic) => Err(diagnostic),
            },
        };

        match outcome {
            Ok(body) => {
                debug!("invocation completed successfully");
                self.client.report_response(&request_id, body).await
            }
            Err(diagnostic) => {
                warn!(error_type = %diagnostic.error_type, error_message = %diagnostic.error_message, "invocation completed with an error");
                self.client.report_invocation_error(&request_id, diagnostic).await
            }
        }
    }

    /// Invokes the handler, honoring its `offload` policy and converting a panic -- whether
    /// raised directly or inside the returned future -- into a reportable [`Diagnostic`] rather
    /// than letting it unwind into the steady-state loop.
    async fn invoke(&mut self, event: LambdaEvent<In>) -> Result<Out, Diagnostic> {
        let svc = match self.handler.service.ready().await {
            Ok(svc) => svc,
            Err(err) => return Err(err.into()),
        };
        let fut = svc.call(event);

        if self.handler.offload {
            match tokio::spawn(fut).await {
                Ok(result) => result.map_err(Into::into),
                Err(join_err) => Err(panic_diagnostic_from_join(&join_err)),
            }
        } else {
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result.map_err(Into::into),
                Err(payload) => Err(panic_diagnostic(payload.as_ref())),
            }
        }
    }
}

fn panic_diagnostic(payload: &(dyn std::any::Any + Send)) -> Diagnostic {
    let message = if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("Lambda panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("Lambda panicked: {msg}")
    } else {
        "Lambda panicked".to_string()
    };
    Diagnostic {
        error_type: type_name_of_val(payload),
        error_message: message,
    }
}

fn panic_diagnostic_from_join(err: &tokio::task::JoinError) -> Diagnostic {
    Diagnostic {
        error_type: "handlerPanic".to_string(),
        error_message: format!("Lambda panicked: {err}"),
    }
}
