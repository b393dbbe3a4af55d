//! The handler contract: what a user provides, and how the runner calls it.
//!
//! A handler is any [`tower::Service<LambdaEvent<In>>`] — a free function wrapped in
//! [`tower::service_fn`], a closure, or a hand-implemented `Service`. [`Bootstrap`] is a
//! separate, optional trait: handlers that don't need one-time setup never have to think
//! about it, matching the capability set `{ bootstrap?, handle }` from the handler contract.

use std::future::{self, Future};

use lambda_runtime_api_client::BoxError;

/// One-time setup run exactly once before the first invocation.
///
/// The default implementation is a no-op success, so a handler that doesn't need bootstrap
/// work (the common case) never has to implement this trait at all — see
/// [`HandlerConfig::new`], which wraps any service with [`NoOpBootstrap`].
pub trait Bootstrap: Send {
    /// The future returned by [`Bootstrap::bootstrap`].
    type Future: Future<Output = Result<(), BoxError>> + Send;

    /// Run once, before the runner issues its first `GET /next`.
    fn bootstrap(&mut self) -> Self::Future;
}

/// A [`Bootstrap`] that always succeeds immediately, used when a handler doesn't supply its
/// own construction hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpBootstrap;

impl Bootstrap for NoOpBootstrap {
    type Future = future::Ready<Result<(), BoxError>>;

    fn bootstrap(&mut self) -> Self::Future {
        future::ready(Ok(()))
    }
}

/// Wraps a `FnMut() -> Future<Output = Result<(), BoxError>>` closure as a [`Bootstrap`].
pub fn bootstrap_fn<F, Fut>(f: F) -> BootstrapFn<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    BootstrapFn(f)
}

/// [`Bootstrap`] implementation returned by [`bootstrap_fn`].
#[derive(Debug, Clone, Copy)]
pub struct BootstrapFn<F>(F);

impl<F, Fut> Bootstrap for BootstrapFn<F>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    type Future = Fut;

    fn bootstrap(&mut self) -> Self::Future {
        (self.0)()
    }
}

/// Binds a handler `Service` to a [`Bootstrap`] and an offload policy.
///
/// `offload` controls whether the runner dispatches each invocation onto a separate worker
/// (`tokio::spawn`, the default — safer, since user code stalling does not block the control
/// loop from negotiating its next long poll) or runs it inline on the task driving the control
/// loop (`offload = false`, lower overhead, appropriate for handlers that are known never to
/// block).
pub struct HandlerConfig<S, B = NoOpBootstrap> {
    pub(crate) service: S,
    pub(crate) bootstrap: B,
    pub(crate) offload: bool,
}

impl<S> HandlerConfig<S, NoOpBootstrap> {
    /// Wrap a handler service with the default offload policy (`true`) and no bootstrap hook.
    pub fn new(service: S) -> Self {
        HandlerConfig {
            service,
            bootstrap: NoOpBootstrap,
            offload: true,
        }
    }
}

impl<S, B> HandlerConfig<S, B> {
    /// Attach a [`Bootstrap`] hook, replacing any previous one.
    pub fn with_bootstrap<B2>(self, bootstrap: B2) -> HandlerConfig<S, B2>
    where
        B2: Bootstrap,
    {
        HandlerConfig {
            service: self.service,
            bootstrap,
            offload: self.offload,
        }
    }

    /// Override the offload policy. Typed-callback handlers default to `true`; set this to
    /// `false` for promise-style handlers that must run on the control loop's own task.
    pub fn with_offload(mut self, offload: bool) -> Self {
        self.offload = offload;
        self
    }
}
