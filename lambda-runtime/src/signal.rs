//! Cooperative shutdown via OS signals.
//!
//! Installs a handler for the configured [`crate::config::StopSignal`] and exposes a future
//! that resolves the first time that signal arrives. Modeled on the
//! `tokio::signal::unix::{signal, SignalKind}` + `tokio::select!` pattern used to trap
//! `SIGTERM`/`SIGINT` for graceful shutdown around Lambda extensions, generalized here to any
//! configured signal number so tests can use a self-inflicted `SIGALRM` instead.

use tokio::signal::unix::{signal, SignalKind};

use crate::{config::StopSignal, error::LifecycleError};

/// A handle to an installed signal trap. Call [`StopSignalFuture::wait`] to await the signal.
pub(crate) struct StopSignalFuture {
    inner: tokio::signal::unix::Signal,
}

/// Install a handler for `stop_signal`. Returns a future that resolves once, the first time
/// the signal is delivered to this process.
pub(crate) fn trap(stop_signal: StopSignal) -> Result<StopSignalFuture, LifecycleError> {
    let kind = SignalKind::from_raw(stop_signal.as_raw());
    let inner = signal(kind)
        .map_err(|err| LifecycleError::ConfigurationError(crate::error::ConfigError::InvalidStopSignal(err.to_string())))?;
    Ok(StopSignalFuture { inner })
}

impl StopSignalFuture {
    /// Waits for the signal to be delivered. Cancel-safe: intended to be used inside
    /// `tokio::select!` alongside the steady-state loop's other branches.
    pub(crate) async fn wait(&mut self) {
        // `recv` returning `None` means the signal stream can no longer deliver events (the
        // underlying fd was closed); there is nothing more to wait for at that point.
        self.inner.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StopSignal;

    #[tokio::test]
    async fn trap_resolves_when_signal_is_raised() {
        let mut trap = trap(StopSignal::SIGALRM).expect("failed to install signal handler");

        let raise = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            unsafe {
                libc_raise(StopSignal::SIGALRM.as_raw());
            }
        });

        tokio::time::timeout(std::time::Duration::from_secs(1), trap.wait())
            .await
            .expect("signal was not observed in time");

        raise.await.unwrap();
    }

    // Avoids a direct `libc` dependency for a single raise() call in tests; `nix`/`libc` are not
    // otherwise needed by this crate.
    unsafe fn libc_raise(sig: i32) {
        extern "C" {
            fn raise(sig: i32) -> i32;
        }
        raise(sig);
    }
}
