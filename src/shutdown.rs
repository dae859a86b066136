//! Process signals that end the server.
//!
//! Both SIGINT and SIGTERM lead to the same orderly shutdown. Containers and
//! the orchestration service stop the process with SIGTERM.
use std::io;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

#[cfg(unix)]
pub struct ShutdownSignal {
    interrupt: Signal,
    terminate: Signal,
}

#[cfg(unix)]
impl ShutdownSignal {
    /// Installs the handlers. From here on neither signal kills the process
    /// on its own.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolves with the name of the first signal received.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(not(unix))]
pub struct ShutdownSignal;

#[cfg(not(unix))]
impl ShutdownSignal {
    pub fn install() -> io::Result<Self> {
        Ok(Self)
    }

    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_sigterm_is_caught() {
        let mut shutdown = ShutdownSignal::install().unwrap();

        // Handler is in place, so this no longer terminates the test binary.
        unsafe {
            libc::raise(libc::SIGTERM);
        }

        let received = timeout(Duration::from_secs(5), shutdown.recv())
            .await
            .expect("SIGTERM was not delivered");
        assert_eq!(received, "SIGTERM");
    }
}
