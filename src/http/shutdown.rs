//! Stop signal shared between the server and whatever decides it should stop.
//!
//! A [`Shutdown`] is a cheap, cloneable handle. The server holds a receiver
//! from [`Shutdown::subscribe`]; tests call [`Shutdown::trigger`] directly,
//! and the binary calls [`Shutdown::trigger_on_signal`] to stop on Ctrl+C
//! (or SIGTERM on Unix).

use std::io;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Handle used to ask the server to drain and stop.
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    /// A receiver that completes once [`trigger`](Self::trigger) is called.
    ///
    /// Receivers created after the trigger do not see it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Tell every current subscriber to stop. Repeated calls are harmless.
    pub fn trigger(&self) {
        if self.sender.send(()).is_err() {
            tracing::debug!("Shutdown requested with nothing listening");
        }
    }

    /// Spawn a task that triggers shutdown on the first termination signal.
    ///
    /// If no signal handler can be installed, shutdown is triggered at once.
    pub fn trigger_on_signal(&self) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(name) => tracing::info!(signal = name, "Shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "Cannot listen for shutdown signals"),
            }
            handle.trigger();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.clone().subscribe();
        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_without_subscribers_is_harmless() {
        let shutdown = Shutdown::default();
        shutdown.trigger();
        shutdown.trigger();

        let mut late = shutdown.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_signal_task_can_be_cancelled() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();
        let task = shutdown.trigger_on_signal();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
