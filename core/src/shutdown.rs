use tokio::sync::watch;
use tracing::{error, info};

/// Trips the shutdown signal. Dropping it without triggering leaves receivers waiting forever.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observes whether an orderly stop has been requested.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested.
    pub async fn triggered(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Spawns a task that trips the returned signal on Ctrl-C or SIGTERM.
pub fn on_os_signal() -> Shutdown {
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                eprintln!("\nReceived interrupt signal, shutting down gracefully...");
                info!("Shutdown signal received");
                trigger.trigger();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    shutdown
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
