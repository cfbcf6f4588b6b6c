//! Cooperative stop signalling for in-flight rollouts

use tokio::sync::watch;

/// Raises the stop signal of one in-flight operation
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observed by strategies at their checkpoints
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl StopSignal {
    /// A linked handle/signal pair
    pub fn channel() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (StopHandle { tx }, StopSignal { rx: Some(rx) })
    }

    /// A signal that is never raised
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_raised(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once the signal is raised; pends forever otherwise
    pub async fn raised(&self) {
        if let Some(rx) = &self.rx {
            let mut rx = rx.clone();
            if rx.wait_for(|raised| *raised).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}
