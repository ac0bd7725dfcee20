use tokio::sync::watch;

/// Sender half of the process-wide cancellation flag.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cancellation flag checked by the scheduler and every per-city task.
///
/// Level triggered: a receiver created after `trigger()` still observes it.
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
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested. Never resolves if the trigger is dropped untouched.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let sender_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if sender_dropped {
            futures::future::pending::<()>().await;
        }
    }
}
