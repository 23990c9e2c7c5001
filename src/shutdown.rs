// Process-wide stop signal. Every task holds a `Shutdown` and checks it at its
// own suspension points; dropping the `ShutdownTrigger` counts as a trigger.

use std::time::Duration;

use tokio::sync::watch;

pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

#[derive(Clone)]
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
        Shutdown { rx: self.tx.subscribe() }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the trigger fires (or is dropped).
    pub async fn wait(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep for `period` unless shutdown comes first. Returns false if interrupted.
    pub async fn sleep(&mut self, period: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(period) => true,
            _ = self.wait() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let (trigger, shutdown) = channel();
        let mut a = shutdown.clone();
        let mut b = trigger.subscribe();
        assert!(!a.is_triggered());

        trigger.trigger();
        a.wait().await;
        b.wait().await;
        assert!(a.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted() {
        let (trigger, mut shutdown) = channel();
        let handle = tokio::spawn(async move { shutdown.sleep(Duration::from_secs(60)).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.trigger();
        assert!(!handle.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let (_trigger, mut shutdown) = channel();
        assert!(shutdown.sleep(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_dropped_trigger_counts() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        shutdown.wait().await;
    }
}
