//! Coalescing background task
//!
//! Every `touch` restarts the quiet period; the action runs once the period
//! passes without another touch. There is at most one pending run and at
//! most one run in flight. `flush` runs a pending action immediately and
//! waits for it, `cancel` drops it.

use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

enum Signal {
    Touch,
    Flush(oneshot::Sender<()>),
    Cancel,
}

/// Handle to the debounce worker. The worker stops when every handle is dropped.
#[derive(Clone)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<Signal>,
}

impl Debouncer {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn<F, Fut>(quiet: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, quiet, action));
        Self { tx }
    }

    /// Schedule the action, restarting the quiet period
    pub fn touch(&self) {
        if self.tx.send(Signal::Touch).is_err() {
            tracing::warn!("Debounce worker has stopped");
        }
    }

    /// Run the pending action now (if any) and wait for it to finish
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Signal::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drop the pending action without running it
    pub fn cancel(&self) {
        let _ = self.tx.send(Signal::Cancel);
    }
}

async fn run<F, Fut>(mut rx: mpsc::UnboundedReceiver<Signal>, quiet: Duration, action: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut deadline: Option<Instant> = None;

    loop {
        let signal = match deadline {
            Some(at) => tokio::select! {
                signal = rx.recv() => signal,
                _ = sleep_until(at) => {
                    deadline = None;
                    action().await;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match signal {
            Some(Signal::Touch) => deadline = Some(Instant::now() + quiet),
            Some(Signal::Flush(done)) => {
                if deadline.take().is_some() {
                    action().await;
                }
                let _ = done.send(());
            }
            Some(Signal::Cancel) => deadline = None,
            None => break,
        }
    }

    tracing::debug!("Debounce worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(quiet: Duration) -> (Debouncer, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let debouncer = Debouncer::spawn(quiet, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debouncer, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_run() {
        let (debouncer, runs) = counting(Duration::from_secs(2));

        for _ in 0..5 {
            debouncer.touch();
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_flush_and_cancel() {
        let (debouncer, runs) = counting(Duration::from_secs(60));

        debouncer.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        debouncer.touch();
        debouncer.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        debouncer.touch();
        debouncer.cancel();
        debouncer.flush().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
