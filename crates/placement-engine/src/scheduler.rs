//! Paced loops
//!
//! A paced loop sleeps one period, then runs its action, until the shared
//! shutdown signal fires. Cancellation is observed both before and after the
//! sleep, so a loop never acts once shutdown was requested.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use placement_core::{PlacementError, PlacementResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cooperative shutdown signal shared by all engine tasks
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Period of a loop running at `hz`
pub fn period(hz: u32) -> PlacementResult<Duration> {
    if hz == 0 {
        return Err(PlacementError::InvalidFrequency(hz));
    }
    Ok(Duration::from_secs_f64(1.0 / f64::from(hz)))
}

/// Run `action` every `1 / hz` seconds until `shutdown` becomes true.
///
/// Returns the number of completed iterations. A dropped shutdown sender
/// counts as cancellation.
pub async fn run_at_frequency<F, Fut>(
    hz: u32,
    mut shutdown: watch::Receiver<bool>,
    mut action: F,
) -> PlacementResult<u64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let period = period(hz)?;
    let mut iterations = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        action().await;
        iterations += 1;
    }

    Ok(iterations)
}

/// Spawn a named paced loop on the current runtime
pub fn spawn_paced<F, Fut>(
    name: &'static str,
    hz: u32,
    shutdown: watch::Receiver<bool>,
    action: F,
) -> JoinHandle<PlacementResult<u64>>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tracing::debug!("Starting {} loop at {} Hz", name, hz);
        let result = run_at_frequency(hz, shutdown, action).await;
        match &result {
            Ok(iterations) => {
                tracing::debug!("{} loop stopped after {} iterations", name, iterations)
            }
            Err(e) => tracing::error!("{} loop failed to start: {}", name, e),
        }
        result
    })
}
