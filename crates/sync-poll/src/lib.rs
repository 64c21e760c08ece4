//! Fixed-interval refresh loop with per-tick cancellation.
//!
//! Every tick supersedes the previous in-flight fetch. A result is applied only
//! while the poller is active and its tick is still the newest one, and the
//! check and the apply happen under one lock, so nothing lands after `stop()`.

use parking_lot::Mutex;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::{AbortHandle, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use corsa_sync_core::FetchError;

struct Gate {
    active: bool,
    generation: u64,
    inflight: Option<AbortHandle>,
}

pub struct PollHandle {
    gate: Arc<Mutex<Gate>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

/// Fetches immediately, then every `interval`, handing each fresh result to `apply`.
/// Must be called inside a tokio runtime.
pub fn spawn_poller<T, F, Fut, A>(interval: Duration, fetch: F, apply: A) -> PollHandle
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    A: Fn(T) + Send + Sync + 'static,
{
    let gate = Arc::new(Mutex::new(Gate { active: true, generation: 0, inflight: None }));
    let apply = Arc::new(apply);
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let loop_gate = gate.clone();
    let task = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !start_tick(&loop_gate, &fetch, &apply) {
                        break;
                    }
                }
                _ = stop_rx.changed() => break,
            }
        }
        debug!("poll loop exited");
    });

    info!(interval_ms = interval.as_millis() as u64, "poller started");
    PollHandle { gate, stop_tx, task: Some(task) }
}

fn start_tick<T, F, Fut, A>(gate: &Arc<Mutex<Gate>>, fetch: &F, apply: &Arc<A>) -> bool
where
    T: Send + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    A: Fn(T) + Send + Sync + 'static,
{
    let mut g = gate.lock();
    if !g.active {
        return false;
    }
    if let Some(prev) = g.inflight.take() {
        if !prev.is_finished() {
            prev.abort();
            debug!(tick = g.generation, "superseded in-flight poll");
        }
    }
    g.generation += 1;
    let tick = g.generation;

    let fut = fetch();
    let gate = gate.clone();
    let apply = apply.clone();
    let handle = tokio::spawn(async move {
        match fut.await {
            Ok(value) => {
                let g = gate.lock();
                if g.active && g.generation == tick {
                    apply(value);
                } else {
                    debug!(tick, "dropping stale poll result");
                }
            }
            Err(e) => warn!(tick, error = %e, "poll fetch failed, keeping previous state"),
        }
    });
    g.inflight = Some(handle.abort_handle());
    true
}

impl PollHandle {
    /// Stops the loop and aborts the in-flight fetch. `apply` is not called after this returns.
    pub fn stop(&self) {
        let mut g = self.gate.lock();
        if !g.active {
            return;
        }
        g.active = false;
        if let Some(h) = g.inflight.take() {
            h.abort();
        }
        drop(g);
        let _ = self.stop_tx.send(true);
        info!("poller stopped");
    }

    pub fn is_active(&self) -> bool {
        self.gate.lock().active
    }

    /// Number of ticks started so far.
    pub fn generation(&self) -> u64 {
        self.gate.lock().generation
    }

    /// Stops and waits for the loop task to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
