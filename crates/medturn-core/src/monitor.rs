//! Background long-wait monitor.
//!
//! Re-evaluates the waiting turns on a fixed tick and hands the alert list
//! to a callback. The first evaluation runs immediately on start.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::clock::Clock;
use crate::db::{Database, DbResult};
use crate::queue::{detect_long_waits, LongWaitAlert, WaitThresholds};

/// Default re-evaluation interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(30);

/// Receives the alert list after every evaluation.
pub type AlertCallback = Box<dyn Fn(Vec<LongWaitAlert>) + Send>;

/// Handle to a running monitor thread. Dropping it stops the thread.
pub struct LongWaitMonitor {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LongWaitMonitor {
    pub fn start(
        db: Arc<Mutex<Database>>,
        clock: Arc<dyn Clock>,
        thresholds: WaitThresholds,
        tick: Duration,
        on_alerts: AlertCallback,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("long-wait-monitor".into())
            .spawn(move || {
                tracing::debug!(tick_secs = tick.as_secs(), "long-wait monitor started");
                loop {
                    match evaluate(&db, clock.as_ref(), &thresholds) {
                        Ok(alerts) => {
                            if !alerts.is_empty() {
                                tracing::info!(count = alerts.len(), "long waits detected");
                            }
                            on_alerts(alerts);
                        }
                        Err(e) => tracing::warn!(error = %e, "long-wait evaluation failed"),
                    }

                    match stop_rx.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("long-wait monitor stopped");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit. Idempotent.
    ///
    /// Called from the alert callback itself, this only signals the thread;
    /// it exits once the callback returns.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                tracing::debug!("long-wait monitor stopped from its own callback");
                return;
            }
            if handle.join().is_err() {
                tracing::error!("long-wait monitor thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for LongWaitMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn evaluate(
    db: &Mutex<Database>,
    clock: &dyn Clock,
    thresholds: &WaitThresholds,
) -> DbResult<Vec<LongWaitAlert>> {
    let waiting = {
        let db = match db.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        db.list_waiting_turns()?
    };
    Ok(detect_long_waits(&waiting, clock.now(), thresholds))
}
