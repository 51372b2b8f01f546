//! Background flow keeper.
//!
//! Spawns a resource thread that re-runs `check_flow` on a fixed period while
//! a long gas operation holds the path open, and publishes the latest result
//! over a bounded channel.
//!
//! Each `FlowKeeper` owns exactly one thread, shut down and joined on drop.
use crossbeam_channel as xch;
use gasflow_traits::HardwarePort;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::regulator::FlowRegulator;
use crate::types::FlowCheck;

/// Longest uninterrupted sleep, so drop never waits a whole period.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub struct FlowKeeper {
    rx: xch::Receiver<FlowCheck>,
    checks_run: Arc<AtomicU64>,
    /// Shutdown flag, checked between checks and between sleep slices
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl FlowKeeper {
    /// Run `check_flow(Some(check_timeout))` every `period` until dropped.
    pub fn spawn<P: HardwarePort + Send + 'static>(
        regulator: FlowRegulator<P>,
        period: Duration,
        check_timeout: Duration,
    ) -> Self {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let checks_run = Arc::new(AtomicU64::new(0));
        let checks_run_clone = checks_run.clone();

        let join_handle = std::thread::spawn(move || {
            let clock = regulator.path().clock();
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("flow keeper received shutdown signal");
                    break;
                }

                let check = regulator.check_flow(Some(check_timeout));
                checks_run_clone.fetch_add(1, Ordering::Relaxed);
                match tx.try_send(check) {
                    Ok(()) | Err(xch::TrySendError::Full(_)) => {}
                    Err(xch::TrySendError::Disconnected(_)) => {
                        tracing::debug!("flow keeper consumer disconnected, exiting thread");
                        break;
                    }
                }
                if check.status.is_terminal() {
                    tracing::warn!(status = %check.status, "flow keeper stopping on terminal status");
                    break;
                }

                let mut remaining = period;
                while !remaining.is_zero() && !shutdown_clone.load(Ordering::Relaxed) {
                    let slice = remaining.min(SLEEP_SLICE);
                    clock.sleep(slice);
                    remaining -= slice;
                }
            }
            tracing::trace!("flow keeper thread exiting cleanly");
        });

        Self {
            rx,
            checks_run,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Most recent published check, if any arrived since the last call.
    pub fn latest(&self) -> Option<FlowCheck> {
        self.rx.try_iter().last()
    }

    pub fn checks_run(&self) -> u64 {
        self.checks_run.load(Ordering::Relaxed)
    }

    /// True once the thread stopped on its own (terminal status).
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }
}

impl Drop for FlowKeeper {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits after its current check (bounded by the check
        // timeout) or current sleep.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("flow keeper thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "flow keeper thread panicked during shutdown");
                }
            }
        }
    }
}
