//! Continuous execution of a [`Machine`] on a worker thread.
//!
//! [`Computer`] wraps a machine so it can be run at a fixed pace
//! (one instruction per interval) while a presentation layer watches it.
//!
//! ```
//! use std::time::Duration;
//! use nic_ensemble::sim::{Machine, Status};
//! use nic_ensemble::sim::observer::Change;
//! use nic_ensemble::sim::runner::Computer;
//!
//! let mut machine = Machine::default();
//! machine.load_text("1f1f1f1f21050000f000").unwrap();
//!
//! let mut computer = Computer::new(machine);
//! computer.set_interval(Duration::from_millis(1));
//! let changes = computer.subscribe();
//!
//! computer.start();
//! // Wait for the run to start and end.
//! while changes.recv().unwrap() != Change::Running {}
//! while changes.recv().unwrap() != Change::Running {}
//!
//! assert!(!computer.is_running());
//! assert_eq!(computer.snapshot().status, Status::Halt);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as cbc;

use crate::asm::Executable;

use super::observer::Change;
use super::{Machine, MachineState, SimErr, Status};

/// A machine which can be run continuously in the background.
///
/// While the machine is running, manual steps are refused with [`SimErr::Running`].
/// Dropping the computer stops the run.
pub struct Computer {
    machine: Arc<Mutex<Machine>>,
    running: Arc<AtomicBool>,
    interval_us: Arc<AtomicU64>,
    worker: Option<(cbc::Sender<()>, JoinHandle<()>)>,
}
impl Computer {
    /// Wraps a machine.
    ///
    /// The run interval starts as the machine's [`SimFlags::interval`].
    ///
    /// [`SimFlags::interval`]: super::SimFlags::interval
    pub fn new(machine: Machine) -> Self {
        let interval_us = duration_to_us(machine.flags.interval);

        Self {
            machine: Arc::new(Mutex::new(machine)),
            running: Arc::new(AtomicBool::new(false)),
            interval_us: Arc::new(AtomicU64::new(interval_us)),
            worker: None,
        }
    }

    /// Starts running the machine, one instruction per interval.
    ///
    /// The run ends once the status is no longer [`Status::Ok`] or when [`Computer::stop`] is called.
    /// If the machine is already running, this does nothing.
    pub fn start(&mut self) {
        // The worker only ends a run while holding the machine lock,
        // so a cleared flag here means the last worker is done stepping.
        let mut machine = lock(&self.machine);
        if self.running.load(Ordering::Relaxed) {
            return;
        }
        if let Some((_, handle)) = self.worker.take() {
            let _ = handle.join();
        }
        self.running.store(true, Ordering::Relaxed);
        machine.observer.notify(Change::Running);
        drop(machine);
        tracing::debug!("starting computer");

        let (stop_tx, stop_rx) = cbc::bounded(1);
        let machine = Arc::clone(&self.machine);
        let running = Arc::clone(&self.running);
        let interval_us = Arc::clone(&self.interval_us);

        let handle = std::thread::spawn(move || loop {
            let interval = Duration::from_micros(interval_us.load(Ordering::Relaxed));
            match stop_rx.recv_timeout(interval) {
                Err(cbc::RecvTimeoutError::Timeout) => {},
                // Stop was requested or the computer was dropped:
                Ok(()) | Err(cbc::RecvTimeoutError::Disconnected) => break,
            }

            let mut machine = lock(&machine);
            if !running.load(Ordering::Relaxed) {
                break;
            }
            match machine.step_in() {
                Ok(Status::Ok) => continue,
                Ok(status) => tracing::debug!(%status, "computer stopped"),
                Err(e) => tracing::warn!("computer stopped: {e}"),
            }

            running.store(false, Ordering::Relaxed);
            machine.observer.notify(Change::Running);
            break;
        });

        self.worker = Some((stop_tx, handle));
    }

    /// Stops running the machine.
    ///
    /// This blocks until the worker has finished its current step.
    /// If the machine is not running, this does nothing.
    pub fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            // The worker may have already exited, in which case there is nobody to tell.
            let _ = stop_tx.try_send(());
            let _ = handle.join();

            let mut machine = lock(&self.machine);
            if self.running.swap(false, Ordering::Relaxed) {
                machine.observer.notify(Change::Running);
            }
            tracing::debug!("stopped computer");
        }
    }

    /// Starts the machine if it is stopped, and stops it if it is running.
    pub fn toggle(&mut self) {
        match self.is_running() {
            true  => self.stop(),
            false => self.start(),
        }
    }

    /// Whether the machine is currently being run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Sets the delay between instructions.
    ///
    /// A delay that is already being waited out is not cut short,
    /// so this applies from the instruction after the next one.
    /// The delay is kept to microsecond precision, and is at least 1 µs.
    pub fn set_interval(&self, interval: Duration) {
        self.interval_us.store(duration_to_us(interval), Ordering::Relaxed);
    }

    /// Gets the delay between instructions.
    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us.load(Ordering::Relaxed))
    }

    fn stopped_machine(&self) -> Result<MutexGuard<'_, Machine>, SimErr> {
        match self.is_running() {
            true  => Err(SimErr::Running),
            false => Ok(lock(&self.machine)),
        }
    }

    /// Performs the next phase (see [`Machine::step`]).
    pub fn step(&self) -> Result<Status, SimErr> {
        self.stopped_machine()?.step()
    }

    /// Completes one instruction (see [`Machine::step_in`]).
    pub fn step_in(&self) -> Result<Status, SimErr> {
        self.stopped_machine()?.step_in()
    }

    /// Resets the machine (see [`Machine::reset`]).
    pub fn reset(&self) -> Result<(), SimErr> {
        self.stopped_machine()?.reset();
        Ok(())
    }

    /// Loads an executable into the machine (see [`Machine::load`]).
    pub fn load(&self, exe: &Executable) -> Result<(), SimErr> {
        self.stopped_machine()?.load(exe);
        Ok(())
    }

    /// Copies the state of the machine.
    ///
    /// This is never taken in the middle of a step.
    pub fn snapshot(&self) -> MachineState {
        lock(&self.machine).snapshot()
    }

    /// Gives access to the machine.
    ///
    /// The worker is blocked while `f` runs, so any changes are seen as a whole.
    pub fn with_machine<R>(&self, f: impl FnOnce(&mut Machine) -> R) -> R {
        f(&mut lock(&self.machine))
    }

    /// Creates a receiver which gets every change to the machine from now on.
    pub fn subscribe(&self) -> cbc::Receiver<Change> {
        lock(&self.machine).observer.subscribe()
    }
}
impl Drop for Computer {
    fn drop(&mut self) {
        self.stop();
    }
}
impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computer")
            .field("running", &self.is_running())
            .field("interval", &self.interval())
            .finish_non_exhaustive()
    }
}

fn lock(machine: &Mutex<Machine>) -> MutexGuard<'_, Machine> {
    // A panic mid-step leaves the machine in a valid (if partial) state.
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

fn duration_to_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX).max(1)
}
