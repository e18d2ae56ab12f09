use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use meterline_core::error::{MeterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted,
    Running,
    Cancelled,
}

type Job = Box<dyn FnMut() + Send + 'static>;

struct Control {
    state: TaskState,
    /// An execution is in flight.
    busy: bool,
}

struct Shared {
    name: String,
    control: Mutex<Control>,
    changed: Condvar,
    executions: AtomicU64,
}

impl Shared {
    // The lock only guards plain flags, so a poisoned guard is still usable.
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Recurring job on a dedicated thread.
///
/// Executions never overlap. The cadence is fixed-rate: when an execution
/// overruns one or more slots those slots are skipped, not queued.
pub struct ScheduledTask {
    shared: Arc<Shared>,
    interval: Duration,
    initial_delay: Duration,
    job: Mutex<Option<Job>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        initial_delay: Duration,
        job: impl FnMut() + Send + 'static,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(MeterError::Config("schedule interval must be > 0".into()));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                name: name.into(),
                control: Mutex::new(Control {
                    state: TaskState::NotStarted,
                    busy: false,
                }),
                changed: Condvar::new(),
                executions: AtomicU64::new(0),
            }),
            interval,
            initial_delay,
            job: Mutex::new(Some(Box::new(job))),
            worker: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> TaskState {
        self.shared.lock().state
    }

    /// Completed executions, including ones that panicked.
    pub fn execution_count(&self) -> u64 {
        self.shared.executions.load(Ordering::Acquire)
    }

    /// Spawn the worker thread. Valid only once, from `NotStarted`.
    pub fn start(&self) -> Result<()> {
        {
            let mut control = self.shared.lock();
            if control.state != TaskState::NotStarted {
                return Err(MeterError::InvalidState("scheduled task already started"));
            }
            control.state = TaskState::Running;
        }

        let job = self
            .job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(MeterError::InvalidState("scheduled task has no job"))?;

        let shared = Arc::clone(&self.shared);
        let (interval, initial_delay) = (self.interval, self.initial_delay);
        let spawned = thread::Builder::new()
            .name(self.shared.name.clone())
            .spawn(move || run_loop(&shared, job, interval, initial_delay));

        match spawned {
            Ok(handle) => {
                *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                tracing::debug!(task = %self.shared.name, ?interval, "scheduled task started");
                Ok(())
            }
            Err(e) => {
                self.shared.lock().state = TaskState::Cancelled;
                Err(MeterError::Io(e))
            }
        }
    }

    /// Stop future executions. An in-flight execution always runs to the end;
    /// with `wait` the caller blocks until it has.
    pub fn cancel(&self, wait: bool) {
        {
            let mut control = self.shared.lock();
            if control.state == TaskState::Cancelled {
                drop(control);
                if wait {
                    self.wait_idle_forever();
                }
                return;
            }
            control.state = TaskState::Cancelled;
            self.shared.changed.notify_all();
        }
        tracing::debug!(task = %self.shared.name, wait, "scheduled task cancelled");

        if wait {
            self.wait_idle_forever();
            self.join_worker();
        }
    }

    /// Block until no execution is in flight or `timeout` elapses.
    /// Returns `true` when idle.
    pub fn wait_if_running(&self, timeout: Duration) -> bool {
        if self.on_worker_thread() {
            // the caller is the execution itself
            return false;
        }
        let control = self.shared.lock();
        let (control, _) = self
            .shared
            .changed
            .wait_timeout_while(control, timeout, |c| c.busy)
            .unwrap_or_else(PoisonError::into_inner);
        !control.busy
    }

    fn wait_idle_forever(&self) {
        if self.on_worker_thread() {
            return;
        }
        let control = self.shared.lock();
        let _idle = self
            .shared
            .changed
            .wait_while(control, |c| c.busy)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn join_worker(&self) {
        if self.on_worker_thread() {
            return;
        }
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(task = %self.shared.name, "scheduled task thread panicked");
            }
        }
    }

    fn worker_id(&self) -> Option<ThreadId> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.thread().id())
    }

    fn on_worker_thread(&self) -> bool {
        self.worker_id() == Some(thread::current().id())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel(false);
    }
}

fn run_loop(shared: &Shared, mut job: Job, interval: Duration, initial_delay: Duration) {
    let mut next = Instant::now() + initial_delay;
    loop {
        {
            let mut control = shared.lock();
            loop {
                if control.state == TaskState::Cancelled {
                    return;
                }
                let now = Instant::now();
                if now >= next {
                    break;
                }
                control = shared
                    .changed
                    .wait_timeout(control, next - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            control.busy = true;
        }

        if catch_unwind(AssertUnwindSafe(|| job())).is_err() {
            tracing::error!(task = %shared.name, "scheduled task panicked; next firing unaffected");
        }
        shared.executions.fetch_add(1, Ordering::AcqRel);

        {
            let mut control = shared.lock();
            control.busy = false;
            shared.changed.notify_all();
        }

        next = next_slot(next, interval, Instant::now());
    }
}

/// First slot after `now` on the grid `prev + k * interval`.
fn next_slot(prev: Instant, interval: Duration, now: Instant) -> Instant {
    let next = prev + interval;
    if next > now {
        return next;
    }
    let behind = now.duration_since(next).as_nanos();
    let skipped = behind / interval.as_nanos() + 1;
    tracing::debug!(skipped = skipped as u64, "scheduled task overran; skipping slots");
    next + interval.saturating_mul(u32::try_from(skipped).unwrap_or(u32::MAX))
}
