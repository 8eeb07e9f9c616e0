//! # Kernel
//!
//! Glues the [`Scheduler`], the [`MemoryManager`] and the [`DeviceTable`]
//! together behind one [`KernelLock`], and runs process bodies on host
//! threads.
//!
//! ## Execution model
//!
//! - Every process body gets its own thread and its own [`Gate`].
//! - A body may only enter the kernel while it is the scheduler's current
//!   process; every [`Os`] call first parks on the gate until that holds.
//! - After each dispatch the gate of the newly current process is opened.
//! - The timer thread dispatches once per quantum. A body that was preempted
//!   notices at its next kernel call.
//! - When a body returns or unwinds, its [`ExitGuard`] marks it done. The
//!   kernel then closes its handles and drops its address space.

use crate::config::KernelConfig;
use crate::error::KernelError;
use crate::os::{Os, ProcessBody};
use crate::process::{Pid, Priority, ProcessDescriptor, ProcessState};
use crate::scheduler::{DispatchOutcome, Scheduler, SchedulerStats};
use kernel_devices::{Device, DeviceTable};
use kernel_sync::{Gate, KernelGuard, KernelLock};
use kernel_vmem::{MemoryManager, PageBitmap};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub(crate) struct KernelState {
    pub scheduler: Scheduler,
    pub memory: MemoryManager,
    pub devices: DeviceTable,
    gates: HashMap<Pid, Arc<Gate>>,
    shutdown: bool,
}

pub(crate) struct KernelShared {
    state: KernelLock<KernelState>,
    /// Parks the timer thread between ticks.
    timer_gate: Gate,
    /// Opened whenever a process terminates.
    exit_gate: Gate,
    boot: Instant,
    config: KernelConfig,
}

impl KernelShared {
    pub fn lock(&self) -> KernelGuard<'_, KernelState> {
        self.state.lock()
    }

    /// Time since boot; the scheduler's clock.
    pub fn now(&self) -> Duration {
        self.boot.elapsed()
    }

    /// Park on `gate` until `pid` is the running process.
    pub fn wait_for_cpu<'a>(
        &'a self,
        gate: &Gate,
        pid: Pid,
        guard: KernelGuard<'a, KernelState>,
    ) -> KernelGuard<'a, KernelState> {
        gate.wait_while(guard, |s| s.scheduler.current() != Some(pid))
    }

    pub fn dispatch(&self, state: &mut KernelState) -> DispatchOutcome {
        let outcome = state.scheduler.dispatch(self.now());
        self.settle(state, &outcome);
        outcome
    }

    /// Act on a dispatch: release whatever was reaped, wake the new current
    /// process.
    pub fn settle(&self, state: &mut KernelState, outcome: &DispatchOutcome) {
        for desc in state.scheduler.take_reaped() {
            self.release(state, desc);
        }
        if let Some(pid) = outcome.resumed
            && let Some(gate) = state.gates.get(&pid)
        {
            gate.open();
        }
    }

    fn release(&self, state: &mut KernelState, mut desc: ProcessDescriptor) {
        for slot in desc.handles.drain() {
            state.devices.close(slot);
        }
        state
            .memory
            .release(&mut desc.space, self.config.release_pages_on_exit());
        state.gates.remove(&desc.pid);
        debug!("released resources of {}", desc.pid);
        self.exit_gate.open();
    }

    /// Admit `body` and start its thread.
    pub fn spawn(
        self: &Arc<Self>,
        state: &mut KernelState,
        body: Box<dyn ProcessBody>,
        priority: Priority,
    ) -> Result<Pid, KernelError> {
        let gate = Arc::new(Gate::new());
        let name = body.name().to_owned();
        let pid = state.scheduler.admit(&name, priority);
        state.gates.insert(pid, Arc::clone(&gate));

        let os = Os::new(pid, Arc::clone(self), gate);
        let spawned = thread::Builder::new()
            .name(format!("{name}-{}", pid.as_u32()))
            .spawn(move || run_body(&os, body));

        if let Err(err) = spawned {
            warn!("could not start a thread for {name}: {err}");
            state.scheduler.mark_done(pid);
            let outcome = DispatchOutcome::default();
            self.settle(state, &outcome);
            return Err(KernelError::Spawn(pid, err));
        }

        state.scheduler.start(pid);
        if state.scheduler.is_idle() {
            self.dispatch(state);
        }
        Ok(pid)
    }
}

fn run_body(os: &Os, mut body: Box<dyn ProcessBody>) {
    let _exit = ExitGuard { os };
    drop(os.enter());
    body.run(os);
}

/// Marks the process done when its body returns or unwinds.
struct ExitGuard<'a> {
    os: &'a Os,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let shared = self.os.shared();
        let mut state = shared.lock();
        if state.scheduler.mark_done(self.os.pid()) {
            shared.dispatch(&mut state);
        } else {
            let outcome = DispatchOutcome::default();
            shared.settle(&mut state, &outcome);
        }
    }
}

/// The booted kernel.
///
/// Dropping it stops the timer. Process threads still blocked in a kernel
/// call at that point stay parked.
pub struct Kernel {
    shared: Arc<KernelShared>,
    timer: Option<JoinHandle<()>>,
}

impl Kernel {
    /// Boot with the default `file` and `random` device drivers.
    #[must_use]
    pub fn boot(config: KernelConfig) -> Self {
        Self::boot_with_devices(config, DeviceTable::with_default_drivers())
    }

    #[must_use]
    pub fn boot_with_devices(config: KernelConfig, devices: DeviceTable) -> Self {
        let mut seeds = config
            .seed()
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let scheduler = Scheduler::new(
            config.demotion_threshold(),
            StdRng::seed_from_u64(seeds.r#gen()),
        );
        let memory = MemoryManager::new(
            config.tlb_miss_policy(),
            StdRng::seed_from_u64(seeds.r#gen()),
        );

        let shared = Arc::new(KernelShared {
            state: KernelLock::new(KernelState {
                scheduler,
                memory,
                devices,
                gates: HashMap::new(),
                shutdown: false,
            }),
            timer_gate: Gate::new(),
            exit_gate: Gate::new(),
            boot: Instant::now(),
            config,
        });

        let timer = config.timer_enabled().then(|| {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("timer".into())
                .spawn(move || timer_loop(&shared))
        });
        let timer = match timer.transpose() {
            Ok(handle) => handle,
            Err(err) => {
                warn!("timer thread failed to start, running without preemption: {err}");
                None
            }
        };

        info!(
            "kernel booted (quantum {:?}, {:?} TLB misses)",
            config.quantum(),
            config.tlb_miss_policy()
        );
        Self { shared, timer }
    }

    /// Create a process at [`Priority::Interactive`].
    ///
    /// # Errors
    /// [`KernelError::Spawn`] if the host refuses another thread.
    pub fn spawn(&self, body: impl ProcessBody + 'static) -> Result<Pid, KernelError> {
        let mut state = self.shared.lock();
        self.shared
            .spawn(&mut state, Box::new(body), Priority::default())
    }

    /// # Errors
    /// [`KernelError::Spawn`] if the host refuses another thread.
    pub fn spawn_with_priority(
        &self,
        body: impl ProcessBody + 'static,
        priority: Priority,
    ) -> Result<Pid, KernelError> {
        let mut state = self.shared.lock();
        self.shared.spawn(&mut state, Box::new(body), priority)
    }

    /// Run one dispatch now, as the timer would.
    pub fn dispatch(&self) -> DispatchOutcome {
        let mut state = self.shared.lock();
        self.shared.dispatch(&mut state)
    }

    #[must_use]
    pub fn config(&self) -> KernelConfig {
        self.shared.config
    }

    #[must_use]
    pub fn current(&self) -> Option<Pid> {
        self.shared.lock().scheduler.current()
    }

    #[must_use]
    pub fn process_state(&self, pid: Pid) -> Option<ProcessState> {
        self.shared.lock().scheduler.process_state(pid)
    }

    #[must_use]
    pub fn priority_of(&self, pid: Pid) -> Option<Priority> {
        self.shared.lock().scheduler.priority_of(pid)
    }

    #[must_use]
    pub fn pid_by_name(&self, name: &str) -> Option<Pid> {
        self.shared.lock().scheduler.pid_by_name(name)
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().scheduler.stats()
    }

    #[must_use]
    pub fn live_processes(&self) -> usize {
        self.shared.lock().scheduler.live()
    }

    #[must_use]
    pub fn allocated_pages(&self) -> usize {
        self.shared.lock().memory.allocated_pages()
    }

    #[must_use]
    pub fn bitmap(&self) -> PageBitmap {
        self.shared.lock().memory.bitmap()
    }

    #[must_use]
    pub fn open_devices(&self) -> usize {
        self.shared.lock().devices.open_count()
    }

    /// Block until `pid` has terminated. `false` on timeout.
    #[must_use]
    pub fn wait_for_exit(&self, pid: Pid, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, timed_out) = self.shared.exit_gate.wait_timeout_while(state, timeout, |s| {
            s.scheduler.process_state(pid) != Some(ProcessState::Terminated)
        });
        drop(state);
        !timed_out
    }

    /// Block until every process has terminated. `false` on timeout.
    #[must_use]
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let state = self.shared.lock();
        let (state, timed_out) = self
            .shared
            .exit_gate
            .wait_timeout_while(state, timeout, |s| s.scheduler.live() > 0);
        drop(state);
        !timed_out
    }

    /// Stop the timer thread. Idempotent.
    pub fn shutdown(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.timer_gate.open();
        if let Some(timer) = self.timer.take()
            && timer.join().is_err()
        {
            warn!("timer thread panicked");
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timer_loop(shared: &KernelShared) {
    let quantum = shared.config.quantum();
    let mut state = shared.lock();
    loop {
        let (guard, _) = shared
            .timer_gate
            .wait_timeout_while(state, quantum, |s| !s.shutdown);
        state = guard;
        if state.shutdown {
            break;
        }
        shared.dispatch(&mut state);
    }
    debug!("timer stopped");
}
