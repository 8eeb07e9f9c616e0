//! The system-call surface seen by process bodies.

use crate::error::KernelError;
use crate::kernel::{KernelShared, KernelState};
use crate::message::KernelMessage;
use crate::process::{Pid, Priority};
use kernel_devices::Device;
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::{Gate, KernelGuard};
use kernel_vmem::{validate_allocation, validate_free};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// Code run as a process.
pub trait ProcessBody: Send {
    /// Name used for [`Os::pid_by_name`]; the type name by default.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// The process body. The process terminates when this returns.
    fn run(&mut self, os: &Os);

    /// Read one byte of this process's memory.
    ///
    /// # Errors
    /// As [`Os::read_byte`].
    fn read(&mut self, os: &Os, address: VirtualAddress) -> Result<u8, KernelError> {
        os.read_byte(address)
    }

    /// Write one byte of this process's memory.
    ///
    /// # Errors
    /// As [`Os::write_byte`].
    fn write(&mut self, os: &Os, address: VirtualAddress, value: u8) -> Result<(), KernelError> {
        os.write_byte(address, value)
    }
}

/// A named process body from a closure.
///
/// ```no_run
/// use kernel::{Kernel, KernelConfig, from_fn};
///
/// let kernel = Kernel::boot(KernelConfig::new());
/// kernel.spawn(from_fn("napper", |os| os.sleep(10))).unwrap();
/// ```
pub fn from_fn<F>(name: impl Into<String>, f: F) -> FnBody<F>
where
    F: FnMut(&Os) + Send,
{
    FnBody {
        name: name.into(),
        f,
    }
}

pub struct FnBody<F> {
    name: String,
    f: F,
}

impl<F> ProcessBody for FnBody<F>
where
    F: FnMut(&Os) + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, os: &Os) {
        (self.f)(os);
    }
}

/// Handle through which one process talks to the kernel.
///
/// Every call first waits until the process holds the CPU.
pub struct Os {
    pid: Pid,
    shared: Arc<KernelShared>,
    gate: Arc<Gate>,
}

impl Os {
    pub(crate) const fn new(pid: Pid, shared: Arc<KernelShared>, gate: Arc<Gate>) -> Self {
        Self { pid, shared, gate }
    }

    pub(crate) fn shared(&self) -> &KernelShared {
        &self.shared
    }

    /// Take the kernel lock once this process is the running one.
    pub(crate) fn enter(&self) -> KernelGuard<'_, KernelState> {
        let guard = self.shared.lock();
        self.shared.wait_for_cpu(&self.gate, self.pid, guard)
    }

    /// Give up the lock and wait until the scheduler picks this process again.
    fn resume(&self, guard: KernelGuard<'_, KernelState>) {
        drop(self.shared.wait_for_cpu(&self.gate, self.pid, guard));
    }

    #[inline]
    #[must_use]
    pub const fn pid(&self) -> Pid {
        self.pid
    }

    /// Create a process at [`Priority::Interactive`].
    ///
    /// # Errors
    /// [`KernelError::Spawn`] if the host refuses another thread.
    pub fn create_process(&self, body: impl ProcessBody + 'static) -> Result<Pid, KernelError> {
        self.create_process_with_priority(body, Priority::default())
    }

    /// # Errors
    /// [`KernelError::Spawn`] if the host refuses another thread.
    pub fn create_process_with_priority(
        &self,
        body: impl ProcessBody + 'static,
        priority: Priority,
    ) -> Result<Pid, KernelError> {
        let mut state = self.enter();
        self.shared.spawn(&mut state, Box::new(body), priority)
    }

    /// Sleep for at least `milliseconds`.
    pub fn sleep(&self, milliseconds: u64) {
        let mut guard = self.enter();
        let state = &mut *guard;
        let outcome = state
            .scheduler
            .sleep_current(self.shared.now(), Duration::from_millis(milliseconds));
        self.shared.settle(state, &outcome);
        self.resume(guard);
    }

    /// Give up the CPU for one dispatch.
    pub fn yield_now(&self) {
        let mut guard = self.enter();
        self.shared.dispatch(&mut guard);
        self.resume(guard);
    }

    #[must_use]
    pub fn pid_by_name(&self, name: &str) -> Option<Pid> {
        self.enter().scheduler.pid_by_name(name)
    }

    /// Open `"<driver> <argument>"`, returning a process-local handle.
    ///
    /// `None` if this process has no free handle or the device layer refuses.
    #[must_use]
    pub fn open(&self, spec: &str) -> Option<usize> {
        let mut guard = self.enter();
        let state = &mut *guard;
        let desc = state.scheduler.process_mut(self.pid)?;
        if !desc.handles.has_free() {
            warn!("{} has no free device handle", self.pid);
            return None;
        }
        let slot = state.devices.open(spec)?;
        let handle = desc.handles.insert(slot);
        debug!("{} opened {spec:?} as handle {handle:?}", self.pid);
        handle
    }

    /// Close `handle`. Unbound handles are ignored.
    pub fn close(&self, handle: usize) {
        let mut guard = self.enter();
        let state = &mut *guard;
        if let Some(slot) = state
            .scheduler
            .process_mut(self.pid)
            .and_then(|d| d.handles.remove(handle))
        {
            state.devices.close(slot);
        }
    }

    /// Read up to `size` bytes. `Ok(None)` at end of stream; an unbound
    /// handle reads as empty.
    ///
    /// # Errors
    /// [`KernelError::Device`] if the device fails.
    pub fn read(&self, handle: usize, size: usize) -> Result<Option<Vec<u8>>, KernelError> {
        let mut state = self.enter();
        match self.slot(&state, handle) {
            Some(slot) => Ok(state.devices.read(slot, size)?),
            None => Ok(Some(Vec::new())),
        }
    }

    /// # Errors
    /// [`KernelError::Device`] if the device fails.
    pub fn seek(&self, handle: usize, offset: u64) -> Result<(), KernelError> {
        let mut state = self.enter();
        if let Some(slot) = self.slot(&state, handle) {
            state.devices.seek(slot, offset)?;
        }
        Ok(())
    }

    /// Returns the number of bytes written; 0 for an unbound handle.
    ///
    /// # Errors
    /// [`KernelError::Device`] if the device fails.
    pub fn write(&self, handle: usize, data: &[u8]) -> Result<usize, KernelError> {
        let mut state = self.enter();
        match self.slot(&state, handle) {
            Some(slot) => Ok(state.devices.write(slot, data)?),
            None => Ok(0),
        }
    }

    fn slot(&self, state: &KernelState, handle: usize) -> Option<usize> {
        state.scheduler.process(self.pid)?.handles.get(handle)
    }

    /// Send a copy of `message` to its target.
    ///
    /// If the target was waiting for a message, the scheduler runs and this
    /// process may be suspended until picked again.
    ///
    /// # Errors
    /// [`KernelError::NoSuchProcess`] if the target does not exist.
    pub fn send_message(&self, message: &KernelMessage) -> Result<(), KernelError> {
        let mut guard = self.enter();
        let woke = guard
            .scheduler
            .deliver(message)
            .map_err(KernelError::NoSuchProcess)?;
        if woke {
            self.shared.dispatch(&mut guard);
            self.resume(guard);
        }
        Ok(())
    }

    /// Pop the oldest message, or block until one may be available.
    ///
    /// Returns `None` after blocking; call again to collect the message.
    #[must_use]
    pub fn wait_for_message(&self) -> Option<KernelMessage> {
        let mut guard = self.enter();
        if let Some(message) = guard.scheduler.take_message(self.pid) {
            return Some(message);
        }
        let state = &mut *guard;
        let outcome = state.scheduler.wait_current(self.shared.now());
        self.shared.settle(state, &outcome);
        self.resume(guard);
        None
    }

    /// Block until a message arrives and return it.
    #[must_use]
    pub fn receive_message(&self) -> KernelMessage {
        loop {
            if let Some(message) = self.wait_for_message() {
                return message;
            }
        }
    }

    /// Allocate `size` bytes (a positive multiple of the page size), mapped
    /// from virtual address 0.
    ///
    /// # Errors
    /// [`MemoryError::Unaligned`](kernel_vmem::MemoryError::Unaligned) for a
    /// bad size, [`MemoryError::OutOfMemory`](kernel_vmem::MemoryError::OutOfMemory)
    /// if no contiguous run is free.
    pub fn allocate_memory(&self, size: u32) -> Result<VirtualAddress, KernelError> {
        validate_allocation(size)?;
        let mut guard = self.enter();
        let state = &mut *guard;
        let desc = state
            .scheduler
            .process_mut(self.pid)
            .ok_or(KernelError::NoSuchProcess(self.pid))?;
        Ok(state.memory.allocate(&mut desc.space, size)?)
    }

    /// Release `size` bytes starting at `pointer`.
    ///
    /// # Errors
    /// [`MemoryError::Unaligned`](kernel_vmem::MemoryError::Unaligned) if
    /// either argument is not a multiple of the page size.
    pub fn free_memory(&self, pointer: VirtualAddress, size: u32) -> Result<(), KernelError> {
        validate_free(pointer, size)?;
        let mut guard = self.enter();
        let state = &mut *guard;
        let desc = state
            .scheduler
            .process_mut(self.pid)
            .ok_or(KernelError::NoSuchProcess(self.pid))?;
        state.memory.free(&mut desc.space, pointer, size);
        Ok(())
    }

    /// Read one byte through this process's translation cache.
    ///
    /// # Errors
    /// [`MemoryError::Unmapped`](kernel_vmem::MemoryError::Unmapped) when the
    /// page has no mapping.
    pub fn read_byte(&self, address: VirtualAddress) -> Result<u8, KernelError> {
        let mut guard = self.enter();
        let state = &mut *guard;
        let desc = state
            .scheduler
            .process_mut(self.pid)
            .ok_or(KernelError::NoSuchProcess(self.pid))?;
        Ok(state.memory.read_byte(&mut desc.space, address)?)
    }

    /// # Errors
    /// As [`read_byte`](Self::read_byte).
    pub fn write_byte(&self, address: VirtualAddress, value: u8) -> Result<(), KernelError> {
        let mut guard = self.enter();
        let state = &mut *guard;
        let desc = state
            .scheduler
            .process_mut(self.pid)
            .ok_or(KernelError::NoSuchProcess(self.pid))?;
        Ok(state.memory.write_byte(&mut desc.space, address, value)?)
    }
}
