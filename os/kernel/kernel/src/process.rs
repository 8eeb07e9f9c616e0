//! Process descriptors and the types that describe them.

use crate::message::KernelMessage;
use kernel_vmem::AddressSpace;
use std::collections::VecDeque;
use std::fmt;

/// Number of device handles a single process can hold.
pub const MAX_HANDLES: usize = 10;

/// Process identifier. Assigned in increasing order and never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pid(u32);

impl Pid {
    #[inline]
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Scheduling class. Each class has its own ready queue.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Priority {
    Realtime,
    #[default]
    Interactive,
    Background,
}

impl Priority {
    /// Queue order used when the selection lands on an empty queue.
    pub const ALL: [Self; 3] = [Self::Realtime, Self::Interactive, Self::Background];

    /// One level down; `Background` stays `Background`.
    #[must_use]
    pub const fn demoted(self) -> Self {
        match self {
            Self::Realtime => Self::Interactive,
            Self::Interactive | Self::Background => Self::Background,
        }
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Realtime => 0,
            Self::Interactive => 1,
            Self::Background => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProcessState {
    Created,
    Ready(Priority),
    Running,
    Sleeping,
    WaitingForMessage,
    Terminated,
}

/// Per-process device handles: local handle → device-table slot.
#[derive(Clone, Debug, Default)]
pub struct HandleTable {
    slots: [Option<usize>; MAX_HANDLES],
}

impl HandleTable {
    #[must_use]
    pub fn has_free(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Bind the first free handle to `slot`.
    pub fn insert(&mut self, slot: usize) -> Option<usize> {
        let handle = self.slots.iter().position(Option::is_none)?;
        self.slots[handle] = Some(slot);
        Some(handle)
    }

    #[must_use]
    pub fn get(&self, handle: usize) -> Option<usize> {
        self.slots.get(handle).copied().flatten()
    }

    pub fn remove(&mut self, handle: usize) -> Option<usize> {
        self.slots.get_mut(handle).and_then(Option::take)
    }

    /// Unbind every handle, yielding the device-table slots they held.
    pub fn drain(&mut self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

/// Everything the kernel knows about one process.
///
/// The body itself runs on a host thread owned by the kernel façade; the
/// descriptor only carries bookkeeping.
#[derive(Debug)]
pub struct ProcessDescriptor {
    pub pid: Pid,
    pub name: String,
    pub priority: Priority,
    /// Consecutive dispatches while running, reset on sleep and demotion.
    pub timeouts: u32,
    pub state: ProcessState,
    pub space: AddressSpace,
    pub handles: HandleTable,
    pub mailbox: VecDeque<KernelMessage>,
    pub done: bool,
}

impl ProcessDescriptor {
    #[must_use]
    pub fn new(pid: Pid, name: impl Into<String>, priority: Priority) -> Self {
        Self {
            pid,
            name: name.into(),
            priority,
            timeouts: 0,
            state: ProcessState::Created,
            space: AddressSpace::new(),
            handles: HandleTable::default(),
            mailbox: VecDeque::new(),
            done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demotion_chain() {
        assert_eq!(Priority::Realtime.demoted(), Priority::Interactive);
        assert_eq!(Priority::Interactive.demoted(), Priority::Background);
        assert_eq!(Priority::Background.demoted(), Priority::Background);
        assert_eq!(Priority::default(), Priority::Interactive);
    }

    #[test]
    fn handle_table_fills_and_frees() {
        let mut t = HandleTable::default();
        for n in 0..MAX_HANDLES {
            assert_eq!(t.insert(n + 100), Some(n));
        }
        assert!(!t.has_free());
        assert_eq!(t.insert(1), None);

        assert_eq!(t.remove(3), Some(103));
        assert_eq!(t.get(3), None);
        assert_eq!(t.insert(7), Some(3));
        assert_eq!(t.remove(MAX_HANDLES), None);

        let slots: Vec<_> = t.drain().collect();
        assert_eq!(slots.len(), MAX_HANDLES);
        assert_eq!(t.open_count(), 0);
    }
}
