use crate::process::Pid;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Sleepers ordered by wake time, ties broken by insertion order.
#[derive(Debug, Default)]
pub struct SleepQueue {
    heap: BinaryHeap<Reverse<(Duration, u64, Pid)>>,
    seq: u64,
}

impl SleepQueue {
    pub fn push(&mut self, wake_at: Duration, pid: Pid) {
        self.heap.push(Reverse((wake_at, self.seq, pid)));
        self.seq += 1;
    }

    /// Pop the earliest sleeper if it is due at `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<Pid> {
        let Reverse((wake_at, _, _)) = self.heap.peek()?;
        if *wake_at > now {
            return None;
        }
        self.heap.pop().map(|Reverse((_, _, pid))| pid)
    }

    pub fn remove(&mut self, pid: Pid) {
        self.heap.retain(|Reverse((_, _, p))| *p != pid);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
