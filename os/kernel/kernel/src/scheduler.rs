//! # Scheduler
//!
//! A pure state machine over process descriptors: it owns the three ready
//! queues, the sleep queue, the waiting set and the pid/name indices, and
//! decides who runs next. It never touches threads or clocks; callers pass the
//! current time in and act on the returned [`DispatchOutcome`].
//!
//! ## Dispatch
//!
//! ```text
//!  sleepers due ──► ready queues
//!  current ───────► timeouts += 1, flush TLB
//!                    ├─ done ──────────► reaped
//!                    ├─ timeouts == N ─► demote, timeouts = 0, enqueue
//!                    └─ otherwise ─────► enqueue at its priority
//!  draw p ────────► select_queue ──► pop front ──► current
//! ```
//!
//! A process blocking on its own (sleep, message wait) leaves the CPU before
//! the dispatch, so it is neither counted nor re-enqueued.

mod selection;
mod sleep_queue;

pub use selection::select_queue;
pub use sleep_queue::SleepQueue;

use crate::message::KernelMessage;
use crate::process::{Pid, Priority, ProcessDescriptor, ProcessState};
use log::{debug, info, trace};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;

/// What a single dispatch did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DispatchOutcome {
    /// Sleepers moved back to a ready queue, in wake order.
    pub woken: Vec<Pid>,
    /// The process that was running and is now back in a ready queue.
    pub suspended: Option<Pid>,
    /// The process that was running and had finished.
    pub reaped: Option<Pid>,
    /// The process now holding the CPU; `None` means idle.
    pub resumed: Option<Pid>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SchedulerStats {
    pub dispatches: u64,
    /// Dispatches that handed the CPU to a different process.
    pub context_switches: u64,
    pub demotions: u64,
}

pub struct Scheduler {
    queues: [VecDeque<Pid>; 3],
    sleepers: SleepQueue,
    waiting: BTreeSet<Pid>,
    processes: BTreeMap<Pid, ProcessDescriptor>,
    names: HashMap<String, Pid>,
    current: Option<Pid>,
    next_pid: u32,
    demotion_threshold: u32,
    rng: StdRng,
    reaped: Vec<ProcessDescriptor>,
    stats: SchedulerStats,
}

impl Scheduler {
    #[must_use]
    pub fn new(demotion_threshold: u32, rng: StdRng) -> Self {
        Self {
            queues: Default::default(),
            sleepers: SleepQueue::default(),
            waiting: BTreeSet::new(),
            processes: BTreeMap::new(),
            names: HashMap::new(),
            current: None,
            next_pid: 0,
            demotion_threshold,
            rng,
            reaped: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Register a new process in the [`Created`](ProcessState::Created) state.
    ///
    /// It is not runnable until [`start`](Self::start) puts it in a queue.
    pub fn admit(&mut self, name: &str, priority: Priority) -> Pid {
        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;

        self.processes
            .insert(pid, ProcessDescriptor::new(pid, name, priority));
        self.names.insert(name.to_owned(), pid);
        info!("created {name} as {pid} ({priority:?})");
        pid
    }

    /// Move a created process to the tail of its ready queue.
    ///
    /// Returns `false` if `pid` is unknown or already started. The caller
    /// dispatches if the CPU [is idle](Self::is_idle).
    pub fn start(&mut self, pid: Pid) -> bool {
        let Some(desc) = self.processes.get_mut(&pid) else {
            return false;
        };
        if desc.state != ProcessState::Created {
            return false;
        }
        desc.state = ProcessState::Ready(desc.priority);
        self.queues[desc.priority.index()].push_back(pid);
        true
    }

    /// Run one scheduling round at time `now`.
    pub fn dispatch(&mut self, now: Duration) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        self.stats.dispatches += 1;

        while let Some(pid) = self.sleepers.pop_due(now) {
            if let Some(desc) = self.processes.get_mut(&pid)
                && desc.state == ProcessState::Sleeping
            {
                desc.state = ProcessState::Ready(desc.priority);
                self.queues[desc.priority.index()].push_back(pid);
                outcome.woken.push(pid);
            }
        }

        let previous = self.current.take();
        if let Some(pid) = previous {
            self.retire_current(pid, &mut outcome);
        }

        outcome.resumed = self.select();
        if let Some(pid) = outcome.resumed {
            if let Some(desc) = self.processes.get_mut(&pid) {
                desc.state = ProcessState::Running;
            }
            self.current = Some(pid);
            if previous != Some(pid) {
                self.stats.context_switches += 1;
            }
        }

        debug!(
            "dispatch at {now:?}: woke {:?}, suspended {:?}, reaped {:?}, running {:?} ({} asleep, {} waiting)",
            outcome.woken,
            outcome.suspended,
            outcome.reaped,
            outcome.resumed,
            self.sleepers.len(),
            self.waiting.len()
        );
        outcome
    }

    fn retire_current(&mut self, pid: Pid, outcome: &mut DispatchOutcome) {
        let Some(desc) = self.processes.get_mut(&pid) else {
            return;
        };
        desc.timeouts += 1;
        desc.space.tlb.flush();

        if desc.done {
            outcome.reaped = Some(pid);
            self.reap(pid);
            return;
        }

        if desc.timeouts >= self.demotion_threshold {
            let demoted = desc.priority.demoted();
            if demoted != desc.priority {
                info!("{pid} demoted from {:?} to {demoted:?}", desc.priority);
                self.stats.demotions += 1;
            }
            desc.priority = demoted;
            desc.timeouts = 0;
        }
        desc.state = ProcessState::Ready(desc.priority);
        self.queues[desc.priority.index()].push_back(pid);
        outcome.suspended = Some(pid);
    }

    fn select(&mut self) -> Option<Pid> {
        let ready = self.queues.each_ref().map(VecDeque::len);
        let p: f64 = self.rng.r#gen();
        let queue = select_queue(p, ready)?;
        trace!("draw {p:.3} over {ready:?} picks {queue:?}");
        self.queues[queue.index()].pop_front()
    }

    /// Put the running process to sleep until `now + duration`, then dispatch.
    ///
    /// Does nothing but dispatch if no process is running.
    pub fn sleep_current(&mut self, now: Duration, duration: Duration) -> DispatchOutcome {
        if let Some(pid) = self.current.take()
            && let Some(desc) = self.processes.get_mut(&pid)
        {
            desc.timeouts = 0;
            desc.space.tlb.flush();
            desc.state = ProcessState::Sleeping;
            self.sleepers.push(now + duration, pid);
            debug!("{pid} sleeps for {duration:?}");
        }
        self.dispatch(now)
    }

    /// Park the running process until a message arrives, then dispatch.
    pub fn wait_current(&mut self, now: Duration) -> DispatchOutcome {
        if let Some(pid) = self.current.take()
            && let Some(desc) = self.processes.get_mut(&pid)
        {
            desc.space.tlb.flush();
            desc.state = ProcessState::WaitingForMessage;
            self.waiting.insert(pid);
            debug!("{pid} waits for a message");
        }
        self.dispatch(now)
    }

    /// Append a copy of `message` to the target's mailbox.
    ///
    /// Returns `Ok(true)` if the target was waiting and is now ready again;
    /// the caller should dispatch in that case.
    ///
    /// # Errors
    /// The target pid as `Err` if no such process exists.
    pub fn deliver(&mut self, message: &KernelMessage) -> Result<bool, Pid> {
        let target = message.target;
        let desc = self.processes.get_mut(&target).ok_or(target)?;
        desc.mailbox.push_back(message.clone());
        trace!("delivered {message}");

        if self.waiting.remove(&target) {
            desc.state = ProcessState::Ready(desc.priority);
            self.queues[desc.priority.index()].push_back(target);
            debug!("{target} woken by a message");
            return Ok(true);
        }
        Ok(false)
    }

    /// Pop the oldest message in `pid`'s mailbox.
    pub fn take_message(&mut self, pid: Pid) -> Option<KernelMessage> {
        self.processes.get_mut(&pid)?.mailbox.pop_front()
    }

    /// Mark `pid` as finished.
    ///
    /// Returns `true` if it is the running process; the caller must dispatch
    /// to reap it. Otherwise it is reaped immediately.
    pub fn mark_done(&mut self, pid: Pid) -> bool {
        let Some(desc) = self.processes.get_mut(&pid) else {
            return false;
        };
        desc.done = true;
        if self.current == Some(pid) {
            return true;
        }
        self.reap(pid);
        false
    }

    fn reap(&mut self, pid: Pid) {
        for queue in &mut self.queues {
            queue.retain(|&p| p != pid);
        }
        self.waiting.remove(&pid);
        self.sleepers.remove(pid);
        if self.current == Some(pid) {
            self.current = None;
        }
        let Some(mut desc) = self.processes.remove(&pid) else {
            return;
        };
        if self.names.get(&desc.name) == Some(&pid) {
            self.names.remove(&desc.name);
        }
        desc.state = ProcessState::Terminated;
        info!("{} ({pid}) terminated", desc.name);
        self.reaped.push(desc);
    }

    /// Descriptors of terminated processes not yet handed out.
    ///
    /// The caller releases their memory and device handles.
    pub fn take_reaped(&mut self) -> Vec<ProcessDescriptor> {
        std::mem::take(&mut self.reaped)
    }

    #[inline]
    #[must_use]
    pub const fn current(&self) -> Option<Pid> {
        self.current
    }

    #[inline]
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    #[must_use]
    pub fn process(&self, pid: Pid) -> Option<&ProcessDescriptor> {
        self.processes.get(&pid)
    }

    pub fn process_mut(&mut self, pid: Pid) -> Option<&mut ProcessDescriptor> {
        self.processes.get_mut(&pid)
    }

    /// Most recently created live process registered under `name`.
    #[must_use]
    pub fn pid_by_name(&self, name: &str) -> Option<Pid> {
        self.names.get(name).copied()
    }

    /// `None` only for pids that were never handed out.
    #[must_use]
    pub fn process_state(&self, pid: Pid) -> Option<ProcessState> {
        match self.processes.get(&pid) {
            Some(desc) => Some(desc.state),
            None if pid.as_u32() < self.next_pid => Some(ProcessState::Terminated),
            None => None,
        }
    }

    #[must_use]
    pub fn priority_of(&self, pid: Pid) -> Option<Priority> {
        self.processes.get(&pid).map(|d| d.priority)
    }

    /// Processes created and not yet terminated.
    #[must_use]
    pub fn live(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::TlbEntry;
    use kernel_vmem::addresses::{PhysicalPage, VirtualPage};
    use rand::SeedableRng;

    const T0: Duration = Duration::ZERO;

    fn scheduler() -> Scheduler {
        Scheduler::new(5, StdRng::seed_from_u64(42))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn ready(s: &mut Scheduler, name: &str, priority: Priority) -> Pid {
        let pid = s.admit(name, priority);
        assert!(s.start(pid));
        pid
    }

    #[test]
    fn admitted_process_waits_in_created_until_started() {
        let mut s = scheduler();
        let pid = s.admit("late", Priority::Background);
        assert_eq!(s.process_state(pid), Some(ProcessState::Created));
        assert_eq!(s.dispatch(T0).resumed, None);

        assert!(s.start(pid));
        assert!(!s.start(pid));
        assert_eq!(
            s.process_state(pid),
            Some(ProcessState::Ready(Priority::Background))
        );
        assert_eq!(s.dispatch(T0).resumed, Some(pid));
    }

    #[test]
    fn descriptor_is_debug_printable() {
        let mut s = scheduler();
        let pid = ready(&mut s, "shown", Priority::Interactive);
        let text = format!("{:?}", s.process(pid).unwrap());
        assert!(text.contains("shown"));
        assert!(text.contains("AddressSpace"));
    }

    #[test]
    fn pids_increase_and_are_not_reused() {
        let mut s = scheduler();
        let a = ready(&mut s, "a", Priority::Interactive);
        let b = ready(&mut s, "b", Priority::Interactive);
        assert!(b > a);
        assert!(!s.mark_done(a));
        let c = ready(&mut s, "c", Priority::Interactive);
        assert!(c > b);
        assert_eq!(s.process_state(a), Some(ProcessState::Terminated));
        assert_eq!(s.process_state(Pid::new(99)), None);
    }

    #[test]
    fn dispatch_on_empty_is_idle() {
        let mut s = scheduler();
        let outcome = s.dispatch(T0);
        assert_eq!(outcome, DispatchOutcome::default());
        assert!(s.is_idle());
    }

    #[test]
    fn realtime_demotes_after_five_dispatches_then_interactive_too() {
        let mut s = scheduler();
        let pid = ready(&mut s, "hog", Priority::Realtime);
        s.dispatch(T0);
        assert_eq!(s.current(), Some(pid));

        for _ in 0..4 {
            s.dispatch(T0);
            assert_eq!(s.priority_of(pid), Some(Priority::Realtime));
        }
        s.dispatch(T0);
        assert_eq!(s.priority_of(pid), Some(Priority::Interactive));
        assert_eq!(s.process(pid).unwrap().timeouts, 0);

        for _ in 0..4 {
            s.dispatch(T0);
        }
        assert_eq!(s.priority_of(pid), Some(Priority::Interactive));
        s.dispatch(T0);
        assert_eq!(s.priority_of(pid), Some(Priority::Background));

        for _ in 0..20 {
            s.dispatch(T0);
        }
        assert_eq!(s.priority_of(pid), Some(Priority::Background));
        assert_eq!(s.stats().demotions, 2);
        assert_eq!(s.current(), Some(pid));
    }

    #[test]
    fn sleep_resets_timeouts() {
        let mut s = scheduler();
        let pid = ready(&mut s, "napper", Priority::Realtime);
        s.dispatch(T0);
        for _ in 0..3 {
            s.dispatch(T0);
        }
        assert_eq!(s.process(pid).unwrap().timeouts, 3);

        s.sleep_current(T0, ms(10));
        assert_eq!(s.process_state(pid), Some(ProcessState::Sleeping));
        assert_eq!(s.process(pid).unwrap().timeouts, 0);
        assert!(s.is_idle());
    }

    #[test]
    fn shorter_sleeper_wakes_first() {
        let mut s = scheduler();
        let long = ready(&mut s, "long", Priority::Interactive);
        let short = ready(&mut s, "short", Priority::Interactive);

        s.dispatch(T0);
        assert_eq!(s.current(), Some(long));
        s.sleep_current(T0, ms(100));
        assert_eq!(s.current(), Some(short));
        s.sleep_current(T0, ms(50));
        assert!(s.is_idle());
        assert_eq!(s.process_state(long), Some(ProcessState::Sleeping));
        assert_eq!(s.process_state(short), Some(ProcessState::Sleeping));

        let outcome = s.dispatch(ms(60));
        assert_eq!(outcome.woken, vec![short]);
        assert_eq!(s.current(), Some(short));
        assert_eq!(s.process_state(long), Some(ProcessState::Sleeping));

        let outcome = s.dispatch(ms(100));
        assert_eq!(outcome.woken, vec![long]);
    }

    #[test]
    fn message_wakes_waiting_process_with_private_copy() {
        let mut s = scheduler();
        let receiver = ready(&mut s, "receiver", Priority::Interactive);
        let sender = ready(&mut s, "sender", Priority::Interactive);

        s.dispatch(T0);
        assert_eq!(s.current(), Some(receiver));
        assert_eq!(s.take_message(receiver), None);
        s.wait_current(T0);
        assert_eq!(s.process_state(receiver), Some(ProcessState::WaitingForMessage));
        assert_eq!(s.current(), Some(sender));

        let mut msg = KernelMessage::new(sender, receiver, 1, vec![1, 2, 3]);
        assert_eq!(s.deliver(&msg), Ok(true));
        msg.data[0] = 99;
        msg.kind = 7;

        assert_eq!(
            s.process_state(receiver),
            Some(ProcessState::Ready(Priority::Interactive))
        );
        let got = s.take_message(receiver).unwrap();
        assert_eq!(got.data, vec![1, 2, 3]);
        assert_eq!(got.kind, 1);
    }

    #[test]
    fn message_to_ready_process_only_queues() {
        let mut s = scheduler();
        let a = ready(&mut s, "a", Priority::Interactive);
        let b = ready(&mut s, "b", Priority::Interactive);
        s.dispatch(T0);

        let msg = KernelMessage::new(a, b, 0, Vec::new());
        assert_eq!(s.deliver(&msg), Ok(false));
        assert_eq!(s.deliver(&msg), Ok(false));
        assert_eq!(s.process(b).unwrap().mailbox.len(), 2);
        assert_eq!(s.deliver(&KernelMessage::new(a, Pid::new(42), 0, Vec::new())), Err(Pid::new(42)));
    }

    #[test]
    fn mailbox_is_fifo() {
        let mut s = scheduler();
        let a = ready(&mut s, "a", Priority::Interactive);
        for kind in 0..3 {
            s.deliver(&KernelMessage::new(a, a, kind, Vec::new())).unwrap();
        }
        let kinds: Vec<_> = std::iter::from_fn(|| s.take_message(a)).map(|m| m.kind).collect();
        assert_eq!(kinds, vec![0, 1, 2]);
    }

    #[test]
    fn finished_process_is_reaped_on_dispatch() {
        let mut s = scheduler();
        let a = ready(&mut s, "a", Priority::Interactive);
        let b = ready(&mut s, "b", Priority::Interactive);
        s.dispatch(T0);
        assert!(s.mark_done(a));

        let outcome = s.dispatch(T0);
        assert_eq!(outcome.reaped, Some(a));
        assert_eq!(outcome.resumed, Some(b));
        assert_eq!(s.process_state(a), Some(ProcessState::Terminated));
        assert_eq!(s.pid_by_name("a"), None);

        let reaped = s.take_reaped();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].pid, a);
        assert!(s.take_reaped().is_empty());
    }

    #[test]
    fn name_lookup_prefers_latest_live_process() {
        let mut s = scheduler();
        let first = ready(&mut s, "worker", Priority::Interactive);
        let second = ready(&mut s, "worker", Priority::Interactive);
        assert_eq!(s.pid_by_name("worker"), Some(second));

        // reaping the older one keeps the newer registration
        s.mark_done(first);
        assert_eq!(s.pid_by_name("worker"), Some(second));
        s.mark_done(second);
        assert_eq!(s.pid_by_name("worker"), None);
    }

    #[test]
    fn switching_flushes_the_translation_cache() {
        let mut s = scheduler();
        let a = ready(&mut s, "a", Priority::Interactive);
        ready(&mut s, "b", Priority::Interactive);
        s.dispatch(T0);

        let mut rng = StdRng::seed_from_u64(0);
        s.process_mut(a).unwrap().space.tlb.install(
            TlbEntry {
                virtual_page: VirtualPage::new(0),
                physical_page: PhysicalPage::new(5),
            },
            &mut rng,
        );
        s.dispatch(T0);
        assert!(s.process(a).unwrap().space.tlb.is_empty());
    }

    #[test]
    fn realtime_wins_about_sixty_percent_against_background() {
        let mut s = Scheduler::new(u32::MAX, StdRng::seed_from_u64(1234));
        let rt = ready(&mut s, "rt", Priority::Realtime);
        ready(&mut s, "bg", Priority::Background);

        let mut realtime = 0u32;
        for _ in 0..1000 {
            s.dispatch(T0);
            if s.current() == Some(rt) {
                realtime += 1;
            }
        }
        let share = f64::from(realtime) / 1000.0;
        assert!((0.55..=0.65).contains(&share), "share = {share}");
    }

    #[test]
    fn context_switches_are_counted() {
        let mut s = scheduler();
        ready(&mut s, "only", Priority::Background);
        s.dispatch(T0);
        s.dispatch(T0);
        s.dispatch(T0);
        let stats = s.stats();
        assert_eq!(stats.dispatches, 3);
        assert_eq!(stats.context_switches, 1);
    }
}
