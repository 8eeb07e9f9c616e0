use crate::process::Pid;
use std::fmt;

/// A message between two processes.
///
/// Sending clones the message into the target's mailbox, so the sender may
/// keep mutating its own copy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KernelMessage {
    pub sender: Pid,
    pub target: Pid,
    /// Free-form tag interpreted by the processes.
    pub kind: u32,
    pub data: Vec<u8>,
}

impl KernelMessage {
    #[must_use]
    pub fn new(sender: Pid, target: Pid, kind: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            sender,
            target,
            kind,
            data: data.into(),
        }
    }
}

impl fmt::Display for KernelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} kind {} ({} bytes)",
            self.sender,
            self.target,
            self.kind,
            self.data.len()
        )
    }
}
