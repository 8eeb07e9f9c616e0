use crate::process::Pid;
use kernel_devices::DeviceError;
use kernel_vmem::MemoryError;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("no process with {0}")]
    NoSuchProcess(Pid),
    #[error("failed to start the thread of {0}")]
    Spawn(Pid, #[source] std::io::Error),
}
