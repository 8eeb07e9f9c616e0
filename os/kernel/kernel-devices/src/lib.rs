//! # Devices
//!
//! Everything a process can `open` goes through the [`Device`] trait. The
//! [`DeviceTable`] is itself a device: it splits `"<driver> <argument>"`,
//! forwards the argument to the named driver and hands out one of its
//! [`DEVICE_SLOTS`] global slots.
//!
//! ```text
//!  process handle ──► DeviceTable slot ──► (driver, driver-local id)
//!                                           ├─ "file"   FileDevice
//!                                           └─ "random" RandomDevice
//! ```

mod file;
mod random;
mod table;

pub use file::FileDevice;
pub use random::RandomDevice;
pub use table::DeviceTable;

/// Number of global device-table slots.
pub const DEVICE_SLOTS: usize = 10;

/// Number of streams a single driver can have open at once.
pub const DRIVER_STREAMS: usize = 10;

/// Largest number of bytes a single read hands back; bigger requests are
/// short reads.
pub const MAX_TRANSFER: usize = 64 * 1024;

/// Furthest a [`RandomDevice`] stream can be advanced by one seek.
pub const MAX_RANDOM_SKIP: u64 = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("device id {0} is not open")]
    NotOpen(usize),
    #[error("cannot skip {0} bytes in one seek")]
    SeekTooFar(u64),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A byte-stream device.
///
/// Ids are local to the implementor: whatever [`open`](Self::open) returned.
pub trait Device: Send {
    /// Open a stream described by `spec`; `None` if the device cannot.
    fn open(&mut self, spec: &str) -> Option<usize>;

    /// Close `id`. Closing an id that is not open does nothing.
    fn close(&mut self, id: usize);

    /// Read up to `size` bytes, at most [`MAX_TRANSFER`]. `Ok(None)` signals
    /// end of stream.
    ///
    /// # Errors
    /// [`DeviceError::NotOpen`] for unknown ids, [`DeviceError::Io`] for
    /// backend failures.
    fn read(&mut self, id: usize, size: usize) -> Result<Option<Vec<u8>>, DeviceError>;

    /// Reposition the stream to `offset`.
    ///
    /// # Errors
    /// As [`read`](Self::read).
    fn seek(&mut self, id: usize, offset: u64) -> Result<(), DeviceError>;

    /// Write `data`, returning the number of bytes accepted.
    ///
    /// # Errors
    /// As [`read`](Self::read).
    fn write(&mut self, id: usize, data: &[u8]) -> Result<usize, DeviceError>;
}

/// Index of the first `None` in a fixed slot array.
fn first_free<T>(slots: &[Option<T>]) -> Option<usize> {
    slots.iter().position(Option::is_none)
}
