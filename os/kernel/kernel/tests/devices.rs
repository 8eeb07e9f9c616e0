use kernel::devices::{Device, DeviceError, DeviceTable};
use kernel::{Kernel, KernelConfig, KernelError, MAX_HANDLES, from_fn};
use std::sync::mpsc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn config() -> KernelConfig {
    KernelConfig::new().with_timer_enabled(false)
}

/// Driver whose streams always fail to read.
struct Broken;

impl Device for Broken {
    fn open(&mut self, _spec: &str) -> Option<usize> {
        Some(0)
    }

    fn close(&mut self, _id: usize) {}

    fn read(&mut self, id: usize, _size: usize) -> Result<Option<Vec<u8>>, DeviceError> {
        Err(DeviceError::NotOpen(id))
    }

    fn seek(&mut self, _id: usize, _offset: u64) -> Result<(), DeviceError> {
        Ok(())
    }

    fn write(&mut self, _id: usize, _data: &[u8]) -> Result<usize, DeviceError> {
        Ok(0)
    }
}

#[test]
fn random_stream_reads_requested_length() {
    let kernel = Kernel::boot(config());
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("reader", move |os| {
            let handle = os.open("random 5").unwrap();
            let bytes = os.read(handle, 8).unwrap().unwrap();
            os.close(handle);
            tx.send(bytes.len()).unwrap();
        }))
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 8);
}

#[test]
fn handle_table_fills_up_and_recycles() {
    let kernel = Kernel::boot(config());
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("hoarder", move |os| {
            let handles: Vec<_> = (0..MAX_HANDLES)
                .map(|n| os.open(&format!("random {n}")).unwrap())
                .collect();
            let overflow = os.open("random 99");
            os.close(handles[3]);
            let reused = os.open("random 7");
            tx.send((overflow, reused)).unwrap();
        }))
        .unwrap();

    let (overflow, reused) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(overflow, None);
    assert_eq!(reused, Some(3));
}

#[test]
fn unbound_handle_reads_empty_and_writes_nothing() {
    let kernel = Kernel::boot(config());
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("idle", move |os| {
            let read = os.read(4, 16).unwrap();
            let written = os.write(4, b"lost").unwrap();
            os.seek(4, 10).unwrap();
            os.close(4);
            tx.send((read, written)).unwrap();
        }))
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), (Some(Vec::new()), 0));
}

#[test]
fn unknown_driver_is_refused() {
    let kernel = Kernel::boot(config());
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("lost", move |os| {
            tx.send(os.open("tape 0")).unwrap();
        }))
        .unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), None);
}

#[test]
fn handles_are_closed_on_exit() {
    let kernel = Kernel::boot(config());
    let pid = kernel
        .spawn(from_fn("leaker", |os| {
            for n in 0..4 {
                os.open(&format!("random {n}")).unwrap();
            }
        }))
        .unwrap();
    assert!(kernel.wait_for_exit(pid, WAIT));
    assert_eq!(kernel.open_devices(), 0);
}

#[test]
fn file_roundtrip_through_handles() {
    let path = std::env::temp_dir().join(format!("kernel-devices-{}.bin", std::process::id()));
    let spec = format!("file {}", path.display());
    let kernel = Kernel::boot(config());
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("scribe", move |os| {
            let handle = os.open(&spec).unwrap();
            let written = os.write(handle, b"hello, kernel").unwrap();
            os.seek(handle, 7).unwrap();
            let tail = os.read(handle, 64).unwrap();
            let end = os.read(handle, 64).unwrap();
            os.close(handle);
            tx.send((written, tail, end)).unwrap();
        }))
        .unwrap();

    let (written, tail, end) = rx.recv_timeout(WAIT).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(written, 13);
    assert_eq!(tail.as_deref(), Some(&b"kernel"[..]));
    assert_eq!(end, None);
}

#[test]
fn driver_failures_surface_as_kernel_errors() {
    let mut devices = DeviceTable::empty();
    devices.register("broken", Box::new(Broken));
    let kernel = Kernel::boot_with_devices(config(), devices);
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("victim", move |os| {
            let handle = os.open("broken").unwrap();
            tx.send(os.read(handle, 1).err()).unwrap();
        }))
        .unwrap();
    assert!(matches!(
        rx.recv_timeout(WAIT).unwrap(),
        Some(KernelError::Device(DeviceError::NotOpen(0)))
    ));
}
