//! Boots the simulated kernel with a handful of sample processes.
//!
//! Usage: `init [seconds]` (default 3). Set `KERNEL_LOG=debug` for scheduler
//! and memory tracing.

mod logger;

use kernel::{
    Kernel, KernelConfig, KernelError, KernelMessage, Os, Priority, ProcessBody, VirtualAddress,
};
use log::{error, info, warn};
use logger::StderrLogger;
use std::thread;
use std::time::Duration;

const PING: u32 = 1;
const PONG: u32 = 2;

/// Touches memory it owns, gives part of it back, then greets forever.
struct HelloWorld;

impl HelloWorld {
    fn setup(os: &Os) -> Result<(), KernelError> {
        let start = os.allocate_memory(4096)?;
        os.write_byte(VirtualAddress::new(3100), 5)?;
        os.free_memory(start, 2048)?;
        info!("3100 holds {}", os.read_byte(VirtualAddress::new(3100))?);
        Ok(())
    }
}

impl ProcessBody for HelloWorld {
    fn run(&mut self, os: &Os) {
        if let Err(err) = Self::setup(os) {
            error!("{}: {err}", os.pid());
            return;
        }
        loop {
            info!("Hello World");
            os.sleep(50);
        }
    }
}

struct GoodbyeWorld;

impl ProcessBody for GoodbyeWorld {
    fn run(&mut self, os: &Os) {
        let address = VirtualAddress::new(6200);
        let setup = os
            .allocate_memory(7 * 1024)
            .and_then(|_| self.write(os, address, 10))
            .and_then(|()| self.read(os, address));
        match setup {
            Ok(value) => info!("6200 holds {value}"),
            Err(err) => {
                error!("{}: {err}", os.pid());
                return;
            }
        }
        loop {
            info!("Goodbye World");
            os.sleep(50);
        }
    }
}

struct Ping;

impl ProcessBody for Ping {
    fn run(&mut self, os: &Os) {
        let Some(pong) = os.pid_by_name("Pong") else {
            warn!("no Pong to play with");
            return;
        };
        for round in 0.. {
            let ping = KernelMessage::new(os.pid(), pong, PING, vec![0; 5]);
            if let Err(err) = os.send_message(&ping) {
                warn!("ping {round} lost: {err}");
                return;
            }
            let reply = os.receive_message();
            info!("Ping got {reply} (round {round})");
            os.sleep(100);
        }
    }
}

struct Pong;

impl ProcessBody for Pong {
    fn run(&mut self, os: &Os) {
        loop {
            let request = os.receive_message();
            info!("Pong got {request}");
            let reply = KernelMessage::new(os.pid(), request.sender, PONG, request.data);
            if let Err(err) = os.send_message(&reply) {
                warn!("pong lost: {err}");
            }
        }
    }
}

/// Writes a scratch file, reads it back and samples the random device.
struct Scribe;

impl Scribe {
    fn scribble(os: &Os) -> Result<(), KernelError> {
        let path = std::env::temp_dir().join("kernel-init-scribe.txt");
        let Some(file) = os.open(&format!("file {}", path.display())) else {
            warn!("could not open {}", path.display());
            return Ok(());
        };
        os.write(file, b"written through the device table")?;
        os.seek(file, 8)?;
        if let Some(bytes) = os.read(file, 64)? {
            info!("read back {:?}", String::from_utf8_lossy(&bytes));
        }
        os.close(file);

        if let Some(random) = os.open("random 42") {
            info!("random bytes {:?}", os.read(random, 4)?);
            os.close(random);
        }
        Ok(())
    }
}

impl ProcessBody for Scribe {
    fn run(&mut self, os: &Os) {
        if let Err(err) = Self::scribble(os) {
            error!("{}: {err}", os.pid());
        }
    }
}

fn main() -> Result<(), KernelError> {
    if let Err(err) = StderrLogger::from_env().init() {
        eprintln!("logger already installed: {err}");
    }

    let seconds = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(3);
    let phase = Duration::from_secs(seconds) / 3;

    let mut kernel = Kernel::boot(KernelConfig::new());
    kernel.spawn(HelloWorld)?;
    kernel.spawn(Pong)?;
    kernel.spawn(Ping)?;
    kernel.spawn(Scribe)?;

    thread::sleep(phase);
    kernel.spawn_with_priority(GoodbyeWorld, Priority::Interactive)?;
    thread::sleep(phase);
    kernel.spawn_with_priority(GoodbyeWorld, Priority::Background)?;
    thread::sleep(phase);

    let stats = kernel.stats();
    info!(
        "{} dispatches, {} context switches, {} demotions, {} pages in use",
        stats.dispatches,
        stats.context_switches,
        stats.demotions,
        kernel.allocated_pages()
    );
    kernel.shutdown();
    Ok(())
}
