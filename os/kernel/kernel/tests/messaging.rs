use kernel::{Kernel, KernelConfig, KernelError, KernelMessage, Os, Pid, ProcessBody, from_fn};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);
const ROUNDS: u32 = 50;

struct Pong {
    seen: Arc<Mutex<Vec<u32>>>,
}

impl ProcessBody for Pong {
    fn run(&mut self, os: &Os) {
        for _ in 0..ROUNDS {
            let request = os.receive_message();
            self.seen.lock().unwrap().push(request.kind);
            let ack = KernelMessage::new(os.pid(), request.sender, request.kind, b"ack".to_vec());
            os.send_message(&ack).unwrap();
        }
    }
}

struct Ping {
    acked: Arc<Mutex<Vec<u32>>>,
}

impl ProcessBody for Ping {
    fn run(&mut self, os: &Os) {
        let pong = os.pid_by_name("Pong").unwrap();
        for round in 0..ROUNDS {
            os.send_message(&KernelMessage::new(os.pid(), pong, round, vec![0; 5]))
                .unwrap();
            let ack = os.receive_message();
            assert_eq!(ack.sender, pong);
            assert_eq!(ack.data, b"ack");
            self.acked.lock().unwrap().push(ack.kind);
        }
    }
}

fn ping_pong(config: KernelConfig) {
    let kernel = Kernel::boot(config);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let acked = Arc::new(Mutex::new(Vec::new()));

    let pong = kernel
        .spawn(Pong {
            seen: Arc::clone(&seen),
        })
        .unwrap();
    assert_eq!(kernel.pid_by_name("Pong"), Some(pong));
    kernel
        .spawn(Ping {
            acked: Arc::clone(&acked),
        })
        .unwrap();

    assert!(kernel.wait_until_idle(WAIT));
    let expected: Vec<u32> = (0..ROUNDS).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
    assert_eq!(*acked.lock().unwrap(), expected);
}

#[test]
fn ping_pong_without_timer() {
    ping_pong(KernelConfig::new().with_timer_enabled(false).with_seed(Some(3)));
}

#[test]
fn ping_pong_under_preemption() {
    ping_pong(
        KernelConfig::new()
            .with_quantum(Duration::from_millis(1))
            .with_seed(Some(4)),
    );
}

#[test]
fn sending_to_unknown_process_fails() {
    let kernel = Kernel::boot(KernelConfig::new().with_timer_enabled(false));
    let (tx, rx) = mpsc::channel();
    kernel
        .spawn(from_fn("lonely", move |os| {
            let msg = KernelMessage::new(os.pid(), Pid::new(999), 0, Vec::new());
            let result = os.send_message(&msg);
            tx.send(matches!(result, Err(KernelError::NoSuchProcess(p)) if p == Pid::new(999)))
                .unwrap();
        }))
        .unwrap();
    assert!(rx.recv_timeout(WAIT).unwrap());
}

#[test]
fn receiver_gets_a_private_copy() {
    let kernel = Kernel::boot(KernelConfig::new().with_timer_enabled(false));
    let (tx, rx) = mpsc::channel();

    let receiver = kernel
        .spawn(from_fn("receiver", move |os| {
            let first = os.receive_message();
            let second = os.receive_message();
            tx.send((first, second)).unwrap();
        }))
        .unwrap();

    kernel
        .spawn(from_fn("sender", move |os| {
            let mut msg = KernelMessage::new(os.pid(), receiver, 1, vec![1, 2, 3]);
            os.send_message(&msg).unwrap();
            msg.data[0] = 42;
            msg.kind = 2;
            os.send_message(&msg).unwrap();
        }))
        .unwrap();

    let (first, second) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!((first.kind, first.data), (1, vec![1, 2, 3]));
    assert_eq!((second.kind, second.data), (2, vec![42, 2, 3]));
    assert!(kernel.wait_until_idle(WAIT));
}

#[test]
fn wait_for_message_returns_none_after_blocking() {
    let kernel = Kernel::boot(KernelConfig::new().with_timer_enabled(false));
    let (tx, rx) = mpsc::channel();

    let waiter = kernel
        .spawn(from_fn("waiter", move |os| {
            let first = os.wait_for_message();
            let second = os.wait_for_message();
            tx.send((first.is_none(), second.map(|m| m.kind))).unwrap();
        }))
        .unwrap();

    kernel
        .spawn(from_fn("poker", move |os| {
            os.send_message(&KernelMessage::new(os.pid(), waiter, 9, Vec::new()))
                .unwrap();
        }))
        .unwrap();

    assert_eq!(rx.recv_timeout(WAIT).unwrap(), (true, Some(9)));
    assert!(kernel.wait_until_idle(WAIT));
}
