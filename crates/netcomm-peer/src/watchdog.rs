//! Stall detection for partially received frames.
//!
//! One watchdog thread runs beside each receive loop. The loop arms it
//! whenever the parser is left holding part of a frame and disarms it when
//! the buffer drains. Arming replaces any earlier deadline, so a frame that
//! keeps trickling in never stalls. A deadline that passes fires once and
//! disarms itself; the next arm starts a new stall period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use netcomm_transport::SocketAddress;
use tracing::trace;

enum Command {
    Arm(SocketAddress),
    Disarm,
}

/// Handle held by the receive loop. Dropping it stops the thread.
pub(crate) struct Watchdog {
    tx: Sender<Command>,
    awaiting: Arc<AtomicBool>,
}

impl Watchdog {
    /// Start the watchdog thread. `on_stall` runs on that thread.
    pub(crate) fn spawn<F>(name: String, timeout: Duration, on_stall: F) -> std::io::Result<Self>
    where
        F: Fn(SocketAddress) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let awaiting = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&awaiting);

        thread::Builder::new()
            .name(name)
            .spawn(move || run(rx, &flag, timeout, on_stall))?;

        Ok(Self { tx, awaiting })
    }

    /// A partial frame is buffered; (re)start the stall deadline.
    pub(crate) fn arm(&self, remote: SocketAddress) {
        self.awaiting.store(true, Ordering::Release);
        let _ = self.tx.send(Command::Arm(remote));
    }

    /// The buffer is empty; cancel any deadline.
    pub(crate) fn disarm(&self) {
        self.awaiting.store(false, Ordering::Release);
        let _ = self.tx.send(Command::Disarm);
    }
}

fn run<F>(rx: Receiver<Command>, awaiting: &AtomicBool, timeout: Duration, on_stall: F)
where
    F: Fn(SocketAddress),
{
    let mut deadline: Option<(Instant, SocketAddress)> = None;

    loop {
        let wait = deadline
            .as_ref()
            .map(|(at, _)| at.saturating_duration_since(Instant::now()));

        let command = match wait {
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => return,
            },
            Some(wait) => match rx.recv_timeout(wait) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some((_, remote)) = deadline.take() {
                        // The loop may have drained the frame just before its
                        // disarm reached us.
                        if awaiting.load(Ordering::Acquire) {
                            trace!(%remote, "stall deadline passed");
                            on_stall(remote);
                        }
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => return,
            },
        };

        match command {
            Command::Arm(remote) => deadline = Some((Instant::now() + timeout, remote)),
            Command::Disarm => deadline = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchdog(timeout_ms: u64) -> (Watchdog, Receiver<SocketAddress>) {
        let (tx, rx) = mpsc::channel();
        let dog = Watchdog::spawn(
            "test-watchdog".to_string(),
            Duration::from_millis(timeout_ms),
            move |remote| {
                let _ = tx.send(remote);
            },
        )
        .unwrap();
        (dog, rx)
    }

    fn remote() -> SocketAddress {
        SocketAddress::new("127.0.0.1", 9)
    }

    #[test]
    fn fires_once_per_stall() {
        let (dog, stalls) = watchdog(40);
        dog.arm(remote());

        assert_eq!(
            stalls.recv_timeout(Duration::from_secs(2)).unwrap(),
            remote()
        );
        assert!(stalls.recv_timeout(Duration::from_millis(200)).is_err());

        // A new arm starts a new stall period.
        dog.arm(remote());
        assert!(stalls.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn rearming_postpones_deadline() {
        let (dog, stalls) = watchdog(150);
        for _ in 0..6 {
            dog.arm(remote());
            thread::sleep(Duration::from_millis(40));
        }
        assert!(stalls.try_recv().is_err());
        assert!(stalls.recv_timeout(Duration::from_secs(2)).is_ok());
    }

    #[test]
    fn disarm_cancels_deadline() {
        let (dog, stalls) = watchdog(40);
        dog.arm(remote());
        dog.disarm();
        assert!(stalls.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn thread_exits_when_dropped() {
        let (dog, stalls) = watchdog(40);
        dog.arm(remote());
        drop(dog);
        // The callback (and its sender) is dropped with the thread.
        assert!(matches!(
            stalls.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }
}
