use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use netcomm_frame::Message;
use netcomm_peer::{bind_datagram_with_config, connect_with_config, Connection, Listener};
use tracing::{info, warn};

use crate::cmd::{forward_events, install_ctrlc_handler, Context, DemoArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_received, OutputFormat, Received};

pub const SAMPLE_COMMAND: u8 = 0x88;

/// Grace period for replies still in flight after the last round.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);
const PRINT_POLL: Duration = Duration::from_millis(100);

/// `0x88 (-256, true, "Hello", -1.1, [0x41, 0x42, 0x43])`
pub fn sample_message() -> Message {
    Message::new(SAMPLE_COMMAND, vec![])
        .with_arg(-256i64)
        .with_arg(true)
        .with_arg("Hello")
        .with_arg(-1.1f64)
        .with_arg(vec![0x41u8, 0x42, 0x43])
}

pub fn run(args: DemoArgs, ctx: &Context) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let (tx, rx) = mpsc::channel();
    let handler = forward_events(tx, false);

    let udp = bind_datagram_with_config(&args.address, ctx.connection.clone())
        .map_err(|err| peer_error("UDP bind failed", err))?;
    let udp_worker = udp
        .start_receiving_shared(Arc::clone(&handler))
        .map_err(|err| peer_error("UDP receive failed", err))?;
    let udp_target = udp.local_address().clone();
    info!(local = %udp_target, "UDP endpoint started");

    let listener = Listener::bind_with_config(&args.address, ctx.connection.clone())
        .map_err(|err| peer_error("TCP bind failed", err))?;
    let server_address = listener.local_address().clone();
    let accepted: Arc<Mutex<Vec<Connection>>> = Arc::default();
    let server = {
        let accepted = Arc::clone(&accepted);
        let handler = Arc::clone(&handler);
        listener
            .spawn(move |connection| {
                info!(remote = %connection.remote_address(), "TCP client accepted");
                if let Err(err) = connection.start_receiving_shared(Arc::clone(&handler)) {
                    warn!(error = %err, "receive worker failed to start");
                    connection.close();
                    return;
                }
                if let Ok(mut list) = accepted.lock() {
                    list.push(connection);
                }
            })
            .map_err(|err| peer_error("TCP listen failed", err))?
    };
    info!(local = %server_address, "TCP server started");

    let client = connect_with_config(&server_address, ctx.connection.clone())
        .map_err(|err| peer_error("TCP connect failed", err))?;
    client
        .start_receiving_shared(handler)
        .map_err(|err| peer_error("TCP receive failed", err))?;
    info!(local = %client.local_address(), "TCP client started");

    let message = sample_message();
    let mut round = 0usize;
    let mut sent = 0usize;
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) && (args.rounds == 0 || round < args.rounds) {
        round += 1;

        match udp.send_to(&message, &udp_target) {
            Ok(()) => sent += 1,
            Err(err) => warn!(error = %err, "UDP send failed"),
        }
        if !client.is_connected() {
            warn!("TCP client disconnected");
            break;
        }
        match client.send(&message) {
            Ok(()) => sent += 1,
            Err(err) => warn!(error = %err, "TCP send failed"),
        }

        let last_round = round == args.rounds;
        let wait = if last_round {
            SETTLE_TIMEOUT
        } else {
            args.interval
        };
        let deadline = Instant::now() + wait;
        let before = printed;
        printed += drain_until(&rx, deadline, &running, ctx.format, |n| {
            last_round && before + n >= sent
        });
    }

    client.close();
    server.close();
    if let Ok(list) = accepted.lock() {
        list.iter().for_each(Connection::close);
    }
    udp.close();
    let _ = udp_worker.join();
    server
        .join()
        .map_err(|err| peer_error("accept loop failed", err))?;

    info!(rounds = round, sent, printed, "demo finished");
    Ok(SUCCESS)
}

/// Print received messages until `deadline`, Ctrl-C, or `done` accepts the
/// count printed so far. Returns that count.
fn drain_until<F>(
    rx: &Receiver<Received>,
    deadline: Instant,
    running: &AtomicBool,
    format: OutputFormat,
    done: F,
) -> usize
where
    F: Fn(usize) -> bool,
{
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match rx.recv_timeout(remaining.min(PRINT_POLL)) {
            Ok(received) => {
                print_received(&received, format);
                printed += 1;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if done(printed) {
            break;
        }
    }
    printed
}
