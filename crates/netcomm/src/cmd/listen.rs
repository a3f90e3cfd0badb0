use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use netcomm_peer::{Connection, Listener};
use tracing::{info, warn};

use crate::cmd::{forward_events, install_ctrlc_handler, print_until, Context, ListenArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let listener = Listener::bind_with_config(&args.address, ctx.connection.clone())
        .map_err(|err| peer_error("bind failed", err))?;
    info!(local = %listener.local_address(), "listening for TCP connections");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let (tx, rx) = mpsc::channel();
    let handler = forward_events(tx, args.echo);
    let accepted: Arc<Mutex<Vec<Connection>>> = Arc::default();

    let handle = {
        let accepted = Arc::clone(&accepted);
        listener
            .spawn(move |connection| {
                if let Err(err) = connection.start_receiving_shared(Arc::clone(&handler)) {
                    warn!(error = %err, "receive worker failed to start");
                    connection.close();
                    return;
                }
                if let Ok(mut list) = accepted.lock() {
                    list.retain(Connection::is_connected);
                    list.push(connection);
                }
            })
            .map_err(|err| peer_error("accept loop failed", err))?
    };

    print_until(&rx, args.count, &running, ctx.format);

    handle.close();
    if let Ok(list) = accepted.lock() {
        list.iter().for_each(Connection::close);
    }
    handle
        .join()
        .map_err(|err| peer_error("accept loop failed", err))?;

    Ok(SUCCESS)
}
