use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;

use netcomm_peer::bind_datagram_with_config;
use tracing::info;

use crate::cmd::{forward_events, install_ctrlc_handler, print_until, Context, UdpArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};

pub fn run(args: UdpArgs, ctx: &Context) -> CliResult<i32> {
    let endpoint = bind_datagram_with_config(&args.address, ctx.connection.clone())
        .map_err(|err| peer_error("bind failed", err))?;
    info!(local = %endpoint.local_address(), "listening for UDP datagrams");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    let (tx, rx) = mpsc::channel();
    let worker = endpoint
        .start_receiving_shared(forward_events(tx, args.echo))
        .map_err(|err| peer_error("receive failed", err))?;

    print_until(&rx, args.count, &running, ctx.format);

    endpoint.close();
    let _ = worker.join();

    Ok(SUCCESS)
}
