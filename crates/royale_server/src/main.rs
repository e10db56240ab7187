//! # royale_server
//!
//! The authoritative side of a royale session. It owns the component store
//! and every client's entity range, applies client reports between ticks,
//! and each tick relays the positions of synced entities to the clients
//! that can see them.
//!
//! ## Startup Sequence
//!
//! 1. Parse `ServerArgs` (the NATS URL falls back to `NATS_URL`, then
//!    `nats://localhost:4222`).
//! 2. Connect to NATS and subscribe to `royale.session.inbound`.
//! 3. Enter the fixed-timestep tick loop until interrupted.

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use royale_net::NatsConnection;
use royale_server::broadcast::Broadcaster;
use royale_server::config::{FIRST_CLIENT_ENTITY, ServerArgs};
use royale_server::gateway::{Gateway, spawn_control_publisher};
use royale_server::lookup::ActivePlayers;
use royale_server::session::ServerSession;
use royale_server::tick::TickLoop;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("royale_server=info".parse()?),
        )
        .init();
    install_panic_hook();

    let args = ServerArgs::parse();
    info!(
        tick_rate = args.tick_rate,
        lookup = ?args.lookup,
        board_width = args.board_width,
        board_height = args.board_height,
        "royale server starting"
    );

    let conn = NatsConnection::connect_to(&args.nats_url).await?;

    let players = ActivePlayers::new();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (control_tx, control_rx) = mpsc::unbounded_channel();

    let session = ServerSession::new(
        args.map(),
        FIRST_CLIENT_ENTITY,
        args.entities_per_client,
        players.clone(),
        control_tx,
    );
    let broadcaster = Broadcaster::new(args.broadcast_config(), &players);
    let mut tick_loop = TickLoop::new(args.tick_config(), session, broadcaster, command_rx);

    spawn_control_publisher(conn.clone(), control_rx);
    let gateway = Gateway::new(conn, command_tx, players, args.map());
    let mut gateway_task = tokio::spawn(gateway.run());

    tokio::select! {
        () = tick_loop.run() => {}
        joined = &mut gateway_task => match joined {
            Ok(Ok(())) => info!("gateway finished"),
            Ok(Err(e)) => error!(error = %e, "gateway failed"),
            Err(e) => error!(error = %e, "gateway task aborted"),
        },
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown requested");
        }
    }

    gateway_task.abort();
    info!(ticks = tick_loop.tick_id(), "royale server shut down");
    Ok(())
}

/// Route panics through `tracing` so they land in the same log stream.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(%panic_info, "panic");
        default_hook(panic_info);
    }));
}
