//! # royale_client
//!
//! Headless client: reads `w`/`a`/`s`/`d` (move) and `f` (drop an object)
//! from stdin, one command per character, and logs what it sees. EOF or
//! Ctrl-C leaves the session.

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use royale_client::{ClientArgs, ClientRunner, Direction, Event};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("royale_client=info".parse()?),
        )
        .init();
    install_panic_hook();

    let args = ClientArgs::parse();
    let runner = ClientRunner::new(args.config());
    info!(client_id = %runner.client_id(), "royale client starting");

    let (input_tx, input_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_keys(input_tx));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    };
    runner.run(input_rx, shutdown).await
}

/// Forward stdin keys as events until EOF.
async fn read_keys(events: mpsc::UnboundedSender<Event>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                for key in line.chars() {
                    let event = match key {
                        'f' | 'F' => Event::Spawn(b'*'),
                        other => match Direction::from_key(other) {
                            Some(direction) => Event::Input(direction),
                            None => continue,
                        },
                    };
                    if events.send(event).is_err() {
                        return;
                    }
                }
            }
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                return;
            }
        }
    }
}

/// Route panics through `tracing` so they land in the same log stream.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!(%panic_info, "panic");
        default_hook(panic_info);
    }));
}
