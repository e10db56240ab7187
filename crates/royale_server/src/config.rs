//! Server configuration.
//!
//! [`ServerArgs`] is the command line; it splits into the plain config
//! structs each part of the server takes, so tests can build those directly.

use clap::{Parser, ValueEnum};
use royale_net::connection::{DEFAULT_NATS_URL, NATS_URL_ENV};
use royale_net::messages::MapLayout;

use crate::broadcast::BroadcastConfig;
use crate::tick::TickConfig;

/// First entity id handed to a client. Ids below are left for server-owned
/// entities.
pub const FIRST_CLIENT_ENTITY: u32 = 1_000;

/// Where the broadcaster reads each client's main-entity position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LookupStrategy {
    /// The component store, as of the last applied command.
    #[default]
    Store,
    /// The active-player registry, updated as soon as a report arrives.
    Registry,
}

/// Parse a tick rate, rejecting anything that is not a positive finite number.
fn parse_tick_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("tick rate must be positive, got {s}"))
    }
}

/// Command line of the royale server.
#[derive(Debug, Clone, Parser)]
#[command(name = "royale_server", about = "Authoritative royale session server over NATS")]
pub struct ServerArgs {
    /// NATS server URL
    #[arg(long, env = NATS_URL_ENV, default_value = DEFAULT_NATS_URL)]
    pub nats_url: String,

    /// Broadcast ticks per second
    #[arg(long, default_value_t = 60.0, value_parser = parse_tick_rate)]
    pub tick_rate: f64,

    /// Stop after this many ticks (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    pub max_ticks: u64,

    /// Half-width of a client's view, in cells
    #[arg(long, default_value_t = 80)]
    pub viewport_width: u16,

    /// Half-height of a client's view, in cells
    #[arg(long, default_value_t = 24)]
    pub viewport_height: u16,

    /// Source of main-entity positions for visibility checks
    #[arg(long, value_enum, default_value_t = LookupStrategy::Store)]
    pub lookup: LookupStrategy,

    /// Entity ids reserved per client
    #[arg(long, default_value_t = 10)]
    pub entities_per_client: u32,

    /// Board width in cells
    #[arg(long, default_value_t = 500)]
    pub board_width: u16,

    /// Board height in cells
    #[arg(long, default_value_t = 500)]
    pub board_height: u16,
}

impl ServerArgs {
    /// Tick loop settings.
    #[must_use]
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            tick_rate: self.tick_rate,
            max_ticks: self.max_ticks,
        }
    }

    /// Broadcast settings.
    #[must_use]
    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig::default()
            .with_viewport(self.viewport_width, self.viewport_height)
            .with_lookup(self.lookup)
    }

    /// The board.
    #[must_use]
    pub fn map(&self) -> MapLayout {
        MapLayout {
            width: self.board_width,
            height: self.board_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = ServerArgs::parse_from(["royale_server"]);
        assert_eq!(args.viewport_width, 80);
        assert_eq!(args.viewport_height, 24);
        assert_eq!(args.lookup, LookupStrategy::Store);
        assert_eq!(args.entities_per_client, 10);
        assert_eq!(args.map(), MapLayout { width: 500, height: 500 });
        assert_eq!(args.tick_config().max_ticks, 0);
    }

    #[test]
    fn test_registry_lookup_flag() {
        let args = ServerArgs::parse_from([
            "royale_server",
            "--lookup",
            "registry",
            "--viewport-width",
            "40",
        ]);
        let config = args.broadcast_config();
        assert_eq!(config.lookup, LookupStrategy::Registry);
        assert_eq!(config.viewport_width, 40);
        assert_eq!(config.viewport_height, 24);
    }

    #[test]
    fn test_non_positive_tick_rate_rejected() {
        for rate in ["0", "-5", "NaN", "fast"] {
            let parsed = ServerArgs::try_parse_from(["royale_server", "--tick-rate", rate]);
            assert!(parsed.is_err(), "accepted tick rate {rate}");
        }
        let parsed = ServerArgs::try_parse_from(["royale_server", "--tick-rate", "0.5"]).unwrap();
        assert_eq!(parsed.tick_rate, 0.5);
    }
}
