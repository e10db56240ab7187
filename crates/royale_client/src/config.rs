//! Client configuration.

use clap::Parser;
use royale_net::connection::{DEFAULT_NATS_URL, NATS_URL_ENV};

/// Configuration for a client process.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Optional NATS URL override (defaults to `NATS_URL` env or localhost).
    pub nats_url: Option<String>,
    /// Processing passes per second.
    pub tick_rate: f64,
    /// Top-left glyph cell of the player entity.
    pub glyph: u8,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nats_url: None,
            tick_rate: 30.0,
            glyph: b'@',
        }
    }
}

impl ClientConfig {
    /// Override the NATS URL.
    #[must_use]
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// Override the tick rate.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Override the player glyph.
    #[must_use]
    pub fn with_glyph(mut self, glyph: u8) -> Self {
        self.glyph = glyph;
        self
    }

    /// The NATS URL to connect to.
    #[must_use]
    pub fn nats_url(&self) -> &str {
        self.nats_url.as_deref().unwrap_or(DEFAULT_NATS_URL)
    }
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

/// Command line of the royale client.
#[derive(Debug, Clone, Parser)]
#[command(name = "royale_client", about = "Royale session client over NATS")]
pub struct ClientArgs {
    /// NATS server URL
    #[arg(long, env = NATS_URL_ENV, default_value = DEFAULT_NATS_URL)]
    pub nats_url: String,

    /// Processing passes per second
    #[arg(long, default_value_t = 30.0, value_parser = parse_tick_rate)]
    pub tick_rate: f64,

    /// Character drawn for the player
    #[arg(long, default_value_t = '@')]
    pub glyph: char,
}

impl ClientArgs {
    /// Build the library config. Non-ASCII glyphs fall back to `'@'`.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let glyph = if self.glyph.is_ascii() {
            self.glyph as u8
        } else {
            b'@'
        };
        ClientConfig::default()
            .with_nats_url(self.nats_url.clone())
            .with_tick_rate(self.tick_rate)
            .with_glyph(glyph)
    }
}
