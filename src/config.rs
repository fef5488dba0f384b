//! Relay configuration.
//!
//! Settings are layered, lowest precedence first: built-in defaults, an
//! optional TOML file, `STEPWATCH_*` environment variables, then command
//! line flags.
//!
//! ```toml
//! listen = "0.0.0.0:7450"
//! broker_url = "amqp://127.0.0.1:5672/%2f"
//! queue = "stepwatch.activity"
//! username = "monitor"
//! password = "secret"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use stepwatch_forwarder::BrokerConfig;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:7450";
pub const DEFAULT_BROKER_URL: &str = "amqp://127.0.0.1:5672/%2f";
pub const DEFAULT_QUEUE: &str = "stepwatch.activity";

/// Everything the relay needs to run.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Address agents connect to.
    pub listen: String,
    #[serde(flatten)]
    pub broker: BrokerConfig,
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub listen: Option<String>,
    pub broker_url: Option<String>,
    pub queue: Option<String>,
}

impl RelayConfig {
    /// Load settings from `path` (if given), the environment and `overrides`.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(path, overrides, Environment::with_prefix("STEPWATCH"))
    }

    fn load_with_env(
        path: Option<&Path>,
        overrides: &Overrides,
        environment: Environment,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("listen", DEFAULT_LISTEN)?
            .set_default("broker_url", DEFAULT_BROKER_URL)?
            .set_default("queue", DEFAULT_QUEUE)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(environment)
            .set_override_option("listen", overrides.listen.clone())?
            .set_override_option("broker_url", overrides.broker_url.clone())?
            .set_override_option("queue", overrides.queue.clone())?
            .build()
            .with_context(|| match path {
                Some(path) => format!("Failed to load config from {}", path.display()),
                None => "Failed to load config".to_string(),
            })?;

        let relay: RelayConfig = config
            .try_deserialize()
            .context("Invalid relay configuration")?;
        relay.broker.validate()?;
        Ok(relay)
    }
}
