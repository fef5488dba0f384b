//! AMQP publisher (RabbitMQ and compatible brokers).
//!
//! Documents are published through the default exchange straight to the
//! configured queue, as non-persistent `application/json` messages.
//!
//! ```rust,no_run
//! use stepwatch_forwarder::amqp::{AmqpPublisher, BrokerConfig};
//! use stepwatch_forwarder::Forwarder;
//!
//! # async fn example() -> Result<(), stepwatch_forwarder::ForwarderError> {
//! let config = BrokerConfig::new("amqp://127.0.0.1:5672/%2f", "stepwatch.activity");
//! let publisher = AmqpPublisher::connect(&config).await?;
//! let forwarder = Forwarder::new(publisher);
//! // ...
//! forwarder.close().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::uri::AMQPUri;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ForwarderError;
use crate::publisher::Publisher;

/// AMQP delivery mode for messages the broker may drop on restart.
const NON_PERSISTENT: u8 = 1;

/// Connection settings for the broker.
#[derive(Clone, Deserialize)]
pub struct BrokerConfig {
    /// Broker URI, e.g. `amqp://host:5672/%2f`.
    pub broker_url: String,
    /// Queue the documents are delivered to.
    pub queue: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl BrokerConfig {
    pub fn new(broker_url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            queue: queue.into(),
            username: None,
            password: None,
        }
    }

    /// Override the credentials carried in the URI.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// The broker URI with any configured credentials applied.
    pub fn uri(&self) -> Result<AMQPUri, ForwarderError> {
        let mut uri: AMQPUri = self
            .broker_url
            .parse()
            .map_err(|err: String| ForwarderError::Config(format!("{}: {}", self.broker_url, err)))?;
        if let Some(username) = &self.username {
            uri.authority.userinfo.username = username.clone();
        }
        if let Some(password) = &self.password {
            uri.authority.userinfo.password = password.clone();
        }
        Ok(uri)
    }

    pub fn validate(&self) -> Result<(), ForwarderError> {
        if self.queue.trim().is_empty() {
            return Err(ForwarderError::Config("queue name is empty".to_string()));
        }
        self.uri().map(|_| ())
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("broker_url", &self.broker_url)
            .field("queue", &self.queue)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Publishes forward documents to an AMQP queue.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Channel,
    queue: String,
}

impl AmqpPublisher {
    /// Connect to the broker, open a channel and declare the queue.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, ForwarderError> {
        config.validate()?;
        let uri = config.uri()?;

        info!(
            host = %uri.authority.host,
            port = uri.authority.port,
            queue = %config.queue,
            "Connecting to broker"
        );

        let connection = Connection::connect_uri(uri, ConnectionProperties::default())
            .await
            .map_err(|err| ForwarderError::Connection(err.to_string()))?;
        let channel = connection.create_channel().await?;
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions::default(),
                FieldTable::default(),
            )
            .await?;

        debug!(queue = %config.queue, "Declared queue");

        Ok(Self {
            connection,
            channel,
            queue: config.queue.clone(),
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl std::fmt::Debug for AmqpPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpPublisher")
            .field("queue", &self.queue)
            .field("connected", &self.connection.status().connected())
            .finish()
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, payload: &str) -> Result<(), ForwarderError> {
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(NON_PERSISTENT);

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                properties,
            )
            .await?
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ForwarderError> {
        // Close the channel first; still try the connection if that fails
        let channel = self.channel.close(200, "OK").await;
        if let Err(err) = &channel {
            warn!(error = %err, "Failed to close broker channel");
        }
        self.connection.close(200, "OK").await?;
        channel.map_err(ForwarderError::from)
    }
}
