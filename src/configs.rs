// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Configuration
//!
//! Broker settings plus the consumer and publisher configuration surfaces.
//! All of them deserialize with `serde` so they can be loaded from the
//! environment with [`from_env`]; builders cover programmatic construction.
//! Configuration is fixed once handed to a daemon or publisher.

use crate::{errors::AmqpError, exchange::ExchangeKind};
use figment::{providers::Env, Figment};
use serde::{de::DeserializeOwned, Deserialize};
use uuid::Uuid;

/// Environment prefix for [`RabbitMQConfigs`].
pub const RABBITMQ_ENV_PREFIX: &str = "RABBITMQ_";

/// Loads any configuration struct from variables starting with `prefix`.
///
/// `PREFIX_QUEUE=orders` populates the `queue` field.
pub fn from_env<T: DeserializeOwned>(prefix: &str) -> Result<T, AmqpError> {
    Figment::new()
        .merge(Env::prefixed(prefix))
        .extract()
        .map_err(|err| AmqpError::ConfigsError(err.to_string()))
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    /// Reported to the broker as the connection name.
    pub app_name: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
            app_name: "rabbitmq-daemon".to_owned(),
        }
    }
}

impl RabbitMQConfigs {
    /// Loads the settings from `RABBITMQ_*` variables, defaulting missing ones.
    pub fn from_env() -> Result<RabbitMQConfigs, AmqpError> {
        from_env(RABBITMQ_ENV_PREFIX)
    }

    /// AMQP URI for these settings. The default vhost `/` is percent-encoded.
    pub fn uri(&self) -> String {
        let vhost = self.vhost.trim_start_matches('/');
        let vhost = if vhost.is_empty() { "%2f" } else { vhost };

        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, vhost
        )
    }
}

fn default_requeue() -> bool {
    true
}

/// Configuration of a [`crate::daemon::ConsumerDaemon`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConsumerConfigs {
    pub queue: String,
    #[serde(default)]
    pub durable: bool,
    /// Unacknowledged bytes in flight, 0 = unlimited.
    #[serde(default)]
    pub prefetch_size: u32,
    /// Unacknowledged messages in flight, 0 = unlimited.
    #[serde(default)]
    pub prefetch_count: u16,
    /// When set, the queue is bound to this exchange.
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub routing_key: Option<String>,
    /// Whether messages the consumer rejects are redelivered.
    #[serde(default = "default_requeue")]
    pub requeue: bool,
    #[serde(default)]
    pub consumer_tag: Option<String>,
}

impl ConsumerConfigs {
    pub fn new(queue: &str) -> ConsumerConfigs {
        ConsumerConfigs {
            queue: queue.to_owned(),
            durable: false,
            prefetch_size: 0,
            prefetch_count: 0,
            exchange: None,
            routing_key: None,
            requeue: true,
            consumer_tag: None,
        }
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn prefetch(mut self, size: u32, count: u16) -> Self {
        self.prefetch_size = size;
        self.prefetch_count = count;
        self
    }

    /// Binds the queue to `exchange` with `routing_key`.
    pub fn bind(mut self, exchange: &str, routing_key: &str) -> Self {
        self.exchange = Some(exchange.to_owned());
        self.routing_key = Some(routing_key.to_owned());
        self
    }

    pub fn requeue(mut self, requeue: bool) -> Self {
        self.requeue = requeue;
        self
    }

    pub fn consumer_tag(mut self, tag: &str) -> Self {
        self.consumer_tag = Some(tag.to_owned());
        self
    }

    /// The configured consumer tag, or a random one.
    pub(crate) fn resolve_consumer_tag(&self) -> String {
        match &self.consumer_tag {
            Some(tag) => tag.clone(),
            None => format!("{}-{}", self.queue, Uuid::new_v4()),
        }
    }
}

/// Configuration of a [`crate::publisher::Publisher`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublisherConfigs {
    /// Queue declared when no exchange is configured, and the default routing key.
    pub queue: String,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub exchange_kind: ExchangeKind,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub dead_letter_exchange: Option<String>,
}

impl PublisherConfigs {
    pub fn new(queue: &str) -> PublisherConfigs {
        PublisherConfigs {
            queue: queue.to_owned(),
            exchange: None,
            exchange_kind: ExchangeKind::Direct,
            durable: false,
            dead_letter_exchange: None,
        }
    }

    pub fn exchange(mut self, name: &str, kind: ExchangeKind) -> Self {
        self.exchange = Some(name.to_owned());
        self.exchange_kind = kind;
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn dead_letter_exchange(mut self, name: &str) -> Self {
        self.dead_letter_exchange = Some(name.to_owned());
        self
    }
}
