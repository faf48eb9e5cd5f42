// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! `Publisher` provisions its topology lazily: the first `publish` call
//! connects, opens a channel and declares the exchange (or the queue) plus the
//! optional dead-letter exchange. Later calls reuse that channel. Messages are
//! sent persistent, with the current trace context injected in the headers.
//!
//! Failures are returned to the caller as they happen; nothing is retried,
//! buffered or reordered. A failed initialization leaves the publisher
//! uninitialized.

use crate::{
    channel::{BrokerChannel, OutgoingMessage},
    configs::PublisherConfigs,
    connection::BrokerConnection,
    errors::AmqpError,
    exchange::{ExchangeDefinition, ExchangeKind},
    otel,
    queue::QueueDefinition,
    topology::AmqpTopology,
};
use opentelemetry::Context;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::OnceCell;
use tracing::debug;

/// Publisher bound to one exchange (or the default exchange and one queue).
pub struct Publisher {
    cfg: PublisherConfigs,
    connection: Arc<dyn BrokerConnection>,
    channel: OnceCell<Arc<dyn BrokerChannel>>,
}

impl Publisher {
    /// Creates a publisher. Nothing touches the broker until the first publish.
    pub fn new(cfg: PublisherConfigs, connection: Arc<dyn BrokerConnection>) -> Publisher {
        Publisher {
            cfg,
            connection,
            channel: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.channel.initialized()
    }

    /// Publishes `payload` with `routing_key`, or the configured queue name
    /// when no (or an empty) key is given.
    pub async fn publish(
        &self,
        payload: &[u8],
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError> {
        self.publish_with_headers(payload, BTreeMap::new(), routing_key)
            .await
    }

    /// Like [`Publisher::publish`], carrying additional text headers.
    pub async fn publish_with_headers(
        &self,
        payload: &[u8],
        mut headers: BTreeMap<String, String>,
        routing_key: Option<&str>,
    ) -> Result<(), AmqpError> {
        let channel = self
            .channel
            .get_or_try_init(|| self.initialize())
            .await?;

        otel::inject_context(&Context::current(), &mut headers);

        let msg = OutgoingMessage {
            exchange: self.cfg.exchange.clone().unwrap_or_default(),
            routing_key: self.routing_key(routing_key).to_owned(),
            payload: payload.to_vec(),
            headers,
            persistent: true,
        };

        debug!(
            exchange = %msg.exchange,
            routing_key = %msg.routing_key,
            "publishing message"
        );

        channel.publish(&msg).await
    }

    fn routing_key<'a>(&'a self, routing_key: Option<&'a str>) -> &'a str {
        match routing_key {
            Some(key) if !key.is_empty() => key,
            _ => &self.cfg.queue,
        }
    }

    async fn initialize(&self) -> Result<Arc<dyn BrokerChannel>, AmqpError> {
        debug!("initializing publisher...");

        if !self.connection.is_connected().await {
            self.connection.connect().await?;
        }
        let channel = self.connection.open_channel().await?;

        let topology = AmqpTopology::new(channel.clone());
        let topology = match &self.cfg.exchange {
            Some(exchange) => topology.exchange(
                ExchangeDefinition::new(exchange)
                    .kind(self.cfg.exchange_kind.clone())
                    .with_durable(self.cfg.durable),
            ),
            None => {
                let mut queue =
                    QueueDefinition::new(&self.cfg.queue).with_durable(self.cfg.durable);
                if let Some(dlx) = &self.cfg.dead_letter_exchange {
                    queue = queue.dead_letter_exchange(dlx);
                }
                topology.queue(queue)
            }
        };
        topology.install().await?;

        // The dead-letter exchange follows the entity that routes to it.
        if let Some(dlx) = &self.cfg.dead_letter_exchange {
            AmqpTopology::new(channel.clone())
                .exchange(
                    ExchangeDefinition::new(dlx)
                        .kind(ExchangeKind::Direct)
                        .with_durable(self.cfg.durable),
                )
                .install()
                .await?;
        }

        debug!("publisher initialized");
        Ok(channel)
    }
}
