// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Daemon
//!
//! `ConsumerDaemon` runs an unattended consumer: it connects, opens one
//! channel, applies the prefetch window, declares (and optionally binds) its
//! queue, installs signal handling, then drives every delivery through the
//! processing capability until shutdown is requested.
//!
//! A requested shutdown is the only graceful exit. The receive loop waits on
//! the shutdown token alongside the delivery stream, and any transport failure
//! observed after the token was raised is treated as the expected consequence
//! of closing the connection. Every other failure is returned unchanged; the
//! daemon never retries or reconnects, that is the supervisor's job.

use crate::{
    channel::BrokerChannel,
    configs::ConsumerConfigs,
    connection::BrokerConnection,
    consumer::{consume, Settlement},
    errors::{AmqpError, ErrorKind},
    handler::{ConsumptionObserver, MessageConsumer},
    queue::{QueueBinding, QueueDefinition},
    shutdown::{register_signal_handlers, stop_connection, ShutdownSignal},
    topology::AmqpTopology,
};
use futures_util::StreamExt;
use opentelemetry::global;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Long-running consumer of a single queue.
pub struct ConsumerDaemon {
    cfg: ConsumerConfigs,
    connection: Arc<dyn BrokerConnection>,
    consumer: Arc<dyn MessageConsumer>,
    observer: Option<Arc<dyn ConsumptionObserver>>,
    shutdown: ShutdownSignal,
}

impl ConsumerDaemon {
    pub fn new(
        cfg: ConsumerConfigs,
        connection: Arc<dyn BrokerConnection>,
        consumer: Arc<dyn MessageConsumer>,
    ) -> ConsumerDaemon {
        ConsumerDaemon {
            cfg,
            connection,
            consumer,
            observer: None,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Notifies `observer` once per settled message.
    pub fn with_observer(mut self, observer: Arc<dyn ConsumptionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Observes `shutdown` instead of a token of its own.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Token that makes `engage` return once requested.
    ///
    /// The token is never reset: after a shutdown, `engage` returns as soon as
    /// it reaches the receive loop.
    pub fn shutdown_handle(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Requests shutdown and closes the connection, like SIGINT/SIGTERM do.
    pub async fn stop(&self) {
        stop_connection(&self.shutdown, self.connection.as_ref()).await;
    }

    /// Runs the daemon until shutdown is requested.
    ///
    /// Returns `Ok(())` on a requested shutdown and the first fatal error
    /// otherwise. Nothing is consumed unless the queue declaration (and the
    /// binding, when an exchange is configured) succeeded.
    pub async fn engage(&self) -> Result<(), AmqpError> {
        self.connect().await?;
        let channel = self.create_channel().await?;
        self.declare_topology(channel.clone()).await?;

        let signals = register_signal_handlers(self.shutdown.clone(), self.connection.clone());

        let result = self.listen_for_messages(channel.as_ref()).await;

        if let Some(handle) = signals {
            handle.abort();
        }

        match &result {
            Ok(()) => info!(queue = %self.cfg.queue, "consumer daemon stopped"),
            Err(err) => error!(
                error = err.to_string(),
                queue = %self.cfg.queue,
                "consumer daemon failed"
            ),
        }

        result
    }

    async fn connect(&self) -> Result<(), AmqpError> {
        if self.connection.is_connected().await {
            debug!("already connected");
            return Ok(());
        }
        self.connection.connect().await
    }

    async fn create_channel(&self) -> Result<Arc<dyn BrokerChannel>, AmqpError> {
        let channel = self.connection.open_channel().await?;
        channel
            .set_qos(self.cfg.prefetch_size, self.cfg.prefetch_count)
            .await?;
        Ok(channel)
    }

    async fn declare_topology(&self, channel: Arc<dyn BrokerChannel>) -> Result<(), AmqpError> {
        let mut topology = AmqpTopology::new(channel)
            .queue(QueueDefinition::new(&self.cfg.queue).with_durable(self.cfg.durable));

        if let Some(exchange) = &self.cfg.exchange {
            topology = topology.queue_binding(
                QueueBinding::new(&self.cfg.queue)
                    .exchange(exchange)
                    .routing_key(self.cfg.routing_key.as_deref().unwrap_or_default()),
            );
        }

        topology.install().await
    }

    async fn listen_for_messages(&self, channel: &dyn BrokerChannel) -> Result<(), AmqpError> {
        let consumer_tag = self.cfg.resolve_consumer_tag();
        let mut deliveries = channel.consume(&self.cfg.queue, &consumer_tag).await?;

        let tracer = global::tracer("amqp consumer");
        let settlement = Settlement {
            queue: &self.cfg.queue,
            requeue: self.cfg.requeue,
            channel,
            consumer: self.consumer.as_ref(),
            observer: self.observer.as_deref(),
        };

        info!(queue = %self.cfg.queue, consumer_tag = %consumer_tag, "waiting for messages");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.requested() => {
                    info!("shutdown requested, leaving the receive loop");
                    return Ok(());
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    if let Err(err) = consume(&tracer, &message, &settlement).await {
                        if err.kind() == ErrorKind::Transport && self.shutdown.is_requested() {
                            debug!(error = err.to_string(), "settlement interrupted by shutdown");
                            return Ok(());
                        }
                        return Err(err);
                    }
                }
                Some(Err(err)) if self.shutdown.is_requested() => {
                    debug!(error = err.to_string(), "delivery stream closed on request");
                    return Ok(());
                }
                Some(Err(err)) => return Err(err),
                None if self.shutdown.is_requested() => return Ok(()),
                None => {
                    return Err(AmqpError::ConsumerError(
                        "delivery stream closed by the broker".to_owned(),
                    ))
                }
            }
        }
    }
}
