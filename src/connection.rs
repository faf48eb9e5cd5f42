// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection Management
//!
//! This module defines the connection capability used by the daemon and the
//! publisher, and its `lapin` implementation. The connection is established
//! lazily by `connect` and closed on request by `stop`; closing it makes every
//! consumer stream on its channels terminate.

use crate::{
    channel::{AmqpChannel, BrokerChannel},
    configs::RabbitMQConfigs,
    errors::AmqpError,
};
use async_trait::async_trait;
use lapin::{types::LongString, Connection, ConnectionProperties};
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// AMQP reply code sent when closing the connection on request
pub const AMQP_REPLY_SUCCESS: u16 = 200;

/// Operations the daemon and the publisher need from a broker connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn connect(&self) -> Result<(), AmqpError>;

    async fn is_connected(&self) -> bool;

    /// Closes the connection. Deliveries pending on its channels end.
    async fn stop(&self) -> Result<(), AmqpError>;

    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, AmqpError>;
}

/// [`BrokerConnection`] backed by a lapin connection.
pub struct AmqpConnection {
    uri: String,
    name: String,
    conn: RwLock<Option<Connection>>,
}

impl AmqpConnection {
    /// Creates an unconnected handle from the broker settings.
    pub fn new(cfg: &RabbitMQConfigs) -> AmqpConnection {
        AmqpConnection {
            uri: cfg.uri(),
            name: cfg.app_name.clone(),
            conn: RwLock::new(None),
        }
    }
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn connect(&self) -> Result<(), AmqpError> {
        let mut guard = self.conn.write().await;
        if guard.as_ref().is_some_and(|c| c.status().connected()) {
            return Ok(());
        }

        debug!("creating amqp connection...");
        let options = ConnectionProperties::default()
            .with_connection_name(LongString::from(self.name.clone()));

        let conn = match Connection::connect(&self.uri, options).await {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "failure to connect");
                Err(AmqpError::ConnectionError(err))
            }
        }?;
        debug!("amqp connected");

        *guard = Some(conn);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.conn
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.status().connected())
    }

    async fn stop(&self) -> Result<(), AmqpError> {
        let guard = self.conn.read().await;
        let Some(conn) = guard.as_ref().filter(|c| c.status().connected()) else {
            debug!("connection already closed");
            return Ok(());
        };

        debug!("closing amqp connection...");
        match conn.close(AMQP_REPLY_SUCCESS, "shutdown requested").await {
            Err(err) => {
                error!(error = err.to_string(), "failure to close the connection");
                Err(AmqpError::StopConnectionError(err.to_string()))
            }
            _ => {
                debug!("amqp connection closed");
                Ok(())
            }
        }
    }

    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, AmqpError> {
        let guard = self.conn.read().await;
        let conn = guard.as_ref().ok_or(AmqpError::NotConnectedError)?;

        debug!("creating amqp channel...");
        match conn.create_channel().await {
            Ok(c) => {
                debug!("channel created");
                Ok(Arc::new(AmqpChannel::new(c)) as Arc<dyn BrokerChannel>)
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(AmqpError::ChannelError(err.to_string()))
            }
        }
    }
}
