// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! SIGTERM delivered to the process while `engage` waits for deliveries.
//!
//! Lives in its own test binary: the signal reaches every handler registered
//! in the process.

#![cfg(unix)]

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use rabbitmq_daemon::{
    channel::{BrokerChannel, Deliveries, OutgoingMessage},
    configs::ConsumerConfigs,
    connection::BrokerConnection,
    daemon::ConsumerDaemon,
    errors::{AmqpError, ProcessingError},
    exchange::ExchangeDefinition,
    handler::MessageConsumer,
    message::Message,
    queue::{QueueBinding, QueueDefinition},
};
use std::{
    process::Command,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::oneshot;

/// Channel whose delivery stream never yields; reports when consuming starts.
struct IdleChannel {
    consuming: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl BrokerChannel for IdleChannel {
    async fn set_qos(&self, _prefetch_size: u32, _prefetch_count: u16) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn declare_queue(&self, _def: &QueueDefinition) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn declare_exchange(&self, _def: &ExchangeDefinition) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn bind_queue(&self, _binding: &QueueBinding) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn publish(&self, _msg: &OutgoingMessage) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn ack(&self, _delivery_tag: u64) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn nack(&self, _delivery_tag: u64, _requeue: bool) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn consume(&self, _queue: &str, _consumer_tag: &str) -> Result<Deliveries, AmqpError> {
        if let Some(tx) = self.consuming.lock().unwrap().take() {
            let _ = tx.send(());
        }
        Ok(stream::pending().boxed())
    }
}

struct CountingConnection {
    channel: Arc<IdleChannel>,
    stops: AtomicUsize,
}

#[async_trait]
impl BrokerConnection for CountingConnection {
    async fn connect(&self) -> Result<(), AmqpError> {
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn stop(&self) -> Result<(), AmqpError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, AmqpError> {
        let channel: Arc<dyn BrokerChannel> = self.channel.clone();
        Ok(channel)
    }
}

struct Unreachable;

#[async_trait]
impl MessageConsumer for Unreachable {
    async fn consume(&self, _message: &Message) -> Result<bool, ProcessingError> {
        Err(ProcessingError::new("no message expected"))
    }
}

#[tokio::test]
async fn sigterm_stops_a_blocked_daemon() {
    let (tx, consuming) = oneshot::channel();
    let conn = Arc::new(CountingConnection {
        channel: Arc::new(IdleChannel {
            consuming: Mutex::new(Some(tx)),
        }),
        stops: AtomicUsize::new(0),
    });
    let daemon = ConsumerDaemon::new(
        ConsumerConfigs::new("orders"),
        conn.clone(),
        Arc::new(Unreachable),
    );
    let shutdown = daemon.shutdown_handle();

    let running = tokio::spawn(async move { daemon.engage().await });

    // Handlers are registered before the consumer, so the signal is caught.
    tokio::time::timeout(Duration::from_secs(1), consuming)
        .await
        .expect("daemon reached the receive loop")
        .expect("consume called");

    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("kill runs");
    assert!(status.success());

    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("engage returned")
        .expect("engage task");

    assert_eq!(result, Ok(()));
    assert!(shutdown.is_requested());
    assert_eq!(conn.stops.load(Ordering::SeqCst), 1);
}
