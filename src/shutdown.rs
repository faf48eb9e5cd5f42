// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Graceful Shutdown
//!
//! `ShutdownSignal` is the cancellation token shared between the receive loop
//! and whoever asks it to stop. Its flag is raised *before* the connection is
//! closed, so the loop can tell a requested close from a broker fault without
//! looking at error text.
//!
//! On unix hosts SIGINT and SIGTERM are converted into a shutdown request by a
//! background task; elsewhere signal registration is a no-op.

use crate::connection::BrokerConnection;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Cloneable cancellation token observed by the receive loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> ShutdownSignal {
        ShutdownSignal::default()
    }

    /// Marks shutdown as requested and wakes every waiter.
    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await
    }
}

/// Requests shutdown, then closes the connection so pending waits return.
pub async fn stop_connection(shutdown: &ShutdownSignal, connection: &dyn BrokerConnection) {
    shutdown.request();
    if let Err(err) = connection.stop().await {
        error!(error = err.to_string(), "failure to stop the connection");
    }
}

/// Converts SIGINT and SIGTERM into [`stop_connection`].
///
/// Returns the handler task so the caller can abort it once it stops
/// listening.
///
/// Tokio keeps its process-wide handlers for both signals installed after the
/// task is aborted, so SIGINT and SIGTERM no longer terminate the process on
/// their own. Hosts that outlive `engage` must handle them themselves.
#[cfg(unix)]
pub fn register_signal_handlers(
    shutdown: ShutdownSignal,
    connection: Arc<dyn BrokerConnection>,
) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = err.to_string(), "failed to install SIGINT handler");
            return None;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = err.to_string(), "failed to install SIGTERM handler");
            return None;
        }
    };

    debug!("signal handlers registered");

    Some(tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, stopping"),
            _ = sigterm.recv() => info!("SIGTERM received, stopping"),
        }
        stop_connection(&shutdown, connection.as_ref()).await;
    }))
}

#[cfg(not(unix))]
pub fn register_signal_handlers(
    _shutdown: ShutdownSignal,
    _connection: Arc<dyn BrokerConnection>,
) -> Option<JoinHandle<()>> {
    debug!("signal handling is not supported on this platform");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection::MockBrokerConnection, errors::AmqpError};
    use std::time::Duration;

    #[tokio::test]
    async fn request_wakes_waiters() {
        let shutdown = ShutdownSignal::new();
        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.requested().await })
        };

        tokio::task::yield_now().await;
        assert!(!shutdown.is_requested());

        shutdown.request();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke up")
            .expect("waiter task");
        assert!(shutdown.is_requested());
    }

    #[tokio::test]
    async fn already_requested_resolves_immediately() {
        let shutdown = ShutdownSignal::new();
        shutdown.request();

        tokio::time::timeout(Duration::from_millis(100), shutdown.requested())
            .await
            .expect("resolved");
    }

    #[tokio::test]
    async fn flag_is_raised_before_the_connection_stops() {
        let shutdown = ShutdownSignal::new();
        let mut conn = MockBrokerConnection::new();
        let observed = shutdown.clone();
        conn.expect_stop().times(1).returning(move || {
            assert!(observed.is_requested());
            Ok(())
        });

        stop_connection(&shutdown, &conn).await;
    }

    #[tokio::test]
    async fn stop_failure_is_logged_not_raised() {
        let shutdown = ShutdownSignal::new();
        let mut conn = MockBrokerConnection::new();
        conn.expect_stop()
            .times(1)
            .returning(|| Err(AmqpError::StopConnectionError("socket gone".to_owned())));

        stop_connection(&shutdown, &conn).await;
        assert!(shutdown.is_requested());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn handler_task_can_be_aborted() {
        let conn: Arc<dyn BrokerConnection> = Arc::new(MockBrokerConnection::new());
        let handle = register_signal_handlers(ShutdownSignal::new(), conn).expect("handlers");

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
