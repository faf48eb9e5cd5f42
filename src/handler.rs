// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Processing Capabilities
//!
//! Traits implemented by the embedding application: the business logic that
//! decides whether a message was processed, and an optional observer told
//! about every completed message.

use crate::{errors::ProcessingError, message::Message};
use async_trait::async_trait;

/// Business logic driven by the consumer daemon.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Processes one message.
    ///
    /// `Ok(true)` acknowledges the message, `Ok(false)` rejects it with the
    /// daemon's requeue policy. An `Err` is fatal: the daemon stops and leaves
    /// the message unacknowledged.
    async fn consume(&self, message: &Message) -> Result<bool, ProcessingError>;
}

/// Told once per message after it was acked or nacked.
///
/// Must not block; the daemon waits for `notify` before the next delivery.
pub trait ConsumptionObserver: Send + Sync {
    fn notify(&self);
}
