// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Processing
//!
//! The per-delivery half of the daemon: hand the message to the processing
//! capability, translate its verdict into an ack or a nack, then notify the
//! observer. Each delivery is processed inside a consumer span.

use crate::{
    channel::BrokerChannel,
    errors::AmqpError,
    handler::{ConsumptionObserver, MessageConsumer},
    message::Message,
    otel,
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// Everything needed to settle one delivery.
pub(crate) struct Settlement<'a> {
    pub(crate) queue: &'a str,
    pub(crate) requeue: bool,
    pub(crate) channel: &'a dyn BrokerChannel,
    pub(crate) consumer: &'a dyn MessageConsumer,
    pub(crate) observer: Option<&'a dyn ConsumptionObserver>,
}

/// Processes one delivered message.
///
/// `Ok(true)` from the consumer acks the message, `Ok(false)` nacks it with
/// the requeue policy, and the observer is notified after either. A consumer
/// error or a failing ack/nack is returned; the message then stays
/// unacknowledged and the observer is not notified.
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    message: &Message,
    settlement: &Settlement<'_>,
) -> Result<(), AmqpError> {
    let (_ctx, mut span) = otel::new_span(&message.headers, tracer, settlement.queue);

    debug!(
        delivery_tag = message.delivery_tag,
        redelivered = message.redelivered,
        "received: {} - exchange: {}",
        message.routing_key,
        message.exchange,
    );

    let processed = match settlement.consumer.consume(message).await {
        Ok(processed) => processed,
        Err(err) => {
            let err = AmqpError::from(err);
            error!(error = err.to_string(), "message consumer failed");
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("message consumer failed"),
            });
            return Err(err);
        }
    };

    let settled = if processed {
        debug!("message successfully processed");
        settlement.channel.ack(message.delivery_tag).await
    } else {
        warn!(
            requeue = settlement.requeue,
            "message was not processed, rejecting"
        );
        settlement
            .channel
            .nack(message.delivery_tag, settlement.requeue)
            .await
    };

    if let Err(err) = settled {
        span.record_error(&err);
        span.set_status(Status::Error {
            description: Cow::from("error to settle msg"),
        });
        return Err(err);
    }

    if processed {
        span.set_status(Status::Ok);
    } else {
        span.set_status(Status::Error {
            description: Cow::from("message rejected"),
        });
    }

    if let Some(observer) = settlement.observer {
        observer.notify();
    }

    Ok(())
}
