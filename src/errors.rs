// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the RabbitMQ Daemon
//!
//! This module provides the error types surfaced by the consumer daemon and the
//! publisher. `AmqpError` represents every failure that can occur while
//! connecting, declaring topology, publishing, consuming or acknowledging.
//! A graceful, signal-triggered shutdown is never an error: `engage` simply
//! returns `Ok(())`.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
///
/// Each variant names the operation that failed. Connection and delivery
/// failures keep the `lapin::Error` as their source; the other variants carry
/// the cause (or the entity involved) as text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmqpError {
    /// Error loading the configuration
    #[error("failure to load configs `{0}`")]
    ConfigsError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError(#[source] lapin::Error),

    /// The connection is not established when an operation requires it
    #[error("connection is not established")]
    NotConnectedError,

    /// Error closing the connection
    #[error("failure to stop the connection `{0}`")]
    StopConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel `{0}`")]
    ChannelError(String),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{1}` to exchange `{0}`")]
    BindingExchangeToQueueError(String, String),

    /// Error registering the consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    ConsumerDeclarationError(String),

    /// Error publishing a message
    #[error("failure to publish `{0}`")]
    PublishingError(String),

    /// Error acknowledging a message
    #[error("failure to ack message `{0}`")]
    AckMessageError(String),

    /// Error negative-acknowledging a message
    #[error("failure to nack message `{0}`")]
    NackMessageError(String),

    /// The delivery stream ended without a shutdown request
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// The broker transport failed while delivering messages
    #[error(transparent)]
    TransportError(#[from] lapin::Error),

    /// The processing capability raised instead of returning a verdict
    #[error("failure to process message `{0}`")]
    ProcessingError(String),
}

/// Coarse classification of an [`AmqpError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection, channel, qos, publish, ack/nack or delivery failures.
    Transport,
    /// Declare or bind failures during setup.
    Topology,
    /// The processing capability failed unexpectedly.
    Processing,
    /// Configuration could not be loaded.
    Configuration,
}

impl AmqpError {
    /// Classifies the error. Every kind is fatal: nothing in this crate retries.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmqpError::ConfigsError(_) => ErrorKind::Configuration,
            AmqpError::DeclareExchangeError(_)
            | AmqpError::DeclareQueueError(_)
            | AmqpError::BindingExchangeToQueueError(_, _) => ErrorKind::Topology,
            AmqpError::ProcessingError(_) => ErrorKind::Processing,
            _ => ErrorKind::Transport,
        }
    }
}

/// Error raised by a [`crate::handler::MessageConsumer`] for unexpected failures.
///
/// Expected processing failures are reported with `Ok(false)` instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProcessingError(pub String);

impl ProcessingError {
    pub fn new(msg: impl Into<String>) -> Self {
        ProcessingError(msg.into())
    }
}

impl From<ProcessingError> for AmqpError {
    fn from(err: ProcessingError) -> Self {
        AmqpError::ProcessingError(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(
            AmqpError::DeclareQueueError("orders".to_owned()).kind(),
            ErrorKind::Topology
        );
        assert_eq!(
            AmqpError::BindingExchangeToQueueError("events".to_owned(), "orders".to_owned())
                .kind(),
            ErrorKind::Topology
        );
        assert_eq!(
            AmqpError::ConsumerError("connection reset".to_owned()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            AmqpError::QoSDeclarationError("channel closed".to_owned()).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            AmqpError::from(ProcessingError::new("boom")).kind(),
            ErrorKind::Processing
        );
    }

    #[test]
    fn transport_error_keeps_the_lapin_cause() {
        let cause = lapin::Error::InvalidConnectionState(lapin::ConnectionState::Closed);
        let err = AmqpError::from(cause.clone());

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), cause.to_string());
        assert!(matches!(&err, AmqpError::TransportError(inner) if *inner == cause));

        let err = AmqpError::ConnectionError(cause.clone());
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), cause.to_string());
    }

    #[test]
    fn binding_error_names_both_sides() {
        let err = AmqpError::BindingExchangeToQueueError("events".to_owned(), "orders".to_owned());
        assert_eq!(
            err.to_string(),
            "failure to bind queue `orders` to exchange `events`"
        );
    }
}
