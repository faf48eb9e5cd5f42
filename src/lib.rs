// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod consumer;
mod otel;

pub mod channel;
pub mod configs;
pub mod connection;
pub mod daemon;
pub mod errors;
pub mod exchange;
pub mod handler;
pub mod logging;
pub mod message;
pub mod publisher;
pub mod queue;
pub mod shutdown;
pub mod topology;
