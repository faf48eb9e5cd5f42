// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivered Messages
//!
//! `Message` is the broker-independent view of a delivery handed to the
//! processing capability. Payloads stay opaque bytes; header values are
//! rendered as text.

use lapin::{
    message::Delivery,
    types::{AMQPValue, FieldTable, LongString, ShortString},
};
use std::collections::BTreeMap;

/// A message delivered to the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Channel-scoped delivery identity used by ack/nack.
    pub delivery_tag: u64,
    pub payload: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
}

impl Message {
    pub fn new(delivery_tag: u64, payload: &[u8]) -> Message {
        Message {
            delivery_tag,
            payload: payload.to_vec(),
            ..Default::default()
        }
    }
}

impl From<Delivery> for Message {
    fn from(delivery: Delivery) -> Self {
        let headers = delivery
            .properties
            .headers()
            .as_ref()
            .map(table_to_headers)
            .unwrap_or_default();

        Message {
            delivery_tag: delivery.delivery_tag,
            payload: delivery.data,
            headers,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            redelivered: delivery.redelivered,
        }
    }
}

/// Renders an AMQP header table as text.
pub(crate) fn table_to_headers(table: &FieldTable) -> BTreeMap<String, String> {
    table
        .inner()
        .iter()
        .map(|(key, value)| (key.to_string(), value_to_string(value)))
        .collect()
}

/// Converts text headers into an AMQP header table of long strings.
pub(crate) fn headers_to_table(headers: &BTreeMap<String, String>) -> FieldTable {
    let btree: BTreeMap<ShortString, AMQPValue> = headers
        .iter()
        .map(|(key, value)| {
            (
                ShortString::from(key.clone()),
                AMQPValue::LongString(LongString::from(value.clone())),
            )
        })
        .collect();

    FieldTable::from(btree)
}

fn value_to_string(value: &AMQPValue) -> String {
    match value {
        AMQPValue::ShortString(v) => v.to_string(),
        AMQPValue::LongString(v) => String::from_utf8_lossy(v.as_bytes()).into_owned(),
        AMQPValue::Boolean(v) => v.to_string(),
        AMQPValue::ShortShortInt(v) => v.to_string(),
        AMQPValue::ShortShortUInt(v) => v.to_string(),
        AMQPValue::ShortInt(v) => v.to_string(),
        AMQPValue::ShortUInt(v) => v.to_string(),
        AMQPValue::LongInt(v) => v.to_string(),
        AMQPValue::LongUInt(v) => v.to_string(),
        AMQPValue::LongLongInt(v) => v.to_string(),
        AMQPValue::Timestamp(v) => v.to_string(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_header_values_as_text() {
        let mut table = FieldTable::default();
        table.insert(
            ShortString::from("traceparent"),
            AMQPValue::LongString(LongString::from("00-abc-def-01")),
        );
        table.insert(ShortString::from("attempt"), AMQPValue::LongInt(3));
        table.insert(ShortString::from("urgent"), AMQPValue::Boolean(true));

        let headers = table_to_headers(&table);

        assert_eq!(headers.get("traceparent").map(String::as_str), Some("00-abc-def-01"));
        assert_eq!(headers.get("attempt").map(String::as_str), Some("3"));
        assert_eq!(headers.get("urgent").map(String::as_str), Some("true"));
    }

    #[test]
    fn text_headers_become_long_strings() {
        let mut headers = BTreeMap::new();
        headers.insert("tenant".to_owned(), "acme".to_owned());

        let table = headers_to_table(&headers);

        assert_eq!(table_to_headers(&table), headers);
    }

    #[test]
    fn empty_headers_by_default() {
        let msg = Message::new(7, b"payload");
        assert_eq!(msg.delivery_tag, 7);
        assert!(msg.headers.is_empty());
    }
}
