//! msgpack-RPC message framing.
//!
//! Messages are msgpack arrays:
//! - request: `[0, msgid, method, params]`
//! - response: `[1, msgid, error, result]`
//! - notification: `[2, method, params]`

use std::io::{Read, Write};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

/// A single msgpack-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Call expecting a response with the same id.
    Request {
        /// Message id used for correlation.
        id: u32,
        /// Method name.
        method: String,
        /// Positional parameters.
        params: Vec<Value>,
    },
    /// Answer to a request.
    Response {
        /// Id of the request being answered.
        id: u32,
        /// Error value, `None` on success.
        error: Option<Value>,
        /// Result value, `Null` on error.
        result: Value,
    },
    /// One-way event.
    Notification {
        /// Event name.
        method: String,
        /// Event parameters.
        params: Vec<Value>,
    },
}

/// Encodes `message` onto `writer`.
///
/// # Errors
///
/// Returns [`Error::Encode`] if serialization or the underlying write fails.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    match message {
        Message::Request { id, method, params } => {
            rmp_serde::encode::write(writer, &(REQUEST, id, method, params))?;
        }
        Message::Response { id, error, result } => {
            rmp_serde::encode::write(writer, &(RESPONSE, id, error, result))?;
        }
        Message::Notification { method, params } => {
            rmp_serde::encode::write(writer, &(NOTIFICATION, method, params))?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Reads one message from `reader`.
///
/// # Errors
///
/// Returns [`Error::Decode`] when the bytes are not valid msgpack (this
/// includes I/O failures and timeouts surfaced by the reader) and
/// [`Error::Protocol`] when the value is not a msgpack-RPC message.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message> {
    let mut deserializer = rmp_serde::Deserializer::new(reader);
    let value = Value::deserialize(&mut deserializer)?;
    parse_message(value)
}

fn parse_message(value: Value) -> Result<Message> {
    let Value::Array(items) = value else {
        return Err(Error::Protocol(format!("expected array, got {value}")));
    };

    let kind = items
        .first()
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Protocol("missing message type".to_string()))?;

    match (kind, items.len()) {
        (REQUEST, 4) => {
            let mut items = items.into_iter().skip(1);
            let id = message_id(items.next())?;
            let method = method_name(items.next())?;
            let params = params(items.next())?;
            Ok(Message::Request { id, method, params })
        }
        (RESPONSE, 4) => {
            let mut items = items.into_iter().skip(1);
            let id = message_id(items.next())?;
            let error = match items.next() {
                Some(Value::Null) | None => None,
                Some(error) => Some(error),
            };
            let result = items.next().unwrap_or(Value::Null);
            Ok(Message::Response { id, error, result })
        }
        (NOTIFICATION, 3) => {
            let mut items = items.into_iter().skip(1);
            let method = method_name(items.next())?;
            let params = params(items.next())?;
            Ok(Message::Notification { method, params })
        }
        (kind, len) => Err(Error::Protocol(format!(
            "unexpected message type {kind} with {len} elements"
        ))),
    }
}

fn message_id(value: Option<Value>) -> Result<u32> {
    value
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| Error::Protocol("invalid message id".to_string()))
}

fn method_name(value: Option<Value>) -> Result<String> {
    match value {
        Some(Value::String(method)) => Ok(method),
        _ => Err(Error::Protocol("invalid method name".to_string())),
    }
}

fn params(value: Option<Value>) -> Result<Vec<Value>> {
    match value {
        Some(Value::Array(params)) => Ok(params),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(other) => Err(Error::Protocol(format!("params must be an array, got {other}"))),
    }
}
