//! msgpack-RPC message types.
//!
//! Every message on the channel is a msgpack array:
//! - request: `[0, msgid, method, params]`
//! - response: `[1, msgid, error, result]`
//! - notification: `[2, method, params]`

use std::io::{Read, Write};
use thiserror::Error;

pub use rmpv::Value;

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: u64,
        method: String,
        params: Vec<Value>,
    },
    Response {
        id: u64,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        params: Vec<Value>,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmpv::decode::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmpv::encode::Error),
    #[error("failed to flush message: {0}")]
    Flush(std::io::Error),
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

impl Message {
    pub fn into_value(self) -> Value {
        match self {
            Message::Request { id, method, params } => Value::Array(vec![
                Value::from(REQUEST),
                Value::from(id),
                Value::from(method),
                Value::Array(params),
            ]),
            Message::Response { id, error, result } => Value::Array(vec![
                Value::from(RESPONSE),
                Value::from(id),
                error,
                result,
            ]),
            Message::Notification { method, params } => Value::Array(vec![
                Value::from(NOTIFICATION),
                Value::from(method),
                Value::Array(params),
            ]),
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Array(items) = value else {
            return Err(ProtocolError::Malformed("message is not an array"));
        };
        let mut items = items.into_iter();
        let kind = items
            .next()
            .and_then(|v| v.as_u64())
            .ok_or(ProtocolError::Malformed("missing message type"))?;

        match kind {
            REQUEST => {
                let id = next_u64(&mut items, "missing request id")?;
                let method = next_string(&mut items, "missing request method")?;
                let params = next_params(&mut items)?;
                Ok(Message::Request { id, method, params })
            }
            RESPONSE => {
                let id = next_u64(&mut items, "missing response id")?;
                let error = items.next().unwrap_or(Value::Nil);
                let result = items.next().unwrap_or(Value::Nil);
                Ok(Message::Response { id, error, result })
            }
            NOTIFICATION => {
                let method = next_string(&mut items, "missing notification method")?;
                let params = next_params(&mut items)?;
                Ok(Message::Notification { method, params })
            }
            _ => Err(ProtocolError::Malformed("unknown message type")),
        }
    }
}

fn next_u64(
    items: &mut impl Iterator<Item = Value>,
    missing: &'static str,
) -> Result<u64, ProtocolError> {
    items
        .next()
        .and_then(|v| v.as_u64())
        .ok_or(ProtocolError::Malformed(missing))
}

fn next_string(
    items: &mut impl Iterator<Item = Value>,
    missing: &'static str,
) -> Result<String, ProtocolError> {
    match items.next() {
        Some(Value::String(s)) => s
            .into_str()
            .ok_or(ProtocolError::Malformed("method name is not utf-8")),
        _ => Err(ProtocolError::Malformed(missing)),
    }
}

fn next_params(items: &mut impl Iterator<Item = Value>) -> Result<Vec<Value>, ProtocolError> {
    match items.next() {
        Some(Value::Array(params)) => Ok(params),
        None | Some(Value::Nil) => Ok(Vec::new()),
        Some(_) => Err(ProtocolError::Malformed("params is not an array")),
    }
}

/// Read one message. `Ok(None)` means the peer closed the stream cleanly.
pub fn read_message(reader: &mut impl Read) -> Result<Option<Message>, ProtocolError> {
    match rmpv::decode::read_value(reader) {
        Ok(value) => Message::from_value(value).map(Some),
        Err(rmpv::decode::Error::InvalidMarkerRead(err))
            if err.kind() == std::io::ErrorKind::UnexpectedEof =>
        {
            Ok(None)
        }
        Err(err) => Err(ProtocolError::Decode(err)),
    }
}

pub fn write_message(writer: &mut impl Write, message: Message) -> Result<(), ProtocolError> {
    // Encode into a buffer first so a message is never half-written.
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &message.into_value())?;
    writer.write_all(&buf).map_err(ProtocolError::Flush)?;
    writer.flush().map_err(ProtocolError::Flush)
}

/// Kinds of host object handles, by their msgpack EXT type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Buffer,
    Window,
    Tabpage,
}

impl HandleKind {
    pub fn ext_type(self) -> i8 {
        match self {
            HandleKind::Buffer => 0,
            HandleKind::Window => 1,
            HandleKind::Tabpage => 2,
        }
    }
}

/// Extract a handle id from either an EXT value or a plain integer.
pub fn handle_id(value: &Value) -> Option<i64> {
    match value {
        Value::Ext(_, data) => rmpv::decode::read_value(&mut data.as_slice())
            .ok()?
            .as_i64(),
        other => other.as_i64(),
    }
}

/// Encode a handle the way the host sends it.
pub fn handle_value(kind: HandleKind, id: i64) -> Value {
    let mut data = Vec::new();
    // Writing an integer into a Vec cannot fail.
    let _ = rmpv::encode::write_value(&mut data, &Value::from(id));
    Value::Ext(kind.ext_type(), data)
}

/// Host errors arrive as `[type, message]`; anything else is rendered as-is.
pub fn error_message(error: &Value) -> String {
    match error {
        Value::Array(items) => items
            .get(1)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        Value::String(s) => s.as_str().unwrap_or_default().to_string(),
        other => other.to_string(),
    }
}

/// The error value sent back for a failed host-initiated request.
pub fn error_value(message: impl Into<String>) -> Value {
    Value::Array(vec![Value::from(0), Value::from(message.into())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_encodes_as_four_element_array() {
        let value = Message::Request {
            id: 3,
            method: "nvim_command".into(),
            params: vec![Value::from("echo 1")],
        }
        .into_value();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_u64(), Some(0));
        assert_eq!(items[2].as_str(), Some("nvim_command"));
    }

    #[test]
    fn notification_without_params_decodes() {
        let value = Value::Array(vec![Value::from(2), Value::from("Handler_abc")]);
        let msg = Message::from_value(value).unwrap();
        assert_eq!(
            msg,
            Message::Notification {
                method: "Handler_abc".into(),
                params: vec![],
            }
        );
    }

    #[test]
    fn malformed_messages_are_rejected() {
        assert!(matches!(
            Message::from_value(Value::from("nope")),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            Message::from_value(Value::Array(vec![Value::from(9)])),
            Err(ProtocolError::Malformed("unknown message type"))
        ));
        assert!(matches!(
            Message::from_value(Value::Array(vec![
                Value::from(0),
                Value::from(1),
                Value::from("m"),
                Value::from(4),
            ])),
            Err(ProtocolError::Malformed("params is not an array"))
        ));
    }

    #[test]
    fn stream_of_messages_reads_until_eof() {
        let mut buf = Vec::new();
        write_message(
            &mut buf,
            Message::Response {
                id: 1,
                error: Value::Nil,
                result: Value::from(true),
            },
        )
        .unwrap();
        write_message(
            &mut buf,
            Message::Notification {
                method: "redraw".into(),
                params: vec![],
            },
        )
        .unwrap();

        let mut reader = buf.as_slice();
        assert!(matches!(
            read_message(&mut reader).unwrap(),
            Some(Message::Response { id: 1, .. })
        ));
        assert!(matches!(
            read_message(&mut reader).unwrap(),
            Some(Message::Notification { .. })
        ));
        assert!(read_message(&mut reader).unwrap().is_none());
    }

    #[test]
    fn handle_id_accepts_ext_and_integers() {
        assert_eq!(handle_id(&handle_value(HandleKind::Buffer, 42)), Some(42));
        assert_eq!(handle_id(&handle_value(HandleKind::Window, 1000)), Some(1000));
        assert_eq!(handle_id(&Value::from(7)), Some(7));
        assert_eq!(handle_id(&Value::from("x")), None);
    }

    #[test]
    fn error_message_prefers_host_text() {
        let err = Value::Array(vec![Value::from(1), Value::from("Invalid buffer id: 9")]);
        assert_eq!(error_message(&err), "Invalid buffer id: 9");
        assert_eq!(error_message(&error_value("boom")), "boom");
    }
}
