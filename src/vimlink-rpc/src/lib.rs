//! Host channel for vimlink plugins.
//!
//! This crate provides:
//! - The msgpack-RPC message types exchanged with the editor ([`protocol`])
//! - A [`Session`] that drives one long-lived channel over stdio
//! - The [`Host`] trait the plugin runtime talks through, so the runtime can be
//!   exercised against an in-memory host in tests
//!
//! # Wire protocol
//!
//! The editor starts the plugin as an RPC job and speaks msgpack-RPC over the
//! job's stdin/stdout:
//! - the plugin sends requests (`nvim_*` API calls) and waits for responses
//! - the editor sends requests when a registered function is invoked through
//!   `rpcrequest`, and the plugin answers them in arrival order
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vimlink_rpc::{Host, Session, Value};
//!
//! let session = Arc::new(Session::stdio()?);
//! session.register("Ping", Arc::new(|_args| Ok(Value::from("pong"))));
//! let buffers = session.call("nvim_list_bufs", vec![])?;
//! session.run();
//! ```

mod host;
pub mod protocol;
mod session;

pub use host::{Host, MethodHandler, MethodTable, RpcError};
pub use protocol::{error_message, handle_id, handle_value, HandleKind, Message, ProtocolError, Value};
pub use session::Session;
