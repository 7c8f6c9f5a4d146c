//! The narrow interface the plugin runtime uses to reach the host.

use crate::protocol::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Handler for a host-initiated request or notification. An `Err` is sent back
/// to the host as the request's error.
pub type MethodHandler = Arc<dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to send to host: {0}")]
    Send(#[from] crate::protocol::ProtocolError),
    #[error("host rejected {method}: {message}")]
    Remote { method: String, message: String },
    #[error("channel to host is closed")]
    Disconnected,
}

/// A live connection to one host.
///
/// `call` blocks until the host replies; there is no timeout. `register`
/// makes `method` answerable when the host invokes it.
pub trait Host: Send + Sync {
    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError>;

    fn register(&self, method: &str, handler: MethodHandler);
}

/// Method name to handler routing shared by hosts.
#[derive(Default, Clone)]
pub struct MethodTable {
    methods: Arc<RwLock<HashMap<String, MethodHandler>>>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations under the same name replace earlier ones.
    pub fn insert(&self, method: &str, handler: MethodHandler) {
        if self
            .methods
            .write()
            .insert(method.to_string(), handler)
            .is_some()
        {
            tracing::debug!(method, "Replaced method handler");
        }
    }

    pub fn get(&self, method: &str) -> Option<MethodHandler> {
        self.methods.read().get(method).cloned()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.methods.read().contains_key(method)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.methods.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_registered_handler() {
        let table = MethodTable::new();
        table.insert("Handler_x", Arc::new(|args| Ok(Value::from(args.len() as u64))));

        let handler = table.get("Handler_x").unwrap();
        assert_eq!(
            handler(vec![Value::Nil, Value::Nil]).unwrap(),
            Value::from(2u64)
        );
        assert!(table.get("Handler_y").is_none());
    }

    #[test]
    fn reinsert_replaces() {
        let table = MethodTable::new();
        table.insert("m", Arc::new(|_| Ok(Value::from(1))));
        table.insert("m", Arc::new(|_| Ok(Value::from(2))));
        assert_eq!(table.get("m").unwrap()(vec![]).unwrap(), Value::from(2));
        assert_eq!(table.names(), vec!["m".to_string()]);
    }
}
