//! Several host calls sent as one `nvim_call_atomic` round-trip.

use crate::{Error, Result};
use std::sync::Arc;
use vimlink_rpc::{error_message, Host, Value};

#[must_use = "a batch does nothing until executed"]
pub struct Batch {
    host: Arc<dyn Host>,
    calls: Vec<(String, Vec<Value>)>,
}

impl Batch {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            calls: Vec::new(),
        }
    }

    pub fn call(mut self, method: &str, args: Vec<Value>) -> Self {
        self.calls.push((method.to_string(), args));
        self
    }

    pub fn command(self, command: &str) -> Self {
        self.call("nvim_command", vec![Value::from(command)])
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Run every call in order and return their results. The host stops at
    /// the first failing call.
    pub fn execute(self) -> Result<Vec<Value>> {
        if self.calls.is_empty() {
            return Ok(Vec::new());
        }

        let calls = self
            .calls
            .into_iter()
            .map(|(method, args)| Value::Array(vec![Value::from(method), Value::Array(args)]))
            .collect();
        let reply = self.host.call("nvim_call_atomic", vec![Value::Array(calls)])?;

        let malformed = Error::UnexpectedReply {
            method: "nvim_call_atomic",
            expected: "[results, error]",
        };
        let Value::Array(mut parts) = reply else {
            return Err(malformed);
        };
        if parts.len() != 2 {
            return Err(malformed);
        }
        let error = parts.pop().unwrap_or(Value::Nil);
        let results = match parts.pop() {
            Some(Value::Array(results)) => results,
            _ => return Err(malformed),
        };

        if let Value::Array(details) = &error {
            let index = details.first().and_then(Value::as_u64).unwrap_or(0) as usize;
            let message = details
                .get(2)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error_message(&error));
            return Err(Error::Batch { index, message });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use vimlink_rpc::handle_id;

    #[test]
    fn results_come_back_in_call_order() {
        let host = FakeHost::new();
        let results = Batch::new(host.clone())
            .command("vertical 30new")
            .call("nvim_get_current_buf", vec![])
            .execute()
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(handle_id(&results[1]), Some(2));
    }

    #[test]
    fn first_failure_is_reported_with_its_index() {
        let host = FakeHost::new();
        let err = Batch::new(host.clone())
            .command("echo 1")
            .call("nvim_buf_get_lines", vec![Value::from(99)])
            .command("echo 2")
            .execute()
            .unwrap_err();

        match err {
            Error::Batch { index, message } => {
                assert_eq!(index, 1);
                assert!(message.contains("Invalid buffer id"));
            }
            other => panic!("expected batch error, got {other:?}"),
        }
        assert_eq!(host.commands(), vec!["echo 1"]);
    }

    #[test]
    fn empty_batch_skips_the_host() {
        let host = FakeHost::new();
        assert!(Batch::new(host.clone()).execute().unwrap().is_empty());
        assert!(host.calls().is_empty());
    }
}
