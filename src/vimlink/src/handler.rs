//! Token-keyed callback table behind the two host-visible dispatch functions.
//!
//! The host can only call plugin code by function name, so every ad-hoc
//! callback is stored under a random [`Token`] and reached through one shared
//! entry point, `Handler_<installation>(token, args...)`. The operator slot
//! mirrors the host's single `operatorfunc` and is reached through
//! `OperatorFunc_<installation>(args...)`.

use crate::options::GlobalOptions;
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use vimlink_core::{recover, Disposable, InstallationId, Token};
use vimlink_rpc::Value;

/// The one callback shape the table stores: the host's extra arguments in,
/// nothing out.
pub type Callback = Arc<dyn Fn(&[Value]) + Send + Sync>;

pub struct HandlerTable {
    installation: InstallationId,
    options: GlobalOptions,
    entries: Mutex<HashMap<Token, Callback>>,
    operator: Mutex<Option<(Token, Callback)>>,
}

impl HandlerTable {
    pub fn new(installation: InstallationId, options: GlobalOptions) -> Self {
        Self {
            installation,
            options,
            entries: Mutex::new(HashMap::new()),
            operator: Mutex::new(None),
        }
    }

    pub fn function_name(&self) -> String {
        format!("Handler_{}", self.installation)
    }

    pub fn operator_function_name(&self) -> String {
        format!("OperatorFunc_{}", self.installation)
    }

    /// Store `callback` under a fresh token. The returned handle renders as
    /// the call expression host-side bindings should run.
    pub fn create(self: &Arc<Self>, callback: impl Fn(&[Value]) + Send + Sync + 'static) -> HandlerFunc {
        let token = Token::generate();
        self.entries.lock().insert(token, Arc::new(callback));
        tracing::debug!(token = %token, "Registered handler");
        HandlerFunc {
            token,
            function_name: self.function_name(),
            table: Arc::downgrade(self),
        }
    }

    /// Install the process-wide operator callback and point `operatorfunc` at
    /// it. Replaces any earlier occupant.
    pub fn set_operator_func(
        self: &Arc<Self>,
        callback: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Result<OperatorFunc> {
        self.options
            .set_operator_func(&self.operator_function_name())?;

        let generation = Token::generate();
        if self
            .operator
            .lock()
            .replace((generation, Arc::new(callback)))
            .is_some()
        {
            tracing::debug!("Replaced operator function");
        }
        Ok(OperatorFunc {
            generation,
            table: Arc::downgrade(self),
        })
    }

    /// Entry point for `Handler_<installation>`: the first argument is the
    /// token, the rest go to the callback.
    pub fn dispatch(&self, args: &[Value]) {
        let Some((first, rest)) = args.split_first() else {
            tracing::warn!("Handler called without a token");
            return;
        };
        let token = match first.as_str().map(Token::parse) {
            Some(Ok(token)) => token,
            _ => {
                tracing::warn!(arg = %first, "Handler called with a malformed token");
                return;
            }
        };

        // Cloned out so the callback may register or dispose handlers.
        let callback = self.entries.lock().get(&token).cloned();
        match callback {
            Some(callback) => {
                recover("handler", || callback(rest));
            }
            None => tracing::debug!(token = %token, "Ignoring stale handler token"),
        }
    }

    /// Entry point for `OperatorFunc_<installation>`.
    pub fn dispatch_operator(&self, args: &[Value]) {
        let callback = self.operator.lock().as_ref().map(|(_, cb)| cb.clone());
        match callback {
            Some(callback) => {
                recover("operator function", || callback(args));
            }
            None => tracing::debug!("Operator function called with no operator installed"),
        }
    }

    pub fn contains(&self, token: Token) -> bool {
        self.entries.lock().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn has_operator(&self) -> bool {
        self.operator.lock().is_some()
    }

    /// Drop every callback. Used when the session ends.
    pub fn clear(&self) {
        self.entries.lock().clear();
        self.operator.lock().take();
    }

    fn remove(&self, token: Token) {
        if self.entries.lock().remove(&token).is_some() {
            tracing::debug!(token = %token, "Removed handler");
        }
    }

    fn clear_operator(&self, generation: Token) {
        let mut slot = self.operator.lock();
        if !matches!(&*slot, Some((current, _)) if *current == generation) {
            return;
        }
        slot.take();
        drop(slot);

        if let Err(err) = self.options.set_operator_func("") {
            tracing::warn!(error = %err, "Failed to clear operatorfunc");
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("installation", &self.installation)
            .field("handlers", &self.len())
            .field("operator", &self.has_operator())
            .finish()
    }
}

/// Handle to one registered callback. Disposing it removes the callback;
/// later host calls with its token are ignored.
#[derive(Clone)]
pub struct HandlerFunc {
    token: Token,
    function_name: String,
    table: Weak<HandlerTable>,
}

impl HandlerFunc {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Call expression with extra Vimscript expressions evaluated host-side
    /// and passed after the token, e.g. `visualmode()`.
    pub fn call_with(&self, evals: &[&str]) -> String {
        let mut call = format!("{}('{}'", self.function_name, self.token);
        for eval in evals {
            call.push_str(", ");
            call.push_str(eval);
        }
        call.push(')');
        call
    }
}

impl fmt::Display for HandlerFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.call_with(&[]))
    }
}

impl fmt::Debug for HandlerFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerFunc").field(&self.token).finish()
    }
}

impl Disposable for HandlerFunc {
    fn dispose(&self) {
        if let Some(table) = self.table.upgrade() {
            table.remove(self.token);
        }
    }
}

/// Handle to the operator slot occupant that created it.
#[derive(Debug)]
pub struct OperatorFunc {
    generation: Token,
    table: Weak<HandlerTable>,
}

impl Disposable for OperatorFunc {
    /// Clears the slot and `operatorfunc`, unless a newer operator has since
    /// replaced this one.
    fn dispose(&self) {
        if let Some(table) = self.table.upgrade() {
            table.clear_operator(self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table(host: &Arc<FakeHost>) -> Arc<HandlerTable> {
        Arc::new(HandlerTable::new(
            InstallationId::new(Token::generate()),
            GlobalOptions::new(host.clone()),
        ))
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&[Value]) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_: &[Value]| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn token_arg(handler: &HandlerFunc) -> Value {
        Value::from(handler.token().to_string())
    }

    #[test]
    fn call_expressions_differ_only_in_token() {
        let host = FakeHost::new();
        let table = table(&host);
        let a = table.create(|_| {});
        let b = table.create(|_| {});

        assert_ne!(a.token(), b.token());
        let a_call = a.to_string();
        let b_call = b.to_string();
        assert_eq!(
            a_call.replace(&a.token().to_string(), "<token>"),
            b_call.replace(&b.token().to_string(), "<token>")
        );
        assert_eq!(a_call, format!("{}('{}')", table.function_name(), a.token()));
    }

    #[test]
    fn extra_evals_follow_the_token() {
        let host = FakeHost::new();
        let table = table(&host);
        let handler = table.create(|_| {});
        assert_eq!(
            handler.call_with(&["visualmode()", "line('.')"]),
            format!(
                "{}('{}', visualmode(), line('.'))",
                table.function_name(),
                handler.token()
            )
        );
    }

    #[test]
    fn dispatch_forwards_remaining_args() {
        let host = FakeHost::new();
        let table = table(&host);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = table.create(move |args| sink.lock().extend_from_slice(args));

        table.dispatch(&[token_arg(&handler), Value::from("v"), Value::from(3)]);
        assert_eq!(*seen.lock(), vec![Value::from("v"), Value::from(3)]);
    }

    #[test]
    fn unknown_and_malformed_tokens_are_ignored() {
        let host = FakeHost::new();
        let table = table(&host);
        let (count, callback) = counter();
        table.create(callback);

        table.dispatch(&[Value::from(Token::generate().to_string())]);
        table.dispatch(&[Value::from("not-a-token")]);
        table.dispatch(&[Value::from(42)]);
        table.dispatch(&[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disposed_handler_no_longer_runs() {
        let host = FakeHost::new();
        let table = table(&host);
        let (count, callback) = counter();
        let handler = table.create(callback);

        table.dispatch(&[token_arg(&handler)]);
        handler.dispose();
        table.dispatch(&[token_arg(&handler)]);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!table.contains(handler.token()));
        assert!(table.is_empty());
    }

    #[test]
    fn panicking_callback_is_contained() {
        let host = FakeHost::new();
        let table = table(&host);
        let broken = table.create(|_| panic!("callback bug"));
        let (count, callback) = counter();
        let healthy = table.create(callback);

        table.dispatch(&[token_arg(&broken)]);
        table.dispatch(&[token_arg(&healthy)]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(table.contains(broken.token()));
    }

    #[test]
    fn callbacks_may_register_more_handlers() {
        let host = FakeHost::new();
        let table = table(&host);
        let inner = table.clone();
        let handler = table.create(move |_| {
            inner.create(|_| {});
        });

        table.dispatch(&[token_arg(&handler)]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn operator_slot_is_last_write_wins() {
        let host = FakeHost::new();
        let table = table(&host);
        let (first_count, first) = counter();
        let (second_count, second) = counter();

        let first_handle = table.set_operator_func(first).unwrap();
        assert_eq!(
            host.global_option("operatorfunc"),
            Value::from(table.operator_function_name())
        );
        let second_handle = table.set_operator_func(second).unwrap();

        table.dispatch_operator(&[Value::from("line")]);
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);

        // A stale handle leaves the newer operator alone.
        first_handle.dispose();
        assert!(table.has_operator());
        assert_eq!(
            host.global_option("operatorfunc"),
            Value::from(table.operator_function_name())
        );

        second_handle.dispose();
        assert!(!table.has_operator());
        assert_eq!(host.global_option("operatorfunc"), Value::from(""));

        table.dispatch_operator(&[Value::from("line")]);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_operator_setup_keeps_previous_operator() {
        let host = FakeHost::new();
        let table = table(&host);
        let (count, callback) = counter();
        table.set_operator_func(callback).unwrap();

        host.fail("nvim_set_option_value");
        assert!(table.set_operator_func(|_| {}).is_err());

        table.dispatch_operator(&[]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handles_outliving_the_table_are_inert() {
        let host = FakeHost::new();
        let table = table(&host);
        let handler = table.create(|_| {});
        drop(table);
        handler.dispose();
    }
}
