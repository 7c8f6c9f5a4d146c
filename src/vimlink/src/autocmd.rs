//! Autocmd subscriptions routed through the handler table.

use crate::events::Event;
use crate::handler::HandlerFunc;
use crate::value;
use crate::{Api, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vimlink_core::Disposable;
use vimlink_rpc::{Host, Value};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Target {
    /// Every buffer (`*`).
    Global,
    Buffer(i64),
}

/// One autocmd in its own augroup. Disposing it deletes the group, then the
/// handler behind it.
pub struct Subscription {
    group: String,
    handler: HandlerFunc,
    host: Arc<dyn Host>,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn create(
        api: &Api,
        target: Target,
        event: Event,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self> {
        let handler = api.handlers().create(move |_| callback());
        let (prefix, scope) = match target {
            Target::Global => ("global", ("pattern", Value::from("*"))),
            Target::Buffer(id) => ("buffer", ("buffer", Value::from(id))),
        };
        let subscription = Self {
            group: format!("{prefix}_{}", handler.token()),
            handler,
            host: api.host().clone(),
            disposed: AtomicBool::new(false),
        };

        if let Err(err) = subscription.install(event, scope) {
            subscription.dispose();
            return Err(err);
        }
        tracing::debug!(group = %subscription.group, event = %event, "Subscribed to autocmd");
        Ok(subscription)
    }

    fn install(&self, event: Event, scope: (&str, Value)) -> Result<()> {
        self.host.call(
            "nvim_create_augroup",
            vec![
                Value::from(self.group.as_str()),
                value::map([("clear", Value::from(true))]),
            ],
        )?;
        self.host.call(
            "nvim_create_autocmd",
            vec![
                Value::Array(vec![Value::from(event.as_str())]),
                value::map([
                    ("group", Value::from(self.group.as_str())),
                    scope,
                    ("command", Value::from(format!("call {}", self.handler))),
                ]),
            ],
        )?;
        Ok(())
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn handler(&self) -> &HandlerFunc {
        &self.handler
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.host.call(
            "nvim_del_augroup_by_name",
            vec![Value::from(self.group.as_str())],
        ) {
            tracing::debug!(group = %self.group, error = %err, "Failed to delete augroup");
        }
        self.handler.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("group", &self.group)
            .field("handler", &self.handler)
            .finish()
    }
}
