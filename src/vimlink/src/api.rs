//! The process-level context every wrapper and collaborator is built from.

use crate::batch::Batch;
use crate::buffer::Buffer;
use crate::global::Global;
use crate::handler::HandlerTable;
use crate::options::GlobalOptions;
use crate::out::Out;
use crate::registry::{Registry, SWEEP_TRIGGERS};
use crate::renderer::Renderer;
use crate::tab::Tab;
use crate::value::{self, into_string};
use crate::window::Window;
use crate::{Error, Result};
use std::fmt;
use std::sync::Arc;
use vimlink_core::{recover, Disposable, DisposableCollection, InstallationId, RuntimeConfig};
use vimlink_rpc::{handle_id, Host, Value};

/// Handle to the plugin's connection with the editor.
///
/// Cheap to clone; every clone shares one host, one handler table and one
/// registry. Built once per process with [`Api::new`] and passed to whatever
/// needs it.
#[derive(Clone)]
pub struct Api {
    inner: Arc<Inner>,
}

struct Inner {
    host: Arc<dyn Host>,
    channel: i64,
    handlers: Arc<HandlerTable>,
    registry: Arc<Registry>,
    sweeps: DisposableCollection,
    runtime: RuntimeConfig,
}

/// Placement of a split opened by [`Api::create_split_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitModifier {
    Vertical,
    Horizontal,
    TopLeft,
    BottomRight,
}

impl SplitModifier {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitModifier::Vertical => "vertical",
            SplitModifier::Horizontal => "horizontal",
            SplitModifier::TopLeft => "topleft",
            SplitModifier::BottomRight => "botright",
        }
    }
}

impl Api {
    /// Connect the runtime to `host`: learn our channel id, define the two
    /// dispatch functions and start sweeping the registry on host events.
    pub fn new(
        host: Arc<dyn Host>,
        installation: InstallationId,
        runtime: RuntimeConfig,
    ) -> Result<Self> {
        let info = host.call("nvim_get_api_info", vec![])?;
        let channel = info
            .as_array()
            .and_then(|items| items.first())
            .and_then(Value::as_i64)
            .ok_or(Error::UnexpectedReply {
                method: "nvim_get_api_info",
                expected: "[channel, metadata]",
            })?;

        let handlers = Arc::new(HandlerTable::new(
            installation,
            GlobalOptions::new(host.clone()),
        ));
        let api = Self {
            inner: Arc::new(Inner {
                host,
                channel,
                handlers,
                registry: Arc::new(Registry::new()),
                sweeps: DisposableCollection::new(),
                runtime,
            }),
        };
        api.define_dispatch_functions()?;
        api.watch_registry()?;

        tracing::info!(channel, installation = %installation, "Connected to host");
        Ok(api)
    }

    fn define_dispatch_functions(&self) -> Result<()> {
        let handlers = self.inner.handlers.clone();
        self.function(&handlers.function_name(), move |args| {
            handlers.dispatch(&args);
            Ok(Value::Nil)
        })?;

        let handlers = self.inner.handlers.clone();
        self.function(&handlers.operator_function_name(), move |args| {
            handlers.dispatch_operator(&args);
            Ok(Value::Nil)
        })
    }

    fn watch_registry(&self) -> Result<()> {
        let global = self.global();
        for &(event, kind) in SWEEP_TRIGGERS {
            let registry = Arc::downgrade(&self.inner.registry);
            let subscription = global.on(event, move || {
                if let Some(registry) = registry.upgrade() {
                    registry.garbage_collect(kind);
                }
            })?;
            self.inner.sweeps.add(subscription);
        }
        Ok(())
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    pub fn handlers(&self) -> &Arc<HandlerTable> {
        &self.inner.handlers
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.inner.runtime
    }

    /// Our RPC channel id as the host knows it.
    pub fn channel(&self) -> i64 {
        self.inner.channel
    }

    /// Expose `f` to the host as the Vimscript function `name(...)`.
    pub fn function(
        &self,
        name: &str,
        f: impl Fn(Vec<Value>) -> std::result::Result<Value, String> + Send + Sync + 'static,
    ) -> Result<()> {
        self.inner.host.register(name, Arc::new(f));
        let shim = format!(
            "function! {name}(...) abort\n  return call('rpcrequest', [{channel}, '{name}'] + a:000)\nendfunction",
            channel = self.inner.channel,
        );
        self.exec(&shim, false)?;
        tracing::debug!(function = name, "Defined host function");
        Ok(())
    }

    fn exec(&self, source: &str, output: bool) -> Result<Value> {
        Ok(self.inner.host.call(
            "nvim_exec2",
            vec![
                Value::from(source),
                value::map([("output", Value::from(output))]),
            ],
        )?)
    }

    /// Run Ex commands and return what they printed.
    pub fn execute(&self, command: &str) -> Result<String> {
        let reply = self.exec(command, true)?;
        Ok(value::get(&reply, "output")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub fn command(&self, command: &str) -> Result<()> {
        self.inner
            .host
            .call("nvim_command", vec![Value::from(command)])?;
        Ok(())
    }

    pub fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.inner.host.call(
            "nvim_call_function",
            vec![Value::from(name), Value::Array(args)],
        )?)
    }

    /// The editor's working directory, empty if it cannot be read.
    pub fn cwd(&self) -> String {
        match self.call_function("getcwd", vec![]) {
            Ok(cwd) => into_string(cwd).unwrap_or_default(),
            Err(err) => {
                tracing::debug!(error = %err, "Failed to read cwd");
                String::new()
            }
        }
    }

    pub fn batch(&self) -> Batch {
        Batch::new(self.inner.host.clone())
    }

    pub fn out(&self) -> Out {
        Out::new(self.inner.host.clone())
    }

    pub fn global(&self) -> Global {
        Global::new(self.clone())
    }

    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.inner.runtime.dispose_grace())
    }

    fn list(&self, method: &str) -> Vec<i64> {
        match self.inner.host.call(method, vec![]) {
            Ok(Value::Array(handles)) => handles.iter().filter_map(handle_id).collect(),
            Ok(other) => {
                tracing::debug!(method, reply = %other, "Unexpected listing");
                Vec::new()
            }
            Err(err) => {
                tracing::debug!(method, error = %err, "Listing failed");
                Vec::new()
            }
        }
    }

    fn current(&self, method: &'static str) -> Result<i64> {
        let handle = self.inner.host.call(method, vec![])?;
        handle_id(&handle).ok_or(Error::UnexpectedReply {
            method,
            expected: "a handle",
        })
    }

    pub(crate) fn buffer_ids(&self) -> Vec<i64> {
        self.list("nvim_list_bufs")
    }

    pub(crate) fn window_ids(&self) -> Vec<i64> {
        self.list("nvim_list_wins")
    }

    pub(crate) fn tab_ids(&self) -> Vec<i64> {
        self.list("nvim_list_tabpages")
    }

    pub(crate) fn current_buffer_id(&self) -> Option<i64> {
        self.current("nvim_get_current_buf").ok()
    }

    pub(crate) fn current_window_id(&self) -> Option<i64> {
        self.current("nvim_get_current_win").ok()
    }

    pub(crate) fn current_tab_id(&self) -> Option<i64> {
        self.current("nvim_get_current_tabpage").ok()
    }

    /// The wrapper for buffer `id`, if the editor has such a buffer.
    pub fn buffer_by_id(&self, id: i64) -> Option<Arc<Buffer>> {
        self.buffer_ids()
            .contains(&id)
            .then(|| Buffer::get_or_create(self, id))
    }

    pub fn current_buffer(&self) -> Result<Arc<Buffer>> {
        let id = self.current("nvim_get_current_buf")?;
        Ok(Buffer::get_or_create(self, id))
    }

    pub fn buffers(&self) -> Vec<Arc<Buffer>> {
        self.buffer_ids()
            .into_iter()
            .map(|id| Buffer::get_or_create(self, id))
            .collect()
    }

    pub fn find_buffer(&self, mut predicate: impl FnMut(&Buffer) -> bool) -> Option<Arc<Buffer>> {
        self.buffers()
            .into_iter()
            .find(|buffer| predicate(buffer.as_ref()))
    }

    /// Open a new empty buffer in a split of `size` lines or columns and
    /// return it.
    pub fn create_split_buffer(
        &self,
        size: u32,
        modifiers: &[SplitModifier],
    ) -> Result<Arc<Buffer>> {
        let mut command: Vec<&str> = modifiers.iter().map(|m| m.as_str()).collect();
        let new = format!("{size}new");
        command.push(&new);

        let results = self
            .batch()
            .command(&command.join(" "))
            .call("nvim_get_current_buf", vec![])
            .execute()?;
        let id = results
            .get(1)
            .and_then(handle_id)
            .ok_or(Error::UnexpectedReply {
                method: "nvim_get_current_buf",
                expected: "a buffer handle",
            })?;
        Ok(Buffer::get_or_create(self, id))
    }

    pub fn window_by_id(&self, id: i64) -> Option<Arc<Window>> {
        self.window_ids()
            .contains(&id)
            .then(|| Window::get_or_create(self, id))
    }

    pub fn current_window(&self) -> Result<Arc<Window>> {
        let id = self.current("nvim_get_current_win")?;
        Ok(Window::get_or_create(self, id))
    }

    pub fn windows(&self) -> Vec<Arc<Window>> {
        self.window_ids()
            .into_iter()
            .map(|id| Window::get_or_create(self, id))
            .collect()
    }

    pub fn find_window(&self, mut predicate: impl FnMut(&Window) -> bool) -> Option<Arc<Window>> {
        self.windows()
            .into_iter()
            .find(|window| predicate(window.as_ref()))
    }

    pub fn tab_by_id(&self, id: i64) -> Option<Arc<Tab>> {
        self.tab_ids()
            .contains(&id)
            .then(|| Tab::get_or_create(self, id))
    }

    pub fn current_tab(&self) -> Result<Arc<Tab>> {
        let id = self.current("nvim_get_current_tabpage")?;
        Ok(Tab::get_or_create(self, id))
    }

    pub fn tabs(&self) -> Vec<Arc<Tab>> {
        self.tab_ids()
            .into_iter()
            .map(|id| Tab::get_or_create(self, id))
            .collect()
    }

    pub fn find_tab(&self, mut predicate: impl FnMut(&Tab) -> bool) -> Option<Arc<Tab>> {
        self.tabs().into_iter().find(|tab| predicate(tab.as_ref()))
    }

    /// Release everything still cached and drop every callback. Wrappers hold
    /// an `Api`, so this also breaks the cycle that keeps the context alive.
    pub fn shutdown(&self) {
        self.inner.sweeps.dispose();
        let objects = self.inner.registry.clear();
        for object in &objects {
            recover("release", || object.release());
        }
        self.inner.handlers.clear();
        tracing::info!(released = objects.len(), "Runtime shut down");
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("channel", &self.inner.channel)
            .field("handlers", &self.inner.handlers)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ObjectKind;
    use crate::testing::FakeHost;
    use vimlink_core::{DisposeFn, Token};

    #[test]
    fn setup_defines_both_dispatch_functions() {
        let host = FakeHost::new();
        let api = host.api();
        let handler = api.handlers().function_name();
        let operator = api.handlers().operator_function_name();

        assert!(host.has_method(&handler));
        assert!(host.has_method(&operator));
        let shim = host
            .commands()
            .into_iter()
            .find(|line| line.starts_with(&format!("return call('rpcrequest', [1, '{handler}']")));
        assert!(shim.is_some());
    }

    #[test]
    fn installations_get_distinct_function_names() {
        let host = FakeHost::new();
        let first = host.api();
        let second = host.api();
        assert_ne!(
            first.handlers().function_name(),
            second.handlers().function_name()
        );
    }

    #[test]
    fn setup_fails_without_api_info() {
        let host = FakeHost::new();
        host.fail("nvim_get_api_info");
        let result = Api::new(
            host.clone(),
            InstallationId::new(Token::generate()),
            RuntimeConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn host_calls_dispatch_registered_handlers() {
        let host = FakeHost::new();
        let api = host.api();
        let (tx, rx) = std::sync::mpsc::channel();
        let handler = api.handlers().create(move |args| {
            let _ = tx.send(args.to_vec());
        });

        host.run_call(&handler.call_with(&["'extra'"])).unwrap();
        assert_eq!(rx.try_recv().unwrap(), vec![Value::from("extra")]);
    }

    #[test]
    fn lookups_return_the_cached_wrapper() {
        let host = FakeHost::new();
        let api = host.api();
        let first = api.current_buffer().unwrap();
        let second = api.buffer_by_id(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(api.buffer_by_id(42).is_none());
        assert_eq!(api.registry().len(ObjectKind::Buffer), 1);
    }

    #[test]
    fn sweeps_run_on_host_events() {
        let host = FakeHost::new();
        let api = host.api();
        let doomed = host.add_buffer(&["x"]);
        let kept = host.add_buffer(&["y"]);
        api.buffer_by_id(doomed).unwrap();
        api.buffer_by_id(kept).unwrap();

        host.wipe_buffer(doomed);
        host.fire("BufWipeout", Some(doomed));

        assert_eq!(api.registry().ids(ObjectKind::Buffer), vec![kept]);
    }

    #[test]
    fn window_and_tab_sweeps_use_their_own_events() {
        let host = FakeHost::new();
        let api = host.api();
        let window = host.open_window(1);
        let (tab, _) = host.open_tab(1);
        api.window_by_id(window).unwrap();
        api.tab_by_id(tab).unwrap();

        host.close_window(window);
        host.close_tab(tab);
        host.fire("TabClosed", None);
        assert!(api.registry().get(ObjectKind::Tab, tab).is_none());
        assert!(api.registry().get(ObjectKind::Window, window).is_some());

        host.fire("BufWinLeave", Some(1));
        assert!(api.registry().get(ObjectKind::Window, window).is_none());
    }

    #[test]
    fn evicted_buffers_keep_their_attachments_until_shutdown() {
        let host = FakeHost::new();
        let api = host.api();
        let id = host.add_buffer(&["x"]);
        let buffer = api.buffer_by_id(id).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        buffer.attach(DisposeFn::new(move || {
            let _ = tx.send(());
        }));

        host.wipe_buffer(id);
        let evicted = api.registry().garbage_collect(ObjectKind::Buffer);
        assert_eq!(evicted.len(), 1);
        assert!(rx.try_recv().is_err());

        evicted[0].release();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn shutdown_releases_cached_wrappers() {
        let host = FakeHost::new();
        let api = host.api();
        let buffer = api.current_buffer().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        buffer.attach(DisposeFn::new(move || {
            let _ = tx.send(());
        }));

        api.shutdown();

        assert!(rx.try_recv().is_ok());
        assert_eq!(api.registry().len(ObjectKind::Buffer), 0);
        assert!(api.handlers().is_empty());
    }

    #[test]
    fn shutdown_deletes_the_sweep_augroups() {
        let host = FakeHost::new();
        let api = host.api();
        let sweep_groups = || {
            host.autocmds()
                .iter()
                .filter(|a| a.group.as_deref().is_some_and(|g| g.starts_with("global_")))
                .count()
        };
        assert_eq!(sweep_groups(), SWEEP_TRIGGERS.len());

        api.shutdown();

        assert_eq!(sweep_groups(), 0);
        assert_eq!(host.fire("BufWipeout", Some(1)), 0);
    }

    #[test]
    fn split_buffer_is_the_new_current_buffer() {
        let host = FakeHost::new();
        let api = host.api();
        let buffer = api
            .create_split_buffer(30, &[SplitModifier::Vertical, SplitModifier::TopLeft])
            .unwrap();

        assert_eq!(buffer.id(), 2);
        assert!(buffer.is_current());
        assert!(host.commands().contains(&"vertical topleft 30new".to_string()));
    }

    #[test]
    fn execute_returns_command_output() {
        let host = FakeHost::new();
        let api = host.api();
        assert_eq!(api.execute("echo 'hi'").unwrap(), "");
        assert_eq!(api.cwd(), "/fake/cwd");

        host.fail("nvim_call_function");
        assert_eq!(api.cwd(), "");
    }
}
