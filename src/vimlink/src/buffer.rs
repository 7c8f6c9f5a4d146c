use crate::autocmd::{Subscription, Target};
use crate::events::Event;
use crate::keymaps::KeyMaps;
use crate::options::BufferOptions;
use crate::registry::{LiveObject, ObjectKind};
use crate::value::{self, into_string};
use crate::vars::Vars;
use crate::window::Window;
use crate::{Api, Result};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::Arc;
use vimlink_core::{Disposable, DisposableCollection};
use vimlink_rpc::Value;

/// Wrapper of one editor buffer, shared through the registry.
pub struct Buffer {
    api: Api,
    id: i64,
    options: BufferOptions,
    vars: Vars,
    keymaps: KeyMaps,
    writes: ReentrantMutex<()>,
    disposables: DisposableCollection,
}

/// Flags [`Buffer::make_writable`] cleared.
#[must_use]
pub(crate) struct Writable {
    readonly: bool,
    modifiable: bool,
}

impl Buffer {
    pub(crate) fn get_or_create(api: &Api, id: i64) -> Arc<Self> {
        api.registry()
            .get_or_insert_with(ObjectKind::Buffer, id, || Self::new(api.clone(), id))
    }

    fn new(api: Api, id: i64) -> Self {
        let host = api.host().clone();
        Self {
            options: BufferOptions::new(host.clone(), id),
            vars: Vars::buffer(host, id),
            keymaps: KeyMaps::buffer(api.clone(), id),
            api,
            id,
            writes: ReentrantMutex::new(()),
            disposables: DisposableCollection::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn options(&self) -> &BufferOptions {
        &self.options
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn keymaps(&self) -> &KeyMaps {
        &self.keymaps
    }

    pub fn is_current(&self) -> bool {
        self.api.current_buffer_id() == Some(self.id)
    }

    /// Wipe the buffer, then dispose everything attached to it.
    pub fn close(&self) -> Result<()> {
        let wiped = self.api.command(&format!("bwipeout {}", self.id));
        self.disposables.dispose();
        wiped
    }

    /// Full path of the buffer's file, empty for unnamed buffers.
    pub fn path(&self) -> String {
        match self
            .api
            .call_function("expand", vec![Value::from(format!("#{}:p", self.id))])
        {
            Ok(path) => into_string(path).unwrap_or_default(),
            Err(err) => {
                tracing::debug!(buffer = self.id, error = %err, "Failed to expand buffer path");
                String::new()
            }
        }
    }

    /// Windows currently showing this buffer.
    pub fn windows(&self) -> Vec<Arc<Window>> {
        self.api
            .windows()
            .into_iter()
            .filter(|window| window.buffer_id() == Some(self.id))
            .collect()
    }

    pub fn freeze(&self) -> Result<()> {
        self.options.set_modifiable(false)?;
        self.options.set_readonly(true)
    }

    pub fn unfreeze(&self) -> Result<()> {
        self.options.set_modifiable(true)?;
        self.options.set_readonly(false)
    }

    pub fn title(&self) -> String {
        match self
            .api
            .host()
            .call("nvim_buf_get_name", vec![Value::from(self.id)])
        {
            Ok(name) => into_string(name).unwrap_or_default(),
            Err(err) => {
                tracing::debug!(buffer = self.id, error = %err, "Failed to read buffer name");
                String::new()
            }
        }
    }

    pub fn set_title(&self, title: &str) -> Result<()> {
        self.api.host().call(
            "nvim_buf_set_name",
            vec![Value::from(self.id), Value::from(title)],
        )?;
        Ok(())
    }

    pub fn lines(&self) -> Result<Vec<String>> {
        let lines = self.api.host().call(
            "nvim_buf_get_lines",
            vec![
                Value::from(self.id),
                Value::from(0),
                Value::from(-1),
                Value::from(false),
            ],
        )?;
        Ok(value::into_strings(lines))
    }

    /// Replace the whole content, even if the buffer is frozen. Concurrent
    /// writers to the same buffer are serialized.
    pub fn set_lines(&self, lines: &[String]) -> Result<()> {
        let _writes = self.lock_writes();
        let writable = self.make_writable()?;
        self.replace_lines(lines)?;
        self.restore(writable)
    }

    /// A buffer holding a single empty line. Unreadable buffers count as
    /// empty.
    pub fn is_empty(&self) -> bool {
        match self.lines() {
            Ok(lines) => lines.len() <= 1 && lines.first().map_or(true, String::is_empty),
            Err(err) => {
                tracing::debug!(buffer = self.id, error = %err, "Failed to read buffer lines");
                true
            }
        }
    }

    /// Run `f` whenever `event` fires for this buffer, until the buffer is
    /// closed.
    pub fn on(&self, event: Event, f: impl Fn() + Send + Sync + 'static) -> Result<()> {
        let subscription = Subscription::create(&self.api, Target::Buffer(self.id), event, f)?;
        self.disposables.add(subscription);
        Ok(())
    }

    /// Dispose `resource` when the buffer is closed.
    pub fn attach(&self, resource: impl Disposable + 'static) {
        self.disposables.add(resource);
    }

    /// Serializes the unfreeze, write and freeze steps of whole-content
    /// writes. Reentrant: a nested host callback on the dispatch thread may
    /// render the same buffer again while the outer render holds the lock.
    pub(crate) fn lock_writes(&self) -> ReentrantMutexGuard<'_, ()> {
        self.writes.lock()
    }

    /// Clear `readonly` and set `modifiable`, remembering which changed.
    pub(crate) fn make_writable(&self) -> Result<Writable> {
        let writable = Writable {
            readonly: self.options.readonly(),
            modifiable: self.options.modifiable(),
        };
        if writable.readonly {
            self.options.set_readonly(false)?;
        }
        if !writable.modifiable {
            self.options.set_modifiable(true)?;
        }
        Ok(writable)
    }

    fn restore(&self, writable: Writable) -> Result<()> {
        if writable.readonly {
            self.options.set_readonly(true)?;
        }
        if !writable.modifiable {
            self.options.set_modifiable(false)?;
        }
        Ok(())
    }

    /// One `nvim_buf_set_lines` over the whole buffer. Callers hold the write
    /// lock.
    pub(crate) fn replace_lines(&self, lines: &[String]) -> Result<()> {
        self.api.host().call(
            "nvim_buf_set_lines",
            vec![
                Value::from(self.id),
                Value::from(0),
                Value::from(-1),
                Value::from(false),
                value::strings(lines),
            ],
        )?;
        Ok(())
    }
}

impl LiveObject for Buffer {
    fn id(&self) -> i64 {
        self.id
    }

    fn exists(&self) -> bool {
        self.api.buffer_ids().contains(&self.id)
    }

    fn release(&self) {
        self.disposables.dispose();
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("attached", &self.disposables.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vimlink_core::DisposeFn;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn set_lines_restores_frozen_state() {
        let host = FakeHost::new();
        let api = host.api();
        let buffer = api.current_buffer().unwrap();
        buffer.freeze().unwrap();

        buffer.set_lines(&lines(&["one", "two"])).unwrap();

        assert_eq!(buffer.lines().unwrap(), lines(&["one", "two"]));
        assert!(!buffer.options().modifiable());
        assert!(buffer.options().readonly());
    }

    #[test]
    fn set_lines_leaves_writable_buffer_writable() {
        let host = FakeHost::new();
        let api = host.api();
        let buffer = api.current_buffer().unwrap();

        buffer.set_lines(&lines(&["x"])).unwrap();
        assert!(buffer.options().modifiable());
        assert!(!buffer.options().readonly());
    }

    #[test]
    fn emptiness() {
        let host = FakeHost::new();
        let api = host.api();
        let empty = api.current_buffer().unwrap();
        let full = api.buffer_by_id(host.add_buffer(&["text"])).unwrap();
        let blank_lines = api.buffer_by_id(host.add_buffer(&["", ""])).unwrap();

        assert!(empty.is_empty());
        assert!(!full.is_empty());
        assert!(!blank_lines.is_empty());
    }

    #[test]
    fn close_wipes_and_disposes_attachments() {
        let host = FakeHost::new();
        let api = host.api();
        let id = host.add_buffer(&["a"]);
        let buffer = api.buffer_by_id(id).unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let seen = fired.clone();
        buffer
            .on(Event::BufEnter, move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        buffer.attach(DisposeFn::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(host.fire("BufEnter", Some(id)), 1);
        buffer.close().unwrap();

        assert!(host.commands().contains(&format!("bwipeout {id}")));
        assert!(!buffer.exists());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(host.fire("BufEnter", Some(id)), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn windows_showing_the_buffer() {
        let host = FakeHost::new();
        let api = host.api();
        let id = host.add_buffer(&["a"]);
        let first = host.open_window(id);
        let (_, second) = host.open_tab(id);

        let buffer = api.buffer_by_id(id).unwrap();
        let ids: Vec<i64> = buffer.windows().iter().map(|w| w.id()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn title_and_path() {
        let host = FakeHost::new();
        let api = host.api();
        let buffer = api.current_buffer().unwrap();
        buffer.set_title("/tmp/notes.md").unwrap();

        assert_eq!(buffer.title(), "/tmp/notes.md");
        assert_eq!(buffer.path(), "/tmp/notes.md");

        host.fail("nvim_buf_get_name");
        assert_eq!(buffer.title(), "");
    }

    #[test]
    fn current_buffer_follows_focus() {
        let host = FakeHost::new();
        let api = host.api();
        let id = host.add_buffer(&[]);
        let window = host.open_window(id);
        let buffer = api.buffer_by_id(id).unwrap();

        assert!(!buffer.is_current());
        host.focus(window);
        assert!(buffer.is_current());
    }
}
