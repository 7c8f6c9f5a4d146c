//! Binding of in-memory views to frozen scratch buffers.
//!
//! A [`View`] owns some state and knows how to print it as lines. Attaching
//! it to a buffer turns the buffer into a read-only scratch buffer whose
//! content is replaced wholesale on every [`ViewRenderer::render`].

use crate::buffer::Buffer;
use crate::cursor::Cursor;
use crate::events::Event;
use crate::options::{BufferHidden, BufferType};
use crate::registry::LiveObject;
use crate::{Api, Error, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vimlink_core::{recover, Disposable};

/// Content shown in a buffer through a [`ViewRenderer`].
pub trait View: Send + Sync {
    fn file_type(&self) -> String;

    /// The full content, one entry per line.
    fn lines(&self) -> Vec<String>;

    /// Called once per attach. Views that re-render themselves keep the
    /// renderer.
    fn attach(&self, _renderer: ViewRenderer) {}

    /// Install buffer-local key-maps or subscriptions.
    fn initialize(&self, _buffer: &Arc<Buffer>, _api: &Api) {}

    /// Recompute derived state before [`lines`](Self::lines) is read.
    fn update(&self) {}

    /// Views holding resources return themselves here; they are disposed
    /// when the buffer goes away.
    fn as_disposable(&self) -> Option<&dyn Disposable> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Attached,
    Rendered,
    Disposed,
}

/// Attaches views to buffers.
#[derive(Debug, Clone)]
pub struct Renderer {
    grace: Duration,
}

impl Renderer {
    pub(crate) fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Turn `buffer` into a scratch buffer showing `view` and render it once.
    ///
    /// A failed first render is logged and leaves the binding attached; the
    /// error is only returned when configuring the buffer fails.
    pub fn attach(&self, buffer: &Arc<Buffer>, view: Arc<dyn View>) -> Result<ViewRenderer> {
        let renderer = ViewRenderer {
            binding: Arc::new(Binding {
                buffer: buffer.clone(),
                view: Mutex::new(Some(view.clone())),
                rendered: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        };

        buffer.freeze()?;
        let options = buffer.options();
        options.set_hidden(BufferHidden::Hide)?;
        options.set_buffer_type(BufferType::NoFile)?;
        options.set_listed(false)?;

        recover("view attach", || view.attach(renderer.clone()));
        options.set_file_type(&view.file_type())?;
        recover("view initialize", || view.initialize(buffer, buffer.api()));

        buffer.attach(renderer.clone());
        if view.as_disposable().is_some() {
            self.dispose_with(buffer, &renderer)?;
        }

        tracing::debug!(buffer = buffer.id(), "View attached");
        renderer.render();
        Ok(renderer)
    }

    /// Dispose the view when the buffer is wiped, or when it has been left
    /// and is gone once the grace period ran out.
    fn dispose_with(&self, buffer: &Arc<Buffer>, renderer: &ViewRenderer) -> Result<()> {
        let wiped = renderer.clone();
        buffer.on(Event::BufWipeout, move || wiped.dispose())?;

        let left = renderer.clone();
        let grace = self.grace;
        buffer.on(Event::BufLeave, move || {
            let renderer = left.clone();
            let spawned = thread::Builder::new()
                .name("vimlink-dispose-grace".to_string())
                .spawn(move || {
                    thread::sleep(grace);
                    if renderer.state() != RenderState::Disposed && !renderer.buffer().exists() {
                        renderer.dispose();
                    }
                });
            if let Err(err) = spawned {
                tracing::warn!(error = %err, "Failed to schedule view disposal");
            }
        })
    }
}

struct Binding {
    buffer: Arc<Buffer>,
    view: Mutex<Option<Arc<dyn View>>>,
    rendered: AtomicBool,
    disposed: AtomicBool,
}

impl Binding {
    /// Unfreeze, replace the content, put the cursor back on its line and
    /// freeze again. Stops at the first failure, possibly leaving the buffer
    /// writable.
    fn write(&self, view: &dyn View) -> Result<()> {
        let buffer = &self.buffer;
        let _writes = buffer.lock_writes();

        let window = buffer.api().current_window()?;
        let cursor = match window.buffer_id() {
            Some(id) if id == buffer.id() => Some(window.cursor()?),
            _ => None,
        };

        let _writable = buffer.make_writable()?;
        let lines = recover("view lines", || view.lines()).ok_or(Error::ViewPanicked)?;
        buffer.replace_lines(&lines)?;

        if let Some(cursor) = cursor {
            let last = lines.len().max(1) as i64;
            window.set_cursor(Cursor::new(cursor.line().clamp(1, last), 0))?;
        }
        buffer.freeze()
    }
}

/// Handle on one attached view. Clones share the binding.
#[derive(Clone)]
pub struct ViewRenderer {
    binding: Arc<Binding>,
}

impl ViewRenderer {
    /// Rewrite the buffer from the view. Failures are logged, not returned.
    pub fn render(&self) {
        let view = self.binding.view.lock().clone();
        let Some(view) = view else {
            tracing::debug!(buffer = self.binding.buffer.id(), "Render skipped, view is disposed");
            return;
        };

        if recover("view update", || view.update()).is_none() {
            return;
        }
        match self.binding.write(view.as_ref()) {
            Ok(()) => self.binding.rendered.store(true, Ordering::SeqCst),
            Err(err) => {
                tracing::error!(buffer = self.binding.buffer.id(), error = %err, "Render failed");
            }
        }
    }

    pub fn state(&self) -> RenderState {
        if self.binding.disposed.load(Ordering::SeqCst) {
            RenderState::Disposed
        } else if self.binding.rendered.load(Ordering::SeqCst) {
            RenderState::Rendered
        } else {
            RenderState::Attached
        }
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.binding.buffer
    }
}

impl Disposable for ViewRenderer {
    /// Release the view and detach it from the buffer. Only the first call
    /// does anything.
    fn dispose(&self) {
        if self
            .binding
            .disposed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let view = self.binding.view.lock().take();
        if let Some(disposable) = view.as_deref().and_then(|view| view.as_disposable()) {
            recover("view dispose", || disposable.dispose());
        }
        tracing::debug!(buffer = self.binding.buffer.id(), "View disposed");
    }
}

impl fmt::Debug for ViewRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRenderer")
            .field("buffer", &self.binding.buffer.id())
            .field("state", &self.state())
            .finish()
    }
}
