//! Composable teardown actions.
//!
//! A [`Disposable`] releases something: an autocmd group, a handler table
//! entry, a view's subscriptions. A [`DisposableCollection`] owns many of them
//! and tears them all down in insertion order, isolating failures so that one
//! broken teardown cannot leak every other resource.

use crate::recover::recover;
use parking_lot::Mutex;
use std::sync::Arc;

pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

impl<T: Disposable + ?Sized> Disposable for Arc<T> {
    fn dispose(&self) {
        (**self).dispose()
    }
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
    fn dispose(&self) {
        (**self).dispose()
    }
}

/// A teardown closure that runs at most once.
pub struct DisposeFn {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl DisposeFn {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }
}

impl Disposable for DisposeFn {
    fn dispose(&self) {
        // Take before running so the lock is not held across the closure.
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }
}

impl std::fmt::Debug for DisposeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposeFn")
            .field("pending", &self.action.lock().is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct DisposableCollection {
    members: Mutex<Vec<Box<dyn Disposable>>>,
}

impl DisposableCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, disposable: impl Disposable + 'static) {
        self.members.lock().push(Box::new(disposable));
    }

    pub fn add_fn(&self, action: impl FnOnce() + Send + 'static) {
        self.add(DisposeFn::new(action));
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }
}

impl Disposable for DisposableCollection {
    /// Dispose every member once, in insertion order. A panicking member is
    /// logged and skipped. The collection is empty afterwards; anything added
    /// by a member's teardown is kept for the next pass.
    fn dispose(&self) {
        let members = std::mem::take(&mut *self.members.lock());
        let total = members.len();
        let mut failed = 0usize;
        for member in members {
            if recover("dispose", || member.dispose()).is_none() {
                failed += 1;
            }
        }
        if failed > 0 {
            tracing::warn!(total, failed, "Disposed collection with failures");
        }
    }
}

impl std::fmt::Debug for DisposableCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposableCollection")
            .field("len", &self.len())
            .finish()
    }
}
