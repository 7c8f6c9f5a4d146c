//! Identity cache for wrappers of host objects.
//!
//! Each kind keeps its wrappers in insertion order. Lookups scan linearly;
//! wrapper counts are in the tens. Entries are only evicted by
//! [`Registry::garbage_collect`], which the [`Api`](crate::Api) runs when the
//! host reports that objects of that kind went away.

use crate::events::Event;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Window,
    Tab,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectKind::Buffer => "buffer",
            ObjectKind::Window => "window",
            ObjectKind::Tab => "tab",
        })
    }
}

/// Host events after which a kind is swept.
pub const SWEEP_TRIGGERS: &[(Event, ObjectKind)] = &[
    (Event::BufDelete, ObjectKind::Buffer),
    (Event::BufWipeout, ObjectKind::Buffer),
    (Event::TabClosed, ObjectKind::Tab),
    (Event::BufWinLeave, ObjectKind::Window),
];

/// Upcast to `Any` so cached trait objects can be recovered as their
/// concrete wrapper type.
pub trait AsAny {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A cached wrapper of one host object.
pub trait LiveObject: AsAny + Send + Sync {
    fn id(&self) -> i64;

    /// Whether the host still has this object. Usually a host round-trip.
    fn exists(&self) -> bool;

    /// Release resources attached to the wrapper. Not called on eviction.
    fn release(&self) {}
}

pub type Object = Arc<dyn LiveObject>;

#[derive(Default)]
pub struct Registry {
    content: Mutex<HashMap<ObjectKind, Vec<Object>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ObjectKind, id: i64) -> Option<Object> {
        self.content
            .lock()
            .get(&kind)?
            .iter()
            .find(|o| o.id() == id)
            .cloned()
    }

    /// [`get`](Self::get), downcast to the concrete wrapper type.
    pub fn get_as<T: LiveObject + 'static>(&self, kind: ObjectKind, id: i64) -> Option<Arc<T>> {
        self.get(kind, id)?.into_any().downcast::<T>().ok()
    }

    /// Appends without checking for an existing entry; see
    /// [`get_or_insert_with`](Self::get_or_insert_with).
    pub fn add(&self, kind: ObjectKind, object: Object) {
        self.content.lock().entry(kind).or_default().push(object);
    }

    /// The cached wrapper for `(kind, id)`, or a new one from `create`.
    /// `create` runs under the registry lock and must not call the host.
    pub fn get_or_insert_with<T: LiveObject + 'static>(
        &self,
        kind: ObjectKind,
        id: i64,
        create: impl FnOnce() -> T,
    ) -> Arc<T> {
        let mut content = self.content.lock();
        let objects = content.entry(kind).or_default();
        if let Some(existing) = objects.iter().find(|o| o.id() == id) {
            match existing.clone().into_any().downcast::<T>() {
                Ok(existing) => return existing,
                Err(_) => tracing::warn!(%kind, id, "Cached object has an unexpected type"),
            }
        }

        let created = Arc::new(create());
        objects.push(created.clone());
        created
    }

    /// Evict every wrapper of `kind` whose object no longer exists and return
    /// them, in cache order. Evicted wrappers are not released.
    ///
    /// Liveness checks run without the lock held, since each one is a host
    /// round-trip that may dispatch nested callbacks.
    pub fn garbage_collect(&self, kind: ObjectKind) -> Vec<Object> {
        let snapshot: Vec<Object> = match self.content.lock().get(&kind) {
            Some(objects) => objects.clone(),
            None => return Vec::new(),
        };
        let dead: Vec<Object> = snapshot.into_iter().filter(|o| !o.exists()).collect();
        if dead.is_empty() {
            return dead;
        }

        if let Some(objects) = self.content.lock().get_mut(&kind) {
            objects.retain(|o| !dead.iter().any(|d| same_object(o, d)));
        }
        for object in &dead {
            tracing::debug!(%kind, id = object.id(), "Evicted dead object");
        }
        dead
    }

    /// Remove every cached wrapper of every kind.
    pub fn clear(&self) -> Vec<Object> {
        self.content
            .lock()
            .drain()
            .flat_map(|(_, objects)| objects)
            .collect()
    }

    pub fn ids(&self, kind: ObjectKind) -> Vec<i64> {
        self.content
            .lock()
            .get(&kind)
            .map(|objects| objects.iter().map(|o| o.id()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: ObjectKind) -> usize {
        self.content.lock().get(&kind).map_or(0, Vec::len)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = self.content.lock();
        let mut map = f.debug_map();
        for (kind, objects) in content.iter() {
            map.entry(kind, &objects.iter().map(|o| o.id()).collect::<Vec<_>>());
        }
        map.finish()
    }
}

fn same_object(a: &Object, b: &Object) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
