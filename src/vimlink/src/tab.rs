use crate::buffer::Buffer;
use crate::registry::{LiveObject, ObjectKind};
use crate::vars::Vars;
use crate::window::Window;
use crate::{Api, Result};
use std::fmt;
use std::sync::Arc;
use vimlink_rpc::{handle_id, Value};

pub struct Tab {
    api: Api,
    id: i64,
    vars: Vars,
}

impl Tab {
    pub(crate) fn get_or_create(api: &Api, id: i64) -> Arc<Self> {
        api.registry()
            .get_or_insert_with(ObjectKind::Tab, id, || Self::new(api.clone(), id))
    }

    fn new(api: Api, id: i64) -> Self {
        Self {
            vars: Vars::tab(api.host().clone(), id),
            api,
            id,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn is_current(&self) -> bool {
        self.api.current_tab_id() == Some(self.id)
    }

    fn window_ids(&self) -> Vec<i64> {
        match self
            .api
            .host()
            .call("nvim_tabpage_list_wins", vec![Value::from(self.id)])
        {
            Ok(Value::Array(handles)) => handles.iter().filter_map(handle_id).collect(),
            Ok(other) => {
                tracing::debug!(tab = self.id, reply = %other, "Unexpected window listing");
                Vec::new()
            }
            Err(err) => {
                tracing::debug!(tab = self.id, error = %err, "Failed to list tab windows");
                Vec::new()
            }
        }
    }

    pub fn windows(&self) -> Vec<Arc<Window>> {
        self.window_ids()
            .into_iter()
            .map(|id| Window::get_or_create(&self.api, id))
            .collect()
    }

    pub fn find_window(&self, mut predicate: impl FnMut(&Window) -> bool) -> Option<Arc<Window>> {
        self.windows().into_iter().find(|window| predicate(window.as_ref()))
    }

    /// Whether any window of this tab shows buffer `id`.
    pub fn has_buffer_id(&self, id: i64) -> bool {
        self.windows()
            .iter()
            .any(|window| window.buffer_id() == Some(id))
    }

    pub fn has_buffer(&self, buffer: &Buffer) -> bool {
        self.has_buffer_id(buffer.id())
    }

    /// Close every window of the tab; the first failure stops the rest.
    pub fn close(&self, force: bool) -> Result<()> {
        for window in self.windows() {
            window.close(force)?;
        }
        Ok(())
    }
}

impl LiveObject for Tab {
    fn id(&self) -> i64 {
        self.id
    }

    fn exists(&self) -> bool {
        self.api.tab_ids().contains(&self.id)
    }
}

impl fmt::Debug for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tab").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeHost, FIRST_WINDOW};

    #[test]
    fn windows_and_buffers_of_a_tab() {
        let host = FakeHost::new();
        let api = host.api();
        let id = host.add_buffer(&["x"]);
        let (tab_id, window) = host.open_tab(id);

        let tab = api.tab_by_id(tab_id).unwrap();
        let ids: Vec<i64> = tab.windows().iter().map(|w| w.id()).collect();
        assert_eq!(ids, vec![window]);
        assert!(tab.has_buffer_id(id));
        assert!(!tab.has_buffer_id(1));
        assert!(!tab.is_current());

        let first = api.current_tab().unwrap();
        assert!(first.is_current());
        assert_eq!(
            first.find_window(|w| w.id() == FIRST_WINDOW).map(|w| w.id()),
            Some(FIRST_WINDOW)
        );
    }

    #[test]
    fn close_closes_every_window() {
        let host = FakeHost::new();
        let api = host.api();
        let id = host.add_buffer(&["x"]);
        let (tab_id, window) = host.open_tab(id);
        host.focus(window);
        host.open_window(id);

        let tab = api.tab_by_id(tab_id).unwrap();
        assert_eq!(tab.windows().len(), 2);
        tab.close(false).unwrap();
        assert!(tab.windows().is_empty());
    }
}
