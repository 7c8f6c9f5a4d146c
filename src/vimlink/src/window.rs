use crate::buffer::Buffer;
use crate::cursor::Cursor;
use crate::options::WindowOptions;
use crate::registry::{LiveObject, ObjectKind};
use crate::tab::Tab;
use crate::vars::Vars;
use crate::{Api, Error, Result};
use std::fmt;
use std::sync::Arc;
use vimlink_rpc::{handle_id, Value};

pub struct Window {
    api: Api,
    id: i64,
    options: WindowOptions,
    vars: Vars,
}

impl Window {
    pub(crate) fn get_or_create(api: &Api, id: i64) -> Arc<Self> {
        api.registry()
            .get_or_insert_with(ObjectKind::Window, id, || Self::new(api.clone(), id))
    }

    fn new(api: Api, id: i64) -> Self {
        let host = api.host().clone();
        Self {
            options: WindowOptions::new(host.clone(), id),
            vars: Vars::window(host, id),
            api,
            id,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn options(&self) -> &WindowOptions {
        &self.options
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn is_current(&self) -> bool {
        self.api.current_window_id() == Some(self.id)
    }

    pub fn focus(&self) -> Result<()> {
        self.api
            .host()
            .call("nvim_set_current_win", vec![Value::from(self.id)])?;
        Ok(())
    }

    pub(crate) fn buffer_id(&self) -> Option<i64> {
        self.handle_of("nvim_win_get_buf")
    }

    /// The buffer shown in this window, `None` once the window is gone.
    pub fn buffer(&self) -> Option<Arc<Buffer>> {
        self.buffer_id()
            .map(|id| Buffer::get_or_create(&self.api, id))
    }

    pub fn tab(&self) -> Option<Arc<Tab>> {
        self.handle_of("nvim_win_get_tabpage")
            .map(|id| Tab::get_or_create(&self.api, id))
    }

    pub fn cursor(&self) -> Result<Cursor> {
        let position = self
            .api
            .host()
            .call("nvim_win_get_cursor", vec![Value::from(self.id)])?;
        Cursor::from_value(&position).ok_or(Error::UnexpectedReply {
            method: "nvim_win_get_cursor",
            expected: "[line, column]",
        })
    }

    pub fn set_cursor(&self, cursor: Cursor) -> Result<()> {
        self.api.host().call(
            "nvim_win_set_cursor",
            vec![Value::from(self.id), cursor.to_value()],
        )?;
        Ok(())
    }

    pub fn close(&self, force: bool) -> Result<()> {
        self.api.host().call(
            "nvim_win_close",
            vec![Value::from(self.id), Value::from(force)],
        )?;
        Ok(())
    }

    fn handle_of(&self, method: &str) -> Option<i64> {
        match self.api.host().call(method, vec![Value::from(self.id)]) {
            Ok(handle) => handle_id(&handle),
            Err(err) => {
                tracing::debug!(window = self.id, method, error = %err, "Window lookup failed");
                None
            }
        }
    }
}

impl LiveObject for Window {
    fn id(&self) -> i64 {
        self.id
    }

    fn exists(&self) -> bool {
        self.api.window_ids().contains(&self.id)
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window").field("id", &self.id).finish()
    }
}
