use crate::value::{as_bool, into_string};
use crate::Result;
use std::sync::Arc;
use vimlink_rpc::{Host, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Buffer(i64),
    Window(i64),
    Tab(i64),
}

impl Scope {
    fn method(self, op: &str) -> String {
        match self {
            Scope::Global => format!("nvim_{op}_var"),
            Scope::Buffer(_) => format!("nvim_buf_{op}_var"),
            Scope::Window(_) => format!("nvim_win_{op}_var"),
            Scope::Tab(_) => format!("nvim_tabpage_{op}_var"),
        }
    }

    fn args(self, name: &str) -> Vec<Value> {
        match self {
            Scope::Global => vec![Value::from(name)],
            Scope::Buffer(id) | Scope::Window(id) | Scope::Tab(id) => {
                vec![Value::from(id), Value::from(name)]
            }
        }
    }
}

/// `g:`, `b:`, `w:` or `t:` variables of one object.
///
/// Typed getters return the zero value when the variable is unset or the
/// host call fails.
#[derive(Clone)]
pub struct Vars {
    host: Arc<dyn Host>,
    scope: Scope,
}

impl Vars {
    pub fn global(host: Arc<dyn Host>) -> Self {
        Self {
            host,
            scope: Scope::Global,
        }
    }

    pub fn buffer(host: Arc<dyn Host>, id: i64) -> Self {
        Self {
            host,
            scope: Scope::Buffer(id),
        }
    }

    pub fn window(host: Arc<dyn Host>, id: i64) -> Self {
        Self {
            host,
            scope: Scope::Window(id),
        }
    }

    pub fn tab(host: Arc<dyn Host>, id: i64) -> Self {
        Self {
            host,
            scope: Scope::Tab(id),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        Ok(self
            .host
            .call(&self.scope.method("get"), self.scope.args(name))?)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut args = self.scope.args(name);
        args.push(value.into());
        self.host.call(&self.scope.method("set"), args)?;
        Ok(())
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.host
            .call(&self.scope.method("del"), self.scope.args(name))?;
        Ok(())
    }

    fn get_or_log(&self, name: &str) -> Option<Value> {
        match self.get(name) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(var = name, scope = ?self.scope, error = %err, "Variable read failed");
                None
            }
        }
    }

    pub fn string(&self, name: &str) -> String {
        self.get_or_log(name)
            .and_then(into_string)
            .unwrap_or_default()
    }

    pub fn bool(&self, name: &str) -> bool {
        self.get_or_log(name)
            .as_ref()
            .and_then(as_bool)
            .unwrap_or(false)
    }

    pub fn int(&self, name: &str) -> i64 {
        self.get_or_log(name)
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }
}
