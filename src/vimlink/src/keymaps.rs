use crate::handler::HandlerFunc;
use crate::mode::Mode;
use crate::options::{Clipboard, Selection};
use crate::value::{self, into_string};
use crate::{Api, Result};
use std::sync::Arc;
use vimlink_core::Disposable;
use vimlink_rpc::Value;

/// Key mappings, either global or local to one buffer. Every mapping is
/// `silent` and `nowait`.
#[derive(Clone)]
pub struct KeyMaps {
    api: Api,
    buffer: Option<i64>,
}

impl KeyMaps {
    pub(crate) fn global(api: Api) -> Self {
        Self { api, buffer: None }
    }

    pub(crate) fn buffer(api: Api, id: i64) -> Self {
        Self {
            api,
            buffer: Some(id),
        }
    }

    fn options() -> Value {
        value::map([("silent", Value::from(true)), ("nowait", Value::from(true))])
    }

    pub fn set(&self, mode: Mode, keys: &str, rhs: &str) -> Result<()> {
        let mut args = vec![
            Value::from(mode.as_str()),
            Value::from(keys),
            Value::from(rhs),
            Self::options(),
        ];
        let method = match self.buffer {
            Some(id) => {
                args.insert(0, Value::from(id));
                "nvim_buf_set_keymap"
            }
            None => "nvim_set_keymap",
        };
        self.api.host().call(method, args)?;
        Ok(())
    }

    pub fn delete(&self, mode: Mode, keys: &str) -> Result<()> {
        let mut args = vec![Value::from(mode.as_str()), Value::from(keys)];
        let method = match self.buffer {
            Some(id) => {
                args.insert(0, Value::from(id));
                "nvim_buf_del_keymap"
            }
            None => "nvim_del_keymap",
        };
        self.api.host().call(method, args)?;
        Ok(())
    }

    /// Map `keys` to nothing.
    pub fn disable(&self, mode: Mode, keys: &str) -> Result<()> {
        self.set(mode, keys, "<nop>")
    }

    /// Run `f` when `keys` are pressed. Disposing the returned handler
    /// leaves the mapping in place but makes it do nothing.
    pub fn set_func(
        &self,
        mode: Mode,
        keys: &str,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Result<HandlerFunc> {
        let handler = self.api.handlers().create(move |_| f());
        if let Err(err) = self.set(mode, keys, &format!(":silent call {handler}<CR>")) {
            handler.dispose();
            return Err(err);
        }
        Ok(handler)
    }

    /// Make `keys` an operator in normal mode (`keys` + motion) and an
    /// action on the selection in visual mode. The covered text is yanked,
    /// passed through `transform`, and pasted back over itself.
    pub fn set_text_action(
        &self,
        keys: &str,
        transform: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Result<TextAction> {
        let action: Arc<dyn Fn(&[Value]) + Send + Sync> = {
            let api = self.api.clone();
            Arc::new(move |args: &[Value]| {
                if let Err(err) = run_text_action(&api, args, &transform) {
                    tracing::error!(error = %err, "Text action failed");
                }
            })
        };

        let motion = {
            let api = self.api.clone();
            let action = action.clone();
            self.api.handlers().create(move |_| {
                let action = action.clone();
                if let Err(err) = api
                    .handlers()
                    .set_operator_func(move |args| action(args))
                {
                    tracing::error!(error = %err, "Failed to install text action operator");
                }
            })
        };
        let selection = self.api.handlers().create(move |args| action(args));
        let text_action = TextAction { motion, selection };

        let mapped = self
            .set(
                Mode::Normal,
                keys,
                &format!(":<C-U>silent call {}<CR>g@", text_action.motion),
            )
            .and_then(|()| {
                self.set(
                    Mode::VisualOnly,
                    keys,
                    &format!(
                        ":<C-U>silent call {}<CR>",
                        text_action.selection.call_with(&["visualmode()"])
                    ),
                )
            });
        if let Err(err) = mapped {
            text_action.dispose();
            return Err(err);
        }
        Ok(text_action)
    }
}

/// The two handlers behind a text action mapping.
#[derive(Debug, Clone)]
pub struct TextAction {
    motion: HandlerFunc,
    selection: HandlerFunc,
}

impl TextAction {
    pub fn motion(&self) -> &HandlerFunc {
        &self.motion
    }

    pub fn selection(&self) -> &HandlerFunc {
        &self.selection
    }
}

impl Disposable for TextAction {
    fn dispose(&self) {
        self.motion.dispose();
        self.selection.dispose();
    }
}

/// Normal-mode keys that yank the text a text action covers. `kind` is what
/// the host passes to an operator function, or `visualmode()`.
fn yank_keys(kind: &str) -> String {
    if !kind.is_empty() && kind.chars().all(|c| c.is_ascii_digit()) {
        format!("V{kind}$y")
    } else if kind.chars().count() == 1 {
        format!("`<{kind}`>y")
    } else {
        match kind {
            "line" => "'[V']y".to_string(),
            "block" => "`[\u{16}`]y".to_string(),
            _ => "`[v`]y".to_string(),
        }
    }
}

fn run_text_action(api: &Api, args: &[Value], transform: &dyn Fn(&str) -> String) -> Result<()> {
    let [kind] = args else {
        tracing::debug!(args = args.len(), "Text action called with unexpected arguments");
        return Ok(());
    };
    let kind = kind.as_str().unwrap_or_default();

    let options = api.global().options();
    let selection = options.selection();
    let clipboard = options.clipboard();
    let saved = read_register(api)?;

    options.set_selection(Selection::Inclusive)?;
    options.set_clipboard(Clipboard::None)?;
    let result = replace_text(api, kind, transform);

    let restored = options
        .set_selection(selection)
        .and_then(|()| options.set_clipboard(clipboard))
        .and_then(|()| write_register(api, &saved.0, &saved.1));
    result.and(restored)
}

fn replace_text(api: &Api, kind: &str, transform: &dyn Fn(&str) -> String) -> Result<()> {
    api.command(&format!("normal! {}", yank_keys(kind)))?;
    let (content, register_type) = read_register(api)?;
    let replacement = transform(&content);
    write_register(api, &replacement, &register_type)?;
    api.command("normal! gvp")
}

fn read_register(api: &Api) -> Result<(String, String)> {
    let content = api.call_function("getreg", vec![Value::from("\"")])?;
    let register_type = api.call_function("getregtype", vec![Value::from("\"")])?;
    Ok((
        into_string(content).unwrap_or_default(),
        into_string(register_type).unwrap_or_default(),
    ))
}

fn write_register(api: &Api, content: &str, register_type: &str) -> Result<()> {
    api.call_function(
        "setreg",
        vec![
            Value::from("\""),
            Value::from(content),
            Value::from(register_type),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn call_in(rhs: &str) -> &str {
        let start = rhs.find("call ").map(|i| i + 5).unwrap_or(0);
        let end = rhs[start..].find("<CR>").map(|i| start + i).unwrap_or(rhs.len());
        &rhs[start..end]
    }

    #[test]
    fn yank_keys_follow_motion_kind() {
        assert_eq!(yank_keys("char"), "`[v`]y");
        assert_eq!(yank_keys("line"), "'[V']y");
        assert_eq!(yank_keys("block"), "`[\u{16}`]y");
        assert_eq!(yank_keys("v"), "`<v`>y");
        assert_eq!(yank_keys("3"), "V3$y");
    }

    #[test]
    fn set_func_maps_to_a_handler_call() {
        let host = FakeHost::new();
        let api = host.api();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler = api
            .global()
            .keymaps()
            .set_func(Mode::Normal, "<leader>x", move || {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let keymap = host.keymap("n", "<leader>x").unwrap();
        assert_eq!(keymap.rhs, format!(":silent call {handler}<CR>"));
        assert_eq!(keymap.buffer, None);

        host.run_call(call_in(&keymap.rhs)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn buffer_keymaps_are_local() {
        let host = FakeHost::new();
        let api = host.api();
        let keymaps = KeyMaps::buffer(api.clone(), 1);
        keymaps.disable(Mode::Insert, "<Tab>").unwrap();
        assert_eq!(
            host.keymap("i", "<Tab>").map(|k| (k.buffer, k.rhs)),
            Some((Some(1), "<nop>".to_string()))
        );

        keymaps.delete(Mode::Insert, "<Tab>").unwrap();
        assert!(host.keymap("i", "<Tab>").is_none());
        assert!(keymaps.delete(Mode::Insert, "<Tab>").is_err());
    }

    #[test]
    fn text_action_transforms_the_motion_and_restores_state() {
        let host = FakeHost::new();
        let api = host.api();
        api.global()
            .keymaps()
            .set_text_action("cu", |text| text.to_uppercase())
            .unwrap();
        host.set_register("\"", "kept");
        host.set_motion_text("hello world");

        // `cu` in normal mode installs the operator; the host then calls it
        // with the motion type once the motion is typed.
        let normal = host.keymap("n", "cu").unwrap();
        assert!(normal.rhs.ends_with("<CR>g@"));
        host.run_call(call_in(&normal.rhs)).unwrap();
        let operator = api.handlers().operator_function_name();
        assert_eq!(host.global_option("operatorfunc"), Value::from(operator.as_str()));
        host.invoke(&operator, vec![Value::from("char")]).unwrap();

        assert_eq!(host.pasted(), vec!["HELLO WORLD"]);
        assert_eq!(host.register("\""), "kept");
        assert_eq!(host.global_option("selection"), Value::from("inclusive"));
        assert!(host.commands().contains(&"normal! `[v`]y".to_string()));
    }

    #[test]
    fn text_action_over_a_visual_selection() {
        let host = FakeHost::new();
        let api = host.api();
        api.global()
            .keymaps()
            .set_text_action("cl", |text| text.to_lowercase())
            .unwrap();
        host.set_motion_text("LOUD");

        let visual = host.keymap("x", "cl").unwrap();
        host.run_call(call_in(&visual.rhs)).unwrap();

        assert_eq!(host.pasted(), vec!["loud"]);
        assert!(host.commands().contains(&"normal! `<v`>y".to_string()));
    }

    #[test]
    fn failed_mapping_releases_handlers() {
        let host = FakeHost::new();
        let api = host.api();
        let before = api.handlers().len();
        host.fail("nvim_set_keymap");

        assert!(api
            .global()
            .keymaps()
            .set_text_action("cu", |text| text.to_string())
            .is_err());
        assert_eq!(api.handlers().len(), before);
    }
}
