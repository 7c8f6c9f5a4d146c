//! Typed accessors over `nvim_get_option_value` / `nvim_set_option_value`.
//!
//! Getters fall back to the option's zero value when the host call fails;
//! setters report the failure.

use crate::value::{self, as_bool, into_string};
use crate::Result;
use std::sync::Arc;
use vimlink_rpc::{Host, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Buffer(i64),
    Window(i64),
}

/// Option access bound to one scope.
#[derive(Clone)]
pub struct Options {
    host: Arc<dyn Host>,
    scope: Scope,
}

impl Options {
    fn new(host: Arc<dyn Host>, scope: Scope) -> Self {
        Self { host, scope }
    }

    fn scope_value(&self) -> Value {
        match self.scope {
            Scope::Global => value::empty_map(),
            Scope::Buffer(id) => value::map([("buf", Value::from(id))]),
            Scope::Window(id) => value::map([("win", Value::from(id))]),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        Ok(self.host.call(
            "nvim_get_option_value",
            vec![Value::from(name), self.scope_value()],
        )?)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.host.call(
            "nvim_set_option_value",
            vec![Value::from(name), value.into(), self.scope_value()],
        )?;
        Ok(())
    }

    fn get_or_log(&self, name: &str) -> Option<Value> {
        match self.get(name) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(option = name, scope = ?self.scope, error = %err, "Option read failed");
                None
            }
        }
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

    pub fn string(&self, name: &str) -> String {
        self.get_or_log(name)
            .and_then(into_string)
            .unwrap_or_default()
    }
}

macro_rules! string_option {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub enum $name {
            #[default]
            $($variant,)*
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value,)*
                }
            }

            /// Unrecognized values map to the default.
            pub fn parse(s: &str) -> Self {
                match s {
                    $($value => $name::$variant,)*
                    _ => Self::default(),
                }
            }
        }
    };
}

string_option!(
    /// `bufhidden`
    BufferHidden {
        Default => "",
        Hide => "hide",
        Unload => "unload",
        Delete => "delete",
        Wipe => "wipe",
    }
);

string_option!(
    /// `buftype`
    BufferType {
        Normal => "",
        AcWrite => "acwrite",
        Help => "help",
        NoFile => "nofile",
        NoWrite => "nowrite",
        QuickFix => "quickfix",
        Terminal => "terminal",
    }
);

string_option!(
    /// `signcolumn`
    SignColumn {
        Auto => "auto",
        No => "no",
        Yes => "yes",
        Number => "number",
    }
);

string_option!(
    /// `foldmethod`
    FoldMethod {
        Manual => "manual",
        Indent => "indent",
        Expr => "expr",
        Marker => "marker",
        Syntax => "syntax",
        Diff => "diff",
    }
);

string_option!(
    /// `selection`
    Selection {
        Inclusive => "inclusive",
        Old => "old",
        Exclusive => "exclusive",
    }
);

string_option!(
    /// `clipboard`
    Clipboard {
        None => "",
        Unnamed => "unnamed",
        UnnamedPlus => "unnamedplus",
    }
);

macro_rules! bool_accessors {
    ($($get:ident / $set:ident => $option:literal),* $(,)?) => {
        $(
            pub fn $get(&self) -> bool {
                self.0.bool($option)
            }

            pub fn $set(&self, value: bool) -> Result<()> {
                self.0.set($option, value)
            }
        )*
    };
}

#[derive(Clone)]
pub struct BufferOptions(Options);

impl BufferOptions {
    pub fn new(host: Arc<dyn Host>, buffer: i64) -> Self {
        Self(Options::new(host, Scope::Buffer(buffer)))
    }

    bool_accessors! {
        modifiable / set_modifiable => "modifiable",
        readonly / set_readonly => "readonly",
        swapfile / set_swapfile => "swapfile",
        listed / set_listed => "buflisted",
    }

    pub fn hidden(&self) -> BufferHidden {
        BufferHidden::parse(&self.0.string("bufhidden"))
    }

    pub fn set_hidden(&self, value: BufferHidden) -> Result<()> {
        self.0.set("bufhidden", value.as_str())
    }

    pub fn buffer_type(&self) -> BufferType {
        BufferType::parse(&self.0.string("buftype"))
    }

    pub fn set_buffer_type(&self, value: BufferType) -> Result<()> {
        self.0.set("buftype", value.as_str())
    }

    pub fn file_type(&self) -> String {
        self.0.string("filetype")
    }

    pub fn set_file_type(&self, value: &str) -> Result<()> {
        self.0.set("filetype", value)
    }

    /// Untyped access for options without an accessor.
    pub fn raw(&self) -> &Options {
        &self.0
    }
}

#[derive(Clone)]
pub struct WindowOptions(Options);

impl WindowOptions {
    pub fn new(host: Arc<dyn Host>, window: i64) -> Self {
        Self(Options::new(host, Scope::Window(window)))
    }

    bool_accessors! {
        fixed_width / set_fixed_width => "winfixwidth",
        number / set_number => "number",
        relative_number / set_relative_number => "relativenumber",
        fold_enable / set_fold_enable => "foldenable",
        wrap / set_wrap => "wrap",
        cursor_line / set_cursor_line => "cursorline",
        cursor_column / set_cursor_column => "cursorcolumn",
        list / set_list => "list",
        spell / set_spell => "spell",
    }

    pub fn fold_column(&self) -> String {
        self.0.string("foldcolumn")
    }

    pub fn set_fold_column(&self, value: &str) -> Result<()> {
        self.0.set("foldcolumn", value)
    }

    pub fn fold_method(&self) -> FoldMethod {
        FoldMethod::parse(&self.0.string("foldmethod"))
    }

    pub fn set_fold_method(&self, value: FoldMethod) -> Result<()> {
        self.0.set("foldmethod", value.as_str())
    }

    pub fn sign_column(&self) -> SignColumn {
        SignColumn::parse(&self.0.string("signcolumn"))
    }

    pub fn set_sign_column(&self, value: SignColumn) -> Result<()> {
        self.0.set("signcolumn", value.as_str())
    }

    pub fn width(&self) -> i64 {
        self.0.int("winwidth")
    }

    pub fn set_width(&self, value: i64) -> Result<()> {
        self.0.set("winwidth", value)
    }

    pub fn color_column(&self) -> String {
        self.0.string("colorcolumn")
    }

    pub fn set_color_column(&self, value: &str) -> Result<()> {
        self.0.set("colorcolumn", value)
    }

    pub fn raw(&self) -> &Options {
        &self.0
    }
}

#[derive(Clone)]
pub struct GlobalOptions(Options);

impl GlobalOptions {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self(Options::new(host, Scope::Global))
    }

    pub fn operator_func(&self) -> String {
        self.0.string("operatorfunc")
    }

    pub fn set_operator_func(&self, name: &str) -> Result<()> {
        self.0.set("operatorfunc", name)
    }

    pub fn selection(&self) -> Selection {
        Selection::parse(&self.0.string("selection"))
    }

    pub fn set_selection(&self, value: Selection) -> Result<()> {
        self.0.set("selection", value.as_str())
    }

    pub fn clipboard(&self) -> Clipboard {
        Clipboard::parse(&self.0.string("clipboard"))
    }

    pub fn set_clipboard(&self, value: Clipboard) -> Result<()> {
        self.0.set("clipboard", value.as_str())
    }

    pub fn raw(&self) -> &Options {
        &self.0
    }
}
