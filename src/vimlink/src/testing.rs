//! An in-memory editor used by the test suites.
//!
//! [`FakeHost`] answers the subset of the editor API this crate uses, keeps
//! buffers, windows, tabs, options, variables, key-maps and autocmds in
//! memory, and records every command it is sent. Host-side Vimscript is not
//! evaluated; instead tests drive the plugin side through [`FakeHost::fire`]
//! (autocmds) and [`FakeHost::run_call`] (a handler call expression taken
//! from a key-map or autocmd).

use crate::value::{self, into_string};
use crate::Api;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use vimlink_core::{InstallationId, RuntimeConfig, Token};
use vimlink_rpc::{handle_id, handle_value, HandleKind, Host, MethodHandler, MethodTable, RpcError, Value};

/// Window id of the window every fake host starts with.
pub const FIRST_WINDOW: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    pub buffer: Option<i64>,
    pub mode: String,
    pub lhs: String,
    pub rhs: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autocmd {
    pub group: Option<String>,
    pub event: String,
    pub buffer: Option<i64>,
    pub command: String,
}

#[derive(Default)]
struct FakeBuffer {
    lines: Vec<String>,
    name: String,
    options: HashMap<String, Value>,
    vars: HashMap<String, Value>,
    writes: Vec<String>,
}

struct FakeWindow {
    buffer: i64,
    tab: i64,
    cursor: (i64, i64),
    options: HashMap<String, Value>,
    vars: HashMap<String, Value>,
}

#[derive(Default)]
struct FakeTab {
    vars: HashMap<String, Value>,
}

struct State {
    buffers: BTreeMap<i64, FakeBuffer>,
    windows: BTreeMap<i64, FakeWindow>,
    tabs: BTreeMap<i64, FakeTab>,
    current_window: i64,
    next_buffer: i64,
    next_window: i64,
    global_vars: HashMap<String, Value>,
    global_options: HashMap<String, Value>,
    registers: HashMap<String, (String, String)>,
    keymaps: Vec<Keymap>,
    autocmds: Vec<Autocmd>,
    commands: Vec<String>,
    calls: Vec<String>,
    failing: HashSet<String>,
    motion_text: String,
    pasted: Vec<String>,
}

type HostResult = Result<Value, String>;

pub struct FakeHost {
    state: Mutex<State>,
    methods: MethodTable,
}

impl FakeHost {
    /// One tab with one window showing one empty buffer.
    pub fn new() -> Arc<Self> {
        let mut state = State {
            buffers: BTreeMap::new(),
            windows: BTreeMap::new(),
            tabs: BTreeMap::new(),
            current_window: FIRST_WINDOW,
            next_buffer: 1,
            next_window: FIRST_WINDOW,
            global_vars: HashMap::new(),
            global_options: HashMap::from([
                ("operatorfunc".to_string(), Value::from("")),
                ("selection".to_string(), Value::from("inclusive")),
                ("clipboard".to_string(), Value::from("")),
            ]),
            registers: HashMap::new(),
            keymaps: Vec::new(),
            autocmds: Vec::new(),
            commands: Vec::new(),
            calls: Vec::new(),
            failing: HashSet::new(),
            motion_text: String::new(),
            pasted: Vec::new(),
        };
        let buffer = state.create_buffer(&[""]);
        state.tabs.insert(1, FakeTab::default());
        let window = state.create_window(buffer, 1);
        state.current_window = window;

        Arc::new(Self {
            state: Mutex::new(state),
            methods: MethodTable::new(),
        })
    }

    /// An `Api` over this host with a fresh installation id and a short
    /// disposal grace period.
    pub fn api(self: &Arc<Self>) -> Api {
        let runtime = RuntimeConfig {
            activation_delay_ms: 0,
            dispose_grace_ms: 20,
            installation_id_file: None,
        };
        match Api::new(self.clone(), InstallationId::new(Token::generate()), runtime) {
            Ok(api) => api,
            Err(err) => panic!("fake host rejected Api setup: {err}"),
        }
    }

    pub fn add_buffer(&self, lines: &[&str]) -> i64 {
        self.state.lock().create_buffer(lines)
    }

    /// Open a window on `buffer` in the current tab without focusing it.
    pub fn open_window(&self, buffer: i64) -> i64 {
        let mut state = self.state.lock();
        let tab = state.current_tab();
        state.create_window(buffer, tab)
    }

    pub fn open_tab(&self, buffer: i64) -> (i64, i64) {
        let mut state = self.state.lock();
        let tab = state.tabs.keys().max().copied().unwrap_or(0) + 1;
        state.tabs.insert(tab, FakeTab::default());
        let window = state.create_window(buffer, tab);
        (tab, window)
    }

    pub fn focus(&self, window: i64) {
        self.state.lock().current_window = window;
    }

    /// Remove a buffer and every window showing it, as `:bwipeout` does.
    pub fn wipe_buffer(&self, id: i64) {
        self.state.lock().wipe_buffer(id);
    }

    pub fn close_window(&self, id: i64) {
        self.state.lock().close_window(id);
    }

    pub fn close_tab(&self, id: i64) {
        let mut state = self.state.lock();
        let windows: Vec<i64> = state
            .windows
            .iter()
            .filter(|(_, w)| w.tab == id)
            .map(|(id, _)| *id)
            .collect();
        for window in windows {
            state.close_window(window);
        }
        state.tabs.remove(&id);
    }

    pub fn buffer_lines(&self, id: i64) -> Vec<String> {
        self.state
            .lock()
            .buffers
            .get(&id)
            .map(|b| b.lines.clone())
            .unwrap_or_default()
    }

    pub fn buffer_option(&self, id: i64, name: &str) -> Value {
        self.state
            .lock()
            .buffers
            .get(&id)
            .and_then(|b| b.options.get(name).cloned())
            .unwrap_or(Value::Nil)
    }

    /// Changes of `modifiable`, `readonly` and the content of buffer `id`,
    /// in order. Option changes read `name=value`; content writes read
    /// `lines`.
    pub fn buffer_writes(&self, id: i64) -> Vec<String> {
        self.state
            .lock()
            .buffers
            .get(&id)
            .map(|b| b.writes.clone())
            .unwrap_or_default()
    }

    pub fn set_buffer_option(&self, id: i64, name: &str, value: impl Into<Value>) {
        if let Some(buffer) = self.state.lock().buffers.get_mut(&id) {
            buffer.options.insert(name.to_string(), value.into());
        }
    }

    pub fn global_option(&self, name: &str) -> Value {
        self.state
            .lock()
            .global_options
            .get(name)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn window_cursor(&self, id: i64) -> Option<(i64, i64)> {
        self.state.lock().windows.get(&id).map(|w| w.cursor)
    }

    pub fn set_window_cursor(&self, id: i64, line: i64, column: i64) {
        if let Some(window) = self.state.lock().windows.get_mut(&id) {
            window.cursor = (line, column);
        }
    }

    pub fn register(&self, name: &str) -> String {
        self.state
            .lock()
            .registers
            .get(name)
            .map(|(value, _)| value.clone())
            .unwrap_or_default()
    }

    pub fn set_register(&self, name: &str, value: &str) {
        self.state
            .lock()
            .registers
            .insert(name.to_string(), (value.to_string(), "v".to_string()));
    }

    /// Text a `normal! ...y` yank puts into the unnamed register.
    pub fn set_motion_text(&self, text: &str) {
        self.state.lock().motion_text = text.to_string();
    }

    /// Register contents at each `normal! gvp`.
    pub fn pasted(&self) -> Vec<String> {
        self.state.lock().pasted.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Every method called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn keymaps(&self) -> Vec<Keymap> {
        self.state.lock().keymaps.clone()
    }

    pub fn keymap(&self, mode: &str, lhs: &str) -> Option<Keymap> {
        self.state
            .lock()
            .keymaps
            .iter()
            .find(|k| k.mode == mode && k.lhs == lhs)
            .cloned()
    }

    pub fn autocmds(&self) -> Vec<Autocmd> {
        self.state.lock().autocmds.clone()
    }

    /// Make every later call to `method` fail.
    pub fn fail(&self, method: &str) {
        self.state.lock().failing.insert(method.to_string());
    }

    pub fn heal(&self, method: &str) {
        self.state.lock().failing.remove(method);
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Invoke a registered plugin method, as `rpcrequest` would.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> HostResult {
        let handler = self
            .methods
            .get(method)
            .ok_or_else(|| format!("unknown method {method}"))?;
        handler(args)
    }

    /// Run a call expression such as `Handler_x('token', visualmode())`.
    /// Quoted arguments are passed as strings; `visualmode()` evaluates to
    /// `"v"`; anything else is passed verbatim.
    pub fn run_call(&self, expression: &str) -> HostResult {
        let (method, args) =
            parse_call(expression).ok_or_else(|| format!("not a call: {expression}"))?;
        self.invoke(&method, args)
    }

    /// Fire every autocmd registered for `event` whose pattern matches
    /// `buffer`. Returns how many ran.
    pub fn fire(&self, event: &str, buffer: Option<i64>) -> usize {
        let commands: Vec<String> = self
            .state
            .lock()
            .autocmds
            .iter()
            .filter(|a| a.event.eq_ignore_ascii_case(event))
            .filter(|a| a.buffer.is_none() || a.buffer == buffer)
            .map(|a| a.command.clone())
            .collect();

        for command in &commands {
            let expression = command.strip_prefix("call ").unwrap_or(command);
            if let Err(err) = self.run_call(expression) {
                panic!("autocmd {command:?} failed: {err}");
            }
        }
        commands.len()
    }

    fn call_atomic(&self, args: Vec<Value>) -> HostResult {
        let calls = match args.into_iter().next() {
            Some(Value::Array(calls)) => calls,
            _ => return Err("nvim_call_atomic expects a list of calls".into()),
        };

        let mut results = Vec::new();
        for (index, call) in calls.into_iter().enumerate() {
            let mut parts = match call {
                Value::Array(parts) => parts.into_iter(),
                _ => return Err("malformed atomic call".into()),
            };
            let method = parts.next().and_then(into_string).unwrap_or_default();
            let args = match parts.next() {
                Some(Value::Array(args)) => args,
                _ => Vec::new(),
            };
            match self.call(&method, args) {
                Ok(value) => results.push(value),
                Err(err) => {
                    let error = Value::Array(vec![
                        Value::from(index as i64),
                        Value::from(0),
                        Value::from(err.to_string()),
                    ]);
                    return Ok(Value::Array(vec![Value::Array(results), error]));
                }
            }
        }
        Ok(Value::Array(vec![Value::Array(results), Value::Nil]))
    }
}

impl Host for FakeHost {
    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        {
            let mut state = self.state.lock();
            state.calls.push(method.to_string());
            if state.failing.contains(method) {
                return Err(remote(method, "injected failure"));
            }
        }

        let result = match method {
            "nvim_call_atomic" => self.call_atomic(args),
            _ => self.state.lock().handle(method, args),
        };
        result.map_err(|message| remote(method, &message))
    }

    fn register(&self, method: &str, handler: MethodHandler) {
        self.methods.insert(method, handler);
    }
}

fn remote(method: &str, message: &str) -> RpcError {
    RpcError::Remote {
        method: method.to_string(),
        message: message.to_string(),
    }
}

fn parse_call(expression: &str) -> Option<(String, Vec<Value>)> {
    let open = expression.find('(')?;
    let method = expression[..open].trim().to_string();
    let inner = expression[open + 1..].trim_end().strip_suffix(')')?;
    let args = inner
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(|arg| match arg {
            "visualmode()" => Value::from("v"),
            quoted if quoted.len() >= 2 && quoted.starts_with('\'') && quoted.ends_with('\'') => {
                Value::from(&quoted[1..quoted.len() - 1])
            }
            other => Value::from(other),
        })
        .collect();
    Some((method, args))
}

fn arg_id(args: &[Value], index: usize) -> Result<i64, String> {
    args.get(index)
        .and_then(handle_id)
        .ok_or_else(|| format!("argument {index} is not a handle"))
}

fn arg_str(args: &[Value], index: usize) -> Result<String, String> {
    args.get(index)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| format!("argument {index} is not a string"))
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Nil)
}

fn handles(kind: HandleKind, ids: impl Iterator<Item = i64>) -> Value {
    Value::Array(ids.map(|id| handle_value(kind, id)).collect())
}

fn get_var(vars: &HashMap<String, Value>, name: &str) -> HostResult {
    vars.get(name)
        .cloned()
        .ok_or_else(|| format!("Key not found: {name}"))
}

fn del_var(vars: &mut HashMap<String, Value>, name: &str) -> HostResult {
    vars.remove(name)
        .map(|_| Value::Nil)
        .ok_or_else(|| format!("Key not found: {name}"))
}

impl State {
    fn create_buffer(&mut self, lines: &[&str]) -> i64 {
        let id = self.next_buffer;
        self.next_buffer += 1;
        let options = HashMap::from([
            ("modifiable".to_string(), Value::from(true)),
            ("readonly".to_string(), Value::from(false)),
            ("buflisted".to_string(), Value::from(true)),
            ("swapfile".to_string(), Value::from(true)),
            ("bufhidden".to_string(), Value::from("")),
            ("buftype".to_string(), Value::from("")),
            ("filetype".to_string(), Value::from("")),
        ]);
        self.buffers.insert(
            id,
            FakeBuffer {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                options,
                ..Default::default()
            },
        );
        id
    }

    fn create_window(&mut self, buffer: i64, tab: i64) -> i64 {
        let id = self.next_window;
        self.next_window += 1;
        self.windows.insert(
            id,
            FakeWindow {
                buffer,
                tab,
                cursor: (1, 0),
                options: HashMap::new(),
                vars: HashMap::new(),
            },
        );
        id
    }

    fn current_tab(&self) -> i64 {
        self.windows
            .get(&self.current_window)
            .map(|w| w.tab)
            .unwrap_or(1)
    }

    fn close_window(&mut self, id: i64) {
        self.windows.remove(&id);
        if self.current_window == id {
            self.current_window = self.windows.keys().next().copied().unwrap_or(0);
        }
    }

    fn wipe_buffer(&mut self, id: i64) {
        self.buffers.remove(&id);
        let showing: Vec<i64> = self
            .windows
            .iter()
            .filter(|(_, w)| w.buffer == id)
            .map(|(id, _)| *id)
            .collect();
        for window in showing {
            self.close_window(window);
        }
    }

    fn buffer(&mut self, id: i64) -> Result<&mut FakeBuffer, String> {
        self.buffers
            .get_mut(&id)
            .ok_or_else(|| format!("Invalid buffer id: {id}"))
    }

    fn window(&mut self, id: i64) -> Result<&mut FakeWindow, String> {
        self.windows
            .get_mut(&id)
            .ok_or_else(|| format!("Invalid window id: {id}"))
    }

    fn tab(&mut self, id: i64) -> Result<&mut FakeTab, String> {
        self.tabs
            .get_mut(&id)
            .ok_or_else(|| format!("Invalid tabpage id: {id}"))
    }

    fn run_command(&mut self, command: &str) -> HostResult {
        self.commands.push(command.to_string());
        let words: Vec<&str> = command.split_whitespace().collect();

        match words.as_slice() {
            ["bwipeout" | "bwipeout!", id] => {
                let id: i64 = id.parse().map_err(|_| format!("bad buffer {id}"))?;
                self.buffer(id)?;
                self.wipe_buffer(id);
            }
            ["normal!", keys] if *keys == "gvp" => {
                let pasted = self
                    .registers
                    .get("\"")
                    .map(|(value, _)| value.clone())
                    .unwrap_or_default();
                self.pasted.push(pasted);
            }
            ["normal!", keys] if keys.ends_with('y') => {
                let text = self.motion_text.clone();
                self.registers
                    .insert("\"".to_string(), (text, "v".to_string()));
            }
            [.., last] if last.ends_with("new") => {
                let buffer = self.create_buffer(&[""]);
                let tab = self.current_tab();
                let window = self.create_window(buffer, tab);
                self.current_window = window;
            }
            _ => {}
        }
        Ok(Value::Nil)
    }

    fn option_map(&mut self, scope: &Value) -> Result<&mut HashMap<String, Value>, String> {
        if let Some(id) = value::get(scope, "buf").and_then(handle_id) {
            return Ok(&mut self.buffer(id)?.options);
        }
        if let Some(id) = value::get(scope, "win").and_then(handle_id) {
            return Ok(&mut self.window(id)?.options);
        }
        Ok(&mut self.global_options)
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> HostResult {
        match name {
            "getcwd" => Ok(Value::from("/fake/cwd")),
            "expand" => {
                let pattern = arg_str(&args, 0)?;
                let id = pattern
                    .trim_start_matches('#')
                    .trim_end_matches(":p")
                    .parse::<i64>()
                    .map_err(|_| format!("cannot expand {pattern}"))?;
                Ok(Value::from(self.buffer(id)?.name.clone()))
            }
            "getreg" => {
                let name = arg_str(&args, 0)?;
                Ok(Value::from(
                    self.registers
                        .get(&name)
                        .map(|(v, _)| v.clone())
                        .unwrap_or_default(),
                ))
            }
            "getregtype" => {
                let name = arg_str(&args, 0)?;
                Ok(Value::from(
                    self.registers
                        .get(&name)
                        .map(|(_, t)| t.clone())
                        .unwrap_or_default(),
                ))
            }
            "setreg" => {
                let name = arg_str(&args, 0)?;
                let value = arg_str(&args, 1)?;
                let kind = arg_str(&args, 2).unwrap_or_else(|_| "v".to_string());
                self.registers.insert(name, (value, kind));
                Ok(Value::from(0))
            }
            other => Err(format!("Unknown function: {other}")),
        }
    }

    fn handle(&mut self, method: &str, args: Vec<Value>) -> HostResult {
        match method {
            "nvim_get_api_info" => Ok(Value::Array(vec![Value::from(1), value::empty_map()])),
            "nvim_command" => self.run_command(&arg_str(&args, 0)?),
            "nvim_exec2" => {
                let source = arg_str(&args, 0)?;
                for line in source.lines() {
                    self.run_command(line.trim())?;
                }
                Ok(value::map([("output", Value::from(""))]))
            }
            "nvim_call_function" => {
                let name = arg_str(&args, 0)?;
                let fn_args = match arg(&args, 1) {
                    Value::Array(items) => items,
                    _ => Vec::new(),
                };
                self.call_function(&name, fn_args)
            }

            "nvim_list_bufs" => Ok(handles(HandleKind::Buffer, self.buffers.keys().copied())),
            "nvim_list_wins" => Ok(handles(HandleKind::Window, self.windows.keys().copied())),
            "nvim_list_tabpages" => Ok(handles(HandleKind::Tabpage, self.tabs.keys().copied())),
            "nvim_get_current_win" => Ok(handle_value(HandleKind::Window, self.current_window)),
            "nvim_get_current_buf" => {
                let window = self.current_window;
                let buffer = self.window(window)?.buffer;
                Ok(handle_value(HandleKind::Buffer, buffer))
            }
            "nvim_get_current_tabpage" => {
                Ok(handle_value(HandleKind::Tabpage, self.current_tab()))
            }
            "nvim_set_current_win" => {
                let id = arg_id(&args, 0)?;
                self.window(id)?;
                self.current_window = id;
                Ok(Value::Nil)
            }

            "nvim_buf_get_lines" => {
                let id = arg_id(&args, 0)?;
                Ok(value::strings(&self.buffer(id)?.lines))
            }
            "nvim_buf_set_lines" => {
                let id = arg_id(&args, 0)?;
                let buffer = self.buffer(id)?;
                let modifiable = buffer
                    .options
                    .get("modifiable")
                    .and_then(value::as_bool)
                    .unwrap_or(true);
                if !modifiable {
                    return Err("Buffer is not 'modifiable'".into());
                }
                buffer.lines = value::into_strings(arg(&args, 4));
                buffer.writes.push("lines".to_string());
                if buffer.lines.is_empty() {
                    buffer.lines.push(String::new());
                }
                Ok(Value::Nil)
            }
            "nvim_buf_line_count" => {
                let id = arg_id(&args, 0)?;
                Ok(Value::from(self.buffer(id)?.lines.len() as i64))
            }
            "nvim_buf_get_name" => {
                let id = arg_id(&args, 0)?;
                Ok(Value::from(self.buffer(id)?.name.clone()))
            }
            "nvim_buf_set_name" => {
                let id = arg_id(&args, 0)?;
                let name = arg_str(&args, 1)?;
                self.buffer(id)?.name = name;
                Ok(Value::Nil)
            }

            "nvim_win_get_buf" => {
                let id = arg_id(&args, 0)?;
                Ok(handle_value(HandleKind::Buffer, self.window(id)?.buffer))
            }
            "nvim_win_get_tabpage" => {
                let id = arg_id(&args, 0)?;
                Ok(handle_value(HandleKind::Tabpage, self.window(id)?.tab))
            }
            "nvim_win_get_cursor" => {
                let id = arg_id(&args, 0)?;
                let (line, column) = self.window(id)?.cursor;
                Ok(Value::Array(vec![Value::from(line), Value::from(column)]))
            }
            "nvim_win_set_cursor" => {
                let id = arg_id(&args, 0)?;
                let position = arg(&args, 1);
                let pair = position.as_array().cloned().unwrap_or_default();
                let line = pair.first().and_then(Value::as_i64).unwrap_or(0);
                let column = pair.get(1).and_then(Value::as_i64).unwrap_or(0);
                let buffer = self.window(id)?.buffer;
                let count = self.buffer(buffer)?.lines.len() as i64;
                if line < 1 || line > count {
                    return Err("Cursor position outside buffer".into());
                }
                self.window(id)?.cursor = (line, column);
                Ok(Value::Nil)
            }
            "nvim_win_close" => {
                let id = arg_id(&args, 0)?;
                self.window(id)?;
                self.close_window(id);
                Ok(Value::Nil)
            }
            "nvim_tabpage_list_wins" => {
                let id = arg_id(&args, 0)?;
                self.tab(id)?;
                let windows: Vec<i64> = self
                    .windows
                    .iter()
                    .filter(|(_, w)| w.tab == id)
                    .map(|(id, _)| *id)
                    .collect();
                Ok(handles(HandleKind::Window, windows.into_iter()))
            }

            "nvim_get_option_value" => {
                let name = arg_str(&args, 0)?;
                let options = self.option_map(&arg(&args, 1))?;
                Ok(options.get(&name).cloned().unwrap_or(Value::Nil))
            }
            "nvim_set_option_value" => {
                let name = arg_str(&args, 0)?;
                let value = arg(&args, 1);
                let scope = arg(&args, 2);
                if let Some(id) = value::get(&scope, "buf").and_then(handle_id) {
                    if let (true, Some(on)) = (
                        name == "modifiable" || name == "readonly",
                        value::as_bool(&value),
                    ) {
                        self.buffer(id)?.writes.push(format!("{name}={on}"));
                    }
                }
                self.option_map(&scope)?.insert(name, value);
                Ok(Value::Nil)
            }

            "nvim_get_var" => get_var(&self.global_vars, &arg_str(&args, 0)?),
            "nvim_set_var" => {
                self.global_vars.insert(arg_str(&args, 0)?, arg(&args, 1));
                Ok(Value::Nil)
            }
            "nvim_del_var" => del_var(&mut self.global_vars, &arg_str(&args, 0)?),
            "nvim_buf_get_var" => {
                let name = arg_str(&args, 1)?;
                get_var(&self.buffer(arg_id(&args, 0)?)?.vars, &name)
            }
            "nvim_buf_set_var" => {
                let name = arg_str(&args, 1)?;
                self.buffer(arg_id(&args, 0)?)?.vars.insert(name, arg(&args, 2));
                Ok(Value::Nil)
            }
            "nvim_buf_del_var" => {
                let name = arg_str(&args, 1)?;
                del_var(&mut self.buffer(arg_id(&args, 0)?)?.vars, &name)
            }
            "nvim_win_get_var" => {
                let name = arg_str(&args, 1)?;
                get_var(&self.window(arg_id(&args, 0)?)?.vars, &name)
            }
            "nvim_win_set_var" => {
                let name = arg_str(&args, 1)?;
                self.window(arg_id(&args, 0)?)?.vars.insert(name, arg(&args, 2));
                Ok(Value::Nil)
            }
            "nvim_win_del_var" => {
                let name = arg_str(&args, 1)?;
                del_var(&mut self.window(arg_id(&args, 0)?)?.vars, &name)
            }
            "nvim_tabpage_get_var" => {
                let name = arg_str(&args, 1)?;
                get_var(&self.tab(arg_id(&args, 0)?)?.vars, &name)
            }
            "nvim_tabpage_set_var" => {
                let name = arg_str(&args, 1)?;
                self.tab(arg_id(&args, 0)?)?.vars.insert(name, arg(&args, 2));
                Ok(Value::Nil)
            }
            "nvim_tabpage_del_var" => {
                let name = arg_str(&args, 1)?;
                del_var(&mut self.tab(arg_id(&args, 0)?)?.vars, &name)
            }

            "nvim_set_keymap" => {
                self.set_keymap(None, &args)?;
                Ok(Value::Nil)
            }
            "nvim_buf_set_keymap" => {
                let buffer = arg_id(&args, 0)?;
                self.buffer(buffer)?;
                self.set_keymap(Some(buffer), &args[1..])?;
                Ok(Value::Nil)
            }
            "nvim_del_keymap" => self.del_keymap(None, &args),
            "nvim_buf_del_keymap" => {
                let buffer = arg_id(&args, 0)?;
                self.del_keymap(Some(buffer), &args[1..])
            }

            "nvim_create_augroup" => {
                let name = arg_str(&args, 0)?;
                self.autocmds.retain(|a| a.group.as_deref() != Some(name.as_str()));
                Ok(Value::from(1))
            }
            "nvim_del_augroup_by_name" => {
                let name = arg_str(&args, 0)?;
                self.autocmds.retain(|a| a.group.as_deref() != Some(name.as_str()));
                Ok(Value::Nil)
            }
            "nvim_create_autocmd" => {
                let events = match arg(&args, 0) {
                    Value::Array(events) => events.into_iter().filter_map(into_string).collect(),
                    other => into_string(other).into_iter().collect::<Vec<_>>(),
                };
                let opts = arg(&args, 1);
                let group = value::get(&opts, "group").and_then(|v| v.as_str()).map(str::to_string);
                let buffer = value::get(&opts, "buffer").and_then(handle_id);
                let command = value::get(&opts, "command")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .ok_or("autocmd needs a command")?;
                for event in events {
                    self.autocmds.push(Autocmd {
                        group: group.clone(),
                        event,
                        buffer,
                        command: command.clone(),
                    });
                }
                Ok(Value::from(self.autocmds.len() as i64))
            }

            other => Err(format!("Invalid method: {other}")),
        }
    }

    fn set_keymap(&mut self, buffer: Option<i64>, args: &[Value]) -> Result<(), String> {
        let keymap = Keymap {
            buffer,
            mode: arg_str(args, 0)?,
            lhs: arg_str(args, 1)?,
            rhs: arg_str(args, 2)?,
        };
        self.keymaps
            .retain(|k| !(k.buffer == keymap.buffer && k.mode == keymap.mode && k.lhs == keymap.lhs));
        self.keymaps.push(keymap);
        Ok(())
    }

    fn del_keymap(&mut self, buffer: Option<i64>, args: &[Value]) -> HostResult {
        let mode = arg_str(args, 0)?;
        let lhs = arg_str(args, 1)?;
        let before = self.keymaps.len();
        self.keymaps
            .retain(|k| !(k.buffer == buffer && k.mode == mode && k.lhs == lhs));
        if self.keymaps.len() == before {
            return Err("E31: No such mapping".into());
        }
        Ok(Value::Nil)
    }
}
