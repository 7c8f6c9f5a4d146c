//! Plugin runtime for editors that speak msgpack-RPC.
//!
//! This crate provides:
//! - A handler table that turns Rust closures into call expressions the
//!   editor can run from key-maps and autocmds ([`handler`])
//! - Cached wrappers of buffers, windows and tabs with identity preserved
//!   across lookups, swept when the editor reports objects going away
//!   ([`registry`])
//! - A renderer that keeps a read-only scratch buffer in sync with an
//!   in-memory [`View`]
//! - Typed access to options, variables, key-maps and autocmds
//!
//! # Usage
//!
//! ```rust,ignore
//! use vimlink::{Api, Plugin, RuntimeConfig};
//!
//! struct Shout;
//!
//! impl Plugin for Shout {
//!     fn activate(&self, api: &Api) {
//!         let keymaps = api.global().keymaps();
//!         if let Err(err) = keymaps.set_text_action("gS", |text| text.to_uppercase()) {
//!             tracing::error!(error = %err, "Failed to map gS");
//!         }
//!     }
//! }
//!
//! vimlink::run(Shout, RuntimeConfig::default())?;
//! ```

pub mod api;
pub mod autocmd;
pub mod batch;
pub mod buffer;
pub mod cursor;
mod error;
pub mod events;
pub mod global;
pub mod handler;
pub mod keymaps;
pub mod mode;
pub mod options;
pub mod out;
pub mod plugin;
pub mod registry;
pub mod renderer;
pub mod tab;
pub mod testing;
mod value;
pub mod vars;
pub mod window;

pub use api::{Api, SplitModifier};
pub use autocmd::Subscription;
pub use batch::Batch;
pub use buffer::Buffer;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use events::{Event, UnknownEvent};
pub use global::Global;
pub use handler::{HandlerFunc, HandlerTable, OperatorFunc};
pub use keymaps::{KeyMaps, TextAction};
pub use mode::Mode;
pub use options::{BufferOptions, GlobalOptions, WindowOptions};
pub use out::Out;
pub use plugin::{run, start, Plugin};
pub use registry::{LiveObject, ObjectKind, Registry};
pub use renderer::{RenderState, Renderer, View, ViewRenderer};
pub use tab::Tab;
pub use vars::Vars;
pub use window::Window;

pub use vimlink_core::{Disposable, DisposableCollection, DisposeFn, RuntimeConfig};
pub use vimlink_rpc::Value;
