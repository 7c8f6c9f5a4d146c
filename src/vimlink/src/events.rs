//! Autocmd events the runtime can subscribe to.

use std::fmt;
use std::str::FromStr;

macro_rules! events {
    ($($name:ident),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Event {
            $($name,)*
        }

        impl Event {
            pub const ALL: &'static [Event] = &[$(Event::$name,)*];

            /// The name used in `:autocmd`.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Event::$name => stringify!($name),)*
                }
            }
        }
    };
}

events! {
    BufNewFile, BufReadPre, BufRead, BufReadPost, BufReadCmd,
    FileReadPre, FileReadPost, FileReadCmd,
    FilterReadPre, FilterReadPost, StdinReadPre, StdinReadPost,
    BufWrite, BufWritePre, BufWritePost, BufWriteCmd,
    FileWritePre, FileWritePost, FileWriteCmd,
    FileAppendPre, FileAppendPost, FileAppendCmd,
    FilterWritePre, FilterWritePost,
    BufAdd, BufCreate, BufDelete, BufWipeout, BufFilePre, BufFilePost,
    BufEnter, BufLeave, BufWinEnter, BufWinLeave, BufUnload, BufHidden, BufNew,
    SwapExists,
    TermOpen, TermEnter, TermLeave, TermClose,
    ChanOpen, ChanInfo,
    FileType, Syntax, OptionSet,
    VimEnter, UIEnter, UILeave, TermResponse, QuitPre, ExitPre,
    VimLeavePre, VimLeave, VimResume, VimSuspend,
    DiffUpdated, DirChanged,
    FileChangedShell, FileChangedShellPost, FileChangedRO,
    ShellCmdPost, ShellFilterPost,
    CmdUndefined, FuncUndefined, SpellFileMissing,
    SourcePre, SourcePost, SourceCmd,
    VimResized, FocusGained, FocusLost,
    CursorHold, CursorHoldI, CursorMoved, CursorMovedI,
    WinNew, WinEnter, WinLeave,
    TabEnter, TabLeave, TabNew, TabNewEntered, TabClosed,
    CmdlineChanged, CmdlineEnter, CmdlineLeave, CmdwinEnter, CmdwinLeave,
    InsertEnter, InsertChange, InsertLeave, InsertCharPre,
    TextYankPost, TextChanged, TextChangedI, TextChangedP,
    ColorSchemePre, ColorScheme, RemoteReply,
    QuickFixCmdPre, QuickFixCmdPost, SessionLoadPost, MenuPopup,
    CompleteChanged, CompleteDone,
    User, Signal,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event {0:?}")]
pub struct UnknownEvent(pub String);

impl FromStr for Event {
    type Err = UnknownEvent;

    /// Event names are matched case-insensitively, like `:autocmd` does.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .iter()
            .copied()
            .find(|event| event.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}
