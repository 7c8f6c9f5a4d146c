use std::fmt;

/// Map modes accepted by `nvim_set_keymap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Normal, visual, select and operator-pending (`:map`).
    All,
    Normal,
    /// Visual and select.
    Visual,
    /// Visual only, without select.
    VisualOnly,
    Select,
    OperatorPending,
    Insert,
    CommandLine,
    Terminal,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::All => "",
            Mode::Normal => "n",
            Mode::Visual => "v",
            Mode::VisualOnly => "x",
            Mode::Select => "s",
            Mode::OperatorPending => "o",
            Mode::Insert => "i",
            Mode::CommandLine => "c",
            Mode::Terminal => "t",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
