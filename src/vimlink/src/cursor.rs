use vimlink_rpc::Value;

/// A window cursor position: 1-based line, 0-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    line: i64,
    column: i64,
}

impl Cursor {
    pub fn new(line: i64, column: i64) -> Self {
        Self { line, column }
    }

    pub fn line(&self) -> i64 {
        self.line
    }

    pub fn column(&self) -> i64 {
        self.column
    }

    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        Some(Self::new(items.first()?.as_i64()?, items.get(1)?.as_i64()?))
    }

    pub(crate) fn to_value(self) -> Value {
        Value::Array(vec![Value::from(self.line), Value::from(self.column)])
    }
}
