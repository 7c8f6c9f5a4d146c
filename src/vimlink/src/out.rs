use crate::Result;
use std::sync::Arc;
use vimlink_rpc::{Host, Value};

/// Messages shown in the command line.
#[derive(Clone)]
pub struct Out {
    host: Arc<dyn Host>,
}

impl Out {
    pub fn new(host: Arc<dyn Host>) -> Self {
        Self { host }
    }

    /// `:echo`, not kept in message history.
    pub fn print(&self, text: &str) -> Result<()> {
        self.echo("echo", text)
    }

    /// `:echomsg`
    pub fn message(&self, text: &str) -> Result<()> {
        self.echo("echomsg", text)
    }

    /// `:echoerr`
    pub fn error(&self, text: &str) -> Result<()> {
        self.echo("echoerr", text)
    }

    fn echo(&self, command: &str, text: &str) -> Result<()> {
        let command = format!("{command} \"{}\"", escape(text));
        self.host.call("nvim_command", vec![Value::from(command)])?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn quotes_are_escaped() {
        let host = FakeHost::new();
        let out = Out::new(host.clone());
        out.print(r#"say "hi""#).unwrap();
        out.error(r"C:\tmp").unwrap();

        assert_eq!(
            host.commands(),
            vec![r#"echo "say \"hi\"""#, r#"echoerr "C:\\tmp""#]
        );
    }
}
