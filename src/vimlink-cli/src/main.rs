use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use vimlink::{Api, Plugin};
use vimlink_core::{init_logging, AppDirs, Config, LogLevel};

#[derive(Debug, Parser)]
#[command(
    name = "vimlink-case",
    version,
    about = "Upper- and lower-case operators for Neovim, started as an RPC job"
)]
struct Cli {
    /// Log level override (takes precedence over config)
    #[arg(long, value_enum)]
    log_level: Option<LevelArg>,
    /// Config file to read instead of <config dir>/config.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Keys of the upper-casing operator
    #[arg(long, default_value = "cu")]
    upper: String,
    /// Keys of the lower-casing operator
    #[arg(long, default_value = "cl")]
    lower: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelArg> for LogLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Trace => LogLevel::Trace,
            LevelArg::Debug => LogLevel::Debug,
            LevelArg::Info => LogLevel::Info,
            LevelArg::Warn => LogLevel::Warn,
            LevelArg::Error => LogLevel::Error,
        }
    }
}

struct CasePlugin {
    upper: String,
    lower: String,
}

impl CasePlugin {
    fn actions(&self) -> [(&str, fn(&str) -> String); 2] {
        [
            (self.upper.as_str(), str::to_uppercase),
            (self.lower.as_str(), str::to_lowercase),
        ]
    }
}

impl Plugin for CasePlugin {
    fn activate(&self, api: &Api) {
        let keymaps = api.global().keymaps();
        for (keys, transform) in self.actions() {
            match keymaps.set_text_action(keys, transform) {
                Ok(_) => tracing::info!(keys, "Mapped text action"),
                Err(err) => tracing::error!(keys, error = %err, "Failed to map text action"),
            }
        }
    }
}

fn load_config(cli: &Cli, dirs: &AppDirs) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(dirs)?,
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level.into();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = load_config(&cli, &dirs)?;
    let _logging = init_logging(&config.logging, &dirs)?;

    tracing::info!(
        config_dir = %dirs.config_dir().display(),
        upper = %cli.upper,
        lower = %cli.lower,
        "Starting vimlink-case"
    );
    vimlink::run(
        CasePlugin {
            upper: cli.upper,
            lower: cli.lower,
        },
        config.runtime,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vimlink::testing::FakeHost;

    #[test]
    fn defaults_map_cu_and_cl() {
        let cli = Cli::parse_from(["vimlink-case"]);
        assert_eq!(cli.upper, "cu");
        assert_eq!(cli.lower, "cl");
        assert!(cli.log_level.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn log_level_flag_overrides_config() {
        let root = tempfile::tempdir().unwrap();
        let dirs = AppDirs::from_root(root.path());
        let path = root.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let from_file = Cli::parse_from(["vimlink-case", "--config", path.to_str().unwrap()]);
        assert_eq!(
            load_config(&from_file, &dirs).unwrap().logging.level,
            LogLevel::Warn
        );

        let overridden = Cli::parse_from([
            "vimlink-case",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "trace",
        ]);
        assert_eq!(
            load_config(&overridden, &dirs).unwrap().logging.level,
            LogLevel::Trace
        );
    }

    #[test]
    fn activation_maps_both_operators() {
        let host = FakeHost::new();
        let api = host.api();
        let plugin = CasePlugin {
            upper: "gU".to_string(),
            lower: "gl".to_string(),
        };

        vimlink::start(&api, Arc::new(plugin)).unwrap().join().unwrap();

        for keys in ["gU", "gl"] {
            assert!(host.keymap("n", keys).is_some());
            assert!(host.keymap("x", keys).is_some());
        }
    }

    #[test]
    fn transforms_change_case() {
        let plugin = CasePlugin {
            upper: "cu".to_string(),
            lower: "cl".to_string(),
        };
        let [(_, upper), (_, lower)] = plugin.actions();
        assert_eq!(upper("MiXed"), "MIXED");
        assert_eq!(lower("MiXed"), "mixed");
    }
}
