pub mod config;
pub mod disposables;
pub mod installation;
pub mod logging;
pub mod paths;
pub mod recover;
pub mod token;

pub use config::{Config, ConfigError, LogLevel, LoggingConfig, RuntimeConfig, ValidationError};
pub use disposables::{Disposable, DisposableCollection, DisposeFn};
pub use installation::{InstallationError, InstallationId};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use paths::{AppDirs, DirsError};
pub use recover::recover;
pub use token::{Token, TokenParseError};

pub const APP_NAME: &str = "vimlink";
pub const APP_AUTHOR: &str = "Vimlink";
pub const APP_QUALIFIER: &str = "io";
