//! Process bootstrap: connect to the editor, register, activate, serve.

use crate::{Api, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use vimlink_core::{recover, InstallationId, RuntimeConfig};
use vimlink_rpc::Session;

/// A plugin driven by [`run`].
pub trait Plugin: Send + Sync + 'static {
    /// Define functions and bindings. Runs on the dispatch thread before the
    /// host is served; an error aborts startup.
    fn register(&self, _api: &Api) -> Result<()> {
        Ok(())
    }

    /// User-facing setup. Runs once on its own thread after the activation
    /// delay, when every binding from [`register`](Self::register) exists.
    fn activate(&self, api: &Api);
}

/// Register `plugin` and schedule its activation.
pub fn start<P: Plugin>(api: &Api, plugin: Arc<P>) -> Result<JoinHandle<()>> {
    plugin.register(api)?;

    let delay = api.runtime().activation_delay();
    let api = api.clone();
    let handle = thread::Builder::new()
        .name("vimlink-activate".to_string())
        .spawn(move || {
            thread::sleep(delay);
            tracing::info!("Activating plugin");
            recover("plugin activation", || plugin.activate(&api));
        })?;
    Ok(handle)
}

/// Serve `plugin` over stdin/stdout until the editor closes the channel.
pub fn run<P: Plugin>(plugin: P, runtime: RuntimeConfig) -> Result<()> {
    let path = match &runtime.installation_id_file {
        Some(path) => path.clone(),
        None => InstallationId::default_path()?,
    };
    let installation = InstallationId::load_or_create(&path)?;

    let session = Arc::new(Session::stdio()?);
    let api = Api::new(session.clone(), installation, runtime)?;
    start(&api, Arc::new(plugin))?;

    session.run();
    api.shutdown();
    Ok(())
}
