use crate::autocmd::{Subscription, Target};
use crate::events::Event;
use crate::keymaps::KeyMaps;
use crate::options::GlobalOptions;
use crate::vars::Vars;
use crate::{Api, Result};

/// Editor-wide state: `g:` variables, global options and mappings.
#[derive(Clone)]
pub struct Global {
    api: Api,
}

impl Global {
    pub(crate) fn new(api: Api) -> Self {
        Self { api }
    }

    pub fn vars(&self) -> Vars {
        Vars::global(self.api.host().clone())
    }

    pub fn options(&self) -> GlobalOptions {
        GlobalOptions::new(self.api.host().clone())
    }

    pub fn keymaps(&self) -> KeyMaps {
        KeyMaps::global(self.api.clone())
    }

    /// Run `f` whenever `event` fires for any buffer. The subscription lasts
    /// until disposed.
    pub fn on(&self, event: Event, f: impl Fn() + Send + Sync + 'static) -> Result<Subscription> {
        Subscription::create(&self.api, Target::Global, event, f)
    }
}
