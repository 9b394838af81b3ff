use std::sync::Arc;

use atrium_fleet::prelude::Fleet;

use crate::config::RuntimeConfig;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<Fleet>,
    pub config: Arc<RuntimeConfig>,
}
