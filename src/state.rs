//! Shared application state for all routes.

use crate::config::Settings;
use crate::session::SessionSource;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Where every request gets its session from.
    pub sessions: Arc<dyn SessionSource>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionSource>, settings: Settings) -> Self {
        AppState {
            sessions,
            settings: Arc::new(settings),
        }
    }
}
