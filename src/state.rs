use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    engine::SessionRegistry,
    repository::{CatalogStore, ProgressStore, SubmissionService, UserStore},
};

/// Collaborators the handlers reach through.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub submissions: Arc<dyn SubmissionService>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        Self {
            config,
            stores,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Stores {
    fn from_ref(state: &AppState) -> Self {
        state.stores.clone()
    }
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
