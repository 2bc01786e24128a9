use std::sync::Arc;

use crate::config::Config;
use crate::db::{
    organization_repository::OrganizationRepository, task_repository::TaskRepository,
    user_repository::UserRepository, workstream_repository::WorkstreamRepository,
};
use crate::utils::jwt::{SessionVerifier, SessionVerifierProvider};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub organizations: Arc<dyn OrganizationRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub workstreams: Arc<dyn WorkstreamRepository>,
    pub config: Arc<Config>,
}

impl SessionVerifierProvider for AppState {
    fn session_verifier(&self) -> &SessionVerifier {
        &self.config.session
    }
}
