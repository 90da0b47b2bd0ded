use std::sync::Arc;

use crate::{notifications::mailer::Mailer, repository::Repository};

use super::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            repo,
            config: Arc::new(config),
            mailer,
        }
    }
}
