use std::path::PathBuf;

use crate::StalePolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub import_dir: PathBuf,
    pub completed_dir: PathBuf,
    pub stale_policy: StalePolicy,
    pub window_size: usize,
    pub import_budget_secs: u64,
    pub reschedule_delay_secs: u64,
    pub import_cron: String,
    pub image_cron: String,
    pub image_batch_size: usize,
    pub image_timeout_secs: u64,
    pub image_user_agent: String,
    pub fallback_image_path: Option<PathBuf>,
    pub currency_code: String,
    pub size_attribute: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("import_dir", &self.import_dir)
            .field("completed_dir", &self.completed_dir)
            .field("stale_policy", &self.stale_policy)
            .field("window_size", &self.window_size)
            .field("import_budget_secs", &self.import_budget_secs)
            .field("reschedule_delay_secs", &self.reschedule_delay_secs)
            .field("import_cron", &self.import_cron)
            .field("image_cron", &self.image_cron)
            .field("image_batch_size", &self.image_batch_size)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("image_user_agent", &self.image_user_agent)
            .field("fallback_image_path", &self.fallback_image_path)
            .field("currency_code", &self.currency_code)
            .field("size_attribute", &self.size_attribute)
            .finish()
    }
}
