use std::net::SocketAddr;
use std::path::PathBuf;

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
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub pipeline_config_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub generator_url: Option<String>,
    pub generator_api_key: Option<String>,
    pub generator_timeout_secs: u64,
    pub generator_max_retries: u32,
    pub attribution_timeout_secs: u64,
    pub scheduler_enabled: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("pipeline_config_path", &self.pipeline_config_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("generator_url", &self.generator_url)
            .field(
                "generator_api_key",
                &self.generator_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("generator_timeout_secs", &self.generator_timeout_secs)
            .field("generator_max_retries", &self.generator_max_retries)
            .field("attribution_timeout_secs", &self.attribution_timeout_secs)
            .field("scheduler_enabled", &self.scheduler_enabled)
            .finish()
    }
}
