use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mail: MailConfig,
    pub portal: PortalConfig,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ops: OpsConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Envelope sender. Empty means unconfigured; sends fail as a configuration error.
    #[serde(default)]
    pub sender_address: String,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
    /// Transport: "smtp", "log" or "memory"
    #[serde(default = "default_mail_backend")]
    pub backend: String,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// "starttls", "tls" or "none"
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub base_url: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_documents_path")]
    pub documents_path: String,
    #[serde(default = "default_support_email")]
    pub support_email: String,
    #[serde(default = "default_company_name")]
    pub company_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_seconds")]
    pub base_delay_seconds: u64,
    #[serde(default = "default_soft_timeout_seconds")]
    pub soft_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub retry_backoff: bool,
    #[serde(default = "default_true")]
    pub retry_jitter: bool,
    /// Ceiling for a single backoff delay
    #[serde(default = "default_max_delay_seconds")]
    pub max_delay_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Polling interval for backends without push wake-ups
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_queue_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ops_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_true() -> bool {
    true
}

fn default_sender_name() -> String {
    "Contabilidade Vetorial".to_string()
}

fn default_mail_backend() -> String {
    "log".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> String {
    "starttls".to_string()
}

fn default_login_path() -> String {
    "/login/".to_string()
}

fn default_documents_path() -> String {
    "/documents/".to_string()
}

fn default_support_email() -> String {
    "contabilidadevetorial@gmail.com".to_string()
}

fn default_company_name() -> String {
    "Contabilidade Vetorial".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_seconds() -> u64 {
    60
}

fn default_soft_timeout_seconds() -> u64 {
    30
}

fn default_max_delay_seconds() -> u64 {
    3600 // 1 hour
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_queue_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ops_port() -> u16 {
    9090
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "document-notification-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("portal.base_url", "http://localhost:8000")?
            .set_default("task.max_attempts", 3)?
            .set_default("task.base_delay_seconds", 60)?
            .set_default("task.soft_timeout_seconds", 30)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // DOCNOTIFY__MAIL__SENDER_ADDRESS, DOCNOTIFY__TASK__MAX_ATTEMPTS, etc.
            .add_source(
                Environment::with_prefix("DOCNOTIFY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task.max_attempts == 0 {
            return Err(ConfigError::Message(
                "task.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.portal.base_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "portal.base_url must not be empty".to_string(),
            ));
        }

        if self.queue.backend == "postgres" && self.database.url.is_none() {
            return Err(ConfigError::Message(
                "queue.backend = postgres requires database.url".to_string(),
            ));
        }

        Ok(())
    }

    pub fn ops_addr(&self) -> String {
        format!("{}:{}", self.ops.host, self.ops.port)
    }

    /// Settings with every section defaulted, for embedding and tests.
    pub fn with_portal(base_url: impl Into<String>) -> Self {
        Self {
            mail: MailConfig::default(),
            portal: PortalConfig::with_base_url(base_url),
            task: TaskConfig::default(),
            worker: WorkerConfig::default(),
            queue: QueueConfig::default(),
            database: DatabaseConfig::default(),
            ops: OpsConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender_address: String::new(),
            sender_name: default_sender_name(),
            backend: default_mail_backend(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            smtp_tls: default_smtp_tls(),
        }
    }
}

impl PortalConfig {
    /// Portal config rooted at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            login_path: default_login_path(),
            documents_path: default_documents_path(),
            support_email: default_support_email(),
            company_name: default_company_name(),
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_seconds: default_base_delay_seconds(),
            soft_timeout_seconds: default_soft_timeout_seconds(),
            retry_backoff: true,
            retry_jitter: true,
            max_delay_seconds: default_max_delay_seconds(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_ops_port(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::with_portal("https://vetorial.example")
    }

    #[test]
    fn test_task_defaults() {
        let task = TaskConfig::default();
        assert_eq!(task.max_attempts, 3);
        assert_eq!(task.base_delay_seconds, 60);
        assert_eq!(task.soft_timeout_seconds, 30);
        assert!(task.retry_backoff);
        assert!(task.retry_jitter);
    }

    #[test]
    fn test_portal_defaults() {
        let portal = PortalConfig::with_base_url("https://vetorial.example");
        assert_eq!(portal.login_path, "/login/");
        assert_eq!(portal.documents_path, "/documents/");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(settings().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut s = settings();
        s.task.max_attempts = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_postgres_queue_without_database() {
        let mut s = settings();
        s.queue.backend = "postgres".to_string();
        assert!(s.validate().is_err());

        s.database.url = Some("postgres://localhost/vetorial".to_string());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_missing_sender_is_not_a_startup_error() {
        let s = settings();
        assert!(s.mail.sender_address.is_empty());
        assert!(s.validate().is_ok());
    }
}
