mod settings;

pub use settings::{
    DatabaseConfig, MailConfig, OpsConfig, OtelConfig, PortalConfig, QueueConfig, Settings,
    TaskConfig, WorkerConfig,
};
