mod settings;

pub use settings::{
    ApiConfig, ComposeConfig, CredentialConfig, DatabaseConfig, DispatchConfig, LoggingConfig,
    MemoryConfig, OtelConfig, PostgresDraftsConfig, RemoteConfig, ServerConfig, Settings,
};
