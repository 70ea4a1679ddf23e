use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub email: EmailConfig,
    pub logging: LoggingConfig,
}

/// SMTP relay settings and sending behaviour
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Upgrade a plain connection with STARTTLS
    pub use_tls: bool,
    /// Connect over implicit TLS (SMTPS)
    pub use_ssl: bool,
    pub timeout_seconds: Option<u64>,
    /// Name sent in EHLO, defaults to the local hostname
    pub hello_name: Option<String>,
    /// Sender used for messages that do not set one
    pub from_email: String,
    pub from_name: Option<String>,
    /// Swallow connection and delivery failures instead of returning them
    pub fail_silently: bool,
    /// Open a new connection for every batch and close it afterwards
    pub fresh_connection: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            username: String::new(),
            password: String::new(),
            use_tls: false,
            use_ssl: false,
            timeout_seconds: None,
            hello_name: None,
            from_email: "webmaster@localhost".to_string(),
            from_name: None,
            fail_silently: false,
            fresh_connection: true,
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("use_tls", &self.use_tls)
            .field("use_ssl", &self.use_ssl)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("hello_name", &self.hello_name)
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("fail_silently", &self.fail_silently)
            .field("fresh_connection", &self.fresh_connection)
            .finish()
    }
}

impl EmailConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    #[must_use]
    pub fn relay_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided, must exist)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if !Path::new(path).is_file() {
                return Err(ConfigError::Message(format!(
                    "configuration file {path} not found"
                )));
            }
            builder = builder.add_source(File::with_name(path));
        }

        // RELAYMAIL_EMAIL__HOST, RELAYMAIL_LOGGING__LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("RELAYMAIL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Check the configuration, collecting every problem found
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let email = &self.email;

        if email.use_tls && email.use_ssl {
            errors.push("email.use_tls and email.use_ssl are mutually exclusive".to_string());
        }
        if email.host.trim().is_empty() {
            errors.push("email.host must not be empty".to_string());
        }
        if email.port == 0 {
            errors.push("email.port must be greater than 0".to_string());
        }
        if let Err(e) = email.from_email.parse::<lettre::Address>() {
            errors.push(format!("email.from_email is not a valid address: {e}"));
        }
        if email.has_credentials() && email.password.is_empty() {
            errors.push("email.password is required when email.username is set".to_string());
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got \"{}\"",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
