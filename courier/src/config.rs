//! Service configuration
//!
//! Settings come from an optional TOML file with environment variables
//! layered on top, so a containerized deployment can run without any
//! file at all. File lookup precedence:
//!
//! 1. `--config` on the command line
//! 2. the `COURIER_CONFIG` environment variable
//! 3. `./courier.config.toml`
//! 4. `/etc/courier/courier.config.toml`
//!
//! An explicitly named file that does not exist is an error; missing
//! default paths fall through to built-in defaults.

use std::path::{Path, PathBuf};

use courier_dispatch::DispatchConfig;
use courier_http::HttpConfig;
use courier_transport::{SmtpConfig, SmtpMode};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("configured file does not exist: {path}")]
    Missing { path: PathBuf },

    #[error("invalid value for {key}: {detail}")]
    Invalid { key: String, detail: String },
}

/// Full service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Relay connection.
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Queue pacing and retry behaviour.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// API server.
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// `lookup` resolves environment variables; production passes
    /// `std::env::var` and tests pass a closure over a map.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if an explicitly configured file is
    /// missing or unreadable, the TOML does not parse, or an
    /// environment override does not parse as its target type.
    pub fn load<F>(cli_path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match find_config_file(cli_path, &lookup)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(port) = lookup("SMTP_PORT") {
            self.smtp.port = parse("SMTP_PORT", &port)?;
        }
        if let Some(mode) = lookup("SMTP_MODE") {
            self.smtp.mode = parse_mode(&mode)?;
        }
        if let Some(username) = lookup("SMTP_USERNAME") {
            self.smtp.username = Some(username);
        }
        if let Some(password) = lookup("SMTP_PASSWORD") {
            self.smtp.password = Some(password);
        }
        if let Some(from) = lookup("MAIL_FROM") {
            self.smtp.from = from;
        }

        if let Some(rate) = lookup("RATE_LIMIT_PER_MINUTE") {
            self.dispatch.rate_limit_per_minute = parse("RATE_LIMIT_PER_MINUTE", &rate)?;
        }
        if let Some(delay) = lookup("RETRY_DELAY_MS") {
            self.dispatch.retry_delay_ms = parse("RETRY_DELAY_MS", &delay)?;
        }
        if let Some(retries) = lookup("MAX_RETRIES") {
            self.dispatch.max_retries = parse("MAX_RETRIES", &retries)?;
        }
        if let Some(timeout) = lookup("SEND_TIMEOUT_MS") {
            self.dispatch.send_timeout_ms = parse("SEND_TIMEOUT_MS", &timeout)?;
        }

        if let Some(address) = lookup("LISTEN_ADDR") {
            self.http.listen_address = address;
        }
        if let Some(ips) = lookup("ALLOWED_IPS") {
            self.http.allowed_ips = ips
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        Ok(())
    }
}

fn find_config_file<F>(cli_path: Option<&Path>, lookup: &F) -> Result<Option<PathBuf>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = cli_path {
        return existing(path.to_path_buf()).map(Some);
    }
    if let Some(path) = lookup("COURIER_CONFIG") {
        return existing(PathBuf::from(path)).map(Some);
    }

    for path in [
        Path::new("./courier.config.toml"),
        Path::new("/etc/courier/courier.config.toml"),
    ] {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
    }

    Ok(None)
}

fn existing(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ConfigError::Missing { path })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|error: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        detail: error.to_string(),
    })
}

fn parse_mode(value: &str) -> Result<SmtpMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "relay" => Ok(SmtpMode::Relay),
        "starttls" => Ok(SmtpMode::StartTls),
        "plain" => Ok(SmtpMode::Plain),
        other => Err(ConfigError::Invalid {
            key: "SMTP_MODE".to_string(),
            detail: format!("unknown mode {other:?}, expected relay, starttls, or plain"),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::{collections::HashMap, io::Write};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_apply_without_a_file_or_env() {
        let config = Config::load(None, no_env).unwrap();
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.dispatch.rate_limit_per_minute, 60);
        assert_eq!(config.http.listen_address, "0.0.0.0:3000");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [smtp]
            host = "smtp.example.com"
            port = 465
            mode = "relay"

            [dispatch]
            rate_limit_per_minute = 10

            [http]
            listen_address = "127.0.0.1:8080"
            "#
        )
        .unwrap();

        let config = Config::load(Some(file.path()), no_env).unwrap();
        assert_eq!(config.smtp.host, "smtp.example.com");
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.smtp.mode, SmtpMode::Relay);
        assert_eq!(config.dispatch.rate_limit_per_minute, 10);
        assert_eq!(config.dispatch.max_retries, 3);
        assert_eq!(config.http.listen_address, "127.0.0.1:8080");
    }

    #[test]
    fn env_overrides_beat_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[smtp]\nhost = \"from-file\"\nport = 25\n").unwrap();

        let env: HashMap<&str, &str> = [
            ("SMTP_HOST", "from-env"),
            ("SMTP_MODE", "plain"),
            ("RATE_LIMIT_PER_MINUTE", "120"),
            ("ALLOWED_IPS", "10.0.0.1, 10.0.0.2"),
        ]
        .into_iter()
        .collect();

        let config = Config::load(Some(file.path()), |key| {
            env.get(key).map(ToString::to_string)
        })
        .unwrap();

        assert_eq!(config.smtp.host, "from-env");
        assert_eq!(config.smtp.port, 25);
        assert_eq!(config.smtp.mode, SmtpMode::Plain);
        assert_eq!(config.dispatch.rate_limit_per_minute, 120);
        assert_eq!(config.http.allowed_ips, ["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let error = Config::load(Some(Path::new("/no/such/file.toml")), no_env).unwrap_err();
        assert!(matches!(error, ConfigError::Missing { .. }));
    }

    #[test]
    fn unparseable_env_value_is_reported_with_its_key() {
        let error = Config::load(None, |key| {
            (key == "SMTP_PORT").then(|| "not-a-port".to_string())
        })
        .unwrap_err();

        match error {
            ConfigError::Invalid { key, .. } => assert_eq!(key, "SMTP_PORT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_smtp_mode_is_rejected() {
        let error = Config::load(None, |key| (key == "SMTP_MODE").then(|| "ssl".to_string()))
            .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { .. }));
    }
}
