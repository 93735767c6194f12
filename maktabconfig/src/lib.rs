#![allow(clippy::multiple_crate_versions)]

use serde::{Deserialize, Serialize};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

pub const APP_NAME: &str = "profimaktab";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Password {
    Literal(String),
    Env { env: String },
    Cmd { cmd: String },
}

impl Default for Password {
    fn default() -> Self {
        Self::Literal(String::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_token_validity_hours")]
    pub token_validity_hours: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            request_timeout_secs: default_request_timeout_secs(),
            token_validity_hours: default_token_validity_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaktabConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Password,
    #[serde(default)]
    pub student_ids: Vec<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Default for MaktabConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: Password::default(),
            student_ids: Vec::new(),
            base_url: None,
            polling: PollingConfig::default(),
        }
    }
}

const fn default_interval_minutes() -> u64 {
    30
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_token_validity_hours() -> u64 {
    23
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Confy(#[from] confy::ConfyError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("missing username in config; set `username` in the profimaktab config file")]
    MissingUsername,
    #[error("missing password in config; set `password` in the profimaktab config file")]
    MissingPassword,
    #[error("environment variable '{env}' not found")]
    MissingEnv { env: String },
    #[error("password command failed: {cmd}: {message}")]
    CommandFailed { cmd: String, message: String },
    #[error("failed to execute password command '{cmd}': {source}")]
    CommandExec { cmd: String, source: io::Error },
    #[error("password command returned empty output: {cmd}")]
    CommandEmpty { cmd: String },
    #[error("invalid student id list '{input}': ids must be non-empty and comma separated")]
    InvalidStudentId { input: String },
    #[error("no student ids configured; run `maktab students 12345,67890`")]
    NoStudents,
    #[error("`polling.{field}` must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("`polling.{field}` is too large")]
    DurationOverflow { field: &'static str },
    #[error(
        "credentials required but stdin is not interactive; set `username` and `password` in {path}",
        path = .path.display()
    )]
    NonInteractive { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Splits a comma separated list of student ids, trimming each entry.
///
/// # Errors
/// Returns `ConfigError::InvalidStudentId` if any entry is empty.
pub fn parse_student_ids(input: &str) -> Result<Vec<String>> {
    let ids: Vec<String> = input.split(',').map(|s| s.trim().to_string()).collect();
    if ids.iter().any(String::is_empty) {
        return Err(ConfigError::InvalidStudentId {
            input: input.to_string(),
        });
    }
    Ok(ids)
}

impl MaktabConfig {
    /// Loads the config file from the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config file cannot be read or deserialized.
    pub fn load() -> Result<Self> {
        Ok(confy::load(APP_NAME, None)?)
    }

    /// Loads config or walks the user through entering credentials and
    /// student ids.
    ///
    /// # Errors
    /// Returns an error if the config cannot be loaded or stored, or
    /// onboarding fails (including non-interactive stdin).
    pub fn load_or_onboard() -> Result<Self> {
        let config = Self::load()?;
        if config.has_credentials() && !config.student_ids.is_empty() {
            return Ok(config);
        }
        config.onboard()
    }

    /// Stores the config to the standard OS location.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn store(&self) -> Result<()> {
        confy::store(APP_NAME, None, self)?;
        Ok(())
    }

    /// Path of the config file.
    ///
    /// # Errors
    /// Returns an error if the OS config directory cannot be determined.
    pub fn path() -> Result<PathBuf> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }

    /// The configured username.
    ///
    /// # Errors
    /// Returns an error if no username is set.
    pub fn username(&self) -> Result<String> {
        let trimmed = self.username.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        Ok(trimmed.to_string())
    }

    /// Resolves the password from the configured source.
    ///
    /// # Errors
    /// Returns an error if the password cannot be resolved or is empty.
    pub fn password(&self) -> Result<String> {
        self.password.resolve()
    }

    /// The validated, ordered list of student ids.
    ///
    /// # Errors
    /// Returns an error if no ids are configured or one of them is blank.
    pub fn student_ids(&self) -> Result<Vec<String>> {
        if self.student_ids.is_empty() {
            return Err(ConfigError::NoStudents);
        }
        parse_student_ids(&self.student_ids.join(","))
    }

    /// Replaces the student ids with the parsed comma separated list.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidStudentId` if any entry is empty.
    pub fn set_student_ids(&mut self, input: &str) -> Result<()> {
        self.student_ids = parse_student_ids(input)?;
        Ok(())
    }

    /// Interval between two refreshes.
    ///
    /// # Errors
    /// Returns an error if the interval is zero or too large.
    pub fn poll_interval(&self) -> Result<Duration> {
        scaled_secs("interval_minutes", self.polling.interval_minutes, 60)
    }

    /// Upper bound for a single request.
    ///
    /// # Errors
    /// Returns an error if the timeout is zero.
    pub fn request_timeout(&self) -> Result<Duration> {
        non_zero("request_timeout_secs", self.polling.request_timeout_secs)
            .map(Duration::from_secs)
    }

    /// How long a fetched token is trusted.
    ///
    /// # Errors
    /// Returns an error if the validity is zero or too large.
    pub fn token_validity(&self) -> Result<Duration> {
        scaled_secs("token_validity_hours", self.polling.token_validity_hours, 60 * 60)
    }

    fn has_credentials(&self) -> bool {
        let password_set = match &self.password {
            Password::Literal(value) => !value.trim().is_empty(),
            Password::Env { .. } | Password::Cmd { .. } => true,
        };
        !self.username.trim().is_empty() && password_set
    }

    fn onboard(mut self) -> Result<Self> {
        let config_path = Self::path()?;
        if !io::stdin().is_terminal() {
            return Err(ConfigError::NonInteractive { path: config_path });
        }

        if !config_path.as_os_str().is_empty() {
            eprintln!(
                "ProfiMaktab config incomplete. It will be stored at: {}",
                config_path.display()
            );
        }

        if !self.has_credentials() {
            self.username = prompt("Username: ")?;
            if self.username.is_empty() {
                return Err(ConfigError::MissingUsername);
            }
            let password = prompt("Password: ")?;
            if password.is_empty() {
                return Err(ConfigError::MissingPassword);
            }
            self.password = Password::Literal(password);
        }

        if self.student_ids.is_empty() {
            let input = prompt("Student ids, comma separated (e.g. 12345,67890): ")?;
            self.set_student_ids(&input)?;
        }

        self.store()?;
        Ok(self)
    }
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn non_zero(field: &'static str, value: u64) -> Result<u64> {
    if value == 0 {
        Err(ConfigError::ZeroDuration { field })
    } else {
        Ok(value)
    }
}

fn scaled_secs(field: &'static str, value: u64, unit_secs: u64) -> Result<Duration> {
    non_zero(field, value)?
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or(ConfigError::DurationOverflow { field })
}

impl Password {
    fn resolve(&self) -> Result<String> {
        match self {
            Self::Literal(value) => {
                if value.is_empty() {
                    return Err(ConfigError::MissingPassword);
                }
                Ok(value.clone())
            }
            Self::Env { env } => {
                let value = std::env::var(env)
                    .map_err(|_| ConfigError::MissingEnv { env: env.clone() })?;
                if value.is_empty() {
                    return Err(ConfigError::MissingPassword);
                }
                Ok(value)
            }
            Self::Cmd { cmd } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(cmd)
                    .output()
                    .map_err(|e| ConfigError::CommandExec {
                        cmd: cmd.clone(),
                        source: e,
                    })?;

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(ConfigError::CommandFailed {
                        cmd: cmd.clone(),
                        message: stderr.trim().to_string(),
                    });
                }

                // strip the trailing newline most password managers print
                let stdout = String::from_utf8_lossy(&output.stdout);
                let value = stdout.trim_end_matches(['\n', '\r']);
                if value.is_empty() {
                    return Err(ConfigError::CommandEmpty { cmd: cmd.clone() });
                }
                Ok(value.to_string())
            }
        }
    }
}
