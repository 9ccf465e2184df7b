use figment::{
    providers::{Env, Serialized},
    value::{Dict, Value},
    Figment,
};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Env file read by [`Settings::load`] when it exists in the working directory.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Errors raised while building [`Settings`]. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required variable is absent from both the env file and the environment.
    #[error("missing required setting: {field}")]
    Missing { field: String },

    /// A variable is present but cannot be converted to the field type.
    #[error("invalid setting: {0}")]
    Invalid(Box<figment::Error>),

    /// The env file exists but could not be parsed.
    #[error("failed to read env file '{}': {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    /// An env file value uses bare `$NAME` expansion. Only the key is reported.
    #[error(
        "env file '{}': value of {key} contains '$' outside of ${{...}}; escape it as \\$ or use single quotes",
        path.display()
    )]
    EnvFileSubstitution { path: PathBuf, key: String },
}

impl From<figment::Error> for SettingsError {
    fn from(err: figment::Error) -> Self {
        if let figment::error::Kind::MissingField(field) = &err.kind {
            return Self::Missing {
                field: field.to_uppercase(),
            };
        }
        Self::Invalid(Box::new(err))
    }
}

/// Typed process configuration.
///
/// Field names map one-to-one onto environment variables (`postgres_db` is
/// read from `POSTGRES_DB`, matched case-insensitively). Variables that do not
/// correspond to a field are ignored.
///
/// Every source is read as text. String fields keep the value verbatim
/// (`POSTGRES_PASSWORD=007` stays `"007"`); numeric and boolean fields are
/// parsed from that text.
#[derive(Clone, Deserialize)]
pub struct Settings {
    // Database
    pub postgres_db: String,
    pub postgres_password: String,
    pub postgres_user: String,
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,
    #[serde(default = "default_postgres_port", deserialize_with = "de::parsed")]
    pub postgres_port: u16,

    // JSON Web Token
    pub jwt_secret_key: String,
    #[serde(default = "default_jwt_algorithm")]
    pub jwt_algorithm: String,
    #[serde(
        default = "default_access_token_expire_minutes",
        deserialize_with = "de::parsed"
    )]
    pub access_token_expire_minutes: u64,

    // NLP model identifier
    #[serde(default = "default_space_mode")]
    pub space_mode: String,

    /// Echo SQL statements to the log.
    #[serde(default, deserialize_with = "de::flag")]
    pub debug: bool,
    /// Upper bound of the connection pool.
    #[serde(default = "default_db_max_connections", deserialize_with = "de::parsed")]
    pub db_max_connections: u32,
    /// Console log level ("trace" .. "error", or "off").
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional JSON log file; console-only when unset.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_postgres_host() -> String {
    "db".to_string()
}

const fn default_postgres_port() -> u16 {
    5432
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

const fn default_access_token_expire_minutes() -> u64 {
    15
}

fn default_space_mode() -> String {
    "en_core_web_sm".to_string()
}

const fn default_db_max_connections() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from `./.env` (if present) overlaid by the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(DEFAULT_ENV_FILE)
    }

    /// Load settings from the given env file (if present) overlaid by the process environment.
    ///
    /// A missing env file is not an error; an unreadable one is.
    pub fn load_from<P: AsRef<Path>>(env_file: P) -> Result<Self, SettingsError> {
        let file_values = read_env_file(env_file.as_ref())?;

        let figment = Figment::new()
            .merge(Serialized::defaults(file_values))
            .merge(Serialized::defaults(env_values()));

        Self::from_figment(figment)
    }

    /// Extract settings from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, SettingsError> {
        let settings: Settings = figment.extract()?;
        Ok(settings)
    }

    /// Connection URL assembled from the current database fields.
    ///
    /// Computed on every call, so it always reflects the live values of
    /// user, password, host, port and database name.
    pub fn database_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            urlencoding::encode(&self.postgres_user),
            urlencoding::encode(&self.postgres_password),
            self.postgres_host,
            self.postgres_port,
            self.postgres_db
        )
    }

    /// Same as [`Settings::database_url`] with the password masked, for logs.
    pub fn redacted_database_url(&self) -> String {
        format!(
            "postgresql://{}:***@{}:{}/{}",
            urlencoding::encode(&self.postgres_user),
            self.postgres_host,
            self.postgres_port,
            self.postgres_db
        )
    }

    /// Lifetime of issued access tokens.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes * 60)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("postgres_db", &self.postgres_db)
            .field("postgres_password", &"***")
            .field("postgres_user", &self.postgres_user)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("jwt_secret_key", &"***")
            .field("jwt_algorithm", &self.jwt_algorithm)
            .field(
                "access_token_expire_minutes",
                &self.access_token_expire_minutes,
            )
            .field("space_mode", &self.space_mode)
            .field("debug", &self.debug)
            .field("db_max_connections", &self.db_max_connections)
            .field("log_level", &self.log_level)
            .field("log_file", &self.log_file)
            .finish()
    }
}

/// Process environment as a figment dictionary of untouched strings.
///
/// `Env` itself would parse `123456` into a number and `[a,b]` into an array,
/// which breaks string fields such as passwords.
fn env_values() -> Dict {
    Env::raw()
        .iter()
        .map(|(key, value)| (key.as_str().to_lowercase(), Value::from(value)))
        .collect()
}

/// Read `KEY=value` pairs from an env file into a figment dictionary.
/// Keys are lowercased to line up with [`env_values`].
fn read_env_file(path: &Path) -> Result<Dict, SettingsError> {
    let mut dict = Dict::new();
    if !path.is_file() {
        return Ok(dict);
    }

    let env_file_err = |source| SettingsError::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let content = std::fs::read_to_string(path)
        .map_err(|e| env_file_err(dotenvy::Error::Io(e)))?;
    if let Some(key) = find_bare_substitution(&content) {
        return Err(SettingsError::EnvFileSubstitution {
            path: path.to_path_buf(),
            key,
        });
    }

    for entry in dotenvy::from_path_iter(path).map_err(env_file_err)? {
        let (key, raw) = entry.map_err(env_file_err)?;
        dict.insert(key.to_lowercase(), Value::from(raw));
    }

    Ok(dict)
}

/// First key whose value dotenvy would expand through a bare `$`.
///
/// dotenvy replaces `$NAME` (and a lone `$`) in unquoted and double-quoted
/// values, silently truncating secrets like `pa$word`. `${NAME}`, `\$` and
/// single-quoted values are left alone.
fn find_bare_substitution(content: &str) -> Option<String> {
    for line in content.lines() {
        let line = line.trim_start();
        if line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim_start();
        if value.starts_with('\'') {
            continue;
        }
        let value = if value.starts_with('"') {
            value
        } else {
            value.split(" #").next().unwrap_or(value)
        };
        if has_bare_dollar(value) {
            return Some(key.trim().to_string());
        }
    }
    None
}

fn has_bare_dollar(value: &str) -> bool {
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '$' if chars.peek() != Some(&'{') => return true,
            _ => {}
        }
    }
    false
}

/// Deserializers for the non-string fields. Each accepts either the native
/// value (from a typed figment provider) or its text form (from the
/// environment or an env file).
mod de {
    use serde::{de::Error, Deserialize, Deserializer};
    use std::{fmt::Display, str::FromStr};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOr<T> {
        Text(String),
        Native(T),
    }

    pub(super) fn parsed<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match TextOr::<T>::deserialize(deserializer)? {
            TextOr::Text(text) => text
                .trim()
                .parse()
                .map_err(|e| D::Error::custom(format!("'{}': {e}", text.trim()))),
            TextOr::Native(value) => Ok(value),
        }
    }

    /// `true/false`, `1/0`, `yes/no`, `on/off`, case-insensitive.
    pub(super) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = match TextOr::<bool>::deserialize(deserializer)? {
            TextOr::Native(value) => return Ok(value),
            TextOr::Text(text) => text,
        };
        match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(D::Error::custom(format!("'{other}' is not a boolean"))),
        }
    }
}
