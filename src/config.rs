//! Application configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if any) through `dotenvy`, then calls
//! [`AppConfig::from_env`] once. Database and JWT settings are mandatory;
//! SFTP uploads and the welcome mail are optional and switch themselves off
//! when their variables are absent.

use time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 30;
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_FONTS_PATH: &str = "/usr/share/fonts";
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },
    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes")]
    WeakJwtSecret,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_lifetime: Duration,
    pub refresh_lifetime: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
    pub domain: Option<String>,
}

/// Remote directory and public URL prefix for one kind of uploaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSettings {
    pub remote_dir: String,
    pub public_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub avatars: BucketSettings,
    pub dog_photos: BucketSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub port: u16,
    pub jwt: JwtSettings,
    pub cookie: CookieSettings,
    pub sftp: Option<SftpSettings>,
    pub mail: Option<MailSettings>,
    pub queries_path: Option<String>,
    /// Directory searched for a TrueType report font.
    pub fonts_path: String,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a required variable is missing or a numeric
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads through `lookup`, which keeps
    /// tests independent of the shared process environment.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = get("DB_HOST").unwrap_or_else(|| "localhost".into());
                let port = get("DB_PORT").unwrap_or_else(|| "5432".into());
                let user = get("DB_USER").unwrap_or_else(|| "postgres".into());
                let name = get("DB_NAME").unwrap_or_else(|| "doghub_db".into());
                let password = get("DB_PASSWORD").ok_or(ConfigError::Missing { var: "DB_PASSWORD" })?;
                build_database_url(&host, &port, &user, &password, &name)
            }
        };

        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing { var: "JWT_SECRET" })?;
        if secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret);
        }

        let access_minutes = parse_or("ACCESS_TOKEN_MINUTES", get("ACCESS_TOKEN_MINUTES"), DEFAULT_ACCESS_TOKEN_MINUTES)?;
        let refresh_days = parse_or("REFRESH_TOKEN_DAYS", get("REFRESH_TOKEN_DAYS"), DEFAULT_REFRESH_TOKEN_DAYS)?;

        let jwt = JwtSettings {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "doghub".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "doghub-client".into()),
            access_lifetime: Duration::minutes(access_minutes),
            refresh_lifetime: Duration::days(refresh_days),
        };

        let cookie = CookieSettings {
            secure: parse_bool(get("REFRESH_COOKIE_SECURE").as_deref()).unwrap_or(false),
            domain: get("REFRESH_COOKIE_DOMAIN"),
        };

        let sftp = match (get("SSH_HOST"), get("SSH_USER"), get("SSH_PASSWORD")) {
            (Some(host), Some(user), Some(password)) => Some(SftpSettings {
                host,
                port: parse_or("SSH_PORT", get("SSH_PORT"), DEFAULT_SSH_PORT)?,
                user,
                password,
                avatars: BucketSettings {
                    remote_dir: get("AVATAR_REMOTE_DIR").unwrap_or_else(|| "/srv/doghub/avatars".into()),
                    public_base_url: trim_url(get("AVATAR_PUBLIC_BASE_URL").unwrap_or_default()),
                },
                dog_photos: BucketSettings {
                    remote_dir: get("DOG_PHOTO_REMOTE_DIR").unwrap_or_else(|| "/srv/doghub/dogs".into()),
                    public_base_url: trim_url(get("DOG_PHOTO_PUBLIC_BASE_URL").unwrap_or_default()),
                },
            }),
            _ => None,
        };

        let mail = match (get("RESEND_API_KEY"), get("MAIL_FROM")) {
            (Some(api_key), Some(from)) => Some(MailSettings { api_key, from }),
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), DEFAULT_DB_MAX_CONNECTIONS)?,
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            jwt,
            cookie,
            sftp,
            mail,
            queries_path: get("QUERIES_PATH"),
            fonts_path: get("FONTS_PATH").unwrap_or_else(|| DEFAULT_FONTS_PATH.to_owned()),
        })
    }
}

/// Credentials and database name are percent-encoded so characters like
/// `@`, `/` or `#` stay inside their URL component.
pub(crate) fn build_database_url(host: &str, port: &str, user: &str, password: &str, name: &str) -> String {
    let user = urlencoding::encode(user);
    let password = urlencoding::encode(password);
    let name = urlencoding::encode(name);
    format!("postgres://{user}:{password}@{host}:{port}/{name}")
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

fn parse_or<T: std::str::FromStr>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// Parse a loose boolean (`1/true/yes/on`, `0/false/no/off`).
pub(crate) fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
