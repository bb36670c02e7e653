use chrono::Duration;
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub database_url: String,
    pub port: u16,
    pub public_url: String,
    pub public_dir: String,
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub jwt_cookie_expires_in_days: i64,
    pub mail_service_url: String,
    pub mail_service_token: String,
    pub mail_from: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_url: String,
    pub rate_limit_per_hour: u32,
    /// Take the client address from `X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            Ok("development") | Err(_) => Environment::Development,
            Ok(other) => {
                return Err(ConfigError::Invalid { key: "APP_ENV", value: other.to_string() });
            }
        };

        let port: u16 = parse_var("PORT", "3000")?;

        Ok(Self {
            environment,
            database_url: database_url()?,
            port,
            public_url: env::var("PUBLIC_URL").unwrap_or_else(|_| format!("http://localhost:{port}")),
            public_dir: env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_expires_in: {
                let raw = env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| "90d".to_string());
                parse_duration(&raw).ok_or(ConfigError::Invalid { key: "JWT_EXPIRES_IN", value: raw })?
            },
            jwt_cookie_expires_in_days: parse_var("JWT_COOKIE_EXPIRES_IN", "90")?,
            mail_service_url: env::var("MAIL_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1/send".to_string()),
            mail_service_token: env::var("MAIL_SERVICE_TOKEN").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| "Tour Booking <hello@tour-booking.local>".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            stripe_api_url: env::var("STRIPE_API_URL").unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            rate_limit_per_hour: parse_var("RATE_LIMIT_PER_HOUR", "100")?,
            trust_proxy: parse_var("TRUST_PROXY", "false")?,
        })
    }
}

/// `DATABASE` may carry a `<PASSWORD>` placeholder that is filled from
/// `DATABASE_PASSWORD`, so the secret can live apart from the URL.
fn database_url() -> Result<String, ConfigError> {
    match env::var("DATABASE") {
        Ok(template) => {
            if template.contains("<PASSWORD>") {
                let password = env::var("DATABASE_PASSWORD").map_err(|_| ConfigError::Missing("DATABASE_PASSWORD"))?;
                Ok(template.replace("<PASSWORD>", &password))
            } else {
                Ok(template)
            }
        }
        Err(_) => env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE")),
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw })
}

/// Parses `90d`, `12h`, `30m`, `45s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let amount: i64 = digits.parse().ok()?;

    match unit {
        "" | "s" => Some(Duration::seconds(amount)),
        "m" => Some(Duration::minutes(amount)),
        "h" => Some(Duration::hours(amount)),
        "d" => Some(Duration::days(amount)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("90d"), Some(Duration::days(90)));
        assert_eq!(parse_duration("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_duration("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_duration("3600"), Some(Duration::seconds(3600)));
    }

    #[test]
    fn rejects_garbage_durations() {
        assert_eq!(parse_duration("d90"), None);
        assert_eq!(parse_duration("10 weeks"), None);
        assert_eq!(parse_duration(""), None);
    }
}
