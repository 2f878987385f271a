use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use barter_api::Settings;

/// JWT secrets shipped in sample files that must never reach a real deployment.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "django-insecure-change-me",
];

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("BARTER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BARTER_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let mut settings = Settings::new(jwt_secret);
        settings.page_size = parsed(&get, "BARTER_PAGE_SIZE", settings.page_size)?;
        settings.access_ttl = Duration::minutes(parsed(&get, "BARTER_ACCESS_TOKEN_MINUTES", 60)?);
        settings.refresh_ttl = Duration::days(parsed(&get, "BARTER_REFRESH_TOKEN_DAYS", 1)?);
        settings.session_ttl = Duration::days(parsed(&get, "BARTER_SESSION_DAYS", 14)?);
        if settings.page_size == 0 {
            bail!("BARTER_PAGE_SIZE must be at least 1");
        }

        Ok(Self {
            host: get("BARTER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&get, "BARTER_PORT", 8000)?,
            db_path: get("BARTER_DB_PATH").unwrap_or_else(|| "barter.db".into()).into(),
            settings,
        })
    }
}

fn parsed<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value {:?} for {}", raw, key)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("BARTER_JWT_SECRET", "s3cret-for-tests")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.db_path, PathBuf::from("barter.db"));
        assert_eq!(config.settings.page_size, 10);
        assert_eq!(config.settings.access_ttl, Duration::minutes(60));
        assert_eq!(config.settings.refresh_ttl, Duration::days(1));
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(load(&[]).is_err());
        assert!(load(&[("BARTER_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let config = load(&[
            ("BARTER_JWT_SECRET", "s3cret-for-tests"),
            ("BARTER_PORT", "9000"),
            ("BARTER_PAGE_SIZE", "25"),
            ("BARTER_SESSION_DAYS", "2"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.settings.page_size, 25);
        assert_eq!(config.settings.session_ttl, Duration::days(2));

        let err = load(&[("BARTER_JWT_SECRET", "s3cret-for-tests"), ("BARTER_PORT", "http")])
            .unwrap_err();
        assert!(err.to_string().contains("BARTER_PORT"));
        assert!(load(&[("BARTER_JWT_SECRET", "x"), ("BARTER_PAGE_SIZE", "0")]).is_err());
    }
}
