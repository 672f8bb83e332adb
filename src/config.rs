use anyhow::{Context, Result};
use std::str::FromStr;

pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    pub webapp_url: String,
    pub host: String,
    pub port: u16,
    /// Maximum age of WebApp `auth_date`, in seconds. 0 disables the check.
    pub auth_max_age_secs: i64,
    pub allow_unsigned_auth: bool,
    pub generate_test_data: bool,
    pub run_bot: bool,
    pub debug_routes: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bot_token: std::env::var("BOT_TOKEN").context("BOT_TOKEN not set")?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "./data/social_rent.db".into()),
            webapp_url: std::env::var("WEBAPP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("PORT", 8001)?,
            auth_max_age_secs: parse_var("AUTH_MAX_AGE_SECS", 86_400)?,
            allow_unsigned_auth: flag("ALLOW_UNSIGNED_AUTH", false),
            generate_test_data: flag("GENERATE_TEST_DATA", false),
            run_bot: flag("RUN_BOT", true),
            debug_routes: flag("DEBUG_ROUTES", false),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
impl Config {
    /// Settings for router and repository tests. No env access.
    pub fn for_tests(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.into(),
            database_url: ":memory:".into(),
            webapp_url: "https://example.test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            auth_max_age_secs: 86_400,
            allow_unsigned_auth: false,
            generate_test_data: false,
            run_bot: false,
            debug_routes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        for v in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(parse_flag(v), "{v}");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!parse_flag(v), "{v}");
        }
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let mut cfg = Config::for_tests("t");
        cfg.host = "0.0.0.0".into();
        cfg.port = 8001;
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8001");
    }
}
