use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use quill_api::password::DEFAULT_ITERATIONS;

/// Placeholder session secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Session cookie lifetime bounds, in days.
const SESSION_DAYS: std::ops::RangeInclusive<i64> = 1..=3650;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_secret: String,
    pub session_days: i64,
    pub pbkdf2_iterations: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let session_secret = env::var("QUILL_SESSION_SECRET").unwrap_or_default();
        if session_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&session_secret.as_str()) {
            bail!("QUILL_SESSION_SECRET is unset or still a placeholder");
        }

        Ok(Self {
            host: env::var("QUILL_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("QUILL_PORT", 5000)?,
            db_path: env::var("QUILL_DB_PATH")
                .unwrap_or_else(|_| "blog.db".into())
                .into(),
            session_secret,
            session_days: check_session_days(parse_var("QUILL_SESSION_DAYS", 30)?)?,
            pbkdf2_iterations: parse_var("QUILL_PBKDF2_ITERATIONS", DEFAULT_ITERATIONS)?,
        })
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {key} value: {raw}")),
        Err(_) => Ok(default),
    }
}

fn check_session_days(days: i64) -> Result<i64> {
    if !SESSION_DAYS.contains(&days) {
        bail!(
            "QUILL_SESSION_DAYS must be between {} and {}, got {}",
            SESSION_DAYS.start(),
            SESSION_DAYS.end(),
            days
        );
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_days_within_bounds() {
        assert_eq!(check_session_days(1).unwrap(), 1);
        assert_eq!(check_session_days(30).unwrap(), 30);
        assert_eq!(check_session_days(3650).unwrap(), 3650);
    }

    #[test]
    fn session_days_out_of_bounds_rejected() {
        for days in [0, -1, 3651, 100_000_000_000_000, i64::MAX] {
            assert!(check_session_days(days).is_err(), "{days} accepted");
        }
    }
}
