//! Shell configuration from environment variables and command-line flags.
//! Flags override env; env overrides defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};

pub const ENV_USERS_FILE: &str = "MEALY_USERS_FILE";
pub const ENV_AUTH_TIMEOUT_MS: &str = "MEALY_AUTH_TIMEOUT_MS";
pub const ENV_SEED_DEMO: &str = "MEALY_SEED_DEMO";

const DEFAULT_AUTH_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellConfig {
    /// JSON account directory; `None` keeps accounts in memory only.
    pub users_file: Option<PathBuf>,
    pub auth_timeout: Duration,
    /// Seed one admin and one customer account when no users file is configured.
    pub seed_demo_users: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            users_file: None,
            auth_timeout: Duration::from_millis(DEFAULT_AUTH_TIMEOUT_MS),
            seed_demo_users: true,
        }
    }
}

fn parse_bool(name: &str, v: &str) -> AppResult<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::config("invalid_bool".to_string(), format!("{}: expected a boolean, got '{}'", name, other))),
    }
}

fn parse_millis(name: &str, v: &str) -> AppResult<Duration> {
    let ms = v
        .trim()
        .parse::<u64>()
        .map_err(|e| AppError::config("invalid_timeout".to_string(), format!("{}: {}", name, e)))?;
    if ms == 0 {
        return Err(AppError::config("invalid_timeout".to_string(), format!("{}: must be greater than zero", name)));
    }
    Ok(Duration::from_millis(ms))
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> AppResult<&'a str> {
    args.get(i + 1)
        .map(|s| s.as_str())
        .ok_or_else(|| AppError::config("missing_value".to_string(), format!("{} requires a value", flag)))
}

impl ShellConfig {
    /// Read the process environment and the given arguments (program name excluded).
    pub fn load(args: &[String]) -> AppResult<Self> {
        let cfg = Self::from_sources(|k| env::var(k).ok(), args)?;
        info!(
            target: "mealy::config",
            "config: users_file={:?} auth_timeout_ms={} seed_demo_users={}",
            cfg.users_file, cfg.auth_timeout.as_millis(), cfg.seed_demo_users
        );
        Ok(cfg)
    }

    pub fn from_sources<F>(lookup: F, args: &[String]) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_USERS_FILE).filter(|v| !v.trim().is_empty()) {
            cfg.users_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_AUTH_TIMEOUT_MS) {
            cfg.auth_timeout = parse_millis(ENV_AUTH_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_SEED_DEMO) {
            cfg.seed_demo_users = parse_bool(ENV_SEED_DEMO, &v)?;
        }

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--users" => {
                    cfg.users_file = Some(PathBuf::from(flag_value(args, i, "--users")?));
                    i += 1;
                }
                "--timeout-ms" => {
                    cfg.auth_timeout = parse_millis("--timeout-ms", flag_value(args, i, "--timeout-ms")?)?;
                    i += 1;
                }
                "--no-seed" => cfg.seed_demo_users = false,
                other => {
                    return Err(AppError::config("unknown_flag".to_string(), format!("unrecognized argument '{}'", other)));
                }
            }
            i += 1;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults() {
        let cfg = ShellConfig::from_sources(env_of(&[]), &[]).unwrap();
        assert_eq!(cfg, ShellConfig::default());
        assert_eq!(cfg.auth_timeout, Duration::from_millis(5_000));
    }

    #[test]
    fn env_then_flags() {
        let env = env_of(&[(ENV_USERS_FILE, "/tmp/a.json"), (ENV_AUTH_TIMEOUT_MS, "250"), (ENV_SEED_DEMO, "off")]);
        let cfg = ShellConfig::from_sources(&env, &[]).unwrap();
        assert_eq!(cfg.users_file, Some(PathBuf::from("/tmp/a.json")));
        assert_eq!(cfg.auth_timeout, Duration::from_millis(250));
        assert!(!cfg.seed_demo_users);

        let cfg = ShellConfig::from_sources(&env, &args(&["--users", "b.json", "--timeout-ms", "75"])).unwrap();
        assert_eq!(cfg.users_file, Some(PathBuf::from("b.json")));
        assert_eq!(cfg.auth_timeout, Duration::from_millis(75));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = ShellConfig::from_sources(env_of(&[(ENV_AUTH_TIMEOUT_MS, "soon")]), &[]).unwrap_err();
        assert_eq!(err.code_str(), "invalid_timeout");
        let err = ShellConfig::from_sources(env_of(&[(ENV_SEED_DEMO, "maybe")]), &[]).unwrap_err();
        assert_eq!(err.code_str(), "invalid_bool");
        let err = ShellConfig::from_sources(env_of(&[]), &args(&["--timeout-ms", "0"])).unwrap_err();
        assert_eq!(err.code_str(), "invalid_timeout");
        let err = ShellConfig::from_sources(env_of(&[]), &args(&["--users"])).unwrap_err();
        assert_eq!(err.code_str(), "missing_value");
        let err = ShellConfig::from_sources(env_of(&[]), &args(&["--verbose"])).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn no_seed_flag() {
        let cfg = ShellConfig::from_sources(env_of(&[]), &args(&["--no-seed"])).unwrap();
        assert!(!cfg.seed_demo_users);
    }
}
