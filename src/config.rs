//! Configuration module for apiwatch.
//!
//! Targets and notification channels are read from a JSON file. Global
//! defaults can be overridden from the environment.

use reqwest::{Method, Url};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::engine::Target;

/// Path used when `APIWATCH_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "apiwatch.json";

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("target {target} is missing required field {field}")]
    MissingField { target: String, field: &'static str },
    #[error("target {target}: {reason}")]
    Invalid { target: String, reason: String },
    #[error("duplicate target name {0}")]
    DuplicateTarget(String),
    #[error("invalid check interval: {0}")]
    InvalidInterval(String),
}

/// Values applied to every target that does not override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TargetDefaults {
    pub window_size: usize,
    pub consecutive_threshold: u32,
    pub cooldown_secs: f64,
    pub method: String,
    pub timeout_secs: f64,
    pub warning_latency_secs: f64,
    pub critical_latency_secs: f64,
    pub success_rate_threshold: f64,
    pub availability_threshold: f64,
    pub headers: BTreeMap<String, String>,
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self {
            window_size: 60,
            consecutive_threshold: 10,
            cooldown_secs: 300.0,
            method: "GET".to_string(),
            timeout_secs: 20.0,
            warning_latency_secs: 3.0,
            critical_latency_secs: 5.0,
            success_rate_threshold: 95.0,
            availability_threshold: 98.0,
            headers: BTreeMap::from([("User-Agent".to_string(), "apiwatch/0.1".to_string())]),
        }
    }
}

/// One target as written in the file. Absent fields fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetConfig {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: Option<BTreeMap<String, String>>,
    pub timeout_secs: Option<f64>,
    pub warning_latency_secs: Option<f64>,
    pub critical_latency_secs: Option<f64>,
    pub success_rate_threshold: Option<f64>,
    pub availability_threshold: Option<f64>,
    pub window_size: Option<usize>,
    pub consecutive_threshold: Option<u32>,
    pub cooldown_secs: Option<f64>,
}

/// A notification channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    Feishu {
        webhook: String,
        #[serde(default)]
        user_ids: Vec<String>,
    },
    Webhook {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Email {
        smtp_host: String,
        #[serde(default = "default_smtp_port")]
        smtp_port: u16,
        username: Option<String>,
        password: Option<String>,
        from: String,
        to: Vec<String>,
        #[serde(default = "default_use_tls")]
        use_tls: bool,
    },
}

fn default_smtp_port() -> u16 {
    587
}

fn default_use_tls() -> bool {
    true
}

/// Top-level monitor configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between checks of each target (default: 30)
    pub check_interval_secs: f64,
    pub defaults: TargetDefaults,
    pub targets: Vec<TargetConfig>,
    pub notifiers: Vec<NotifierConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30.0,
            defaults: TargetDefaults::default(),
            targets: Vec::new(),
            notifiers: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the file named by the environment.
    ///
    /// Environment variables:
    /// - `APIWATCH_CONFIG`: config file path (default: "apiwatch.json")
    /// - `APIWATCH_CHECK_INTERVAL_SECS`: seconds between checks
    /// - `APIWATCH_WINDOW_SIZE`: default statistics window size
    /// - `APIWATCH_CONSECUTIVE_THRESHOLD`: default consecutive checks before alerting
    /// - `APIWATCH_COOLDOWN_SECS`: default seconds between repeated notifications
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("APIWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_with(path, |key| env::var(key).ok())
    }

    /// Read `path`, apply overrides from `lookup` and check global settings.
    pub fn load_with<P, F>(path: P, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_overrides(lookup);
        cfg.check_interval()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply overrides from a key lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, "APIWATCH_CHECK_INTERVAL_SECS") {
            self.check_interval_secs = v;
        }
        if let Some(v) = parse_override(&lookup, "APIWATCH_WINDOW_SIZE") {
            self.defaults.window_size = v;
        }
        if let Some(v) = parse_override(&lookup, "APIWATCH_CONSECUTIVE_THRESHOLD") {
            self.defaults.consecutive_threshold = v;
        }
        if let Some(v) = parse_override(&lookup, "APIWATCH_COOLDOWN_SECS") {
            self.defaults.cooldown_secs = v;
        }
    }

    pub fn check_interval(&self) -> Result<Duration, ConfigError> {
        positive_secs("check_interval_secs", self.check_interval_secs)
            .map_err(ConfigError::InvalidInterval)
    }

    /// Resolve every configured target.
    ///
    /// Invalid targets are logged once and left out; the rest are returned in
    /// file order.
    pub fn targets(&self) -> Vec<Target> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());

        for (i, raw) in self.targets.iter().enumerate() {
            let resolved = raw.resolve(&self.defaults).and_then(|target| {
                if seen.insert(target.name.clone()) {
                    Ok(target)
                } else {
                    Err(ConfigError::DuplicateTarget(target.name))
                }
            });

            match resolved {
                Ok(target) => {
                    if target.window_size < target.consecutive_threshold as usize {
                        tracing::warn!(
                            "Target {}: window size {} is smaller than consecutive threshold {}; success rate and availability will never be evaluated",
                            target.name,
                            target.window_size,
                            target.consecutive_threshold
                        );
                    }
                    targets.push(target);
                }
                Err(e) => {
                    tracing::error!("Invalid API configuration (entry {}): {}", i, e);
                }
            }
        }

        targets
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse {:?}", key, raw);
            None
        }
    }
}

impl TargetConfig {
    /// Merge with defaults and validate.
    pub fn resolve(&self, defaults: &TargetDefaults) -> Result<Target, ConfigError> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(ConfigError::MissingField {
                    target: self.url.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                    field: "name",
                })
            }
        };

        let invalid = |reason: String| ConfigError::Invalid {
            target: name.clone(),
            reason,
        };

        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                return Err(ConfigError::MissingField {
                    target: name.clone(),
                    field: "url",
                })
            }
        };
        let parsed = Url::parse(&url).map_err(|e| invalid(format!("invalid url {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported url scheme {}", parsed.scheme())));
        }

        let method = self
            .method
            .as_deref()
            .unwrap_or(&defaults.method)
            .trim()
            .to_uppercase();
        Method::from_bytes(method.as_bytes())
            .map_err(|_| invalid(format!("invalid HTTP method {}", method)))?;

        let timeout = positive_secs(
            "timeout_secs",
            self.timeout_secs.unwrap_or(defaults.timeout_secs),
        )
        .map_err(&invalid)?;
        let warning_latency = positive_secs(
            "warning_latency_secs",
            self.warning_latency_secs
                .unwrap_or(defaults.warning_latency_secs),
        )
        .map_err(&invalid)?;
        let critical_latency = positive_secs(
            "critical_latency_secs",
            self.critical_latency_secs
                .unwrap_or(defaults.critical_latency_secs),
        )
        .map_err(&invalid)?;
        if critical_latency <= warning_latency {
            return Err(invalid(format!(
                "critical latency ({:?}) must exceed warning latency ({:?})",
                critical_latency, warning_latency
            )));
        }

        let success_rate_threshold = percentage(
            "success_rate_threshold",
            self.success_rate_threshold
                .unwrap_or(defaults.success_rate_threshold),
        )
        .map_err(&invalid)?;
        let availability_threshold = percentage(
            "availability_threshold",
            self.availability_threshold
                .unwrap_or(defaults.availability_threshold),
        )
        .map_err(&invalid)?;

        let window_size = self.window_size.unwrap_or(defaults.window_size);
        if window_size == 0 {
            return Err(invalid("window_size must be at least 1".to_string()));
        }
        let consecutive_threshold = self
            .consecutive_threshold
            .unwrap_or(defaults.consecutive_threshold);
        if consecutive_threshold == 0 {
            return Err(invalid("consecutive_threshold must be at least 1".to_string()));
        }

        let cooldown_secs = self.cooldown_secs.unwrap_or(defaults.cooldown_secs);
        let cooldown = Duration::try_from_secs_f64(cooldown_secs)
            .map_err(|_| invalid(format!("cooldown_secs must be non-negative, got {}", cooldown_secs)))?;

        Ok(Target {
            name,
            url,
            method,
            headers: self.headers.clone().unwrap_or_else(|| defaults.headers.clone()),
            timeout,
            warning_latency,
            critical_latency,
            success_rate_threshold,
            availability_threshold,
            window_size,
            consecutive_threshold,
            cooldown,
        })
    }
}

fn positive_secs(field: &str, secs: f64) -> Result<Duration, String> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(format!("{} must be positive, got {}", field, secs));
    }
    match Duration::try_from_secs_f64(secs) {
        Ok(d) if d.is_zero() => Err(format!("{} rounds down to zero: {}", field, secs)),
        Ok(d) => Ok(d),
        Err(e) => Err(format!("{}: {}", field, e)),
    }
}

fn percentage(field: &str, value: f64) -> Result<f64, String> {
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} must be between 0 and 100, got {}", field, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    const SAMPLE: &str = r#"{
        "check_interval_secs": 15,
        "defaults": { "consecutive_threshold": 3, "window_size": 20 },
        "targets": [
            { "name": "prod", "url": "https://api.example.com/health" },
            { "name": "staging", "url": "https://staging.example.com/health",
              "method": "head", "critical_latency_secs": 10, "cooldown_secs": 60 },
            { "url": "https://nameless.example.com" },
            { "name": "bad-latency", "url": "https://x.example.com",
              "warning_latency_secs": 5, "critical_latency_secs": 2 },
            { "name": "prod", "url": "https://dup.example.com" }
        ],
        "notifiers": [
            { "type": "feishu", "webhook": "https://open.feishu.cn/hook/abc", "user_ids": ["u1"] },
            { "type": "webhook", "url": "https://hooks.example.com/alerts" }
        ]
    }"#;

    #[test]
    fn test_default_config() {
        let cfg = MonitorConfig::default();
        assert_eq!(assert_ok!(cfg.check_interval()), Duration::from_secs(30));
        assert_eq!(cfg.defaults.window_size, 60);
        assert_eq!(cfg.defaults.consecutive_threshold, 10);
        assert_eq!(cfg.defaults.cooldown_secs, 300.0);
        assert!(cfg.targets().is_empty());
    }

    #[test]
    fn test_targets_resolve_with_defaults() {
        let cfg = assert_ok!(MonitorConfig::from_json(SAMPLE));
        assert_eq!(assert_ok!(cfg.check_interval()), Duration::from_secs(15));
        assert_eq!(cfg.notifiers.len(), 2);

        let targets = cfg.targets();
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["prod", "staging"]);

        let prod = &targets[0];
        assert_eq!(prod.method, "GET");
        assert_eq!(prod.timeout, Duration::from_secs(20));
        assert_eq!(prod.warning_latency, Duration::from_secs(3));
        assert_eq!(prod.critical_latency, Duration::from_secs(5));
        assert_eq!(prod.window_size, 20);
        assert_eq!(prod.consecutive_threshold, 3);
        assert_eq!(prod.cooldown, Duration::from_secs(300));
        assert_eq!(prod.headers.get("User-Agent").map(String::as_str), Some("apiwatch/0.1"));

        let staging = &targets[1];
        assert_eq!(staging.method, "HEAD");
        assert_eq!(staging.critical_latency, Duration::from_secs(10));
        assert_eq!(staging.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let defaults = TargetDefaults::default();

        let no_url = TargetConfig {
            name: Some("api".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            no_url.resolve(&defaults),
            Err(ConfigError::MissingField { field: "url", .. })
        ));

        let no_name = TargetConfig {
            url: Some("https://api.example.com".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            no_name.resolve(&defaults),
            Err(ConfigError::MissingField { field: "name", .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let defaults = TargetDefaults::default();
        let base = TargetConfig {
            name: Some("api".to_string()),
            url: Some("https://api.example.com".to_string()),
            ..Default::default()
        };
        assert_ok!(base.resolve(&defaults));

        let cases = [
            TargetConfig { url: Some("ftp://api.example.com".to_string()), ..base.clone() },
            TargetConfig { url: Some("not a url".to_string()), ..base.clone() },
            TargetConfig { method: Some("BAD METHOD".to_string()), ..base.clone() },
            TargetConfig { timeout_secs: Some(0.0), ..base.clone() },
            TargetConfig { success_rate_threshold: Some(120.0), ..base.clone() },
            TargetConfig { availability_threshold: Some(-1.0), ..base.clone() },
            TargetConfig { window_size: Some(0), ..base.clone() },
            TargetConfig { consecutive_threshold: Some(0), ..base.clone() },
            TargetConfig { cooldown_secs: Some(-5.0), ..base.clone() },
        ];

        for case in cases {
            assert_err!(case.resolve(&defaults), "{:?}", case);
        }
    }

    #[test]
    fn test_overrides() {
        let mut cfg = MonitorConfig::default();
        cfg.apply_overrides(|key| match key {
            "APIWATCH_CHECK_INTERVAL_SECS" => Some("5".to_string()),
            "APIWATCH_CONSECUTIVE_THRESHOLD" => Some("4".to_string()),
            "APIWATCH_WINDOW_SIZE" => Some("not-a-number".to_string()),
            _ => None,
        });

        assert_eq!(assert_ok!(cfg.check_interval()), Duration::from_secs(5));
        assert_eq!(cfg.defaults.consecutive_threshold, 4);
        assert_eq!(cfg.defaults.window_size, 60);
    }

    #[test]
    fn test_unusable_check_interval_rejected() {
        for secs in ["1e30", "1e-10", "0", "-5", "NaN", "inf"] {
            let mut cfg = MonitorConfig::default();
            cfg.apply_overrides(|key| match key {
                "APIWATCH_CHECK_INTERVAL_SECS" => Some(secs.to_string()),
                _ => None,
            });
            assert!(
                matches!(cfg.check_interval(), Err(ConfigError::InvalidInterval(_))),
                "interval {}",
                secs
            );
        }

        let cfg = assert_ok!(MonitorConfig::from_json(r#"{ "check_interval_secs": 1e-10 }"#));
        assert_err!(cfg.check_interval());
    }

    #[test]
    fn test_load_fails_on_bad_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "check_interval_secs": 1e30 }"#).unwrap();

        let loaded = MonitorConfig::load_with(file.path(), |_| None);
        assert!(matches!(loaded, Err(ConfigError::InvalidInterval(_))));

        let fixed = MonitorConfig::load_with(file.path(), |key| match key {
            "APIWATCH_CHECK_INTERVAL_SECS" => Some("45".to_string()),
            _ => None,
        });
        let fixed = assert_ok!(fixed);
        assert_eq!(fixed.check_interval_secs, 45.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let cfg = assert_ok!(MonitorConfig::from_file(file.path()));
        assert_eq!(cfg.targets().len(), 2);

        let missing = MonitorConfig::from_file("/nonexistent/apiwatch.json");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_email_notifier_defaults() {
        let cfg = assert_ok!(MonitorConfig::from_json(
            r#"{ "notifiers": [ { "type": "email", "smtp_host": "smtp.example.com",
                 "from": "monitor@example.com", "to": ["ops@example.com"] } ] }"#
        ));

        match &cfg.notifiers[0] {
            NotifierConfig::Email { smtp_port, use_tls, username, .. } => {
                assert_eq!(*smtp_port, 587);
                assert!(*use_tls);
                assert!(username.is_none());
            }
            other => panic!("unexpected notifier: {:?}", other),
        }
    }
}
