//! TOML-based configuration.
//!
//! Holds the tunables of the core:
//! - Work and break lengths, and the long-break cadence
//! - The tolerance used to detect consecutive focus sessions
//! - The XP level curve
//! - Task completion policy
//!
//! Configuration is stored at `~/.config/focusquest/config.toml`. Every field
//! has a default, so a partial file (or no file) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::reward::XpCurve;
use crate::session::SessionPolicy;
use crate::task::TaskPolicy;
use crate::timer::{BreakPolicy, TimerKind};

const APP_DIR: &str = "focusquest";
const FILE_NAME: &str = "config.toml";

/// Timer durations, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u64,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u64,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u64,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Allowed drift, either way, between the expected and actual start of
    /// the next session for it to count as consecutive.
    #[serde(default = "default_tolerance_minutes")]
    pub consecutive_tolerance_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpConfig {
    #[serde(default = "default_xp_base")]
    pub base: u64,
    #[serde(default = "default_xp_growth")]
    pub growth: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub require_subtasks_complete: bool,
}

/// Core configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub xp: XpConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

fn default_work_minutes() -> u64 {
    25
}
fn default_short_break_minutes() -> u64 {
    5
}
fn default_long_break_minutes() -> u64 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_tolerance_minutes() -> u64 {
    2
}
fn default_xp_base() -> u64 {
    100
}
fn default_xp_growth() -> f64 {
    1.1
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_interval: default_long_break_interval(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            consecutive_tolerance_minutes: default_tolerance_minutes(),
        }
    }
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            base: default_xp_base(),
            growth: default_xp_growth(),
        }
    }
}

impl Config {
    // ── Files ────────────────────────────────────────────────────────

    /// Default location, `<config dir>/focusquest/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| ConfigError::LoadFailed {
            path: PathBuf::from(FILE_NAME),
            message: "no user configuration directory".to_string(),
        })?;
        Ok(dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load from `path`. A missing file yields the defaults; an unreadable or
    /// invalid one is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                }
                .into())
            }
        };
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(Self::default_path()?)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::from)?)
    }

    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.break_policy()?;
        self.session_policy()?;
        self.xp_curve()?;
        if self.timer.work_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.work_minutes".to_string(),
                message: "must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }

    // ── Dotted keys ──────────────────────────────────────────────────

    /// Read a value by dotted key, e.g. `timer.work_minutes`.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match lookup(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dotted key. The new value is parsed as the type of the
    /// existing one, and the result must still validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::SerializeFailed(e.to_string()))?;
        assign(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    // ── Conversions ──────────────────────────────────────────────────

    pub fn break_policy(&self) -> Result<BreakPolicy> {
        BreakPolicy::new(
            minutes(self.timer.short_break_minutes),
            minutes(self.timer.long_break_minutes),
            self.timer.long_break_interval,
        )
    }

    pub fn session_policy(&self) -> Result<SessionPolicy> {
        SessionPolicy::new(
            self.break_policy()?,
            minutes(self.session.consecutive_tolerance_minutes),
        )
    }

    pub fn xp_curve(&self) -> Result<XpCurve> {
        XpCurve::new(self.xp.base, self.xp.growth)
    }

    pub fn task_policy(&self) -> TaskPolicy {
        TaskPolicy {
            require_subtasks_complete: self.tasks.require_subtasks_complete,
        }
    }

    /// Configured length of a timer of the given kind, in seconds.
    pub fn duration_secs(&self, kind: TimerKind) -> u64 {
        match kind {
            TimerKind::Work => minutes(self.timer.work_minutes),
            TimerKind::ShortBreak => minutes(self.timer.short_break_minutes),
            TimerKind::LongBreak => minutes(self.timer.long_break_minutes),
        }
    }
}

fn minutes(m: u64) -> u64 {
    m.saturating_mul(60)
}

fn lookup<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    if key.is_empty() {
        return None;
    }
    key.split('.').try_fold(root, |node, part| node.get(part))
}

fn assign(root: &mut serde_json::Value, key: &str, value: &str) -> Result<()> {
    let unknown = || ConfigError::UnknownKey(key.to_string());
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let (parent, leaf) = match key.rsplit_once('.') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, key),
    };
    let mut node = root;
    if let Some(parent) = parent {
        for part in parent.split('.') {
            node = node.get_mut(part).ok_or_else(unknown)?;
        }
    }
    let obj = node.as_object_mut().ok_or_else(unknown)?;
    let existing = obj.get(leaf).ok_or_else(unknown)?;

    let parsed = match existing {
        serde_json::Value::Bool(_) => value
            .parse::<bool>()
            .map(serde_json::Value::Bool)
            .map_err(|e| invalid(e.to_string()))?,
        serde_json::Value::Number(_) => {
            if let Ok(n) = value.parse::<u64>() {
                serde_json::Value::Number(n.into())
            } else {
                value
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| invalid(format!("cannot parse '{value}' as a number")))?
            }
        }
        serde_json::Value::Object(_) => return Err(unknown().into()),
        _ => serde_json::Value::String(value.to_string()),
    };
    obj.insert(leaf.to_string(), parsed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CoreError, ValidationError};

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.timer.work_minutes, 25);
        assert_eq!(cfg.timer.short_break_minutes, 5);
        assert_eq!(cfg.timer.long_break_minutes, 15);
        assert_eq!(cfg.timer.long_break_interval, 4);
        assert_eq!(cfg.session.consecutive_tolerance_minutes, 2);
        assert_eq!(cfg.xp.base, 100);
        assert!(!cfg.tasks.require_subtasks_complete);
        assert_eq!(cfg.duration_secs(TimerKind::Work), 1500);
        assert_eq!(cfg.session_policy().unwrap(), SessionPolicy::default());
        assert_eq!(cfg.xp_curve().unwrap(), XpCurve::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [timer]
            work_minutes = 50

            [tasks]
            require_subtasks_complete = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timer.work_minutes, 50);
        assert_eq!(cfg.timer.short_break_minutes, 5);
        assert!(cfg.task_policy().require_subtasks_complete);
    }

    #[test]
    fn toml_roundtrip() {
        let mut cfg = Config::default();
        cfg.xp.growth = 1.25;
        let parsed = Config::from_toml_str(&cfg.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn invalid_values_rejected() {
        let zero_break = "[timer]\nshort_break_minutes = 0\n";
        assert!(matches!(
            Config::from_toml_str(zero_break),
            Err(CoreError::Validation(ValidationError::NonPositiveDuration { .. }))
        ));
        assert!(Config::from_toml_str("[xp]\ngrowth = 1.0\n").is_err());
        let exact = Config::from_toml_str("[session]\nconsecutive_tolerance_minutes = 0\n").unwrap();
        assert_eq!(exact.session_policy().unwrap().tolerance_secs, 0);
        assert!(matches!(
            Config::from_toml_str("[timer]\nwork_minutes = \"lots\"\n"),
            Err(CoreError::Config(ConfigError::ParseFailed(_)))
        ));
    }

    #[test]
    fn get_by_dotted_key() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.work_minutes").as_deref(), Some("25"));
        assert_eq!(cfg.get("tasks.require_subtasks_complete").as_deref(), Some("false"));
        assert_eq!(cfg.get("xp.growth").as_deref(), Some("1.1"));
        assert!(cfg.get("timer").is_none());
        assert!(cfg.get("timer.missing").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_by_dotted_key() {
        let mut cfg = Config::default();
        cfg.set("timer.work_minutes", "45").unwrap();
        cfg.set("tasks.require_subtasks_complete", "true").unwrap();
        cfg.set("xp.growth", "1.5").unwrap();
        assert_eq!(cfg.timer.work_minutes, 45);
        assert!(cfg.tasks.require_subtasks_complete);
        assert_eq!(cfg.xp.growth, 1.5);
    }

    #[test]
    fn set_rejects_bad_input_and_leaves_config_untouched() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nope", "1"),
            Err(CoreError::Config(ConfigError::UnknownKey(_)))
        ));
        assert!(matches!(
            cfg.set("tasks.require_subtasks_complete", "maybe"),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(cfg.set("timer.work_minutes", "1.5").is_err());
        assert!(cfg.set("timer.work_minutes", "0").is_err());
        assert!(cfg.set("timer", "1").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.set("session.consecutive_tolerance_minutes", "3").unwrap();
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.session.consecutive_tolerance_minutes, 3);
        assert_eq!(loaded.session_policy().unwrap().tolerance_secs, 180);
    }

    #[test]
    fn load_from_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer\nwork_minutes = 25").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(CoreError::Config(ConfigError::ParseFailed(_)))
        ));
    }
}
