//! Core error types for focusquest-core.
//!
//! Timer commands never fail: calls from an illegal state are no-ops. Everything
//! else (sessions, tasks, quests, rewards, configuration) reports failures through
//! the hierarchy below.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusquest-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid caller-supplied arguments
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation not permitted in the current state
    #[error("Illegal state: {0}")]
    State(#[from] StateError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A timer was built outside of a tokio runtime
    #[error("No tokio runtime available to drive the timer clock")]
    NoRuntime,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid argument errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A session was requested without a task
    #[error("Task id must not be empty")]
    EmptyTaskId,

    /// Any other entity created with an empty identifier
    #[error("{entity} id must not be empty")]
    EmptyId { entity: &'static str },

    /// XP can only be added, never removed
    #[error("XP amount must not be negative (got {amount})")]
    NegativeAmount { amount: i64 },

    /// Durations and intervals must be strictly positive
    #[error("Duration '{field}' must be positive")]
    NonPositiveDuration { field: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Operations attempted from a state that does not allow them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("No focus session is active")]
    NoActiveSession,

    #[error("A focus session for task '{task_id}' is already active")]
    SessionAlreadyActive { task_id: String },

    #[error("The current focus session is already paused")]
    SessionAlreadyPaused,

    #[error("The current focus session is not paused")]
    SessionNotPaused,

    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Task '{0}' already exists")]
    DuplicateTask(String),

    #[error("Unknown quest '{0}'")]
    UnknownQuest(String),

    #[error("Quest '{0}' already exists")]
    DuplicateQuest(String),

    #[error("Unknown achievement '{0}'")]
    UnknownAchievement(String),

    /// A task may only ever hang under one parent
    #[error("Task '{child}' is already a subtask of '{parent}'")]
    AlreadyHasParent { child: String, parent: String },

    #[error("Adding '{child}' under '{parent}' would create a cycle")]
    CycleDetected { parent: String, child: String },

    #[error("Task '{task_id}' still has {remaining} incomplete subtask(s)")]
    IncompleteSubtasks { task_id: String, remaining: usize },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Failed to render configuration
    #[error("Failed to serialize configuration: {0}")]
    SerializeFailed(String),

    /// Unknown dotted key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SerializeFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
