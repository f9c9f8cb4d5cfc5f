//! v1 cross-boundary contracts for the Misfortune core, table host, and connected clients.

pub mod roll;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use roll::{RollOptions, RollTestEvent, RollTestKind};

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const MODULE_ID: &str = "wfrp4e-misfortune";
pub const SOCKET_NAME: &str = "module.wfrp4e-misfortune";
pub const LOG_CAPACITY: usize = 50;
pub const DEFAULT_TRIGGER_VALUE: i64 = 88;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Player,
    Trusted,
    AssistantGm,
    Gamemaster,
}

impl UserRole {
    /// GM and assistant GM both count as privileged.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::AssistantGm | Self::Gamemaster)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerConfig {
    pub trigger_value: i64,
    pub show_players: bool,
    pub chat_flavor: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_value: DEFAULT_TRIGGER_VALUE,
            show_players: true,
            chat_flavor: true,
        }
    }
}

impl TriggerConfig {
    pub fn apply(&mut self, patch: &TriggerConfigPatch) {
        if let Some(trigger_value) = patch.trigger_value {
            self.trigger_value = trigger_value;
        }
        if let Some(show_players) = patch.show_players {
            self.show_players = show_players;
        }
        if let Some(chat_flavor) = patch.chat_flavor {
            self.chat_flavor = chat_flavor;
        }
    }
}

impl fmt::Display for TriggerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trigger_value={} show_players={} chat_flavor={}",
            self.trigger_value, self.show_players, self.chat_flavor
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerConfigPatch {
    pub trigger_value: Option<i64>,
    pub show_players: Option<bool>,
    pub chat_flavor: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    Earned,
    Spent,
}

/// One mutation of the pool. Entries are never edited once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogEntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<i64>,
    pub pool: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn earned(player: Option<String>, roll: Option<i64>, pool: u64) -> Self {
        Self {
            kind: LogEntryKind::Earned,
            player,
            roll,
            pool,
            timestamp: Utc::now(),
        }
    }

    pub fn spent(pool: u64) -> Self {
        Self {
            kind: LogEntryKind::Spent,
            player: None,
            roll: None,
            pool,
            timestamp: Utc::now(),
        }
    }
}

/// The only message shape carried on the module's broadcast channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action")]
pub enum ReplicationMessage {
    #[serde(rename = "updateTracker")]
    UpdateTracker {
        #[serde(rename = "poolValue", alias = "pool")]
        pool_value: u64,
    },
}

impl ReplicationMessage {
    pub fn update_tracker(pool_value: u64) -> Self {
        Self::UpdateTracker { pool_value }
    }

    pub fn pool_value(&self) -> u64 {
        match self {
            Self::UpdateTracker { pool_value } => *pool_value,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatCardVariant {
    Earned,
    Spent,
    Reset,
    Status,
    Help,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatAudience {
    Public,
    Privileged,
    PrivilegedAndUser { user_id: String },
    User { user_id: String },
}

impl ChatAudience {
    pub fn includes(&self, user_id: &str, role: UserRole) -> bool {
        match self {
            Self::Public => true,
            Self::Privileged => role.is_privileged(),
            Self::PrivilegedAndUser { user_id: target } => {
                role.is_privileged() || target == user_id
            }
            Self::User { user_id: target } => target == user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatCard {
    pub variant: ChatCardVariant,
    pub speaker_alias: String,
    pub icon: Option<String>,
    pub title: Option<String>,
    pub lines: Vec<String>,
    pub audience: ChatAudience,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warn,
}

/// Transient user-facing notification. `recipient == None` means the local client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub recipient: Option<String>,
}

impl Notice {
    pub fn info(message: impl Into<String>, recipient: Option<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            recipient,
        }
    }

    pub fn warn(message: impl Into<String>, recipient: Option<String>) -> Self {
        Self {
            level: NoticeLevel::Warn,
            message: message.into(),
            recipient,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackerControl {
    Spend,
    Add,
    Reset,
}

impl TrackerControl {
    pub const ALL: [TrackerControl; 3] = [Self::Spend, Self::Add, Self::Reset];

    pub fn label(self) -> &'static str {
        match self {
            Self::Spend => "☠ Spend",
            Self::Add => "+",
            Self::Reset => "↺",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "spend" => Some(Self::Spend),
            "add" => Some(Self::Add),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisplayCue {
    PulseUp,
    PulseDown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerRender {
    pub symbol: String,
    pub title: String,
    pub count: u64,
    pub controls: Vec<TrackerControl>,
}

impl fmt::Display for TrackerRender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.symbol, self.title, self.count)?;
        if !self.controls.is_empty() {
            let labels: Vec<&str> = self.controls.iter().map(|control| control.label()).collect();
            write!(f, "  [{}]", labels.join("] ["))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogViewEntry {
    #[serde(flatten)]
    pub entry: LogEntry,
    pub formatted_time: String,
    pub is_earned: bool,
    pub is_spent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectedUser {
    pub user_id: String,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub owned_actors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UserNotFound,
    Unauthorized,
    InsufficientBalance,
    InvalidRequest,
    ConfirmationRequired,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}
