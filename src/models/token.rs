use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token lifecycle state as the server encodes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TokenStatus {
    Enabled,
    Disabled,
    Expired,
    Exhausted,
    Other(i64),
}

impl From<i64> for TokenStatus {
    fn from(code: i64) -> Self {
        match code {
            1 => TokenStatus::Enabled,
            2 => TokenStatus::Disabled,
            3 => TokenStatus::Expired,
            4 => TokenStatus::Exhausted,
            n => TokenStatus::Other(n),
        }
    }
}

impl From<TokenStatus> for i64 {
    fn from(status: TokenStatus) -> Self {
        match status {
            TokenStatus::Enabled => 1,
            TokenStatus::Disabled => 2,
            TokenStatus::Expired => 3,
            TokenStatus::Exhausted => 4,
            TokenStatus::Other(n) => n,
        }
    }
}

impl TokenStatus {
    pub fn label(self) -> &'static str {
        match self {
            TokenStatus::Enabled => "enabled",
            TokenStatus::Disabled => "disabled",
            TokenStatus::Expired => "expired",
            TokenStatus::Exhausted => "exhausted",
            TokenStatus::Other(_) => "unknown",
        }
    }
}

impl std::str::FromStr for TokenStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enabled" | "enable" | "on" | "1" => Ok(TokenStatus::Enabled),
            "disabled" | "disable" | "off" | "2" => Ok(TokenStatus::Disabled),
            other => Err(format!("unsupported token status '{}'", other)),
        }
    }
}

/// Per-token settings blob. Only the fields the console reads are modelled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_tag: Option<String>,
}

/// A token row as returned by the list endpoints. Server-owned; the console
/// only ever replaces these wholesale or patches `status` after a toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub group: String,
    pub status: TokenStatus,
    #[serde(default)]
    pub used_quota: i64,
    #[serde(default)]
    pub remain_quota: i64,
    #[serde(default)]
    pub unlimited_quota: bool,
    /// Unix seconds.
    #[serde(default)]
    pub created_time: i64,
    /// Unix seconds, `-1` for never.
    #[serde(default = "never_expires")]
    pub expired_time: i64,
    #[serde(default)]
    pub setting: TokenSetting,
}

fn never_expires() -> i64 {
    -1
}

impl Token {
    pub fn billing_tag(&self) -> Option<&str> {
        self.setting
            .billing_tag
            .as_deref()
            .filter(|tag| !tag.is_empty())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_time, 0)
    }

    /// `None` when the token never expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.expired_time < 0 {
            return None;
        }
        DateTime::from_timestamp(self.expired_time, 0)
    }

    pub fn remaining_label(&self) -> String {
        if self.unlimited_quota {
            "unlimited".to_string()
        } else {
            self.remain_quota.to_string()
        }
    }
}
