//! Well-known timer names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Namespace of every timer key. Disjoint from the sync slot prefix.
pub const TIMER_KEY_PREFIX: &str = "timer:";

/// Every timer the dispatcher knows about.
///
/// The wire name (see [`TimerName::as_str`]) is part of the store key and
/// must stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimerName {
    /// Wipe copied secrets from the clipboard.
    #[serde(rename = "clearClipboard")]
    ClearClipboard,
    /// Expire a half-finished login.
    #[serde(rename = "loginStrategySessionTimeout")]
    LoginStrategySessionTimeout,
    /// Flush collected events.
    #[serde(rename = "eventUploadsInterval")]
    EventUploads,
    /// Run the next background sync.
    #[serde(rename = "scheduleNextSyncInterval")]
    ScheduleNextSync,
    /// Abort a pending passkey request.
    #[serde(rename = "fido2ClientAbortTimeout")]
    Fido2ClientAbortTimeout,
    /// Reconnect the notifications channel.
    #[serde(rename = "notificationsReconnectTimeout")]
    NotificationsReconnectTimeout,
    /// Refresh the phishing domain list.
    #[serde(rename = "phishingDomainUpdate")]
    PhishingDomainUpdate,
}

impl TimerName {
    /// All timers, in dispatch order.
    pub const ALL: [TimerName; 7] = [
        Self::ClearClipboard,
        Self::LoginStrategySessionTimeout,
        Self::EventUploads,
        Self::ScheduleNextSync,
        Self::Fido2ClientAbortTimeout,
        Self::NotificationsReconnectTimeout,
        Self::PhishingDomainUpdate,
    ];

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearClipboard => "clearClipboard",
            Self::LoginStrategySessionTimeout => "loginStrategySessionTimeout",
            Self::EventUploads => "eventUploadsInterval",
            Self::ScheduleNextSync => "scheduleNextSyncInterval",
            Self::Fido2ClientAbortTimeout => "fido2ClientAbortTimeout",
            Self::NotificationsReconnectTimeout => "notificationsReconnectTimeout",
            Self::PhishingDomainUpdate => "phishingDomainUpdate",
        }
    }

    /// Store key holding this timer's fire time.
    pub fn store_key(self) -> String {
        format!("{TIMER_KEY_PREFIX}{}", self.as_str())
    }
}

impl fmt::Display for TimerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerName {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| SyncError::Configuration(format!("unknown timer name '{s}'")))
    }
}
