use serde::{Deserialize, Serialize};
use std::fmt;

/// List status as reported by the remote list service.
///
/// The reconciliation engine only ever writes `Current`, `Completed` and
/// `Repeating`; the other values can be set by the user on the service itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchStatus {
    /// Watching, first watch-through
    Current,
    /// Finished the current watch-through
    Completed,
    /// Rewatching a previously completed item
    Repeating,
    /// On the plan-to-watch list
    Planning,
    /// On hold
    Paused,
    /// Stopped watching
    Dropped,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::Current => "CURRENT",
            WatchStatus::Completed => "COMPLETED",
            WatchStatus::Repeating => "REPEATING",
            WatchStatus::Planning => "PLANNING",
            WatchStatus::Paused => "PAUSED",
            WatchStatus::Dropped => "DROPPED",
        }
    }

    /// Statuses the item has never been finished in (for the current watch-through)
    pub fn is_unfinished(&self) -> bool {
        matches!(
            self,
            WatchStatus::Current | WatchStatus::Planning | WatchStatus::Paused | WatchStatus::Dropped
        )
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
