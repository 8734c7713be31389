use serde::{Deserialize, Serialize};
use std::fmt;
use crate::media_ids::MediaIds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the content script identified on the page: the media item plus the
/// season being played, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaIdentity {
    pub kind: MediaKind,
    pub ids: MediaIds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
}

impl MediaIdentity {
    pub fn new(kind: MediaKind, ids: MediaIds) -> Self {
        Self {
            kind,
            ids,
            title: None,
            year: None,
            season: None,
        }
    }

    pub fn movie(ids: MediaIds) -> Self {
        Self::new(MediaKind::Movie, ids)
    }

    pub fn show(ids: MediaIds) -> Self {
        Self::new(MediaKind::Show, ids)
    }

    pub fn with_title(mut self, title: impl Into<String>, year: Option<u32>) -> Self {
        self.title = Some(title.into());
        self.year = year;
        self
    }

    pub fn with_season(mut self, season: u32) -> Self {
        self.season = Some(season);
        self
    }

    /// Human label for logs, e.g. `show "Frieren" (2023)`.
    pub fn label(&self) -> String {
        match (&self.title, self.year) {
            (Some(title), Some(year)) => format!("{} \"{}\" ({})", self.kind, title, year),
            (Some(title), None) => format!("{} \"{}\"", self.kind, title),
            _ => format!(
                "{} {}",
                self.kind,
                self.ids.get_any_id().unwrap_or_else(|| "<no id>".to_string())
            ),
        }
    }
}
