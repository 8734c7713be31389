use serde::{Deserialize, Serialize};
use crate::media::MediaKind;

/// A "watched" signal from the page.
///
/// A movie observation is always a completed watch. A show observation carries the
/// episode that just finished and, if the page or a lookup knows it, the episode count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Observation {
    Movie,
    Show {
        #[serde(default)]
        episode: Option<u32>,
        #[serde(default)]
        total_episodes: Option<u32>,
    },
}

impl Observation {
    pub fn episode(episode: u32, total_episodes: Option<u32>) -> Self {
        Observation::Show {
            episode: Some(episode),
            total_episodes,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Observation::Movie => MediaKind::Movie,
            Observation::Show { .. } => MediaKind::Show,
        }
    }
}
