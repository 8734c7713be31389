use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Identifiers of one media item across services
///
/// Content scripts usually resolve one or two of these from the page; the rest are
/// filled in by lookups. Each tracking service is addressed with its own id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anilist_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simkl_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trakt_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imdb_id: Option<String>,
    /// Service-agnostic slug (e.g. `the-matrix-1999`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl MediaIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anilist(id: u64) -> Self {
        Self {
            anilist_id: Some(id),
            ..Self::default()
        }
    }

    pub fn trakt(id: u64) -> Self {
        Self {
            trakt_id: Some(id),
            ..Self::default()
        }
    }

    pub fn simkl(id: u64) -> Self {
        Self {
            simkl_id: Some(id),
            ..Self::default()
        }
    }

    /// Merge IDs from another lookup, only filling in missing values.
    pub fn merge(&mut self, other: &MediaIds) {
        if self.anilist_id.is_none() {
            self.anilist_id = other.anilist_id;
        }
        if self.mal_id.is_none() {
            self.mal_id = other.mal_id;
        }
        if self.simkl_id.is_none() {
            self.simkl_id = other.simkl_id;
        }
        if self.trakt_id.is_none() {
            self.trakt_id = other.trakt_id;
        }
        if self.tmdb_id.is_none() {
            self.tmdb_id = other.tmdb_id;
        }
        if self.imdb_id.is_none() {
            self.imdb_id = other.imdb_id.clone();
        }
        if self.slug.is_none() {
            self.slug = other.slug.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.anilist_id.is_none()
            && self.mal_id.is_none()
            && self.simkl_id.is_none()
            && self.trakt_id.is_none()
            && self.tmdb_id.is_none()
            && self.imdb_id.is_none()
            && self.slug.is_none()
    }

    /// The id a given service addresses this item by.
    ///
    /// Unlike [`MediaIds::get_any_id`] this never falls back to another service's id:
    /// writing to AniList with a Trakt id would hit the wrong entry.
    /// `local` accepts any id since the local list is keyed by whatever the caller has.
    ///
    /// # Arguments
    /// * `service` - The service name (e.g., "anilist", "simkl", "trakt", "local")
    pub fn id_for_service(&self, service: &str) -> Option<String> {
        match service.to_lowercase().as_str() {
            "anilist" => self.anilist_id.map(|id| id.to_string()),
            "mal" | "myanimelist" => self.mal_id.map(|id| id.to_string()),
            "simkl" => self.simkl_id.map(|id| id.to_string()),
            "trakt" => self.trakt_id.map(|id| id.to_string()),
            "tmdb" => self.tmdb_id.map(|id| id.to_string()),
            "imdb" => self.imdb_id.clone(),
            _ => self.get_any_id(),
        }
    }

    /// Any available ID, prefixed with its source, preferring AniList.
    pub fn get_any_id(&self) -> Option<String> {
        self.anilist_id.map(|id| format!("anilist:{}", id))
            .or_else(|| self.mal_id.map(|id| format!("mal:{}", id)))
            .or_else(|| self.simkl_id.map(|id| format!("simkl:{}", id)))
            .or_else(|| self.trakt_id.map(|id| format!("trakt:{}", id)))
            .or_else(|| self.tmdb_id.map(|id| format!("tmdb:{}", id)))
            .or_else(|| self.imdb_id.clone())
            .or_else(|| self.slug.clone())
    }

    pub fn has_id(&self, id_type: &str) -> bool {
        match id_type.to_lowercase().as_str() {
            "anilist" => self.anilist_id.is_some(),
            "mal" | "myanimelist" => self.mal_id.is_some(),
            "simkl" => self.simkl_id.is_some(),
            "trakt" => self.trakt_id.is_some(),
            "tmdb" => self.tmdb_id.is_some(),
            "imdb" => self.imdb_id.is_some(),
            "slug" => self.slug.is_some(),
            _ => false,
        }
    }
}

impl Hash for MediaIds {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.anilist_id.hash(state);
        self.mal_id.hash(state);
        self.simkl_id.hash(state);
        self.trakt_id.hash(state);
        self.tmdb_id.hash(state);
        self.imdb_id.hash(state);
        self.slug.hash(state);
    }
}
