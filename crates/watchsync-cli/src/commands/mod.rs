pub mod clear;
pub mod config;
pub mod rate;
pub mod show;
pub mod undo;
pub mod watch;

use crate::output::Output;
use clap::{Args, ValueEnum};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use media_sync_config::{Config, PathManager, ServiceConfig};
use media_sync_core::{FileOriginalDateStore, RetryPolicy, ScrobbleContext, ScrobbleOutcome};
use media_sync_models::{MediaIdentity, MediaIds, MediaKind};
use media_sync_sources::LocalListService;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Movie,
    Show,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Movie => MediaKind::Movie,
            KindArg::Show => MediaKind::Show,
        }
    }
}

/// The media item a command acts on
#[derive(Args, Debug, Clone)]
pub struct MediaArgs {
    /// Movie or show
    #[arg(value_enum)]
    pub kind: KindArg,

    /// AniList media id
    #[arg(long)]
    pub anilist: Option<u64>,

    /// MyAnimeList id
    #[arg(long)]
    pub mal: Option<u64>,

    /// Simkl id
    #[arg(long)]
    pub simkl: Option<u64>,

    /// Trakt id
    #[arg(long)]
    pub trakt: Option<u64>,

    /// TMDB id
    #[arg(long)]
    pub tmdb: Option<u32>,

    /// IMDB id (tt...)
    #[arg(long)]
    pub imdb: Option<String>,

    /// Title, for readable logs
    #[arg(long)]
    pub title: Option<String>,

    /// Release year
    #[arg(long, requires = "title")]
    pub year: Option<u32>,

    /// Season being watched
    #[arg(long)]
    pub season: Option<u32>,
}

impl MediaArgs {
    pub fn identity(&self) -> Result<MediaIdentity> {
        let ids = MediaIds {
            anilist_id: self.anilist,
            mal_id: self.mal,
            simkl_id: self.simkl,
            trakt_id: self.trakt,
            tmdb_id: self.tmdb,
            imdb_id: self.imdb.clone(),
            slug: None,
        };
        if ids.is_empty() {
            return Err(eyre!(
                "No id given. Use at least one of --anilist, --mal, --simkl, --trakt, --tmdb or --imdb"
            ));
        }

        let mut identity = MediaIdentity::new(self.kind.into(), ids);
        if let Some(title) = &self.title {
            identity = identity.with_title(title.clone(), self.year);
        }
        if let Some(season) = self.season {
            identity = identity.with_season(season);
        }
        Ok(identity)
    }
}

/// The named service, or the first enabled one (the primary).
pub fn select_service<'a>(config: &'a Config, name: Option<&str>) -> Result<&'a ServiceConfig> {
    match name {
        Some(name) => config
            .find_service(name)
            .ok_or_else(|| eyre!("Service '{}' is not configured or not enabled", name)),
        None => config
            .enabled_services()
            .into_iter()
            .next()
            .ok_or_else(|| eyre!("No service is enabled. Run 'watchsync config init' to create a configuration")),
    }
}

/// Build the scrobble context for one service: its local list, the shared
/// original-date store and the configured retry policy.
pub fn open_context(config: &Config, paths: &PathManager, service: Option<&str>) -> Result<ScrobbleContext> {
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration: {}", e))?;
    let service = select_service(config, service)?;

    let list_file = paths.local_list_file(&service.name);
    let list = LocalListService::open(&service.name, &list_file)
        .map_err(|e| eyre!("Failed to open list at {}: {}", list_file.display(), e))?
        .with_score_format(service.score_format);

    let dates_file = paths.original_dates_file();
    let store = FileOriginalDateStore::open(&dates_file)
        .map_err(|e| eyre!("Failed to open {}: {}", dates_file.display(), e))?;

    Ok(ScrobbleContext::new(
        Arc::new(list),
        Arc::new(store),
        RetryPolicy::from(&config.retry),
    ))
}

pub fn report_outcome(output: &Output, action: &str, media: &MediaIdentity, outcome: &ScrobbleOutcome) {
    let label = media.label();
    let (human, status, entry_id) = match outcome {
        ScrobbleOutcome::Written(id) => (format!("Updated {} (entry {})", label, id), "written", Some(id)),
        ScrobbleOutcome::Deleted => (format!("Removed {} from the list", label), "deleted", None),
        ScrobbleOutcome::Ignored(id) => (
            format!("Nothing to change for {}, the list is already ahead", label),
            "ignored",
            id.as_ref(),
        ),
        ScrobbleOutcome::AlreadyApplied => (
            format!("{} was already up to date on the service", label),
            "already_applied",
            None,
        ),
        ScrobbleOutcome::Missing => (format!("{} is not on the list, nothing to undo", label), "missing", None),
    };

    output.result(
        human,
        json!({
            "action": action,
            "outcome": status,
            "entry_id": entry_id,
            "media": media,
        }),
    );
}
