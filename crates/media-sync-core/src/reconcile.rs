use media_sync_models::{EntryFields, EntryId, MediaKind, Observation, PartialDate, WatchEntry, WatchStatus};
use thiserror::Error;
use tracing::debug;

/// The observation does not carry what reconciliation needs. Callers must not
/// retry with the same input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObservationError {
    #[error("show observation has no episode number")]
    MissingEpisode,
    #[error("episode numbers start at 1")]
    EpisodeZero,
    #[error("observed a {observed} but the list entry is a {existing}")]
    KindMismatch {
        observed: MediaKind,
        existing: MediaKind,
    },
}

/// Outcome of reconciling one observation against the remote entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Redundant or backward view: do not touch the remote entry.
    Ignore(Option<EntryId>),
    Upsert(Upsert),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    /// Absolute target state for the reconciled fields
    pub fields: EntryFields,
    /// Set when a rewatch starts over a first completion: the date being
    /// overwritten, to be stashed for undo.
    pub original_completion_date: Option<PartialDate>,
}

impl Decision {
    pub fn is_ignore(&self) -> bool {
        matches!(self, Decision::Ignore(_))
    }

    pub fn fields(&self) -> Option<&EntryFields> {
        match self {
            Decision::Ignore(_) => None,
            Decision::Upsert(upsert) => Some(&upsert.fields),
        }
    }
}

/// The existing entry with absent counters read as zero.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) id: Option<EntryId>,
    pub(crate) kind: MediaKind,
    pub(crate) status: Option<WatchStatus>,
    pub(crate) progress: u32,
    pub(crate) repeat: u32,
    pub(crate) started_at: Option<PartialDate>,
    pub(crate) completed_at: Option<PartialDate>,
    pub(crate) total_episodes: Option<u32>,
}

impl From<&WatchEntry> for Snapshot {
    fn from(entry: &WatchEntry) -> Self {
        Self {
            id: entry.id.clone(),
            kind: entry.media_kind,
            status: entry.status,
            progress: entry.progress.unwrap_or(0),
            repeat: entry.repeat.unwrap_or(0),
            started_at: entry.started_at,
            completed_at: entry.completed_at,
            total_episodes: entry.total_episodes,
        }
    }
}

impl Snapshot {
    /// A listed movie that was never finished: planned, abandoned, or added
    /// without a status (e.g. only rated).
    fn is_unwatched_movie(&self) -> bool {
        match self.status {
            Some(status) => status.is_unfinished(),
            None => self.repeat == 0 && self.completed_at.is_none(),
        }
    }

    /// The completion date to stash before a rewatch overwrites it. Only the first
    /// rewatch stashes, so an already stored original is never replaced.
    fn stash_for_rewatch(&self) -> Option<PartialDate> {
        if self.repeat == 0 {
            self.completed_at
        } else {
            None
        }
    }
}

/// Decide the next remote state for a "watched" observation.
///
/// `existing` must be the entry as the service reports it right now; `now` is the
/// date recorded for starts and completions.
pub fn reconcile(
    existing: Option<&WatchEntry>,
    observation: &Observation,
    now: PartialDate,
) -> Result<Decision, ObservationError> {
    let existing = existing.map(Snapshot::from);
    if let Some(entry) = &existing {
        if entry.kind != observation.kind() {
            return Err(ObservationError::KindMismatch {
                observed: observation.kind(),
                existing: entry.kind,
            });
        }
    }

    let decision = match *observation {
        Observation::Movie => reconcile_movie(existing, now),
        Observation::Show {
            episode,
            total_episodes,
        } => {
            let episode = episode.ok_or(ObservationError::MissingEpisode)?;
            if episode == 0 {
                return Err(ObservationError::EpisodeZero);
            }
            reconcile_show(existing, episode, total_episodes, now)
        }
    };

    debug!(?observation, ?decision, "Reconciled observation");
    Ok(decision)
}

fn reconcile_movie(existing: Option<Snapshot>, now: PartialDate) -> Decision {
    let Some(existing) = existing else {
        return Decision::Upsert(Upsert {
            fields: EntryFields {
                status: WatchStatus::Completed,
                progress: 1,
                repeat: 0,
                started_at: Some(now),
                completed_at: Some(now),
            },
            original_completion_date: None,
        });
    };

    if existing.is_unwatched_movie() {
        return Decision::Upsert(Upsert {
            fields: EntryFields {
                status: WatchStatus::Completed,
                progress: 1,
                repeat: existing.repeat,
                started_at: existing.started_at.or(Some(now)),
                completed_at: Some(now),
            },
            original_completion_date: None,
        });
    }

    Decision::Upsert(Upsert {
        fields: EntryFields {
            status: WatchStatus::Repeating,
            progress: 1,
            repeat: existing.repeat.saturating_add(1),
            started_at: existing.started_at,
            completed_at: Some(now),
        },
        original_completion_date: existing.stash_for_rewatch(),
    })
}

fn reconcile_show(
    existing: Option<Snapshot>,
    episode: u32,
    observed_total: Option<u32>,
    now: PartialDate,
) -> Decision {
    let total_episodes = observed_total.or(existing.as_ref().and_then(|e| e.total_episodes));
    // Never claim completion without knowing the episode count
    let is_completed = total_episodes.is_some_and(|total| episode >= total);

    let Some(existing) = existing else {
        return Decision::Upsert(Upsert {
            fields: EntryFields {
                status: if is_completed {
                    WatchStatus::Completed
                } else {
                    WatchStatus::Current
                },
                progress: episode,
                repeat: 0,
                started_at: Some(now),
                completed_at: is_completed.then_some(now),
            },
            original_completion_date: None,
        });
    };

    let status = existing.status;
    // Episode 1 of a finished show starts a new watch-through, even though it is
    // behind the recorded progress
    let starts_rewatch = status == Some(WatchStatus::Completed) && episode == 1;
    if !starts_rewatch && status != Some(WatchStatus::Repeating) && episode < existing.progress {
        return Decision::Ignore(existing.id);
    }

    match status {
        _ if starts_rewatch => Decision::Upsert(Upsert {
            fields: EntryFields {
                status: WatchStatus::Repeating,
                progress: 1,
                repeat: existing.repeat.saturating_add(1),
                started_at: existing.started_at,
                completed_at: None,
            },
            original_completion_date: existing.stash_for_rewatch(),
        }),
        // REPEATING stays until a new rewatch starts, even on the final episode.
        // Re-observing the current episode rewrites the same state.
        Some(WatchStatus::Repeating) => {
            if episode < existing.progress {
                return Decision::Ignore(existing.id);
            }
            Decision::Upsert(Upsert {
                fields: EntryFields {
                    status: WatchStatus::Repeating,
                    progress: episode,
                    repeat: existing.repeat,
                    started_at: existing.started_at,
                    completed_at: if is_completed {
                        Some(now)
                    } else {
                        existing.completed_at
                    },
                },
                original_completion_date: None,
            })
        }
        _ => {
            if episode <= existing.progress {
                return Decision::Ignore(existing.id);
            }
            let was_completed = status == Some(WatchStatus::Completed);
            Decision::Upsert(Upsert {
                fields: EntryFields {
                    status: if is_completed {
                        WatchStatus::Completed
                    } else {
                        WatchStatus::Current
                    },
                    progress: episode,
                    repeat: existing.repeat,
                    started_at: existing.started_at.or(Some(now)),
                    completed_at: if is_completed && !was_completed {
                        Some(now)
                    } else {
                        existing.completed_at
                    },
                },
                original_completion_date: None,
            })
        }
    }
}
