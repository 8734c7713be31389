use media_sync_models::{DateChange, EntryPatch, MediaKind, PartialDate, WatchEntry, WatchStatus};
use tracing::debug;
use crate::reconcile::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// The entry only existed because of the undone watch
    Delete,
    Update(EntryPatch),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoPlan {
    pub action: UndoAction,
    /// Drop the stashed original completion date once this plan is applied
    pub clear_original_date: bool,
}

impl UndoPlan {
    fn delete() -> Self {
        Self {
            action: UndoAction::Delete,
            clear_original_date: true,
        }
    }

    fn update(patch: EntryPatch) -> Self {
        Self {
            action: UndoAction::Update(patch),
            clear_original_date: false,
        }
    }
}

/// Revert the last watch applied to `current`, using nothing but the entry itself
/// and the stashed original completion date (if any) for this media item.
///
/// Only the undo that brings a rewatch back to the first completion consumes the
/// stash; intermediate rewatch undos leave it in place.
pub fn compute_undo(current: &WatchEntry, original_completion_date: Option<PartialDate>) -> UndoPlan {
    let entry = Snapshot::from(current);

    let plan = match (entry.kind, entry.status) {
        // Nothing to reason about, deleting is the safe default
        (_, None) => UndoPlan::delete(),
        (MediaKind::Movie, Some(_)) => undo_movie(&entry, original_completion_date),
        (MediaKind::Show, Some(status)) => undo_show(&entry, status, original_completion_date),
    };

    debug!(
        entry_id = ?entry.id,
        status = ?entry.status,
        progress = entry.progress,
        repeat = entry.repeat,
        ?plan,
        "Computed undo"
    );
    plan
}

/// Undo one rewatch. Leaving the last rewatch restores the stashed first
/// completion date, if there is one.
fn undo_rewatch(
    entry: &Snapshot,
    progress: Option<u32>,
    original_completion_date: Option<PartialDate>,
) -> UndoPlan {
    let back_to_first_watch = entry.repeat == 1;
    let restored = original_completion_date.filter(|_| back_to_first_watch);
    UndoPlan {
        action: UndoAction::Update(EntryPatch {
            status: Some(if back_to_first_watch {
                WatchStatus::Completed
            } else {
                WatchStatus::Repeating
            }),
            progress,
            repeat: Some(entry.repeat - 1),
            completed_at: restored.map_or(DateChange::Keep, DateChange::Set),
        }),
        clear_original_date: restored.is_some(),
    }
}

fn undo_movie(entry: &Snapshot, original_completion_date: Option<PartialDate>) -> UndoPlan {
    if entry.repeat > 0 {
        undo_rewatch(entry, None, original_completion_date)
    } else {
        UndoPlan::delete()
    }
}

fn undo_show(
    entry: &Snapshot,
    status: WatchStatus,
    original_completion_date: Option<PartialDate>,
) -> UndoPlan {
    let progress = entry.progress;
    match status {
        // Undo the start of a rewatch
        WatchStatus::Repeating if progress == 1 && entry.repeat > 0 => undo_rewatch(
            entry,
            Some(entry.total_episodes.unwrap_or(progress)),
            original_completion_date,
        ),
        // Only a finished rewatch sets completed_at, so episode undos leave dates alone
        WatchStatus::Repeating if progress > 1 => UndoPlan::update(EntryPatch {
            progress: Some(progress - 1),
            ..EntryPatch::default()
        }),
        WatchStatus::Completed if progress > 1 => UndoPlan::update(EntryPatch {
            status: Some(WatchStatus::Current),
            progress: Some(progress - 1),
            repeat: None,
            completed_at: DateChange::Clear,
        }),
        WatchStatus::Current if progress > 1 => UndoPlan::update(EntryPatch {
            progress: Some(progress - 1),
            ..EntryPatch::default()
        }),
        _ => UndoPlan::delete(),
    }
}
