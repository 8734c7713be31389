pub mod dedup;
pub mod original_dates;
pub mod reconcile;
pub mod scrobble;
pub mod undo;

pub use dedup::{OperationGuard, OperationKey, OperationKind, Outcome, RetryPolicy};
pub use original_dates::{store_key, FileOriginalDateStore, MemoryOriginalDateStore, OriginalDateStore, StoreError};
pub use reconcile::{reconcile, Decision, ObservationError, Upsert};
pub use scrobble::{ScrobbleContext, ScrobbleError, ScrobbleOutcome};
pub use undo::{compute_undo, UndoAction, UndoPlan};
