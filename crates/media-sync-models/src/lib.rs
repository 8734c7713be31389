pub mod date;
pub mod entry;
pub mod media;
pub mod media_ids;
pub mod observation;
pub mod rating;
pub mod status;

pub use date::{InvalidDate, PartialDate, UNKNOWN_DATE};
pub use entry::{DateChange, EntryFields, EntryId, EntryPatch, WatchEntry};
pub use media::{MediaIdentity, MediaKind};
pub use media_ids::MediaIds;
pub use observation::Observation;
pub use rating::{Rating, ScoreFormat};
pub use status::WatchStatus;
