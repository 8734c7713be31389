pub mod error;
pub mod local;
pub mod traits;

pub use error::SourceError;
pub use local::LocalListService;
pub use traits::ListService;
