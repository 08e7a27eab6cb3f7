//! Media entities and the files linked to them.

mod models;
mod schema;
mod store;

pub use models::{Media, MediaFile, MediaInfo};
pub use store::{LibraryStore, SqliteLibraryStore};
