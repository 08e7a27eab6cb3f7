//! Append-only history of grabbed, imported and failed downloads.

mod models;
mod recorder;
mod schema;
mod store;

pub use models::{data_keys, HistoryEvent, HistoryEventType};
pub use recorder::HistoryRecorder;
pub use store::{HistoryStore, SqliteHistoryStore};
