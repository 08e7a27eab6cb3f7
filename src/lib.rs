//! Pezzottify acquisition server library
//!
//! Release dispatch, download tracking and import of finished downloads
//! into the media library. Exposed as a library for the binary and for
//! integration tests.

pub mod app;
pub mod config;
pub mod download;
pub mod events;
pub mod history;
pub mod import;
pub mod library;
pub mod parser;
pub mod qualities;
pub mod redownload;
pub mod sqlite_persistence;

pub use app::Acquisition;
pub use config::{AppConfig, CliConfig, FileConfig};
pub use events::{DomainEvent, EventBus, EventHandler};
pub use redownload::{ChannelSearchQueue, SearchCommand, SearchQueue};
