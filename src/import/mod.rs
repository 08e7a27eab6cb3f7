//! Import of finished downloads into the library.
//!
//! [`ImportDecisionMaker`] turns candidate files into approve/reject
//! decisions by running every [`ImportSpecification`]; [`ImportExecutor`]
//! puts approved files in place. [`DownloadedMediaImportService`] drives
//! both for one download folder or file.

mod aggregation;
pub mod decision_maker;
pub mod disk;
pub mod downloaded;
pub mod executor;
pub mod media_info;
pub mod models;
pub mod sample;
pub mod specification;
pub mod specifications;

pub use decision_maker::{match_media, ImportDecisionMaker, ImportRequest};
pub use disk::{DiskError, DiskProvider, LocalDiskProvider};
pub use downloaded::DownloadedMediaImportService;
pub use executor::ImportExecutor;
pub use media_info::{
    ffprobe_available, FfprobeMediaInfoReader, MediaInfoError, MediaInfoReader, NoMediaInfoReader,
};
pub use models::{
    ImportDecision, ImportRejection, ImportResult, ImportResultType, LocalMediaFile,
};
pub use specification::{default_specifications, ImportContext, ImportSpecification, SpecDecision};
