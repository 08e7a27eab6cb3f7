//! The individual import specifications.

mod already_imported;
mod free_space;
mod grabbed_release_quality;
mod has_audio_track;
mod matches_folder;
mod matches_grab;
mod not_multi_part;
mod not_sample;
mod not_unpacking;
mod same_file;
mod upgrade;

pub use already_imported::AlreadyImportedSpecification;
pub use free_space::FreeSpaceSpecification;
pub use grabbed_release_quality::GrabbedReleaseQualitySpecification;
pub use has_audio_track::HasAudioTrackSpecification;
pub use matches_folder::MatchesFolderSpecification;
pub use matches_grab::MatchesGrabSpecification;
pub use not_multi_part::NotMultiPartSpecification;
pub use not_sample::NotSampleSpecification;
pub use not_unpacking::NotUnpackingSpecification;
pub use same_file::SameFileSpecification;
pub use upgrade::UpgradeSpecification;
