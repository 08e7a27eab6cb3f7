use anyhow::Result;
use byte_unit::Byte;
use tracing::{debug, warn};

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

const MB: u64 = 1024 * 1024;

/// Rejects a file that would leave less than the configured margin free on
/// the library volume.
pub struct FreeSpaceSpecification;

impl ImportSpecification for FreeSpaceSpecification {
    fn name(&self) -> &'static str {
        "FreeSpace"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file || ctx.settings.skip_free_space_check {
            return Ok(SpecDecision::Accept);
        }
        let Some(media) = &local.media else {
            return Ok(SpecDecision::Accept);
        };

        let available = match ctx.disk.available_space(&media.root_folder) {
            Ok(available) => available,
            Err(e) => {
                warn!(
                    "Unable to check free disk space for {:?}, assuming enough: {}",
                    media.root_folder, e
                );
                return Ok(SpecDecision::Accept);
            }
        };

        let margin = ctx.settings.minimum_free_space_mb.saturating_mul(MB);
        let required = local.size.saturating_add(margin);
        if available < required {
            debug!(
                "Not enough space for {}: {:#} available, {:#} required",
                local,
                Byte::from(available),
                Byte::from(required)
            );
            return Ok(SpecDecision::reject(format!(
                "Not enough free space: {:#} available, {:#} required",
                Byte::from(available),
                Byte::from(required)
            )));
        }
        Ok(SpecDecision::Accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;
    use crate::history::SqliteHistoryStore;
    use crate::import::disk::{DiskError, MockDiskProvider};
    use crate::import::specification::testing::local_for;
    use crate::library::{Media, SqliteLibraryStore};
    use std::path::PathBuf;

    fn evaluate(disk: &MockDiskProvider, local: &LocalMediaFile, settings: &ImportSettings) -> SpecDecision {
        let history = SqliteHistoryStore::in_memory().unwrap();
        let library = SqliteLibraryStore::in_memory().unwrap();
        let ctx = ImportContext {
            download_item: None,
            video_files: &[],
            history: &history,
            library: &library,
            disk,
            settings,
        };
        FreeSpaceSpecification.evaluate(local, &ctx).unwrap()
    }

    fn disk_with(available: u64) -> MockDiskProvider {
        let mut disk = MockDiskProvider::new();
        disk.expect_available_space()
            .withf(|p| p.to_path_buf() == PathBuf::from("/library"))
            .returning(move |_| Ok(available));
        disk
    }

    fn movie() -> Media {
        Media::new(1, "Movie", PathBuf::from("/library/Movie"))
    }

    #[test]
    fn test_rejects_when_space_short() {
        let settings = ImportSettings {
            minimum_free_space_mb: 0,
            ..Default::default()
        };
        let local = local_for("/dl/Movie.2020.mkv", 100 * MB, &movie());

        assert!(matches!(
            evaluate(&disk_with(80 * MB), &local, &settings),
            SpecDecision::Reject(_)
        ));
        assert_eq!(
            evaluate(&disk_with(1024 * MB), &local, &settings),
            SpecDecision::Accept
        );
    }

    #[test]
    fn test_margin_counts() {
        let settings = ImportSettings::default();
        let local = local_for("/dl/Movie.2020.mkv", 100 * MB, &movie());
        // 150MB free, 100MB file + 100MB margin required.
        assert!(matches!(
            evaluate(&disk_with(150 * MB), &local, &settings),
            SpecDecision::Reject(_)
        ));
    }

    #[test]
    fn test_skips_and_io_errors_accept() {
        let settings = ImportSettings::default();
        let mut local = local_for("/dl/Movie.2020.mkv", 100 * MB, &movie());

        let mut failing = MockDiskProvider::new();
        failing
            .expect_available_space()
            .returning(|p| Err(DiskError::NotFound(p.to_path_buf())));
        assert_eq!(evaluate(&failing, &local, &settings), SpecDecision::Accept);

        // Neither of these consults the disk.
        let untouched = MockDiskProvider::new();
        local.existing_file = true;
        assert_eq!(evaluate(&untouched, &local, &settings), SpecDecision::Accept);

        local.existing_file = false;
        let skip = ImportSettings {
            skip_free_space_check: true,
            ..Default::default()
        };
        assert_eq!(evaluate(&untouched, &local, &skip), SpecDecision::Accept);
    }
}
