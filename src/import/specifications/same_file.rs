use anyhow::Result;

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

/// Rejects a file the same size as the file already linked for its unit.
pub struct SameFileSpecification;

impl ImportSpecification for SameFileSpecification {
    fn name(&self) -> &'static str {
        "SameFile"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        let Some(media) = &local.media else {
            return Ok(SpecDecision::Accept);
        };

        let existing = ctx.library.get_media_files(media.id)?;
        let same = existing.iter().find(|f| {
            f.unit == local.unit
                && f.size == local.size
                // A re-scan of the linked file itself is not a re-import.
                && f.full_path(media) != local.path
        });
        match same {
            Some(file) => Ok(SpecDecision::reject(format!(
                "Has same filesize as existing file {}",
                file.relative_path
            ))),
            None => Ok(SpecDecision::Accept),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::specification::testing::{local_for, Harness};
    use crate::library::{LibraryStore, MediaFile};
    use crate::qualities::QualityModel;
    use chrono::Utc;

    #[test]
    fn test_same_size_rejected() {
        let harness = Harness::new();
        let media = harness.add_media("Movie");
        harness
            .library
            .add_media_file(&MediaFile {
                id: 0,
                media_id: media.id,
                relative_path: "Movie.2020.mkv".to_string(),
                size: 4242,
                quality: QualityModel::default(),
                media_info: None,
                release_group: None,
                scene_name: None,
                custom_format_score: 0,
                unit: None,
                date_added: Utc::now(),
            })
            .unwrap();

        let spec = SameFileSpecification;
        let local = local_for("/dl/Movie.2020.mkv", 4242, &media);
        assert!(matches!(
            spec.evaluate(&local, &harness.ctx()).unwrap(),
            SpecDecision::Reject(_)
        ));

        let local = local_for("/dl/Movie.2020.mkv", 4243, &media);
        assert_eq!(spec.evaluate(&local, &harness.ctx()).unwrap(), SpecDecision::Accept);

        let linked = local_for("/library/Movie/Movie.2020.mkv", 4242, &media);
        assert_eq!(spec.evaluate(&linked, &harness.ctx()).unwrap(), SpecDecision::Accept);
    }
}
