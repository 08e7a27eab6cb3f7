use anyhow::Result;
use std::cmp::Ordering;

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};
use crate::qualities::compare_for_upgrade;

/// Accepts a file only if it beats every existing file of the same unit.
pub struct UpgradeSpecification;

impl ImportSpecification for UpgradeSpecification {
    fn name(&self) -> &'static str {
        "Upgrade"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let Some(media) = &local.media else {
            return Ok(SpecDecision::Accept);
        };

        let existing = ctx.library.get_media_files(media.id)?;
        for file in existing.iter().filter(|f| f.unit == local.unit) {
            let ordering = compare_for_upgrade(
                (&local.quality, local.custom_format_score),
                (&file.quality, file.custom_format_score),
                ctx.settings.proper_download_policy,
            );
            if ordering != Ordering::Greater {
                return Ok(SpecDecision::reject(format!(
                    "Not an upgrade for existing file {} ({}, score {})",
                    file.relative_path, file.quality, file.custom_format_score
                )));
            }
        }
        Ok(SpecDecision::Accept)
    }
}
