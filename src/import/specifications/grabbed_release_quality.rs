use anyhow::Result;
use tracing::debug;

use crate::history::HistoryEventType;
use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};
use crate::qualities::Quality;

/// Rejects a file whose quality disagrees with what was grabbed for the job.
pub struct GrabbedReleaseQualitySpecification;

impl ImportSpecification for GrabbedReleaseQualitySpecification {
    fn name(&self) -> &'static str {
        "GrabbedReleaseQuality"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let Some(item) = ctx.download_item else {
            return Ok(SpecDecision::Accept);
        };

        let grabs = ctx
            .history
            .find_by_download_id_and_type(&item.download_id, HistoryEventType::Grabbed)?;
        let grab = match &local.media {
            Some(media) => grabs
                .iter()
                .find(|g| g.media_id == media.id)
                .or_else(|| grabs.first()),
            None => grabs.first(),
        };
        let Some(grab) = grab else {
            return Ok(SpecDecision::Accept);
        };
        if grab.quality.quality == Quality::Unknown {
            return Ok(SpecDecision::Accept);
        }

        if !grab.quality.same_as(&local.quality) {
            debug!(
                "File quality {} doesn't match grabbed quality {} for {}",
                local.quality, grab.quality, local
            );
            return Ok(SpecDecision::reject(
                "File quality does not match quality of the grabbed release",
            ));
        }
        Ok(SpecDecision::Accept)
    }
}
