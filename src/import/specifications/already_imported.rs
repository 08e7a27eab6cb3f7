use anyhow::Result;

use crate::history::HistoryEventType;
use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

/// Rejects a job's files once the job was imported, unless it was grabbed
/// again afterwards.
pub struct AlreadyImportedSpecification;

impl ImportSpecification for AlreadyImportedSpecification {
    fn name(&self) -> &'static str {
        "AlreadyImported"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let (Some(item), Some(media)) = (ctx.download_item, &local.media) else {
            return Ok(SpecDecision::Accept);
        };

        // Most recent first.
        let history = ctx.history.find_by_download_id(&item.download_id)?;
        let for_media = |event_type: HistoryEventType| {
            history
                .iter()
                .find(|e| e.media_id == media.id && e.event_type == event_type)
        };

        let Some(last_imported) = for_media(HistoryEventType::DownloadFolderImported) else {
            return Ok(SpecDecision::Accept);
        };
        if let Some(last_grabbed) = for_media(HistoryEventType::Grabbed) {
            if last_imported.date < last_grabbed.date {
                return Ok(SpecDecision::Accept);
            }
        }

        Ok(SpecDecision::reject(format!(
            "Media file already imported at {}",
            last_imported.date.format("%Y-%m-%d %H:%M:%S")
        )))
    }
}
