use anyhow::Result;

use crate::history::HistoryEventType;
use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

/// Rejects a file matched to media the release wasn't grabbed for.
pub struct MatchesGrabSpecification;

impl ImportSpecification for MatchesGrabSpecification {
    fn name(&self) -> &'static str {
        "MatchesGrab"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let (Some(item), Some(media)) = (ctx.download_item, &local.media) else {
            return Ok(SpecDecision::Accept);
        };

        let grabs = ctx
            .history
            .find_by_download_id_and_type(&item.download_id, HistoryEventType::Grabbed)?;
        if grabs.is_empty() || grabs.iter().any(|g| g.media_id == media.id) {
            return Ok(SpecDecision::Accept);
        }
        Ok(SpecDecision::reject("File was not found in the grabbed release"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{DownloadClientItem, DownloadItemStatus};
    use crate::history::{HistoryEvent, HistoryStore};
    use crate::import::specification::testing::{local_for, Harness};

    #[test]
    fn test_file_for_other_media_rejected() {
        let mut harness = Harness::new();
        let grabbed = harness.add_media("Movie");
        let other = harness.add_media("Other");
        harness.item = Some(DownloadClientItem::new("job", "Movie", DownloadItemStatus::Completed));
        harness
            .history
            .append(
                &HistoryEvent::new(HistoryEventType::Grabbed, grabbed.id, "Movie")
                    .with_download_id(Some("job".to_string())),
            )
            .unwrap();

        let spec = MatchesGrabSpecification;
        let local = local_for("/dl/Movie.2020.mkv", 1, &grabbed);
        assert_eq!(spec.evaluate(&local, &harness.ctx()).unwrap(), SpecDecision::Accept);

        let local = local_for("/dl/Other.2020.mkv", 1, &other);
        assert_eq!(
            spec.evaluate(&local, &harness.ctx()).unwrap(),
            SpecDecision::reject("File was not found in the grabbed release")
        );
    }
}
