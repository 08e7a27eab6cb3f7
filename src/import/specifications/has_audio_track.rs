use anyhow::Result;

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

pub struct HasAudioTrackSpecification;

impl ImportSpecification for HasAudioTrackSpecification {
    fn name(&self) -> &'static str {
        "HasAudioTrack"
    }

    fn evaluate(&self, local: &LocalMediaFile, _ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        match &local.media_info {
            Some(info) if info.audio_stream_count == 0 => {
                Ok(SpecDecision::reject("No audio tracks detected"))
            }
            _ => Ok(SpecDecision::Accept),
        }
    }
}
