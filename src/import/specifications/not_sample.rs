use anyhow::Result;
use tracing::debug;

use crate::import::models::LocalMediaFile;
use crate::import::sample::{detect_sample, SampleVerdict};
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

pub struct NotSampleSpecification;

impl ImportSpecification for NotSampleSpecification {
    fn name(&self) -> &'static str {
        "NotSample"
    }

    fn evaluate(&self, local: &LocalMediaFile, _ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let Some(media) = &local.media else {
            return Ok(SpecDecision::Accept);
        };

        match detect_sample(&local.path, local.size, local.media_info.as_ref(), media) {
            SampleVerdict::Sample => {
                debug!("{} is a sample", local);
                Ok(SpecDecision::reject("Sample"))
            }
            SampleVerdict::NotSample => Ok(SpecDecision::Accept),
        }
    }
}
