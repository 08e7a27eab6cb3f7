use anyhow::Result;
use std::time::{Duration, SystemTime};

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

/// Folder prefixes download clients use while extracting.
const UNPACKING_PREFIXES: &[&str] = &["_UNPACK_", "_FAILED_"];
const UNPACK_GRACE: Duration = Duration::from_secs(5 * 60);

pub struct NotUnpackingSpecification;

impl ImportSpecification for NotUnpackingSpecification {
    fn name(&self) -> &'static str {
        "NotUnpacking"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }

        for folder in local.path.ancestors().skip(1) {
            let Some(name) = folder.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !UNPACKING_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }
            let recently_written = ctx
                .disk
                .last_write_time(folder)
                .and_then(|t| SystemTime::now().duration_since(t).ok())
                .map(|age| age < UNPACK_GRACE)
                .unwrap_or(false);
            if recently_written {
                return Ok(SpecDecision::reject("File is still being unpacked"));
            }
        }
        Ok(SpecDecision::Accept)
    }
}
