use anyhow::Result;

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

/// Rejects a file whose own name identifies a different unit or year than
/// its folder. Titles aren't compared; obfuscated file names are common.
pub struct MatchesFolderSpecification;

impl ImportSpecification for MatchesFolderSpecification {
    fn name(&self) -> &'static str {
        "MatchesFolder"
    }

    fn evaluate(&self, local: &LocalMediaFile, _ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let (Some(file), Some(folder)) = (&local.parsed_info, &local.folder_info) else {
            return Ok(SpecDecision::Accept);
        };

        if let (Some(file_unit), Some(folder_unit)) = (file.unit, folder.unit) {
            if file_unit != folder_unit {
                return Ok(SpecDecision::reject(format!(
                    "File unit {} does not match folder unit {}",
                    file_unit, folder_unit
                )));
            }
        }

        if let (Some(file_year), Some(folder_year)) = (file.year, folder.year) {
            if file_year != folder_year {
                return Ok(SpecDecision::reject(format!(
                    "File year {} does not match folder year {}",
                    file_year, folder_year
                )));
            }
        }

        Ok(SpecDecision::Accept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::specification::testing::{local_for, Harness};
    use crate::parser::parse_title;

    #[test]
    fn test_folder_mismatch() {
        let harness = Harness::new();
        let media = harness.add_media("Show");
        let mut local = local_for("/dl/Show.S01E02.720p.HDTV-GRP.mkv", 1, &media);
        let spec = MatchesFolderSpecification;

        // No folder info, nothing to compare.
        assert_eq!(spec.evaluate(&local, &harness.ctx()).unwrap(), SpecDecision::Accept);

        local.folder_info = parse_title("Show.S01E02.720p.HDTV-GRP");
        assert_eq!(spec.evaluate(&local, &harness.ctx()).unwrap(), SpecDecision::Accept);

        local.folder_info = parse_title("Show.S01E03.720p.HDTV-GRP");
        assert!(matches!(
            spec.evaluate(&local, &harness.ctx()).unwrap(),
            SpecDecision::Reject(_)
        ));

        let mut movie = local_for("/dl/Movie.2019.1080p.WEB-DL-GRP.mkv", 1, &media);
        movie.folder_info = parse_title("Movie.2020.1080p.WEB-DL-GRP");
        assert!(matches!(
            spec.evaluate(&movie, &harness.ctx()).unwrap(),
            SpecDecision::Reject(_)
        ));
    }
}
