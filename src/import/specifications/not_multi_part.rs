use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

use crate::import::models::LocalMediaFile;
use crate::import::specification::{ImportContext, ImportSpecification, SpecDecision};

lazy_static! {
    static ref MULTI_PART_REGEX: Regex =
        Regex::new(r"(?i)(?:^|[^a-z0-9])(?P<kind>cd|dvd|disc|disk|part|pt)[ ._\-]?(?P<number>\d{1,2})(?:[^a-z0-9]|$)")
            .unwrap();
}

/// `(kind, number)` of a multi-part marker in a file name.
fn part_marker(path: &Path) -> Option<(String, u32)> {
    let name = path.file_stem()?.to_str()?;
    let caps = MULTI_PART_REGEX.captures(name)?;
    Some((
        caps["kind"].to_ascii_lowercase(),
        caps["number"].parse().ok()?,
    ))
}

/// Rejects one part of a release split into numbered parts, as long as the
/// siblings follow the same scheme. Mixed naming means the marker is most
/// likely part of a title.
pub struct NotMultiPartSpecification;

impl ImportSpecification for NotMultiPartSpecification {
    fn name(&self) -> &'static str {
        "NotMultiPart"
    }

    fn evaluate(&self, local: &LocalMediaFile, ctx: &ImportContext<'_>) -> Result<SpecDecision> {
        if local.existing_file {
            return Ok(SpecDecision::Accept);
        }
        let Some((kind, number)) = part_marker(&local.path) else {
            return Ok(SpecDecision::Accept);
        };

        let siblings: Vec<&Path> = ctx
            .video_files
            .iter()
            .map(|p| p.as_path())
            .filter(|p| *p != local.path && p.parent() == local.path.parent())
            .collect();
        if siblings.is_empty() {
            return Ok(SpecDecision::Accept);
        }

        let consistent = siblings.iter().all(|sibling| {
            matches!(part_marker(sibling), Some((k, n)) if k == kind && n != number)
        });
        if consistent {
            Ok(SpecDecision::reject("File is one part of a multi-part release"))
        } else {
            Ok(SpecDecision::Accept)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::specification::testing::{local_for, Harness};
    use std::path::PathBuf;

    #[test]
    fn test_part_marker() {
        assert_eq!(part_marker(Path::new("movie.cd1.avi")), Some(("cd".into(), 1)));
        assert_eq!(part_marker(Path::new("Movie Part 2.mkv")), Some(("part".into(), 2)));
        assert_eq!(part_marker(Path::new("movie-disc_03.mkv")), Some(("disc".into(), 3)));
        assert_eq!(part_marker(Path::new("Movie.2020.1080p.mkv")), None);
        assert_eq!(part_marker(Path::new("Apartment.2020.mkv")), None);
    }

    #[test]
    fn test_consistent_parts_rejected() {
        let mut harness = Harness::new();
        let media = harness.add_media("Movie");
        harness.video_files = vec![
            PathBuf::from("/dl/Movie/movie.cd1.avi"),
            PathBuf::from("/dl/Movie/movie.cd2.avi"),
        ];
        let local = local_for("/dl/Movie/movie.cd1.avi", 700, &media);
        assert!(matches!(
            NotMultiPartSpecification.evaluate(&local, &harness.ctx()).unwrap(),
            SpecDecision::Reject(_)
        ));
    }

    #[test]
    fn test_inconsistent_naming_accepted() {
        let mut harness = Harness::new();
        let media = harness.add_media("Movie");
        harness.video_files = vec![
            PathBuf::from("/dl/Movie/Movie.Part.2.2011.mkv"),
            PathBuf::from("/dl/Movie/Movie.Extras.mkv"),
        ];
        let local = local_for("/dl/Movie/Movie.Part.2.2011.mkv", 700, &media);
        assert_eq!(
            NotMultiPartSpecification.evaluate(&local, &harness.ctx()).unwrap(),
            SpecDecision::Accept
        );

        // Alone in its folder.
        harness.video_files = vec![PathBuf::from("/dl/Movie/Movie.Part.2.2011.mkv")];
        assert_eq!(
            NotMultiPartSpecification.evaluate(&local, &harness.ctx()).unwrap(),
            SpecDecision::Accept
        );
    }
}
