use std::io::{ErrorKind, Result as IoResult};
use std::path::Path;

use sieve_core::{CoverageReport, FailureKind};
use tokio::fs::{read_to_string, remove_file};

/// Load the coverage report at `path`, classifying every way it can be unusable.
pub(crate) async fn read_coverage(path: &Path) -> Result<CoverageReport, FailureKind> {
    let text = match read_to_string(path).await {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(FailureKind::ArtifactMissing),
        Err(err) => return Err(FailureKind::ArtifactUnreadable(err.to_string())),
    };

    let report = CoverageReport::from_json(&text)
        .map_err(|err| FailureKind::ArtifactUnreadable(err.to_string()))?;
    if report.is_empty() {
        return Err(FailureKind::ArtifactEmpty);
    }
    Ok(report)
}

/// Delete a report left behind by an earlier task in the same tree.
///
/// A report that survives this call could be mistaken for the next run's
/// output, so any failure other than absence is returned.
pub(crate) async fn clear_stale(path: &Path) -> IoResult<()> {
    match remove_file(path).await {
        Ok(()) => {
            tracing::debug!("Removed stale coverage artifact {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => {
            tracing::warn!(
                "Could not remove stale coverage artifact {}: {err}",
                path.display()
            );
            Err(err)
        }
    }
}
