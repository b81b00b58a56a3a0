//! Removal of items already present on disk.

use futures::future::try_join_all;
use tracing::debug;

use super::item::Downloadable;
use crate::error::{DownloadError, DownloadResult};
use crate::io::FileSystem;

/// Return the items whose destination does not exist yet.
///
/// All destinations are probed concurrently. The input is left untouched
/// and survivors keep their relative order. Existence is only checked here,
/// so a file created between this probe and the write is overwritten.
pub async fn filter_missing(
    fs: &dyn FileSystem,
    items: &[Downloadable],
) -> DownloadResult<Vec<Downloadable>> {
    let probes = items.iter().map(|item| async move {
        fs.exists(item.destination())
            .await
            .map_err(|source| DownloadError::ProbeFailed {
                path: item.destination().to_path_buf(),
                source,
            })
    });
    let present = try_join_all(probes).await?;

    let missing: Vec<Downloadable> = items
        .iter()
        .zip(present)
        .filter(|(_, exists)| !exists)
        .map(|(item, _)| item.clone())
        .collect();

    debug!(
        resolved = items.len(),
        missing = missing.len(),
        "Filtered existing files"
    );

    Ok(missing)
}
