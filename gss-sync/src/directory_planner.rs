//! Destination directory planning and creation.
//!
//! Every directory level above each object's leaf is created before any
//! transfer starts. Creation is best-effort: a failed directory is logged and
//! the objects under it fail later at transfer time.

use crate::path_mapper::map_path;
use crate::transport::Destination;
use crate::types::SyncJob;
use tracing::{debug, warn};

/// Directories to ensure for `objects`, in creation order.
///
/// Within each object the order is parent before child. Directories shared by
/// several objects are repeated; the destination's ensure primitive is
/// idempotent.
pub fn plan_directories(job: &SyncJob, objects: &[String]) -> Vec<String> {
    objects
        .iter()
        .flat_map(|key| map_path(job, key).directories())
        .collect()
}

/// Ensures every planned directory exists, in order.
///
/// Returns the number of directories that could not be created. A failure
/// never stops the remaining directories from being attempted.
pub async fn create_directories(destination: &dyn Destination, plan: &[String]) -> usize {
    let mut failures = 0;
    for dir in plan {
        match destination.ensure_directory(dir).await {
            Ok(()) => debug!("ensured directory {dir}"),
            Err(e) => {
                warn!("directory {dir} could not be created: {e}");
                failures += 1;
            }
        }
    }
    failures
}
