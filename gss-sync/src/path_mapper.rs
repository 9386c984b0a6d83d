//! Object key to FTP path mapping.

use crate::types::{DestinationPath, SyncJob};

/// Maps a source key to its destination path under the job's root.
///
/// Strips the first occurrence of `{source_prefix}/` and prepends
/// `dest_root`. A key without the prefix is used whole; the orchestrator
/// filters such keys out before they reach here (see [`SyncJob::in_scope`]).
pub fn map_path(job: &SyncJob, source_key: &str) -> DestinationPath {
    let relative = source_key.replacen(&job.scope_prefix(), "", 1);
    DestinationPath::parse(&format!("{}{relative}", job.dest_root))
}
