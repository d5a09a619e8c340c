/// Traversal sources: anything that can produce a depth-first stream of
/// metadata records with scoped content handles.
///
/// The engine pulls records from a lazy, finite, non-restartable
/// iterator instead of registering a per-record callback, so it can be
/// exercised against a synthetic stream without a forensic image.
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::{RecordError, SetupError};
use crate::MetadataRecord;

pub mod mounted;
pub mod synthetic;

pub use mounted::MountedSource;
pub use synthetic::SyntheticSource;

/// One record plus its content handle.
///
/// The handle is owned by the entry and dropped when processing of the
/// record finishes; it must not be retained across records. Directories
/// and other non-regular entries carry `None`.
pub struct WalkEntry {
    pub record: MetadataRecord,
    pub content: Option<Box<dyn Read + Send>>,
}

/// Run-header information about the volume being walked
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceInfo {
    pub description: String,
    pub total_bytes: Option<u64>,
    pub filesystem: Option<String>,
    pub entry_count: Option<u64>,
}

pub trait MetadataSource {
    fn info(&self) -> SourceInfo;

    /// Start a recursive depth-first walk from the source root, skipping
    /// orphaned entries. Errors raised mid-stream are scoped to single
    /// records; the iterator stays usable afterwards.
    fn walk(
        &mut self,
    ) -> Result<Box<dyn Iterator<Item = Result<WalkEntry, RecordError>> + '_>, SetupError>;
}
