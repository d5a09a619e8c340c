/// Filter policy deciding which metadata records are worth comparing
/// against the live view.
///
/// The rules are noise-suppression heuristics tuned against real images,
/// not correctness requirements; loosening them changes detection
/// sensitivity, not soundness.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{AllocationState, EntryType, MetadataRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Path prefixes (matched component-wise against the record's parent
    /// path) whose contents are never evaluated.
    pub ignored_prefixes: Vec<PathBuf>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            // /run churns constantly on a live system and produces large
            // numbers of false positives
            ignored_prefixes: vec![PathBuf::from("run")],
        }
    }
}

impl FilterPolicy {
    /// Pure predicate: `true` means the record proceeds to the live-view
    /// comparison. Rules short-circuit in order.
    pub fn should_evaluate(&self, record: &MetadataRecord) -> bool {
        // Symlinks are not compared by content; virtual and undefined
        // entries are parser artifacts, not meaningful hiding targets
        match record.entry_type {
            EntryType::SymbolicLink
            | EntryType::Undefined
            | EntryType::VirtualFile
            | EntryType::VirtualDirectory => return false,
            EntryType::RegularFile | EntryType::Directory => {}
        }

        // Unallocated (deleted) names are expected to differ from the
        // live view and would produce pervasive false positives
        if record.allocation == AllocationState::Unallocated {
            return false;
        }

        // Zero-size or unknown-size entries are excluded for the same
        // false-positive reason
        match record.size {
            Some(size) if size > 0 => {}
            _ => return false,
        }

        // Volatile runtime-only directories are excluded by policy since
        // their churn is expected and not indicative of tampering
        if self
            .ignored_prefixes
            .iter()
            .any(|prefix| record.parent_path.starts_with(prefix))
        {
            return false;
        }

        true
    }
}
