/// Comparator: filter a metadata record, then ask the live-listing
/// oracle whether a counterpart exists.
use serde::{Deserialize, Serialize};

use crate::filter::FilterPolicy;
use crate::liveview::LiveView;
use crate::MetadataRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    /// Rejected by the filter policy; never compared
    Skipped,
    /// A live entry with the exact same name exists under the mirrored path
    Present,
    /// Passed all filters and has no live counterpart
    Hidden,
    /// The live directory could not be read; no determination possible
    Indeterminate { reason: String },
}

pub struct Comparator<'a> {
    filter: &'a FilterPolicy,
    live: &'a dyn LiveView,
}

impl<'a> Comparator<'a> {
    pub fn new(filter: &'a FilterPolicy, live: &'a dyn LiveView) -> Self {
        Self { filter, live }
    }

    /// A record is Hidden only after the filter accepted it *and* the
    /// oracle found no live counterpart. Oracle failures degrade to
    /// Indeterminate rather than failing the scan.
    pub fn classify(&self, record: &MetadataRecord) -> Classification {
        if !self.filter.should_evaluate(record) {
            return Classification::Skipped;
        }

        match self.live.exists(&record.parent_path, &record.name) {
            Ok(true) => Classification::Present,
            Ok(false) => Classification::Hidden,
            Err(err) => {
                tracing::warn!("{}", err);
                Classification::Indeterminate {
                    reason: err.to_string(),
                }
            }
        }
    }
}
