/// In-memory metadata source for exercising the engine without a real
/// volume. Entries are yielded in insertion order; a walk drains the
/// source (a walk is not restartable).
use std::ffi::OsString;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use crate::error::{RecordError, SetupError};
use crate::source::{MetadataSource, SourceInfo, WalkEntry};
use crate::{AllocationState, EntryType, MetadataRecord};

#[derive(Default)]
pub struct SyntheticSource {
    info: SourceInfo,
    entries: Vec<(MetadataRecord, Option<Vec<u8>>)>,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            info: SourceInfo {
                description: "synthetic".into(),
                ..SourceInfo::default()
            },
            entries: Vec::new(),
        }
    }

    pub fn with_info(mut self, info: SourceInfo) -> Self {
        self.info = info;
        self
    }

    pub fn push(&mut self, record: MetadataRecord, content: Option<Vec<u8>>) {
        self.entries.push((record, content));
    }

    /// Allocated directory with the given size (`None` when the metadata
    /// does not expose one, the common case for directories)
    pub fn push_dir(&mut self, parent: impl Into<PathBuf>, name: &str, size: Option<i64>) {
        let record = MetadataRecord {
            name: OsString::from(name),
            entry_type: EntryType::Directory,
            allocation: AllocationState::Allocated,
            size,
            parent_path: parent.into(),
            record_id: self.next_id(),
        };
        self.push(record, None);
    }

    /// Allocated regular file whose size is the content length
    pub fn push_file(&mut self, parent: impl Into<PathBuf>, name: &str, content: Vec<u8>) {
        let record = MetadataRecord {
            name: OsString::from(name),
            entry_type: EntryType::RegularFile,
            allocation: AllocationState::Allocated,
            size: Some(content.len() as i64),
            parent_path: parent.into(),
            record_id: self.next_id(),
        };
        self.push(record, Some(content));
    }

    fn next_id(&self) -> u64 {
        self.entries.len() as u64 + 1
    }
}

impl MetadataSource for SyntheticSource {
    fn info(&self) -> SourceInfo {
        let mut info = self.info.clone();
        info.entry_count = Some(self.entries.len() as u64);
        info
    }

    fn walk(
        &mut self,
    ) -> Result<Box<dyn Iterator<Item = Result<WalkEntry, RecordError>> + '_>, SetupError> {
        let drained = std::mem::take(&mut self.entries);
        Ok(Box::new(drained.into_iter().map(|(record, content)| {
            let content: Option<Box<dyn Read + Send>> =
                content.map(|bytes| Box::new(Cursor::new(bytes)) as Box<dyn Read + Send>);
            Ok(WalkEntry { record, content })
        })))
    }
}
