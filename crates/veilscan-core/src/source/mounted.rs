/// Metadata source backed by an independently mounted, trusted view of
/// the volume (e.g. a read-only forensic mount of the same block
/// device). The kernel driver plays the role of the format parser; this
/// adapter only walks and describes what it exposes.
use std::fs::{self, ReadDir};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{RecordError, SetupError};
use crate::source::{MetadataSource, SourceInfo, WalkEntry};
use crate::{AllocationState, EntryType, MetadataRecord};

pub struct MountedSource {
    root: PathBuf,
}

impl MountedSource {
    /// Open a mounted view rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SetupError> {
        let root = root.as_ref().to_path_buf();
        let meta = fs::metadata(&root).map_err(|source| SetupError::SourceUnavailable {
            path: root.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(SetupError::NotADirectory { path: root });
        }
        Ok(Self { root })
    }
}

impl MetadataSource for MountedSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            description: self.root.display().to_string(),
            ..SourceInfo::default()
        }
    }

    fn walk(
        &mut self,
    ) -> Result<Box<dyn Iterator<Item = Result<WalkEntry, RecordError>> + '_>, SetupError> {
        let top = fs::read_dir(&self.root).map_err(|source| SetupError::SourceUnavailable {
            path: self.root.clone(),
            source,
        })?;
        Ok(Box::new(MountedWalk {
            root: self.root.clone(),
            stack: vec![(PathBuf::new(), top)],
        }))
    }
}

/// Depth-first pre-order walk; each frame is a parent path (relative to
/// the source root) and its open directory handle.
struct MountedWalk {
    root: PathBuf,
    stack: Vec<(PathBuf, ReadDir)>,
}

impl MountedWalk {
    fn make_entry(&mut self, parent: PathBuf, dirent: &fs::DirEntry) -> Result<WalkEntry, RecordError> {
        let abs = dirent.path();
        // DirEntry::metadata does not follow symlinks
        let meta = dirent
            .metadata()
            .map_err(|source| RecordError::DirectoryUnreadable {
                path: abs.clone(),
                source,
            })?;

        let entry_type = if meta.file_type().is_symlink() {
            EntryType::SymbolicLink
        } else if meta.is_dir() {
            EntryType::Directory
        } else if meta.is_file() {
            EntryType::RegularFile
        } else {
            // Sockets, fifos, device nodes
            EntryType::Undefined
        };

        #[cfg(unix)]
        let record_id = {
            use std::os::unix::fs::MetadataExt;
            meta.ino()
        };
        #[cfg(not(unix))]
        let record_id = 0;

        // Descend before returning so children follow their parent
        if entry_type == EntryType::Directory {
            let child_rel = parent.join(dirent.file_name());
            match fs::read_dir(&abs) {
                Ok(iter) => self.stack.push((child_rel, iter)),
                Err(source) => {
                    return Err(RecordError::DirectoryUnreadable { path: abs, source });
                }
            }
        }

        let content: Option<Box<dyn Read + Send>> = if entry_type == EntryType::RegularFile {
            Some(Box::new(LazyFileContent::new(abs)))
        } else {
            None
        };

        Ok(WalkEntry {
            record: MetadataRecord {
                name: dirent.file_name(),
                entry_type,
                // A mounted view only ever exposes allocated names
                allocation: AllocationState::Allocated,
                size: Some(meta.len() as i64),
                parent_path: parent,
                record_id,
            },
            content,
        })
    }
}

impl Iterator for MountedWalk {
    type Item = Result<WalkEntry, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (parent, iter) = self.stack.last_mut()?;
            let parent = parent.clone();
            match iter.next() {
                None => {
                    self.stack.pop();
                }
                Some(Err(source)) => {
                    let path = self.root.join(&parent);
                    return Some(Err(RecordError::DirectoryUnreadable { path, source }));
                }
                Some(Ok(dirent)) => return Some(self.make_entry(parent, &dirent)),
            }
        }
    }
}

/// Content handle that opens the file on first read, so entries the
/// comparator skips never cost a file descriptor.
struct LazyFileContent {
    path: PathBuf,
    file: Option<fs::File>,
}

impl LazyFileContent {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }
}

impl Read for LazyFileContent {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.file.is_none() {
            self.file = Some(fs::File::open(&self.path)?);
        }
        match self.file.as_mut() {
            Some(file) => file.read(buf),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_open_rejects_non_directories() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            MountedSource::open(&file),
            Err(SetupError::NotADirectory { .. })
        ));
        assert!(matches!(
            MountedSource::open(tmp.path().join("missing")),
            Err(SetupError::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn test_walk_yields_records_with_parent_paths() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("etc")).unwrap();
        fs::write(tmp.path().join("etc/passwd"), b"root:x").unwrap();
        fs::write(tmp.path().join("top.txt"), b"hello").unwrap();

        let mut source = MountedSource::open(tmp.path()).unwrap();
        let mut seen: HashMap<PathBuf, (EntryType, Option<i64>)> = HashMap::new();
        for entry in source.walk().unwrap() {
            let entry = entry.unwrap();
            seen.insert(
                entry.record.relative_path(),
                (entry.record.entry_type, entry.record.size),
            );
        }

        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[&PathBuf::from("etc")].0,
            EntryType::Directory
        );
        let (passwd_type, passwd_size) = seen[&PathBuf::from("etc/passwd")];
        assert_eq!(passwd_type, EntryType::RegularFile);
        assert_eq!(passwd_size, Some(6));
    }

    #[test]
    fn test_content_handle_streams_file_bytes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("data.bin"), b"abc").unwrap();

        let mut source = MountedSource::open(tmp.path()).unwrap();
        let entry = source.walk().unwrap().next().unwrap().unwrap();

        let mut content = entry.content.unwrap();
        let mut bytes = Vec::new();
        content.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"abc");
    }
}
