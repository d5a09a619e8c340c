/// Path materialization and content extraction for hidden entries.
///
/// Extraction is read-only against the source: content is streamed from
/// the metadata-backed handle into a mirror path under the extraction
/// root.
use std::fs::{DirBuilder, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::digest::FileDigests;
use crate::error::RecordError;

/// Reference chunk size for streaming source content
pub const CHUNK_SIZE: usize = 1024;

/// What to do when the destination file already exists.
///
/// The historical tool opened destinations in append mode
/// unconditionally, so a second run over the same image duplicated
/// bytes. That is kept available as `Append` for byte-compatible runs,
/// but `Overwrite` is the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WritePolicy {
    #[default]
    Overwrite,
    Append,
    SkipIfExists,
}

/// How null bytes in the source stream are handled.
///
/// `Compact` drops every null byte while copying, collapsing sparse and
/// padding regions; the extracted length is then not guaranteed to equal
/// the source's logical size. `Preserve` copies bytes verbatim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SparsePolicy {
    #[default]
    Compact,
    Preserve,
}

/// Per-hidden-file outcome, consumed by the reporting layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extracted_path: PathBuf,
    pub bytes_written: u64,
    /// Destination already existed and `WritePolicy::SkipIfExists` left it alone
    pub skipped_existing: bool,
    /// Digests of the destination content as extracted (post compaction)
    pub digests: Option<FileDigests>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Create `path` and all missing ancestors, owner-only permissions,
/// idempotent. An ancestor already existing is not a failure.
pub fn ensure_dir(path: &Path) -> Result<(), RecordError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|source| RecordError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

pub struct ContentExtractor {
    write_policy: WritePolicy,
    sparse_policy: SparsePolicy,
}

impl ContentExtractor {
    pub fn new(write_policy: WritePolicy, sparse_policy: SparsePolicy) -> Self {
        Self {
            write_policy,
            sparse_policy,
        }
    }

    /// Stream `content` into `dest` in fixed-size chunks.
    ///
    /// The destination's parent directories must already exist. Returns
    /// the number of bytes written and whether an existing destination
    /// was left untouched. A read failure partway through is logged and
    /// extraction keeps whatever was copied; the source parser is the
    /// authority on read failures and is not second-guessed.
    pub fn extract(
        &self,
        content: &mut dyn Read,
        dest: &Path,
    ) -> Result<(u64, bool), RecordError> {
        let mut options = OpenOptions::new();
        match self.write_policy {
            WritePolicy::Overwrite => {
                options.write(true).create(true).truncate(true);
            }
            WritePolicy::Append => {
                options.append(true).create(true);
            }
            WritePolicy::SkipIfExists => {
                if dest.exists() {
                    tracing::info!("Destination exists, skipping: {}", dest.display());
                    return Ok((0, true));
                }
                options.write(true).create_new(true);
            }
        }

        let mut out = options
            .open(dest)
            .map_err(|source| RecordError::OpenDestination {
                path: dest.to_path_buf(),
                source,
            })?;

        let mut buf = [0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = match content.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!(
                        "Partial read of source content for {}: {} ({} bytes kept)",
                        dest.display(),
                        err,
                        written
                    );
                    break;
                }
            };

            match self.sparse_policy {
                SparsePolicy::Compact => {
                    let kept: Vec<u8> = buf[..read].iter().copied().filter(|&b| b != 0).collect();
                    self.write_chunk(&mut out, &kept, dest)?;
                    written += kept.len() as u64;
                }
                SparsePolicy::Preserve => {
                    self.write_chunk(&mut out, &buf[..read], dest)?;
                    written += read as u64;
                }
            }
        }

        out.flush().map_err(|source| RecordError::WriteDestination {
            path: dest.to_path_buf(),
            source,
        })?;

        Ok((written, false))
    }

    fn write_chunk(
        &self,
        out: &mut impl Write,
        chunk: &[u8],
        dest: &Path,
    ) -> Result<(), RecordError> {
        out.write_all(chunk)
            .map_err(|source| RecordError::WriteDestination {
                path: dest.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn extractor(write_policy: WritePolicy, sparse_policy: SparsePolicy) -> ContentExtractor {
        ContentExtractor::new(write_policy, sparse_policy)
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b/c");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // Second invocation over the same path is not an error
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_dir_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("x/y");
        ensure_dir(&nested).unwrap();

        let mode = std::fs::metadata(&nested).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_null_bytes_are_compacted_in_order() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.bin");

        let mut content = Cursor::new(vec![0x00, 0x41, 0x00, 0x00, 0x42]);
        let (written, skipped) = extractor(WritePolicy::Overwrite, SparsePolicy::Compact)
            .extract(&mut content, &dest)
            .unwrap();

        assert_eq!(written, 2);
        assert!(!skipped);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x41, 0x42]);
    }

    #[test]
    fn test_all_null_content_extracts_to_empty_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("null.bin");

        let mut content = Cursor::new(vec![0x00]);
        let (written, _) = extractor(WritePolicy::Overwrite, SparsePolicy::Compact)
            .extract(&mut content, &dest)
            .unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::read(&dest).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_preserve_policy_copies_verbatim() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("sparse.bin");

        let bytes = vec![0x00, 0x41, 0x00, 0x00, 0x42];
        let mut content = Cursor::new(bytes.clone());
        let (written, _) = extractor(WritePolicy::Overwrite, SparsePolicy::Preserve)
            .extract(&mut content, &dest)
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read(&dest).unwrap(), bytes);
    }

    #[test]
    fn test_overwrite_policy_truncates_previous_run() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.bin");
        let ex = extractor(WritePolicy::Overwrite, SparsePolicy::Compact);

        ex.extract(&mut Cursor::new(vec![0x41, 0x42]), &dest).unwrap();
        ex.extract(&mut Cursor::new(vec![0x43]), &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x43]);
    }

    #[test]
    fn test_append_policy_accumulates_across_runs() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.bin");
        let ex = extractor(WritePolicy::Append, SparsePolicy::Compact);

        ex.extract(&mut Cursor::new(vec![0x41]), &dest).unwrap();
        ex.extract(&mut Cursor::new(vec![0x42]), &dest).unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x41, 0x42]);
    }

    #[test]
    fn test_skip_if_exists_leaves_destination_untouched() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.bin");
        let ex = extractor(WritePolicy::SkipIfExists, SparsePolicy::Compact);

        let (first, skipped_first) = ex.extract(&mut Cursor::new(vec![0x41]), &dest).unwrap();
        assert_eq!((first, skipped_first), (1, false));

        let (second, skipped_second) = ex.extract(&mut Cursor::new(vec![0x42]), &dest).unwrap();
        assert_eq!((second, skipped_second), (0, true));

        assert_eq!(std::fs::read(&dest).unwrap(), vec![0x41]);
    }

    #[test]
    fn test_content_longer_than_chunk_size() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("big.bin");

        // Three chunks worth of alternating null and 0x55 bytes
        let mut bytes = Vec::new();
        for i in 0..(CHUNK_SIZE * 3) {
            bytes.push(if i % 2 == 0 { 0x00 } else { 0x55 });
        }

        let (written, _) = extractor(WritePolicy::Overwrite, SparsePolicy::Compact)
            .extract(&mut Cursor::new(bytes), &dest)
            .unwrap();

        assert_eq!(written as usize, CHUNK_SIZE * 3 / 2);
        assert!(std::fs::read(&dest).unwrap().iter().all(|&b| b == 0x55));
    }

    #[test]
    fn test_missing_parent_directory_is_open_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("no/such/parent/out.bin");

        let err = extractor(WritePolicy::Overwrite, SparsePolicy::Compact)
            .extract(&mut Cursor::new(vec![0x41]), &dest)
            .unwrap_err();
        assert!(matches!(err, RecordError::OpenDestination { .. }));
    }
}
