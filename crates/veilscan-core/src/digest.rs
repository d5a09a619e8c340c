/// Digests of extracted content for chain-of-custody reporting.
///
/// Computed over the destination file as produced by the extractor
/// (post null-byte compaction), not the original source bytes.
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigests {
    /// 32 lowercase hex characters
    pub md5: String,
    /// 40 lowercase hex characters
    pub sha1: String,
    /// 64 lowercase hex characters
    pub sha256: String,
}

/// Digest a file's content in one pass over all three algorithms.
pub fn digest_file(path: impl AsRef<Path>) -> io::Result<FileDigests> {
    let mut file = File::open(path.as_ref())?;
    let mut md5 = md5::Context::new();
    let mut sha1 = sha1::Sha1::new();
    let mut sha256 = Sha256::new();

    let mut buffer = vec![0; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        md5.consume(&buffer[..n]);
        sha1.update(&buffer[..n]);
        sha256.update(&buffer[..n]);
    }

    Ok(FileDigests {
        md5: format!("{:x}", md5.compute()),
        sha1: format!("{:x}", sha1.finalize()),
        sha256: format!("{:x}", sha256.finalize()),
    })
}

/// Digest an in-memory byte slice
pub fn digest_bytes(data: &[u8]) -> FileDigests {
    FileDigests {
        md5: format!("{:x}", md5::compute(data)),
        sha1: format!("{:x}", <sha1::Sha1 as Digest>::digest(data)),
        sha256: format!("{:x}", Sha256::digest(data)),
    }
}
