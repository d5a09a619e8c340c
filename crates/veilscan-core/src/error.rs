/// Error taxonomy for a scan run
///
/// Setup failures abort before any walking. Record failures are isolated
/// to a single entry: they are logged, attached to the report, and the
/// walk continues so partial results of a large image stay usable.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors raised before the walk starts
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to open source {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("failed to prepare extraction root {path}: {source}")]
    ExtractionRootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Non-fatal errors scoped to one metadata record
#[derive(Debug, Error)]
pub enum RecordError {
    /// The live view could not answer an existence query. Mapped to an
    /// Indeterminate classification, never treated as "hidden".
    #[error("failed to open directory: {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open destination {path}: {source}")]
    OpenDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write destination {path}: {source}")]
    WriteDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source content for {path} provided no readable handle")]
    MissingContent { path: PathBuf },

    #[error("failed to digest {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
