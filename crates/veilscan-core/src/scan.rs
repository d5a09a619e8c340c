/// Scan orchestrator: drives the walk and wires filter, comparator,
/// materializer, extractor and digest reporting together per record.
///
/// Records are processed synchronously and sequentially so extraction
/// order stays deterministic and reproducible for chain-of-custody
/// purposes. A single record's failure never aborts the walk; partial
/// results of a multi-terabyte image must still be usable.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{Classification, Comparator};
use crate::digest;
use crate::error::SetupError;
use crate::extract::{ensure_dir, ContentExtractor, ExtractionResult, SparsePolicy, WritePolicy};
use crate::filter::FilterPolicy;
use crate::liveview::{LiveView, OsLiveView};
use crate::source::{MetadataSource, SourceInfo, WalkEntry};
use crate::EntryType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    pub filter: FilterPolicy,
    pub write_policy: WritePolicy,
    pub sparse_policy: SparsePolicy,
}

/// Mutable state for one scan run, created at scan start and dropped at
/// scan end. Neither root is ever the filesystem being scanned.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub live_root: PathBuf,
    pub extraction_root: PathBuf,
    pub hidden_count: u64,
}

/// One hidden finding with its extraction outcome
#[derive(Debug, Clone, Serialize)]
pub struct HiddenItem {
    /// Mirrored path on the live view (where the entry should have been)
    pub live_path: PathBuf,
    pub record_id: u64,
    pub entry_type: EntryType,
    /// Directory materialized under the extraction root, for hidden directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_dir: Option<PathBuf>,
    /// Content extraction outcome, for hidden regular files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndeterminateItem {
    pub live_path: PathBuf,
    pub record_id: u64,
    pub reason: String,
}

/// Full outcome of a scan run
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub source: SourceInfo,
    pub live_root: PathBuf,
    pub extraction_root: PathBuf,
    pub records_scanned: u64,
    pub hidden_count: u64,
    pub hidden: Vec<HiddenItem>,
    pub indeterminate: Vec<IndeterminateItem>,
}

/// Scan `source` against the live view mounted at `live_root`,
/// extracting hidden entries under `extraction_root`.
pub fn run_scan(
    source: &mut dyn MetadataSource,
    live_root: &Path,
    extraction_root: &Path,
    config: &ScanConfig,
) -> Result<ScanReport, SetupError> {
    let oracle = OsLiveView::new(live_root);
    run_scan_with_oracle(source, &oracle, live_root, extraction_root, config)
}

/// Same as [`run_scan`] with an injected live-listing oracle, so the
/// engine can run against synthetic views in tests.
pub fn run_scan_with_oracle(
    source: &mut dyn MetadataSource,
    oracle: &dyn LiveView,
    live_root: &Path,
    extraction_root: &Path,
    config: &ScanConfig,
) -> Result<ScanReport, SetupError> {
    let started_at = Utc::now();
    let start = std::time::Instant::now();
    let session_id = Uuid::new_v4();

    if let Err(err) = ensure_dir(extraction_root) {
        let source = match err {
            crate::RecordError::CreateDir { source, .. } => source,
            other => std::io::Error::new(std::io::ErrorKind::Other, other.to_string()),
        };
        return Err(SetupError::ExtractionRootUnavailable {
            path: extraction_root.to_path_buf(),
            source,
        });
    }

    let mut context = ScanContext {
        live_root: live_root.to_path_buf(),
        extraction_root: extraction_root.to_path_buf(),
        hidden_count: 0,
    };

    let comparator = Comparator::new(&config.filter, oracle);
    let extractor = ContentExtractor::new(config.write_policy, config.sparse_policy);
    let info = source.info();

    tracing::info!(
        "Scan {} starting: {} -> live {} -> extract {}",
        session_id,
        info.description,
        context.live_root.display(),
        context.extraction_root.display()
    );

    let mut records_scanned = 0u64;
    let mut hidden = Vec::new();
    let mut indeterminate = Vec::new();

    for entry in source.walk()? {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                // Walk errors are scoped to one record; keep going
                tracing::warn!("{}", err);
                continue;
            }
        };
        records_scanned += 1;

        match comparator.classify(&entry.record) {
            Classification::Skipped | Classification::Present => {}
            Classification::Indeterminate { reason } => {
                indeterminate.push(IndeterminateItem {
                    live_path: context.live_root.join(entry.record.relative_path()),
                    record_id: entry.record.record_id,
                    reason,
                });
            }
            Classification::Hidden => {
                context.hidden_count += 1;
                let item = process_hidden(&mut entry, &context, &extractor);
                hidden.push(item);
            }
        }
    }

    Ok(ScanReport {
        session_id,
        started_at,
        duration_ms: start.elapsed().as_millis() as u64,
        source: info,
        live_root: context.live_root.clone(),
        extraction_root: context.extraction_root.clone(),
        records_scanned,
        hidden_count: context.hidden_count,
        hidden,
        indeterminate,
    })
}

/// Materialize and extract one hidden record. Failures are captured in
/// the returned item, never propagated.
fn process_hidden(
    entry: &mut WalkEntry,
    context: &ScanContext,
    extractor: &ContentExtractor,
) -> HiddenItem {
    let record = &entry.record;
    let live_path = context.live_root.join(record.relative_path());
    tracing::info!("Hidden: {} ({})", live_path.display(), record.record_id);

    let mut item = HiddenItem {
        live_path,
        record_id: record.record_id,
        entry_type: record.entry_type,
        created_dir: None,
        extraction: None,
    };

    let dest_parent = context.extraction_root.join(&record.parent_path);
    let dest = dest_parent.join(&record.name);

    match record.entry_type {
        EntryType::Directory => match ensure_dir(&dest) {
            Ok(()) => {
                tracing::info!("Created: {}", dest.display());
                item.created_dir = Some(dest);
            }
            Err(err) => {
                tracing::warn!("{}", err);
                item.extraction = Some(failed_extraction(dest, err.to_string()));
            }
        },
        EntryType::RegularFile => {
            if let Err(err) = ensure_dir(&dest_parent) {
                tracing::warn!("{}", err);
                item.extraction = Some(failed_extraction(dest, err.to_string()));
                return item;
            }
            item.extraction = Some(extract_file(entry, &dest, extractor));
        }
        // The filter admits only files and directories
        _ => {}
    }

    item
}

fn extract_file(entry: &mut WalkEntry, dest: &Path, extractor: &ContentExtractor) -> ExtractionResult {
    let content = match entry.content.as_mut() {
        Some(content) => content,
        None => {
            tracing::warn!("No content handle for {}", dest.display());
            return failed_extraction(dest.to_path_buf(), "source provided no content handle".into());
        }
    };

    let (bytes_written, skipped_existing) = match extractor.extract(content.as_mut(), dest) {
        Ok(outcome) => outcome,
        Err(err) => {
            // Fatal for this record only
            tracing::warn!("{}", err);
            return failed_extraction(dest.to_path_buf(), err.to_string());
        }
    };

    // Digest the destination as extracted; under Append this covers
    // content accumulated across runs
    match digest::digest_file(dest) {
        Ok(digests) => {
            tracing::info!(
                "Extracted: {} | MD5={} SHA1={}",
                dest.display(),
                digests.md5,
                digests.sha1
            );
            ExtractionResult {
                extracted_path: dest.to_path_buf(),
                bytes_written,
                skipped_existing,
                digests: Some(digests),
                error: None,
            }
        }
        Err(err) => {
            tracing::warn!("Failed to calculate hashes: {}: {}", dest.display(), err);
            ExtractionResult {
                extracted_path: dest.to_path_buf(),
                bytes_written,
                skipped_existing,
                digests: None,
                error: Some(format!("digest failed: {err}")),
            }
        }
    }
}

fn failed_extraction(path: PathBuf, error: String) -> ExtractionResult {
    ExtractionResult {
        extracted_path: path,
        bytes_written: 0,
        skipped_existing: false,
        digests: None,
        error: Some(error),
    }
}
