use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use veilscan_core::{scan_mounted, ScanConfig, ScanReport, SparsePolicy, WritePolicy};

#[derive(Parser, Debug)]
#[command(
    name = "veilscan",
    version,
    about = "Detect and extract files hidden from the live directory listing"
)]
struct Cli {
    /// Trusted metadata view of the volume (e.g. an independent read-only mount)
    source: PathBuf,
    /// Live mount point of the same volume
    mount_point: PathBuf,
    /// Directory where hidden artifacts are extracted
    extract_dir: PathBuf,

    /// What to do when a destination file already exists
    #[arg(long, value_enum, default_value_t = WriteMode::Overwrite)]
    write_mode: WriteMode,
    /// Copy null bytes verbatim instead of compacting them out
    #[arg(long)]
    keep_nulls: bool,
    /// Path prefixes to skip (path-segment match); defaults to "run"
    #[arg(long = "ignore-prefix")]
    ignore_prefixes: Vec<PathBuf>,
    /// Write the full scan report as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WriteMode {
    Overwrite,
    Append,
    SkipIfExists,
}

impl From<WriteMode> for WritePolicy {
    fn from(mode: WriteMode) -> Self {
        match mode {
            WriteMode::Overwrite => WritePolicy::Overwrite,
            WriteMode::Append => WritePolicy::Append,
            WriteMode::SkipIfExists => WritePolicy::SkipIfExists,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(hidden_count) => {
            // Exit status carries the finding count, capped to the
            // platform's exit-code width
            ExitCode::from(hidden_count.min(u8::MAX as u64) as u8)
        }
        Err(err) => {
            eprintln!("veilscan: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<u64> {
    warn_if_not_root();

    let mut config = ScanConfig {
        write_policy: cli.write_mode.into(),
        sparse_policy: if cli.keep_nulls {
            SparsePolicy::Preserve
        } else {
            SparsePolicy::Compact
        },
        ..ScanConfig::default()
    };
    if !cli.ignore_prefixes.is_empty() {
        config.filter.ignored_prefixes = cli.ignore_prefixes.clone();
    }

    let report = scan_mounted(&cli.source, &cli.mount_point, &cli.extract_dir, &config)
        .with_context(|| format!("scan of {} failed", cli.source.display()))?;

    print_report(&report);

    if let Some(json_path) = &cli.json {
        let file = std::fs::File::create(json_path)
            .with_context(|| format!("failed to create {}", json_path.display()))?;
        serde_json::to_writer_pretty(file, &report)?;
        println!("Report written to: {}", json_path.display());
    }

    Ok(report.hidden_count)
}

fn print_report(report: &ScanReport) {
    let size = report
        .source
        .total_bytes
        .map(|bytes| format!(" ({}MB)", bytes / 1_000_000))
        .unwrap_or_default();
    let filesystem = report.source.filesystem.as_deref().unwrap_or("auto");
    println!(
        "{}{} -> {} ({} records)",
        report.source.description, size, filesystem, report.records_scanned
    );

    for item in &report.indeterminate {
        println!("Failed to open directory: {}", item.live_path.display());
    }

    for item in &report.hidden {
        println!("Hidden: {} ({})", item.live_path.display(), item.record_id);
        if let Some(dir) = &item.created_dir {
            println!("Created: {}", dir.display());
        }
        if let Some(extraction) = &item.extraction {
            match (&extraction.digests, &extraction.error) {
                (Some(digests), _) => println!(
                    "Extracted: {} | MD5={} SHA1={}",
                    extraction.extracted_path.display(),
                    digests.md5,
                    digests.sha1
                ),
                (None, Some(error)) => println!(
                    "Failed to extract: {} ({})",
                    extraction.extracted_path.display(),
                    error
                ),
                (None, None) => {}
            }
        }
    }

    if report.hidden_count > 0 {
        println!(
            "{} hidden file(s) found\nExtracted to: {}",
            report.hidden_count,
            report.extraction_root.display()
        );
    } else {
        println!("No hidden files found");
    }
}

/// Both views are normally readable only by root when scanning a real
/// volume; this is advisory since scanning copies does not need it.
fn warn_if_not_root() {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::fs::MetadataExt;
        // /proc/self is owned by the effective uid
        if let Ok(meta) = std::fs::metadata("/proc/self") {
            if meta.uid() != 0 {
                tracing::warn!("not running as root; parts of the live view may be unreadable");
            }
        }
    }
}
