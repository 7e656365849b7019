use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use doc_review::extraction::SUPPORTED_EXTENSIONS;
use doc_review::{ExportFormat, ExtractionPipeline, LazyAnalyzer, ReviewConfig, Reviewer};

#[derive(Debug, Parser)]
#[command(author, version, about = "Review every supported document in a directory")]
struct Args {
    /// Input directory containing PDF, DOCX or image files
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for exports
    #[arg(short, long)]
    output: PathBuf,

    /// summary, text or html
    #[arg(long, default_value = "html")]
    format: ExportFormat,

    /// Number of documents reviewed at once
    #[arg(long, default_value = "4")]
    workers: usize,

    /// Path to configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DocumentRecord {
    source: String,
    export: Option<String>,
    character_count: usize,
    risk_count: usize,
    safety_score: Option<u32>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchMetadata {
    total_documents: usize,
    reviewed: usize,
    failed: usize,
    format: ExportFormat,
    processed_at: u64,
    documents: Vec<DocumentRecord>,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting batch review");
    info!("Input directory: {:?}", args.input);
    info!("Output directory: {:?}", args.output);

    let config = ReviewConfig::load(args.config.as_deref())?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory: {:?}", args.output))?;

    let files = find_documents(&args.input);
    info!("Found {} documents", files.len());

    if files.is_empty() {
        anyhow::bail!("No supported documents found in {:?}", args.input);
    }

    let reviewer = Reviewer::new(
        ExtractionPipeline::new(&config.ocr),
        Arc::new(LazyAnalyzer::openai(config.analysis.clone())),
    );

    let next = AtomicUsize::new(0);
    let records = Mutex::new(Vec::with_capacity(files.len()));
    let workers = args.workers.clamp(1, files.len());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::SeqCst);
                let Some(path) = files.get(idx) else { break };
                info!("Processing {}/{}: {:?}", idx + 1, files.len(), path);

                let record = review_one(&reviewer, path, &args.output, args.format);
                if let Ok(mut records) = records.lock() {
                    records.push((idx, record));
                }
            });
        }
    });

    let mut records = records
        .into_inner()
        .map_err(|_| anyhow::anyhow!("A worker panicked while recording results"))?;
    records.sort_by_key(|(idx, _)| *idx);
    let documents: Vec<DocumentRecord> = records.into_iter().map(|(_, r)| r).collect();

    let failed = documents.iter().filter(|d| d.error.is_some()).count();
    let metadata = BatchMetadata {
        total_documents: documents.len(),
        reviewed: documents.len() - failed,
        failed,
        format: args.format,
        processed_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
        documents,
    };

    let metadata_path = args.output.join("metadata.json");
    let metadata_json = serde_json::to_string_pretty(&metadata)?;
    fs::write(&metadata_path, metadata_json)?;
    info!("Metadata saved to: {:?}", metadata_path);

    info!("Batch review complete!");
    info!("  - Documents: {}", metadata.total_documents);
    info!("  - Reviewed: {}", metadata.reviewed);
    info!("  - Failed: {}", metadata.failed);

    if metadata.reviewed == 0 {
        anyhow::bail!("No documents could be reviewed");
    }
    Ok(())
}

fn find_documents(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn review_one(reviewer: &Reviewer, path: &Path, output: &Path, format: ExportFormat) -> DocumentRecord {
    let source = path.display().to_string();
    let failed = |error: String| DocumentRecord {
        source: source.clone(),
        export: None,
        character_count: 0,
        risk_count: 0,
        safety_score: None,
        error: Some(error),
    };

    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            return failed(e.to_string());
        }
    };
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let report = match reviewer.analyze(filename, data) {
        Ok(report) => report,
        Err(e) => {
            warn!("Failed to review {:?}: {}", path, e);
            return failed(e.to_string());
        }
    };

    let artifact = doc_review::review::render_report(&report, format);
    let export_path = output.join(&artifact.filename);
    if let Err(e) = fs::write(&export_path, &artifact.content) {
        warn!("Failed to write {:?}: {}", export_path, e);
        return failed(e.to_string());
    }

    DocumentRecord {
        source,
        export: Some(artifact.filename),
        character_count: report.char_count,
        risk_count: report.summary.risks.len(),
        safety_score: Some(report.summary.safety_score().value()),
        error: None,
    }
}
