use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use doc_review::extraction::{OcrEngine, TesseractCli};
use doc_review::review::ExportArtifact;
use doc_review::{ExportFormat, ExtractionPipeline, LazyAnalyzer, ReviewConfig, ReviewError, Reviewer};

#[derive(Debug, Parser)]
#[command(author, version, about = "Summarize documents and flag risky clauses before signing")]
struct Cli {
    /// Path to configuration JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract text from a PDF, DOCX or image and print a preview
    Extract(ExtractArgs),
    /// Extract and analyze a document, printing the report as JSON
    Analyze(FileArgs),
    /// Analyze raw text from a file or stdin (`-`)
    AnalyzeText(TextArgs),
    /// Analyze a document and write a summary, annotated text or HTML export
    Export(ExportArgs),
    /// Report whether the OCR tools are installed
    Check,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Document to read
    file: PathBuf,
    /// Print the full text instead of a JSON preview
    #[arg(long)]
    full: bool,
}

#[derive(Debug, Args)]
struct FileArgs {
    /// Document to analyze
    file: PathBuf,
}

#[derive(Debug, Args)]
struct TextArgs {
    /// Text file to analyze, or `-` for stdin
    input: PathBuf,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// Document to analyze
    file: PathBuf,
    /// summary, text or html
    #[arg(long, default_value = "html")]
    format: ExportFormat,
    /// Output file or directory (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    // A missing .env is fine; variables may come from the environment.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<ReviewError>()
                .map(ReviewError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ReviewConfig::load(cli.config.as_deref())?;
    info!("Configuration loaded: {}", config);

    match cli.command {
        Commands::Extract(args) => extract_command(&build_reviewer(&config), args),
        Commands::Analyze(args) => analyze_command(&build_reviewer(&config), args),
        Commands::AnalyzeText(args) => analyze_text_command(&build_reviewer(&config), args),
        Commands::Export(args) => export_command(&build_reviewer(&config), args),
        Commands::Check => check_command(&config),
    }
}

fn build_reviewer(config: &ReviewConfig) -> Reviewer {
    let pipeline = ExtractionPipeline::new(&config.ocr);
    let analyzer = Arc::new(LazyAnalyzer::openai(config.analysis.clone()));
    Reviewer::new(pipeline, analyzer)
}

fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let data = fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    info!("Loaded {:?} ({} bytes)", path, data.len());
    Ok((filename, data))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(io::stdout(), "{}", json)?;
    Ok(())
}

fn extract_command(reviewer: &Reviewer, args: ExtractArgs) -> Result<()> {
    let (filename, data) = read_upload(&args.file)?;

    if args.full {
        let document = reviewer.extract(&filename, data)?;
        writeln!(io::stdout(), "{}", document.text())?;
        return Ok(());
    }

    let preview = reviewer.preview(&filename, data)?;
    print_json(&preview)
}

fn analyze_command(reviewer: &Reviewer, args: FileArgs) -> Result<()> {
    let (filename, data) = read_upload(&args.file)?;
    let report = reviewer.analyze(&filename, data)?;
    print_json(&report)
}

fn analyze_text_command(reviewer: &Reviewer, args: TextArgs) -> Result<()> {
    let text = if args.input.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read text from stdin")?;
        buffer
    } else {
        fs::read_to_string(&args.input)
            .with_context(|| format!("Failed to read text file: {:?}", args.input))?
    };

    let report = reviewer.analyze_text(&text)?;
    print_json(&report)
}

fn export_command(reviewer: &Reviewer, args: ExportArgs) -> Result<()> {
    let (filename, data) = read_upload(&args.file)?;
    let artifact = reviewer.export(&filename, data, args.format)?;
    write_artifact(&artifact, args.output.as_deref())
}

fn write_artifact(artifact: &ExportArtifact, output: Option<&Path>) -> Result<()> {
    let Some(output) = output else {
        io::stdout().write_all(artifact.content.as_bytes())?;
        return Ok(());
    };

    let target = if output.is_dir() {
        output.join(&artifact.filename)
    } else {
        output.to_path_buf()
    };
    fs::write(&target, &artifact.content)
        .with_context(|| format!("Failed to write export: {:?}", target))?;
    info!("Export saved to: {:?}", target);
    Ok(())
}

fn check_command(config: &ReviewConfig) -> Result<()> {
    let tesseract = TesseractCli::from_config(&config.ocr);
    let tesseract_ok = tesseract.is_available();

    let pdftoppm_ok = std::process::Command::new(&config.ocr.pdftoppm_cmd)
        .arg("-v")
        .output()
        .is_ok();

    let mut stdout = io::stdout();
    writeln!(stdout, "tesseract ({}): {}", config.ocr.tesseract_cmd, status(tesseract_ok))?;
    writeln!(stdout, "pdftoppm ({}): {}", config.ocr.pdftoppm_cmd, status(pdftoppm_ok))?;

    if tesseract_ok {
        // A blank page exercises language data loading as well.
        let blank = image::DynamicImage::new_rgb8(32, 32);
        if let Err(e) = tesseract.recognize(&blank) {
            writeln!(stdout, "tesseract test run failed: {}", e)?;
        }
    }

    if tesseract_ok && pdftoppm_ok {
        Ok(())
    } else {
        Err(ReviewError::OcrUnavailable("OCR tools missing".to_string()).into())
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "available"
    } else {
        "not found"
    }
}
