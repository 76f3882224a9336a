//! # CLI Module
//!
//! Command-line interface for the catch log.
//!
//! ## Usage
//! ```bash
//! # Add a photo, naming the lake it was taken at
//! fishlog ingest catch.jpg --location "Lake Minnetonka" --species Walleye
//!
//! # Find new catches in a camera roll export and add them
//! fishlog scan ~/Pictures/2024 --import
//!
//! # List the log as JSON
//! fishlog list --output json
//!
//! # Offline, with a stricter duplicate threshold
//! fishlog --offline --threshold 4 ingest catch.jpg
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use fishlog::core::catalog::{Catalog, LibraryLayout, PhotoRecord};
use fishlog::core::classifier::{AcceptAllClassifier, SpeciesClassifier};
use fishlog::core::geocode::{Geocoder, NoopGeocoder, NominatimGeocoder};
use fishlog::core::pipeline::{import_scanned, ImportSummary, IngestOutcome, IngestPipeline, IngestRequest};
use fishlog::core::scanner::{BatchScanner, DirectorySource, SourceConfig};
use fishlog::error::{FishlogError, Result, ScanError};
use fishlog::events::{Event, event_channel, EventReceiver, ScanEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// User agent sent to the geocoding service
const USER_AGENT: &str = concat!("fishlog/", env!("CARGO_PKG_VERSION"));

/// Fishlog - A catch log that never keeps the same photo twice
#[derive(Parser, Debug)]
#[command(name = "fishlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Library directory holding the catalog and photo blobs
    #[arg(long, global = true, env = "FISHLOG_LIBRARY")]
    library: Option<PathBuf>,

    /// Never contact the geocoding service
    #[arg(long, global = true)]
    offline: bool,

    /// Seconds to wait for each geocoding lookup
    #[arg(long, global = true, default_value = "5")]
    geocode_timeout: u64,

    /// Comparison threshold (lower = stricter, 0-64)
    #[arg(short, long, global = true, default_value = "10")]
    threshold: u32,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add photos to the log
    Ingest {
        /// Photo files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Where the photos were taken; geocoded when they carry no GPS data
        #[arg(short, long)]
        location: Option<String>,

        /// Species caught
        #[arg(short, long)]
        species: Option<String>,

        /// Add photos even if they duplicate existing ones
        #[arg(long)]
        force: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Find new catches in a directory
    Scan {
        /// Directory to scan
        path: PathBuf,

        /// Add the photos found to the log
        #[arg(long)]
        import: bool,

        /// Species label for every photo found
        #[arg(short, long)]
        species: Option<String>,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// List the photos in the log
    List {
        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Remove a photo and its stored file
    Delete {
        /// Photo id
        id: Uuid,
    },

    /// Correct the species of a photo
    SetSpecies {
        /// Photo id
        id: Uuid,

        /// New species name
        species: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Options shared by every command
struct Context {
    layout: LibraryLayout,
    geocoder: Arc<dyn Geocoder>,
    geocode_timeout: Duration,
    threshold: u32,
    verbose: bool,
}

impl Context {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let root = cli.library.clone().unwrap_or_else(default_library);
        let geocoder: Arc<dyn Geocoder> = if cli.offline {
            Arc::new(NoopGeocoder)
        } else {
            Arc::new(NominatimGeocoder::new(USER_AGENT)?)
        };

        Ok(Self {
            layout: LibraryLayout::new(root),
            geocoder,
            geocode_timeout: Duration::from_secs(cli.geocode_timeout),
            threshold: cli.threshold,
            verbose: cli.verbose,
        })
    }

    fn pipeline(&self) -> Result<IngestPipeline> {
        IngestPipeline::builder()
            .blob_store(self.layout.blob_store())
            .geocoder(Arc::clone(&self.geocoder))
            .geocode_timeout(self.geocode_timeout)
            .threshold(self.threshold)
            .build()
    }

    fn catalog(&self) -> Result<Catalog> {
        Ok(self.layout.open()?)
    }
}

fn default_library() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fishlog")
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Commands::Ingest {
            files,
            location,
            species,
            force,
            output,
        } => run_ingest(&ctx, files, location, species, force, output).await,
        Commands::Scan {
            path,
            import,
            species,
            include_hidden,
            output,
        } => run_scan(&ctx, &path, import, species, include_hidden, output).await,
        Commands::List { output } => run_list(&ctx, output),
        Commands::Delete { id } => run_delete(&ctx, id),
        Commands::SetSpecies { id, species } => run_set_species(&ctx, id, &species),
    }
}

async fn run_ingest(
    ctx: &Context,
    files: Vec<PathBuf>,
    location: Option<String>,
    species: Option<String>,
    force: bool,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();
    let pipeline = ctx.pipeline()?;
    let mut catalog = ctx.catalog()?;
    let mut outcomes = Vec::new();

    for file in files {
        let bytes = std::fs::read(&file).map_err(|source| ScanError::ReadItem {
            path: file.clone(),
            source,
        })?;

        let mut request = IngestRequest::new(bytes).force(force);
        if let Some(ref location) = location {
            request = request.location(location.clone());
        }
        if let Some(ref species) = species {
            request = request.species(species.clone());
        }

        let outcome = pipeline.ingest_into(request, &mut catalog).await?;
        if matches!(output, OutputFormat::Pretty) {
            print_outcome(&term, &file, &outcome);
        }
        outcomes.push((file, outcome));
    }

    if matches!(output, OutputFormat::Json) {
        let json: Vec<_> = outcomes
            .iter()
            .map(|(file, outcome)| outcome_json(file, outcome))
            .collect();
        print_json(&json)?;
    }
    Ok(())
}

fn print_outcome(term: &Term, file: &Path, outcome: &IngestOutcome) {
    let name = file.display();
    match outcome {
        IngestOutcome::Added(record) => {
            term.write_line(&format!(
                "{} {} added as {}",
                style("✓").green().bold(),
                name,
                style(record.id).cyan()
            ))
            .ok();
            term.write_line(&format!(
                "    {} at {}, {}",
                record.species,
                record.location,
                style(record.timestamp.format("%Y-%m-%d %H:%M")).dim()
            ))
            .ok();
        }
        IngestOutcome::Duplicate(verdict) => {
            let matched = verdict
                .matched
                .as_ref()
                .map(|r| r.id.to_string())
                .unwrap_or_default();
            term.write_line(&format!(
                "{} {} is already logged as {} ({}, distance {})",
                style("≈").yellow().bold(),
                name,
                style(matched).cyan(),
                verdict.match_type,
                verdict.distance.unwrap_or_default()
            ))
            .ok();
        }
        IngestOutcome::Undecodable { reason } => {
            term.write_line(&format!(
                "{} {} is not a readable image: {}",
                style("✗").red().bold(),
                name,
                reason
            ))
            .ok();
        }
    }
}

fn outcome_json(file: &Path, outcome: &IngestOutcome) -> serde_json::Value {
    match outcome {
        IngestOutcome::Added(record) => serde_json::json!({
            "file": file,
            "status": "added",
            "record": record,
        }),
        IngestOutcome::Duplicate(verdict) => serde_json::json!({
            "file": file,
            "status": "duplicate",
            "matched_id": verdict.matched.as_ref().map(|r| r.id),
            "distance": verdict.distance,
            "match_type": verdict.match_type.to_string(),
        }),
        IngestOutcome::Undecodable { reason } => serde_json::json!({
            "file": file,
            "status": "undecodable",
            "reason": reason,
        }),
    }
}

async fn run_scan(
    ctx: &Context,
    path: &Path,
    import: bool,
    species: Option<String>,
    include_hidden: bool,
    output: OutputFormat,
) -> Result<()> {
    let term = Term::stderr();
    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Fishlog").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let config = SourceConfig {
        include_hidden,
        ..SourceConfig::default()
    };
    let source = DirectorySource::open(path, &config)?;

    let (sender, receiver) = event_channel();
    let scanner = BatchScanner::builder()
        .geocoder(Arc::clone(&ctx.geocoder))
        .geocode_timeout(ctx.geocode_timeout)
        .threshold(ctx.threshold)
        .events(sender)
        .build()?;

    let classifier: Arc<dyn SpeciesClassifier> = match species {
        Some(label) => Arc::new(AcceptAllClassifier::labelled(&label)),
        None => Arc::new(AcceptAllClassifier::new()),
    };

    let show_progress = matches!(output, OutputFormat::Pretty);
    let event_thread = spawn_progress(receiver, show_progress, ctx.verbose);

    let scan = scanner.scan(source, classifier);
    let progress = scan.progress();
    let photos = scan.collect_all().await;

    // Drop the scanner so its sender closes and the event thread ends
    drop(scanner);
    event_thread.join().ok();

    let summary = if import {
        let pipeline = ctx.pipeline()?;
        let mut catalog = ctx.catalog()?;
        Some(import_scanned(&pipeline, &mut catalog, photos.clone()).await?)
    } else {
        None
    };

    match output {
        OutputFormat::Pretty => {
            term.write_line(&format!(
                "{} Scan Complete",
                style("✓").green().bold()
            ))
            .ok();
            term.write_line(&format!(
                "  {} files processed, {} new catches",
                style(progress.processed()).cyan(),
                style(photos.len()).cyan()
            ))
            .ok();
            if ctx.verbose {
                for photo in &photos {
                    term.write_line(&format!("    {}", describe(&photo.record)))
                        .ok();
                }
            }
            if let Some(ref summary) = summary {
                print_import_summary(&term, summary);
            } else if !photos.is_empty() {
                term.write_line(&format!(
                    "{}",
                    style("Nothing was added. Run again with --import to add them.").dim()
                ))
                .ok();
            }
        }
        OutputFormat::Json => {
            let records: Vec<&PhotoRecord> = photos.iter().map(|p| &p.record).collect();
            print_json(&serde_json::json!({
                "processed": progress.processed(),
                "found": records,
                "import": summary,
            }))?;
        }
    }
    Ok(())
}

/// Drive a progress bar from scan events on a separate thread
fn spawn_progress(
    receiver: EventReceiver,
    show: bool,
    verbose: bool,
) -> thread::JoinHandle<()> {
    let bar = if show {
        let pb = ProgressBar::new(0);
        let bar_style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(bar_style);
        Some(pb)
    } else {
        None
    };

    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = bar else { continue };
            match event {
                Event::Scan(ScanEvent::Started { total }) => pb.set_length(total as u64),
                Event::Scan(ScanEvent::Progress(p)) => pb.set_position(p.processed as u64),
                Event::Scan(ScanEvent::Skipped { index, reason }) if verbose => {
                    pb.println(format!("  skipped item {}: {}", index, reason));
                }
                Event::Scan(ScanEvent::Completed { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
    })
}

fn print_import_summary(term: &Term, summary: &ImportSummary) {
    term.write_line(&format!(
        "  {} added, {} already logged",
        style(summary.imported.len()).green(),
        style(summary.duplicates).yellow()
    ))
    .ok();
    if summary.failed > 0 || summary.undecodable > 0 {
        term.write_line(&format!(
            "  {} could not be stored, {} unreadable",
            style(summary.failed).red(),
            style(summary.undecodable).red()
        ))
        .ok();
    }
}

fn run_list(ctx: &Context, output: OutputFormat) -> Result<()> {
    let catalog = ctx.catalog()?;
    let mut records: Vec<&PhotoRecord> = catalog.records().iter().collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    match output {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Pretty => {
            let term = Term::stdout();
            if records.is_empty() {
                term.write_line("No catches logged yet.").ok();
            }
            for record in records {
                term.write_line(&describe(record)).ok();
            }
        }
    }
    Ok(())
}

fn describe(record: &PhotoRecord) -> String {
    let position = record
        .coordinates()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    format!(
        "{}  {}  {}  {}{}",
        style(record.id).dim(),
        record.timestamp.format("%Y-%m-%d"),
        style(&record.species).bold(),
        record.location,
        position
    )
}

fn run_delete(ctx: &Context, id: Uuid) -> Result<()> {
    let mut catalog = ctx.catalog()?;
    let removed = catalog.delete(id)?;
    Term::stderr()
        .write_line(&format!(
            "{} Deleted {} ({})",
            style("✓").green().bold(),
            removed.id,
            removed.species
        ))
        .ok();
    Ok(())
}

fn run_set_species(ctx: &Context, id: Uuid, species: &str) -> Result<()> {
    let mut catalog = ctx.catalog()?;
    let record = catalog.update_species(id, species)?;
    Term::stderr()
        .write_line(&format!(
            "{} {} is now {}",
            style("✓").green().bold(),
            record.id,
            style(&record.species).bold()
        ))
        .ok();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| FishlogError::Config(format!("Could not format output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
