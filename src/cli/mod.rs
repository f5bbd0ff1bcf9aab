//! # CLI Module
//!
//! Command-line interface for the board image hashing engine.
//!
//! ## Usage
//! ```bash
//! # Hash a file with every stored algorithm
//! board-hash hash upload.png
//!
//! # Register uploads under the storage root
//! board-hash --storage-root /srv/board ingest src/2024
//!
//! # Compare two stored images
//! board-hash compare 12 40 --output json
//!
//! # Rehash the oldest pending page, or one image
//! board-hash rehash
//! board-hash rehash --image 12
//! ```

use board_hasher::core::comparator::{hamming_distance, Comparator, ComparisonResult, ScoringMode};
use board_hasher::core::hasher::{HashAlgorithmKind, HashParams, ImageHasher};
use board_hasher::core::ingest::{IngestReport, Ingestor};
use board_hasher::core::record::{ImageHashes, ImageId};
use board_hasher::core::rehash::{RehashConfig, RehashJob, RehashMode, RehashRun};
use board_hasher::core::store::SqliteStore;
use board_hasher::error::{BoardHashError, HashError, Result};
use board_hasher::events::{Event, EventChannel, EventReceiver, IngestEvent, RehashEvent};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread;

/// Board Hasher - perceptual fingerprints for moderator review
#[derive(Parser, Debug)]
#[command(name = "board-hash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory stored image paths are relative to
    #[arg(long, global = true, default_value = ".")]
    storage_root: PathBuf,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash an image file
    Hash {
        file: PathBuf,

        /// Single algorithm to run (default: the stored aHash/dHash/pHash bundle)
        #[arg(short, long)]
        algorithm: Option<Algorithm>,
    },

    /// Hamming distance between two hex hashes
    Distance { hash_a: String, hash_b: String },

    /// Register and hash uploads (files or directories under the storage root)
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Compare two stored images
    Compare {
        image_a: ImageId,
        image_b: ImageId,

        #[arg(long, default_value = "legacy")]
        scoring: Scoring,
    },

    /// Recompute stored hashes from the original uploads
    Rehash {
        /// Rehash a single image instead of the oldest pending page
        #[arg(long)]
        image: Option<ImageId>,

        /// Images per batch
        #[arg(long, default_value = "10")]
        batch_size: usize,
    },

    /// List images sharing pHash blocks with an image, scored
    Candidates {
        image: ImageId,

        /// Minimum number of equal block slices
        #[arg(long, default_value = "8")]
        min_blocks: usize,

        #[arg(long, default_value = "legacy")]
        scoring: Scoring,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    /// Average Hash - mean-thresholded samples
    Average,
    /// Difference Hash - horizontal gradients
    Difference,
    /// Perceptual Hash - low DCT frequencies
    Perceptual,
    /// Structural block hash - one hash per region
    Structural,
}

impl From<Algorithm> for HashAlgorithmKind {
    fn from(algo: Algorithm) -> Self {
        match algo {
            Algorithm::Average => HashAlgorithmKind::Average,
            Algorithm::Difference => HashAlgorithmKind::Difference,
            Algorithm::Perceptual => HashAlgorithmKind::Perceptual,
            Algorithm::Structural => HashAlgorithmKind::StructuralBlock,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scoring {
    /// The formula moderators are used to
    Legacy,
    /// Differing bits over all 768 hash bits
    Normalized,
}

impl From<Scoring> for ScoringMode {
    fn from(scoring: Scoring) -> Self {
        match scoring {
            Scoring::Legacy => ScoringMode::Legacy,
            Scoring::Normalized => ScoringMode::Normalized,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let term = Term::stdout();

    match cli.command {
        Commands::Hash { file, algorithm } => run_hash(&term, &file, algorithm, cli.output),
        Commands::Distance { hash_a, hash_b } => {
            let distance = hamming_distance(&hash_a, &hash_b)?;
            match cli.output {
                OutputFormat::Pretty => println!("{distance}"),
                OutputFormat::Json => print_json(&serde_json::json!({ "distance": distance }))?,
            }
            Ok(())
        }
        Commands::Ingest { paths } => {
            check_storage_root(&cli.storage_root)?;
            let store = open_store(cli.db)?;
            let hasher = ImageHasher::default();
            let ingestor = Ingestor::new(&store, &hasher, cli.storage_root);

            let (sender, receiver) = EventChannel::new();
            let progress = spawn_progress(receiver, cli.output);
            let report = ingestor.ingest_paths_with_events(&paths, &sender);
            drop(sender);
            progress.join().ok();

            let report = report?;
            match cli.output {
                OutputFormat::Pretty => print_ingest(&term, &report),
                OutputFormat::Json => print_json(&report)?,
            }
            Ok(())
        }
        Commands::Compare {
            image_a,
            image_b,
            scoring,
        } => {
            let store = open_store(cli.db)?;
            let result = Comparator::new(&store, scoring.into()).compare(image_a, image_b)?;
            match cli.output {
                OutputFormat::Pretty => print_comparison(&term, &result),
                OutputFormat::Json => print_json(&result)?,
            }
            Ok(())
        }
        Commands::Rehash { image, batch_size } => {
            if batch_size == 0 {
                return Err(BoardHashError::Config(
                    "--batch-size must be at least 1".to_string(),
                ));
            }
            check_storage_root(&cli.storage_root)?;
            let store = open_store(cli.db)?;
            let hasher = ImageHasher::default();
            let config = RehashConfig::new(cli.storage_root).batch_size(batch_size);
            let job = RehashJob::new(&store, &hasher, config);
            let mode = image.map_or(RehashMode::Batch, RehashMode::Single);

            let (sender, receiver) = EventChannel::new();
            let progress = spawn_progress(receiver, cli.output);
            let run = job.run_with_events(mode, &sender);
            drop(sender);
            progress.join().ok();

            let run = run?;
            match cli.output {
                OutputFormat::Pretty => print_rehash(&term, &run),
                OutputFormat::Json => print_json(&run)?,
            }
            Ok(())
        }
        Commands::Candidates {
            image,
            min_blocks,
            scoring,
        } => {
            let store = open_store(cli.db)?;
            let results =
                Comparator::new(&store, scoring.into()).compare_candidates(image, min_blocks)?;
            match cli.output {
                OutputFormat::Pretty => {
                    if results.is_empty() {
                        term.write_line(&format!(
                            "{} No images share {} or more blocks with {}",
                            style("○").dim(),
                            min_blocks,
                            image
                        ))
                        .ok();
                    }
                    for result in &results {
                        print_comparison(&term, result);
                    }
                }
                OutputFormat::Json => print_json(&results)?,
            }
            Ok(())
        }
    }
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore> {
    let db_path = db.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("board-hasher")
            .join("board.db")
    });
    Ok(SqliteStore::open(&db_path)?)
}

fn check_storage_root(storage_root: &Path) -> Result<()> {
    if !storage_root.is_dir() {
        return Err(BoardHashError::Config(format!(
            "storage root {} is not a directory",
            storage_root.display()
        )));
    }
    Ok(())
}

fn run_hash(
    term: &Term,
    file: &Path,
    algorithm: Option<Algorithm>,
    output: OutputFormat,
) -> Result<()> {
    let bytes = std::fs::read(file).map_err(|source| HashError::IoError {
        path: file.to_path_buf(),
        source,
    })?;
    let params = HashParams::new();

    let Some(algorithm) = algorithm else {
        let hashes = ImageHasher::new(params).fingerprint(&bytes)?;
        match output {
            OutputFormat::Pretty => print_hashes(term, &hashes),
            OutputFormat::Json => print_json(&hashes)?,
        }
        return Ok(());
    };

    let kind = HashAlgorithmKind::from(algorithm);
    let fingerprint = params.build(kind).hash_bytes(&bytes)?;
    match output {
        OutputFormat::Pretty => {
            term.write_line(&format!("{}", style(kind.description()).dim()))
                .ok();
            for hash in fingerprint.hashes() {
                term.write_line(hash).ok();
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "algorithm": kind,
            "fingerprint": fingerprint,
        }))?,
    }
    Ok(())
}

/// Render progress events until the sender side is dropped
fn spawn_progress(receiver: EventReceiver, output: OutputFormat) -> thread::JoinHandle<()> {
    let progress = matches!(output, OutputFormat::Pretty).then(|| {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    });

    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress else {
                continue;
            };
            match event {
                Event::Rehash(RehashEvent::Started { targets, .. }) => {
                    pb.set_length(targets as u64);
                    pb.set_message("rehashing");
                }
                Event::Ingest(IngestEvent::Started { total_files }) => {
                    pb.set_length(total_files as u64);
                    pb.set_message("hashing uploads");
                }
                Event::Rehash(RehashEvent::ImageHashed { .. })
                | Event::Rehash(RehashEvent::ImageSkipped { .. })
                | Event::Ingest(IngestEvent::ImageRegistered { .. })
                | Event::Ingest(IngestEvent::FileRejected { .. }) => pb.inc(1),
                Event::Rehash(RehashEvent::Completed { .. })
                | Event::Ingest(IngestEvent::Completed { .. }) => pb.finish_and_clear(),
            }
        }
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_hashes(term: &Term, hashes: &ImageHashes) {
    term.write_line(&format!("{} {}", style("aHash").bold(), hashes.ahash))
        .ok();
    term.write_line(&format!("{} {}", style("dHash").bold(), hashes.dhash))
        .ok();
    term.write_line(&format!("{} {}", style("pHash").bold(), hashes.phash))
        .ok();
    let blocks: Vec<&str> = hashes.phash_blocks.iter().collect();
    term.write_line(&format!("{}", style(blocks.join(" ")).dim()))
        .ok();
}

fn print_comparison(term: &Term, result: &ComparisonResult) {
    let percent = result.similarity_percent;
    let styled = match percent {
        90..=100 => style(format!("{percent}%")).red().bold(),
        60..=89 => style(format!("{percent}%")).yellow(),
        _ => style(format!("{percent}%")).green(),
    };

    term.write_line(&format!(
        "{} {} vs {}  {}",
        style("Images").bold(),
        result.image_a,
        result.image_b,
        styled
    ))
    .ok();
    term.write_line(&format!(
        "  aHash {}  dHash {}  pHash (block mean) {}",
        style(result.ahash_distance).cyan(),
        style(result.dhash_distance).cyan(),
        style(result.phash_distance).cyan()
    ))
    .ok();
    if result.scoring == ScoringMode::Legacy {
        term.write_line(&format!(
            "  {}",
            style("Legacy score: for moderator review only").dim()
        ))
        .ok();
    }
}

fn print_ingest(term: &Term, report: &IngestReport) {
    term.write_line(&format!(
        "{} Registered {} image(s)",
        style("✓").green().bold(),
        style(report.registered.len()).cyan()
    ))
    .ok();
    for (image_id, path) in &report.registered {
        term.write_line(&format!("  {:>6}  {}", image_id, path.display()))
            .ok();
    }
    for rejected in &report.rejected {
        term.write_line(&format!(
            "  {} {} ({})",
            style("✗").red(),
            rejected.path.display(),
            style(&rejected.reason).dim()
        ))
        .ok();
    }
}

fn print_rehash(term: &Term, run: &RehashRun) {
    if let (RehashMode::Single(_), Some(reason)) = (run.mode, run.failure_reason()) {
        term.write_line(&format!("{} {}", style("✗").red().bold(), reason))
            .ok();
        return;
    }

    term.write_line(&format!(
        "{} Rehashed {} of {} image(s)",
        style("✓").green().bold(),
        style(run.processed.len()).cyan(),
        run.targets
    ))
    .ok();
    if !run.processed.is_empty() {
        let ids: Vec<String> = run.processed.iter().map(ToString::to_string).collect();
        term.write_line(&format!("  {}", ids.join(", "))).ok();
    }
    for skipped in &run.skipped {
        term.write_line(&format!(
            "  {} {} skipped: {}",
            style("○").dim(),
            skipped.image_id,
            skipped.reason
        ))
        .ok();
    }
    if run.stalled() {
        term.write_line(&format!(
            "{} Every selected image was skipped. Later batches will pick the same images \
             until their originals are restored or their rows are deleted.",
            style("!").yellow().bold()
        ))
        .ok();
    }
}
