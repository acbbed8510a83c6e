use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use screenplay_loader::chunk::chunk_units;
use screenplay_loader::{db, LayoutTextSource, LoaderConfig, OutputUnit, ScriptLoader, Settings};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "screenplay_loader", about = "Screenplay layout parser")]
struct Cli {
    /// TOML settings file (SCREENPLAY_* environment variables override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SourceArgs {
    /// Layout text of the script (pages separated by form feeds)
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// First page to parse (pages are numbered from 0)
    #[arg(long)]
    start_page: Option<u32>,
    /// Last page to parse
    #[arg(long)]
    end_page: Option<u32>,
    /// Log lines that match no margin
    #[arg(long)]
    show_unmatched: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print scene-description and dialog units as JSON lines
    Parse {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print retrieval chunks as JSON lines
    Chunk {
        #[command(flatten)]
        source: SourceArgs,
        /// Soft chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Characters carried over between chunks
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Parse, chunk and store in SQLite
    Save {
        #[command(flatten)]
        source: SourceArgs,
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show stored counts for a source
    Stats {
        /// Database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Source identifier (default: configured source)
        #[arg(short, long)]
        source: Option<String>,
        /// Max characters to list
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Parse { source } => {
            let units = load_units(&mut settings, &source)?;
            write_json_lines(&units)
        }
        Commands::Chunk {
            source,
            chunk_size,
            overlap,
        } => {
            if let Some(size) = chunk_size {
                settings.chunking.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                settings.chunking.overlap = overlap;
            }
            let units = load_units(&mut settings, &source)?;
            let chunks = chunk_units(&units, &settings.chunking, &settings.loader.source);
            write_json_lines(&chunks)
        }
        Commands::Save { source, db: db_path } => {
            let units = load_units(&mut settings, &source)?;
            let chunks = chunk_units(&units, &settings.chunking, &settings.loader.source);
            let conn = db::connect(db_path.as_deref().unwrap_or(settings.db_path.as_path()))?;
            db::init_schema(&conn)?;
            let saved_units = db::save_units(&conn, &settings.loader.source, &units)?;
            let saved_chunks = db::save_chunks(&conn, &chunks)?;
            println!("Saved {} units and {} chunks.", saved_units, saved_chunks);
            Ok(())
        }
        Commands::Stats {
            db: db_path,
            source,
            limit,
        } => {
            let conn = db::connect(db_path.as_deref().unwrap_or(settings.db_path.as_path()))?;
            db::init_schema(&conn)?;
            let source = source.unwrap_or_else(|| settings.loader.source.clone());
            let s = db::get_stats(&conn, &source)?;
            println!("Source:             {}", source);
            println!("Scene descriptions: {}", s.scene_descriptions);
            println!("Dialog:             {}", s.dialog);
            println!("Characters:         {}", s.characters);
            println!("Locations:          {}", s.locations);
            println!("Distinct scenes:    {}", s.scenes);
            println!("Chunks:             {}", s.chunks);

            let rows = db::character_lines(&conn, &source, limit)?;
            if !rows.is_empty() {
                println!(
                    "\n{:>3} | {:<24} | {:>5} | {:>10}",
                    "#", "Character", "Lines", "First page"
                );
                println!("{}", "-".repeat(52));
                for (i, r) in rows.iter().enumerate() {
                    println!(
                        "{:>3} | {:<24} | {:>5} | {:>10}",
                        i + 1,
                        truncate(&r.character, 24),
                        r.lines,
                        r.first_page
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Run the parser over the selected input with a progress bar.
fn load_units(settings: &mut Settings, args: &SourceArgs) -> anyhow::Result<Vec<OutputUnit>> {
    let input = apply_source_args(&mut settings.loader, args);
    let script = ScriptLoader::new(settings.loader.clone())?;
    let source = LayoutTextSource::new(input);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let units = script
        .load_with(&source, script.unmatched_sink(), &pb)
        .with_context(|| format!("Failed to load {}", source.path().display()))?;
    info!(units = units.len(), "parsed script");
    Ok(units)
}

/// Fold command-line overrides into `loader` and return the path to read.
///
/// `--input` is read as given; the configured source only receives a lossy label of it.
fn apply_source_args(loader: &mut LoaderConfig, args: &SourceArgs) -> PathBuf {
    let input = match &args.input {
        Some(input) => {
            loader.source = input.to_string_lossy().into_owned();
            input.clone()
        }
        None => PathBuf::from(&loader.source),
    };
    if args.start_page.is_some() {
        loader.start_page = args.start_page;
    }
    if args.end_page.is_some() {
        loader.end_page = args.end_page;
    }
    loader.show_unmatched |= args.show_unmatched;
    input
}

fn write_json_lines<T: Serialize>(items: &[T]) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
