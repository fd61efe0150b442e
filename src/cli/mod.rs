use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use log::warn;
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::{
    config::{Config, IndexConfig},
    extract::{Batch, Extractor},
    http::server::StaticServer,
    playlist,
    storage::{
        cache::ArtworkCache,
        db::{i64_seconds_to_local_time, system_time_to_i64},
        fs::scan_library,
        index::{ExtractionIndex, RunSummary},
    },
};

#[derive(Parser)]
#[command(name = "coverdeck")]
#[command(version = "0.1")]
#[command(about = "Browser playlist with album art for a local music folder")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract cover art and write the playlist and player page into the folder
    Build {
        /// Music folder; asked for interactively when omitted
        folder: Option<PathBuf>,
    },
    /// Build, then host the folder over HTTP
    Serve {
        /// Music folder; asked for interactively when omitted
        folder: Option<PathBuf>,
        /// Port to listen on, overriding the config
        #[arg(short, long)]
        port: Option<u16>,
        /// Serve the folder as it is, without rebuilding
        #[arg(long)]
        no_build: bool,
    },
    /// Show what the last build recorded for the folder
    Status {
        /// Music folder; asked for interactively when omitted
        folder: Option<PathBuf>,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Build { folder } => {
            let folder = folder_or_prompt(folder)?;
            build(&folder, &cfg)?;
        }

        Commands::Serve {
            folder,
            port,
            no_build,
        } => {
            let folder = folder_or_prompt(folder)?;
            if !no_build {
                build(&folder, &cfg)?;
            }
            if let Some(port) = port {
                cfg.http.port = port;
            }

            let server = StaticServer::new(folder, cfg.output.player_page.clone(), cfg.http);
            println!(
                "HTTP server running at http://{}:{}",
                server.config.bind_addr, server.config.port
            );
            server.run();
        }

        Commands::Status { folder } => {
            let folder = folder_or_prompt(folder)?;
            status(&folder, &cfg)?;
        }
    }

    Ok(())
}

/// Scans `folder`, extracts artwork and writes the manifest and player page.
///
/// Per-file problems only cost that file its cover. The build fails when the
/// covers directory or the manifest cannot be written, or when the folder
/// holds no playable files at all.
pub fn build(folder: &Path, cfg: &Config) -> anyhow::Result<Batch> {
    if !folder.is_dir() {
        bail!("directory not found: {}", folder.display());
    }

    let files = scan_library(folder, &cfg.library)
        .with_context(|| format!("failed to scan {}", folder.display()))?;
    println!("Folder: {}", folder.display());
    println!("Found {} audio files", files.len());

    let cache = ArtworkCache::open(folder, &cfg.output.covers_dir)
        .context("failed to create the covers directory")?;
    println!("Extracting artwork into {}/ ...", cfg.output.covers_dir);

    let index = open_index(&cache, &cfg.index);
    let mut extractor = Extractor::new(&cache);
    if let Some(index) = &index {
        extractor = extractor.with_index(index);
    }
    let batch = extractor.run(&files);

    if let Some(index) = &index {
        record_run(index, &batch);
    }

    let manifest = playlist::write_manifest(folder, &cfg.output.manifest, &batch.records)
        .context("failed to write the playlist manifest")?;
    playlist::write_player_page(folder, &cfg.output.player_page, &cfg.output.manifest)
        .context("failed to write the player page")?;

    let stats = &batch.stats;
    println!(
        "Covers: {} of {} files ({} new images, {} without artwork, {} unsupported, {} failed)",
        stats.covers,
        stats.processed,
        cache.stats().written,
        stats.without_artwork,
        stats.unsupported,
        stats.failed
    );
    println!("Wrote {}", manifest.display());

    if batch.records.is_empty() {
        bail!("no playable files found in {}", folder.display());
    }
    println!("Done");
    Ok(batch)
}

fn status(folder: &Path, cfg: &Config) -> anyhow::Result<()> {
    let path = folder
        .join(&cfg.output.covers_dir)
        .join(&cfg.index.file);
    if !path.is_file() {
        println!("No index at {}, run \"build\" first", path.display());
        return Ok(());
    }

    let index = ExtractionIndex::open(&path)?;
    match index.last_run()? {
        Some(run) => println!(
            "Last build {}: {} files, {} covers",
            i64_seconds_to_local_time(run.finished_at)?,
            run.files,
            run.covers
        ),
        None => println!("No build recorded yet"),
    }

    let (total, with_cover) = index.counts()?;
    println!("Index remembers {total} files, {with_cover} with artwork");
    Ok(())
}

/// Opens the freshness index, carrying on without one if that fails.
fn open_index(cache: &ArtworkCache, cfg: &IndexConfig) -> Option<ExtractionIndex> {
    if !cfg.enabled {
        return None;
    }

    let path = cache.dir().join(&cfg.file);
    match ExtractionIndex::open(&path) {
        Ok(index) => Some(index),
        Err(e) => {
            warn!("index {} unavailable, parsing every file: {e}", path.display());
            None
        }
    }
}

fn record_run(index: &ExtractionIndex, batch: &Batch) {
    let summary = system_time_to_i64(SystemTime::now()).map(|finished_at| RunSummary {
        finished_at,
        files: batch.stats.processed,
        covers: batch.stats.covers,
    });

    if let Err(e) = summary.and_then(|s| index.record_run(&s).map_err(anyhow::Error::from)) {
        warn!("failed to record the run in the index: {e}");
    }
}

fn folder_or_prompt(folder: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(folder) = folder {
        return Ok(folder);
    }

    println!("Path to the music folder:");
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(PathBuf::from(clean_prompt_input(&line)))
}

/// Strips whitespace and the quotes file managers add when pasting a path
fn clean_prompt_input(line: &str) -> &str {
    line.trim().trim_matches('"').trim_matches('\'')
}
