//! binstore CLI
//!
//! Command-line harness for a local binstore: ingest a directory tree in
//! parallel, verify it back, and inspect individual keys.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use binstore::{Engine, StorageConfig, StreamInfo};
use clap::{Parser, Subcommand};
use crossbeam::channel;
use md5::{Digest, Md5};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

/// binstore CLI
#[derive(Parser, Debug)]
#[command(name = "binstore-cli")]
#[command(about = "CLI for the binstore content-addressed blob store")]
#[command(version)]
struct Args {
    /// Working folder holding index.bin and storage.bin
    #[arg(short, long, default_value = "./binstore_data")]
    working_folder: PathBuf,

    /// Compress payloads longer than this many bytes (0 = minimal default)
    #[arg(short, long, default_value = "0")]
    compression_threshold: u64,

    /// Maximum index table size before deflate, in bytes (0 = unbounded)
    #[arg(long, default_value = "0")]
    max_index_file: u64,

    /// Maximum data file size in bytes (0 = unbounded)
    #[arg(long, default_value = "0")]
    max_storage_file: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add every file under a directory (key = path relative to it)
    Ingest {
        /// Directory to ingest
        dir: PathBuf,

        /// Worker threads
        #[arg(short, long, default_value = "12")]
        threads: usize,
    },

    /// Check every file under a directory against the store
    Verify {
        /// Directory to compare against
        dir: PathBuf,

        /// Worker threads
        #[arg(short, long, default_value = "12")]
        threads: usize,
    },

    /// Print (or save) the bytes stored under a key
    Get {
        /// The key to get
        key: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Report whether a key is stored
    Contains {
        /// The key to look up
        key: String,
    },

    /// Print store statistics
    Stats,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,binstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!("binstore v{}", binstore::VERSION);
    tracing::info!("Working folder: {}", args.working_folder.display());

    // Build config from args
    let config = StorageConfig::builder()
        .working_folder(&args.working_folder)
        .compression_threshold(args.compression_threshold)
        .max_index_file(args.max_index_file)
        .max_storage_file(args.max_storage_file)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&engine, args.command);

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close store: {}", e);
        std::process::exit(1);
    }

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Execute one command; Ok(false) means "ran fine, answer is negative"
fn run(engine: &Engine, command: Commands) -> binstore::Result<bool> {
    match command {
        Commands::Ingest { dir, threads } => {
            let started = Instant::now();
            let failures = for_each_file(&dir, threads, |path, key| {
                let file = File::open(path)?;
                engine.add(key, file, StreamInfo::empty())
            });
            tracing::info!("Time to create: {:?}", started.elapsed());
            Ok(failures == 0)
        }
        Commands::Verify { dir, threads } => {
            let started = Instant::now();
            let failures = for_each_file(&dir, threads, |path, key| {
                let expected = md5_of(File::open(path)?)?;
                let actual = md5_of(engine.get(key)?)?;
                if expected != actual {
                    return Err(binstore::StoreError::HashMismatch {
                        expected: hex::encode(expected),
                        actual: hex::encode(actual),
                    });
                }
                Ok(())
            });
            tracing::info!("Time to verify: {:?}", started.elapsed());
            Ok(failures == 0)
        }
        Commands::Get { key, out } => {
            let mut reader = engine.get(&key)?;
            match out {
                Some(path) => {
                    let mut file = File::create(path)?;
                    io::copy(&mut reader, &mut file)?;
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    io::copy(&mut reader, &mut stdout)?;
                    stdout.flush()?;
                }
            }
            Ok(true)
        }
        Commands::Contains { key } => {
            let found = engine.contains(&key)?;
            println!("{}", found);
            Ok(found)
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            println!("entries:          {}", stats.entries);
            println!("unique payloads:  {}", stats.unique_payloads);
            println!("data file bytes:  {}", stats.data_file_len);
            Ok(true)
        }
    }
}

/// Run `op` on every file under `dir` from `threads` workers
///
/// Returns the number of files for which `op` failed, plus every path the
/// directory walk could not read.
fn for_each_file<F>(dir: &Path, threads: usize, op: F) -> usize
where
    F: Fn(&Path, &str) -> binstore::Result<()> + Sync,
{
    let (tx, rx) = channel::bounded::<(PathBuf, String)>(threads.max(1) * 4);
    let done = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    let scope_result = crossbeam::scope(|s| {
        for _ in 0..threads.max(1) {
            let rx = rx.clone();
            let (op, done, failed) = (&op, &done, &failed);
            s.spawn(move |_| {
                for (path, key) in rx.iter() {
                    match op(&path, &key) {
                        Ok(()) => {
                            done.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!("{}: {}", key, e);
                        }
                    }
                }
            });
        }
        drop(rx);

        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            let key = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            if tx.send((path, key)).is_err() {
                break;
            }
        }
        drop(tx);
    });

    if scope_result.is_err() {
        tracing::error!("A worker thread panicked");
        failed.fetch_add(1, Ordering::Relaxed);
    }

    tracing::info!(
        "count = {}, failed = {}",
        done.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed)
    );
    failed.load(Ordering::Relaxed)
}

fn md5_of<R: Read>(mut reader: R) -> io::Result<[u8; 16]> {
    let mut hasher = Md5::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}
